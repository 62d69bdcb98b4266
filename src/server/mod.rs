//! HTTP server
//!
//! A thin axum front end over the relay: routes, pages and the listener.

pub mod config;
pub mod listener;
pub mod pages;
pub mod routes;

pub use config::{parse_listen_addr, ServerConfig};
pub use listener::RelayServer;
pub use routes::{router, AppState};
