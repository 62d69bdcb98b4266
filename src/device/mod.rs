//! Stream device record
//!
//! The shared, injected context every component is built from: source
//! address, frame chain, receive counters, sampled metrics and health.

pub mod health;
pub mod state;

pub use health::StreamHealth;
pub use state::{CounterSnapshot, StreamState, SubscriberGuard};
