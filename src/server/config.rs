//! Server configuration

use std::net::{SocketAddr, ToSocketAddrs};

use crate::error::{Error, Result};

/// Default port when none is configured
pub const DEFAULT_LISTEN_PORT: u16 = 8080;

/// HTTP server options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_LISTEN_PORT)),
        }
    }
}

impl ServerConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self { bind_addr: addr }
    }
}

/// Resolve a listen string
///
/// Accepts `host:port` (names are resolved) and the bare `:port` form, which
/// binds all interfaces.
pub fn parse_listen_addr(listen: &str) -> Result<SocketAddr> {
    let listen = listen.trim();
    let full = match listen.strip_prefix(':') {
        Some(port) => format!("0.0.0.0:{port}"),
        None => listen.to_string(),
    };

    full.to_socket_addrs()
        .map_err(|e| Error::Config(format!("invalid listen address {listen:?}: {e}")))?
        .next()
        .ok_or_else(|| Error::Config(format!("listen address {listen:?} did not resolve")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_binds_all_interfaces() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr, "0.0.0.0:8080".parse().unwrap());
    }

    #[test]
    fn test_parse_bare_port() {
        assert_eq!(
            parse_listen_addr(":8080").unwrap(),
            "0.0.0.0:8080".parse::<SocketAddr>().unwrap()
        );
    }

    #[test]
    fn test_parse_host_port() {
        assert_eq!(
            parse_listen_addr("127.0.0.1:9000").unwrap(),
            "127.0.0.1:9000".parse::<SocketAddr>().unwrap()
        );
        assert_eq!(
            parse_listen_addr("[::1]:9000").unwrap(),
            "[::1]:9000".parse::<SocketAddr>().unwrap()
        );
    }

    #[test]
    fn test_parse_invalid() {
        assert!(matches!(parse_listen_addr(":http-ish"), Err(Error::Config(_))));
        assert!(parse_listen_addr("").is_err());
    }
}
