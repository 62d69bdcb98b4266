//! Ingestion configuration

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::UpstreamError;
use crate::protocol::constants::{DEFAULT_HTTP_PORT, DEFAULT_MAX_PART_SIZE};
use crate::protocol::BoundaryQuirk;

/// Parsed `http://` upstream address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamUrl {
    /// Host name or address (IPv6 without brackets)
    pub host: String,
    /// TCP port
    pub port: u16,
    /// Request target: path plus query, at least `/`
    pub path: String,
}

impl UpstreamUrl {
    /// Parse an upstream URL
    ///
    /// Format: `http://host[:port][/path][?query]`
    pub fn parse(url: &str) -> Result<Self, UpstreamError> {
        let invalid = |reason: &str| UpstreamError::InvalidUrl {
            url: url.to_string(),
            reason: reason.to_string(),
        };

        let (scheme, rest) = url
            .split_once("://")
            .ok_or_else(|| invalid("missing scheme"))?;
        if !scheme.eq_ignore_ascii_case("http") {
            return Err(UpstreamError::UnsupportedScheme(scheme.to_string()));
        }

        let (authority, path) = match rest.find(&['/', '?'][..]) {
            Some(idx) => (&rest[..idx], &rest[idx..]),
            None => (rest, "/"),
        };
        let path = if path.starts_with('?') {
            format!("/{path}")
        } else {
            path.to_string()
        };
        // Credentials are not used
        let authority = authority.rsplit_once('@').map_or(authority, |(_, host)| host);

        let (host, port) = if let Some(bracketed) = authority.strip_prefix('[') {
            let (host, after) = bracketed
                .split_once(']')
                .ok_or_else(|| invalid("unterminated IPv6 address"))?;
            let port = match after.strip_prefix(':') {
                Some(port) => Some(port),
                None if after.is_empty() => None,
                None => return Err(invalid("unexpected text after IPv6 address")),
            };
            (host, port)
        } else {
            match authority.rsplit_once(':') {
                Some((host, port)) => (host, Some(port)),
                None => (authority, None),
            }
        };

        if host.is_empty() {
            return Err(invalid("missing host"));
        }
        let port = match port {
            Some(port) => port.parse().map_err(|_| invalid("invalid port"))?,
            None => DEFAULT_HTTP_PORT,
        };

        Ok(Self {
            host: host.to_string(),
            port,
            path,
        })
    }

    /// `host:port` for connecting
    pub fn socket_addr(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// Value of the `Host` request header
    pub fn host_header(&self) -> String {
        if self.port == DEFAULT_HTTP_PORT {
            if self.host.contains(':') {
                format!("[{}]", self.host)
            } else {
                self.host.clone()
            }
        } else {
            self.socket_addr()
        }
    }
}

impl FromStr for UpstreamUrl {
    type Err = UpstreamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for UpstreamUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "http://{}{}", self.host_header(), self.path)
    }
}

/// Ingestion options
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Upstream source
    pub url: UpstreamUrl,

    /// Transform applied to the announced boundary
    pub boundary_quirk: BoundaryQuirk,

    /// Connect plus response-head deadline
    pub connect_timeout: Duration,

    /// Deadline for each read from the upstream body
    pub read_timeout: Duration,

    /// Largest accepted part body
    pub max_part_size: usize,

    /// First reconnect delay
    pub initial_backoff: Duration,

    /// Upper bound on the reconnect delay
    pub max_backoff: Duration,

    /// Consecutive failed attempts before giving up (0 = never give up)
    pub max_reconnect_attempts: u32,
}

impl IngestConfig {
    /// Default options for `url`
    pub fn new(url: UpstreamUrl) -> Self {
        Self {
            url,
            boundary_quirk: BoundaryQuirk::default(),
            connect_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(30),
            max_part_size: DEFAULT_MAX_PART_SIZE,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
            max_reconnect_attempts: 10,
        }
    }

    /// Set the boundary transform
    pub fn boundary_quirk(mut self, quirk: BoundaryQuirk) -> Self {
        self.boundary_quirk = quirk;
        self
    }

    /// Set connect timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set read timeout
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Set the part size limit
    pub fn max_part_size(mut self, size: usize) -> Self {
        self.max_part_size = size;
        self
    }

    /// Set the reconnect delay range
    pub fn backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_backoff = initial;
        self.max_backoff = max.max(initial);
        self
    }

    /// Set how many consecutive failures are tolerated
    pub fn max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }
}

/// Exponential reconnect delay
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    next: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            next: initial,
        }
    }

    /// Delay before the next attempt; doubles up to the maximum
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.next;
        self.next = (self.next * 2).min(self.max);
        delay
    }

    /// Start over from the initial delay
    pub fn reset(&mut self) {
        self.next = self.initial;
    }
}
