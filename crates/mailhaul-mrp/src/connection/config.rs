//! Connection configuration types.

use std::time::Duration;

use crate::{Error, Result};

/// Lowest port the protocol accepts, exclusive.
pub const PORT_MIN: u16 = 2048;

/// Highest port the protocol accepts, exclusive.
pub const PORT_MAX: u16 = 65535;

/// MRP connection configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server hostname.
    pub host: String,
    /// Server port, within the open range 2048–65535.
    pub port: u16,
    /// Pre-shared key the session ciphers derive from.
    pub key: Vec<u8>,
    /// Connection timeout.
    pub connect_timeout: Duration,
}

impl Config {
    /// Creates a new configuration.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] if `port` falls outside the open range
    /// 2048–65535.
    pub fn new(host: impl Into<String>, port: u16, key: impl Into<Vec<u8>>) -> Result<Self> {
        if !port_in_range(port) {
            return Err(Error::Config(format!(
                "port {port} must be between {PORT_MIN} and {PORT_MAX} exclusive"
            )));
        }
        Ok(Self {
            host: host.into(),
            port,
            key: key.into(),
            connect_timeout: Duration::from_secs(30),
        })
    }

    /// Sets the connection timeout.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// The server address in `host:port` form.
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Whether a port lies in the protocol's open range 2048–65535.
#[must_use]
pub const fn port_in_range(port: u16) -> bool {
    port > PORT_MIN && port < PORT_MAX
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    #[test]
    fn test_port_bounds_are_exclusive() {
        assert!(!port_in_range(2048));
        assert!(port_in_range(2049));
        assert!(port_in_range(65534));
        assert!(!port_in_range(65535));
        assert!(!port_in_range(80));
    }

    #[test]
    fn test_config_rejects_out_of_range_port() {
        assert!(Config::new("localhost", 2048, b"key".to_vec()).is_err());
        assert!(Config::new("localhost", 1024, b"key".to_vec()).is_err());
        let config = Config::new("localhost", 5000, b"key".to_vec()).unwrap();
        assert_eq!(config.address(), "localhost:5000");
    }
}
