//! Transport configuration
//!
//! ```rust
//! use rsip_bridge::TransportConfig;
//! use std::time::Duration;
//!
//! let config = TransportConfig::default()
//!     .with_bind_address("127.0.0.1".parse().unwrap())
//!     .with_error_backoff(Duration::from_millis(20))
//!     .with_receive_error_events();
//!
//! assert!(config.validate().is_ok());
//! ```
//!
//! The same settings can be loaded from TOML:
//!
//! ```toml
//! bind_address = "0.0.0.0"
//! max_datagram_size = 65535
//! error_backoff_ms = 50
//! report_receive_errors = false
//! thread_name = "rsip-udp-rx"
//! ```

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Largest payload a single IPv4 UDP datagram can carry
pub const MAX_UDP_PAYLOAD: usize = 65_507;

const DEFAULT_MAX_DATAGRAM_SIZE: usize = 65_535;
const DEFAULT_ERROR_BACKOFF_MS: u64 = 50;
const DEFAULT_THREAD_NAME: &str = "rsip-udp-rx";

/// Settings for the listener socket and its receive thread
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Local address the listener binds to; the port is given to `start_listener`
    pub bind_address: IpAddr,

    /// Size of the receive buffer; longer datagrams are truncated by the OS
    pub max_datagram_size: usize,

    /// SO_RCVBUF override, left to the OS default when `None`
    pub recv_buffer_size: Option<usize>,

    /// Pause after a failed receive, in milliseconds
    pub error_backoff_ms: u64,

    /// Deliver receive failures to the sink as `"error"` events
    pub report_receive_errors: bool,

    /// Name of the background receive thread
    pub thread_name: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            max_datagram_size: DEFAULT_MAX_DATAGRAM_SIZE,
            recv_buffer_size: None,
            error_backoff_ms: DEFAULT_ERROR_BACKOFF_MS,
            report_receive_errors: false,
            thread_name: DEFAULT_THREAD_NAME.to_string(),
        }
    }
}

impl TransportConfig {
    /// Parse a configuration from a TOML document. Missing keys keep their defaults.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: Self = toml::from_str(source)
            .map_err(|e| Error::config(format!("invalid TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Set the local bind address
    pub fn with_bind_address(mut self, address: IpAddr) -> Self {
        self.bind_address = address;
        self
    }

    /// Set the receive buffer size
    pub fn with_max_datagram_size(mut self, size: usize) -> Self {
        self.max_datagram_size = size;
        self
    }

    /// Override the kernel receive buffer size
    pub fn with_recv_buffer_size(mut self, size: usize) -> Self {
        self.recv_buffer_size = Some(size);
        self
    }

    /// Set the back-off applied after a failed receive
    pub fn with_error_backoff(mut self, backoff: Duration) -> Self {
        self.error_backoff_ms = backoff.as_millis().min(u64::MAX as u128) as u64;
        self
    }

    /// Report receive errors to the sink
    pub fn with_receive_error_events(mut self) -> Self {
        self.report_receive_errors = true;
        self
    }

    /// Set the receive thread name
    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    /// Back-off after a failed receive
    pub fn error_backoff(&self) -> Duration {
        Duration::from_millis(self.error_backoff_ms)
    }

    /// Validate the configuration
    ///
    /// # Returns
    /// Ok(()) if valid, `Error::Config` otherwise
    pub fn validate(&self) -> Result<()> {
        if self.max_datagram_size == 0 {
            return Err(Error::config("max_datagram_size must be greater than 0"));
        }
        if self.max_datagram_size > DEFAULT_MAX_DATAGRAM_SIZE {
            return Err(Error::config(format!(
                "max_datagram_size must not exceed {}",
                DEFAULT_MAX_DATAGRAM_SIZE
            )));
        }
        if self.recv_buffer_size == Some(0) {
            return Err(Error::config("recv_buffer_size must be greater than 0"));
        }
        if self.thread_name.is_empty() || self.thread_name.contains('\0') {
            return Err(Error::config("thread_name must be non-empty and contain no NUL"));
        }
        Ok(())
    }
}
