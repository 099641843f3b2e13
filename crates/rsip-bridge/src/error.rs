use std::io;
use std::net::SocketAddr;

use thiserror::Error;

/// A type alias for handling `Result`s with `Error`
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the SIP bridge
#[derive(Error, Debug)]
pub enum Error {
    /// Port 0 is never a valid listen or destination port.
    #[error("Invalid port: {0}")]
    InvalidPort(u16),

    /// The destination is not an IP address literal.
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Rejected transport configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Failed to bind the listener socket
    #[error("Failed to bind to {0}: {1}")]
    BindFailed(SocketAddr, #[source] io::Error),

    /// Failed to send a datagram
    #[error("Failed to send to {0}: {1}")]
    SendFailed(SocketAddr, #[source] io::Error),

    /// Payload does not fit into a single UDP datagram
    #[error("Packet too large: {0} bytes (max {1})")]
    PacketTooLarge(usize, usize),

    /// An operation was attempted before `initialize()`.
    #[error("Bridge is not initialized")]
    NotInitialized,

    /// A listener is already running on the given address.
    #[error("Listener already running on {0}")]
    AlreadyRunning(SocketAddr),

    /// A lifecycle operation was called from inside the event sink.
    #[error("{0} called from inside the event sink")]
    ReentrantCall(&'static str),

    /// Other I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create an invalid address error
    pub fn invalid_address(address: impl Into<String>) -> Self {
        Self::InvalidAddress(address.into())
    }

    /// Returns true for errors caused by caller input rather than the OS.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidPort(_) | Error::InvalidAddress(_) | Error::Config(_)
        )
    }

    /// Returns true for misuse of the lifecycle contract.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            Error::NotInitialized | Error::AlreadyRunning(_) | Error::ReentrantCall(_)
        )
    }
}
