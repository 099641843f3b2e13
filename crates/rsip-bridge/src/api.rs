//! Flat, process-wide API.
//!
//! These functions operate on a single [`SipBridge`] that lives for the whole
//! process. They are what the C ABI in [`crate::ffi`] calls into.

use std::net::SocketAddr;
use std::sync::LazyLock;

use crate::bridge::{SipBridge, TransportPhase};
use crate::config::TransportConfig;
use crate::error::Result;
use crate::event::EventSink;

static BRIDGE: LazyLock<SipBridge> = LazyLock::new(SipBridge::new);

/// The process-wide bridge
pub fn bridge() -> &'static SipBridge {
    &BRIDGE
}

/// Initialize the process-wide bridge with the default configuration
pub fn initialize() -> Result<()> {
    BRIDGE.initialize()
}

/// Initialize the process-wide bridge with `config`; a no-op once initialized
pub fn initialize_with(config: TransportConfig) -> Result<()> {
    BRIDGE.initialize_with(config)
}

/// Register the event sink
pub fn set_callback<S: EventSink>(sink: S) {
    BRIDGE.set_callback(sink)
}

/// Remove the event sink, waiting for an in-flight invocation
pub fn clear_callback() {
    BRIDGE.clear_callback()
}

/// Start the UDP listener on `port`
pub fn start_listener(port: u16) -> Result<SocketAddr> {
    BRIDGE.start_listener(port)
}

/// Send a raw datagram
pub fn send_datagram(dest_ip: &str, dest_port: u16, payload: impl AsRef<[u8]>) -> Result<usize> {
    BRIDGE.send_datagram(dest_ip, dest_port, payload)
}

/// Stop the listener and clear the sink
pub fn shutdown() -> Result<()> {
    BRIDGE.shutdown()
}

/// Lifecycle phase of the process-wide bridge
pub fn state() -> TransportPhase {
    BRIDGE.state()
}

/// Descriptive version string, `rsip-bridge-<version>`
pub fn version() -> &'static str {
    crate::VERSION
}
