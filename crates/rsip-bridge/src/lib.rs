//! SIP-over-UDP transport bridge for embedding hosts
//!
//! The bridge listens for SIP datagrams on one UDP port, hands each one to a
//! registered [`EventSink`] on its own listener thread, and sends raw
//! datagrams to arbitrary peers. It does not parse SIP; payloads are passed
//! through as text.
//!
//! Three layers are available:
//!
//! - [`SipBridge`]: an owned bridge instance.
//! - The flat API ([`initialize`], [`set_callback`], [`start_listener`],
//!   [`send_datagram`], [`clear_callback`], [`shutdown`], [`version`]) over a
//!   process-wide bridge.
//! - The C ABI in [`ffi`] (`rsip_init`, `rsip_start_udp_listener`, ...),
//!   declared in `include/rsip_bridge.h`.
//!
//! ```no_run
//! use rsip_bridge::InboundEvent;
//!
//! rsip_bridge::initialize().unwrap();
//! rsip_bridge::set_callback(|event: &InboundEvent<'_>| {
//!     println!("{} from {}: {} bytes", event.kind, event.source, event.payload.len());
//! });
//! rsip_bridge::start_listener(5060).unwrap();
//!
//! rsip_bridge::send_datagram("192.0.2.10", 5060, "OPTIONS sip:192.0.2.10 SIP/2.0\r\n\r\n").unwrap();
//!
//! rsip_bridge::clear_callback();
//! rsip_bridge::shutdown().unwrap();
//! ```

pub mod api;
pub mod bridge;
pub mod config;
pub mod error;
pub mod event;
pub mod ffi;
pub mod logging;
pub mod queue;

mod dispatch;
mod registry;
mod transport;

pub use api::{
    clear_callback, initialize, initialize_with, send_datagram, set_callback, shutdown,
    start_listener, version,
};
pub use bridge::{SipBridge, TransportPhase};
pub use config::TransportConfig;
pub use error::{Error, Result};
pub use event::{EventKind, EventSink, InboundEvent};

/// `rsip-bridge-<crate version>`
pub const VERSION: &str = concat!(env!("CARGO_PKG_NAME"), "-", env!("CARGO_PKG_VERSION"));

/// Re-export of common types for easier use
pub mod prelude {
    pub use crate::{
        Error, EventKind, EventSink, InboundEvent, Result, SipBridge, TransportConfig,
        TransportPhase,
        queue::{ChannelSink, OwnedEvent, channel_sink},
    };
}
