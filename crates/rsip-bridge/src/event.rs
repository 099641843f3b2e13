//! Inbound events and the sink trait consumers implement to receive them.

use std::fmt;
use std::net::SocketAddr;

/// Kind of an inbound event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A datagram arrived on the listener
    SipRx,
    /// A receive on the listener socket failed
    Error,
}

impl EventKind {
    /// Wire name handed to the sink
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::SipRx => "sip_rx",
            EventKind::Error => "error",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An event delivered to the registered sink.
///
/// The payload is borrowed from the listener's receive buffer and is only
/// valid for the duration of one [`EventSink::on_event`] call. Copy anything
/// that must outlive the call.
#[derive(Debug, Clone, Copy)]
pub struct InboundEvent<'a> {
    /// What happened
    pub kind: EventKind,
    /// Datagram text (lossily decoded) or error description
    pub payload: &'a str,
    /// Sender of the datagram; the listener address for error events
    pub source: SocketAddr,
    /// Address of the listener that produced the event
    pub local: SocketAddr,
}

/// Receiver of inbound events.
///
/// Invoked synchronously on the listener thread. Implementations must return
/// quickly: the next datagram is not read until `on_event` returns. They must
/// not call `start_listener` or `shutdown` on the bridge that invoked them;
/// those calls fail with [`Error::ReentrantCall`](crate::Error::ReentrantCall).
pub trait EventSink: Send + Sync + 'static {
    /// Handle one event
    fn on_event(&self, event: &InboundEvent<'_>);
}

impl<F> EventSink for F
where
    F: Fn(&InboundEvent<'_>) + Send + Sync + 'static,
{
    fn on_event(&self, event: &InboundEvent<'_>) {
        self(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_event_kind_names() {
        assert_eq!(EventKind::SipRx.as_str(), "sip_rx");
        assert_eq!(EventKind::Error.to_string(), "error");
    }

    #[test]
    fn test_closure_is_a_sink() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let sink = move |event: &InboundEvent<'_>| {
            assert_eq!(event.kind, EventKind::SipRx);
            counter.fetch_add(event.payload.len(), Ordering::SeqCst);
        };

        let addr: SocketAddr = "127.0.0.1:5060".parse().unwrap();
        sink.on_event(&InboundEvent {
            kind: EventKind::SipRx,
            payload: "OPTIONS",
            source: addr,
            local: addr,
        });
        assert_eq!(hits.load(Ordering::SeqCst), 7);
    }
}
