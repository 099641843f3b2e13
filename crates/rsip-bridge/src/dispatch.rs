use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use tracing::trace;

use crate::event::{EventKind, InboundEvent};
use crate::registry::CallbackRegistry;

/// Turns raw datagrams into events for the registered sink.
///
/// Runs on the listener thread. The payload text borrows the receive buffer
/// and is gone once the sink returns.
pub(crate) struct Dispatcher {
    registry: Arc<CallbackRegistry>,
    local: SocketAddr,
}

impl Dispatcher {
    pub(crate) fn new(registry: Arc<CallbackRegistry>, local: SocketAddr) -> Self {
        Self { registry, local }
    }

    /// Deliver one datagram as a `sip_rx` event. Returns whether a sink ran.
    pub(crate) fn datagram(&self, data: &[u8], source: SocketAddr) -> bool {
        let text = String::from_utf8_lossy(data);
        trace!("Dispatching {} bytes from {}: {}", data.len(), source, text);

        self.registry.invoke_if_present(&InboundEvent {
            kind: EventKind::SipRx,
            payload: &text,
            source,
            local: self.local,
        })
    }

    /// Deliver a receive failure as an `error` event.
    pub(crate) fn receive_error(&self, err: &io::Error) -> bool {
        let text = format!("recv_err:{}", err);
        self.registry.invoke_if_present(&InboundEvent {
            kind: EventKind::Error,
            payload: &text,
            source: self.local,
            local: self.local,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn recording_registry() -> (Arc<CallbackRegistry>, Arc<Mutex<Vec<(String, String)>>>) {
        let registry = Arc::new(CallbackRegistry::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink_seen = seen.clone();
        registry.set(Arc::new(move |event: &InboundEvent<'_>| {
            sink_seen
                .lock()
                .push((event.kind.to_string(), event.payload.to_string()));
        }));
        (registry, seen)
    }

    #[test]
    fn test_datagram_is_forwarded_verbatim() {
        let (registry, seen) = recording_registry();
        let local: SocketAddr = "127.0.0.1:5060".parse().unwrap();
        let dispatcher = Dispatcher::new(registry, local);

        let invite = b"INVITE sip:bob@example.com SIP/2.0\r\nVia: SIP/2.0/UDP 10.0.0.1\r\n\r\n";
        assert!(dispatcher.datagram(invite, "10.0.0.1:5060".parse().unwrap()));

        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, "sip_rx");
        assert_eq!(seen[0].1.as_bytes(), invite);
    }

    #[test]
    fn test_invalid_utf8_is_not_fatal() {
        let (registry, seen) = recording_registry();
        let dispatcher = Dispatcher::new(registry, "127.0.0.1:5060".parse().unwrap());

        assert!(dispatcher.datagram(&[0x53, 0x49, 0x50, 0xff, 0xfe], "127.0.0.1:1".parse().unwrap()));
        assert_eq!(seen.lock()[0].1, "SIP\u{fffd}\u{fffd}");
    }

    #[test]
    fn test_receive_error_event() {
        let (registry, seen) = recording_registry();
        let dispatcher = Dispatcher::new(registry, "127.0.0.1:5060".parse().unwrap());

        let err = io::Error::new(io::ErrorKind::ConnectionReset, "reset by peer");
        assert!(dispatcher.receive_error(&err));

        let seen = seen.lock();
        assert_eq!(seen[0].0, "error");
        assert_eq!(seen[0].1, "recv_err:reset by peer");
    }

    #[test]
    fn test_no_sink_drops_silently() {
        let dispatcher = Dispatcher::new(
            Arc::new(CallbackRegistry::new()),
            "127.0.0.1:5060".parse().unwrap(),
        );
        assert!(!dispatcher.datagram(b"OPTIONS", "127.0.0.1:1".parse().unwrap()));
    }
}
