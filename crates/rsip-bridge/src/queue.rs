//! Bounded hand-off from the listener thread.
//!
//! [`ChannelSink`] copies each event into a tokio channel without blocking,
//! so slow consumers run on their own thread or task instead of stalling the
//! receive loop. When the channel is full the event is dropped and counted.
//!
//! ```no_run
//! use rsip_bridge::{SipBridge, queue::channel_sink};
//!
//! let bridge = SipBridge::new();
//! bridge.initialize().unwrap();
//!
//! let (sink, mut events) = channel_sink(1024);
//! bridge.set_callback(sink.clone());
//! bridge.start_listener(5060).unwrap();
//!
//! std::thread::spawn(move || {
//!     while let Some(event) = events.blocking_recv() {
//!         println!("{} from {}: {}", event.kind, event.source, event.text());
//!     }
//! });
//! ```

use std::borrow::Cow;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::event::{EventKind, EventSink, InboundEvent};

/// Owned copy of an [`InboundEvent`]
#[derive(Debug, Clone)]
pub struct OwnedEvent {
    /// What happened
    pub kind: EventKind,
    /// Payload bytes (valid UTF-8)
    pub payload: Bytes,
    /// Sender of the datagram
    pub source: SocketAddr,
    /// Listener address
    pub local: SocketAddr,
    /// When the listener handed the event over
    pub received_at: Instant,
}

impl OwnedEvent {
    /// Copy a borrowed event
    pub fn from_event(event: &InboundEvent<'_>) -> Self {
        Self {
            kind: event.kind,
            payload: Bytes::copy_from_slice(event.payload.as_bytes()),
            source: event.source,
            local: event.local,
            received_at: Instant::now(),
        }
    }

    /// Payload as text
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }
}

/// Event sink that forwards owned copies into a bounded channel
#[derive(Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<OwnedEvent>,
    delivered: Arc<AtomicU64>,
    dropped: Arc<AtomicU64>,
}

/// Create a [`ChannelSink`] and the receiver for its events
pub fn channel_sink(capacity: usize) -> (ChannelSink, mpsc::Receiver<OwnedEvent>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let sink = ChannelSink {
        tx,
        delivered: Arc::new(AtomicU64::new(0)),
        dropped: Arc::new(AtomicU64::new(0)),
    };
    (sink, rx)
}

impl ChannelSink {
    /// Events handed to the channel
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    /// Events dropped because the channel was full or closed
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl EventSink for ChannelSink {
    fn on_event(&self, event: &InboundEvent<'_>) {
        match self.tx.try_send(OwnedEvent::from_event(event)) {
            Ok(()) => {
                self.delivered.fetch_add(1, Ordering::Relaxed);
            }
            Err(mpsc::error::TrySendError::Full(event)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                warn!("Event queue full, dropping {} event from {}", event.kind, event.source);
            }
            Err(mpsc::error::TrySendError::Closed(event)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                debug!("Event queue closed, dropping {} event from {}", event.kind, event.source);
            }
        }
    }
}
