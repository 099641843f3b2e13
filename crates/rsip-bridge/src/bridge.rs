//! Lifecycle controller
//!
//! A [`SipBridge`] owns one callback slot and at most one listener. The
//! process-wide instance behind the flat API lives in [`crate::api`]; tests
//! and hosts that want several listeners create their own bridges.
//!
//! ```text
//! Uninitialized ──initialize──▶ Initialized ──start_listener──▶ Listening
//!                                                   ▲               │
//!                                                   │           shutdown
//!                                  start_listener ──┴── Stopped ◀───┘
//! ```
//!
//! `shutdown` reaches `Stopped` from every phase. A bridge shut down before
//! it was ever initialized still needs `initialize` before it can listen.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::config::TransportConfig;
use crate::error::{Error, Result};
use crate::event::EventSink;
use crate::registry::CallbackRegistry;
use crate::transport::{self, UdpListener};

/// Lifecycle phase of a bridge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportPhase {
    /// `initialize` has not run yet
    Uninitialized,
    /// Ready to start a listener
    Initialized,
    /// A listener is bound and receiving
    Listening,
    /// `shutdown` ran; a listener may be started again
    Stopped,
}

impl fmt::Display for TransportPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransportPhase::Uninitialized => "uninitialized",
            TransportPhase::Initialized => "initialized",
            TransportPhase::Listening => "listening",
            TransportPhase::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

struct TransportState {
    phase: TransportPhase,
    // Set by the first successful initialize, never cleared
    initialized: bool,
    config: TransportConfig,
    // Some exactly when phase == Listening
    listener: Option<UdpListener>,
}

/// SIP-over-UDP transport bridge
pub struct SipBridge {
    // Serializes initialize / start_listener / shutdown
    lifecycle: Mutex<()>,
    state: Mutex<TransportState>,
    registry: Arc<CallbackRegistry>,
}

impl SipBridge {
    /// Create an uninitialized bridge
    pub fn new() -> Self {
        Self {
            lifecycle: Mutex::new(()),
            state: Mutex::new(TransportState {
                phase: TransportPhase::Uninitialized,
                initialized: false,
                config: TransportConfig::default(),
                listener: None,
            }),
            registry: Arc::new(CallbackRegistry::new()),
        }
    }

    /// Initialize with the default configuration. Later calls are no-ops.
    pub fn initialize(&self) -> Result<()> {
        self.initialize_with(TransportConfig::default())
    }

    /// Initialize with `config`. Once initialized, further calls succeed
    /// without changing anything, including the configuration.
    pub fn initialize_with(&self, config: TransportConfig) -> Result<()> {
        config.validate()?;
        // A running listener implies an initialized bridge
        if self.registry.is_dispatching_on_current_thread() {
            return Ok(());
        }

        let _lifecycle = self.lifecycle.lock();
        let mut state = self.state.lock();
        if state.initialized {
            debug!("Bridge already initialized ({}), ignoring initialize", state.phase);
            return Ok(());
        }

        state.config = config;
        state.initialized = true;
        state.phase = TransportPhase::Initialized;
        info!("SIP bridge initialized");
        Ok(())
    }

    /// Register the event sink, replacing any previous one.
    ///
    /// Once this returns the previous sink is never invoked again.
    pub fn set_callback<S: EventSink>(&self, sink: S) {
        self.set_callback_arc(Arc::new(sink));
    }

    /// Register a shared event sink, replacing any previous one.
    pub fn set_callback_arc(&self, sink: Arc<dyn EventSink>) {
        self.registry.set(sink);
        debug!("Event sink registered");
    }

    /// Remove the event sink.
    ///
    /// Blocks until an invocation already in progress has returned, so the
    /// sink's context may be released as soon as this call completes.
    pub fn clear_callback(&self) {
        if self.registry.clear() {
            debug!("Event sink cleared");
        }
    }

    /// Whether an event sink is registered
    pub fn has_callback(&self) -> bool {
        self.registry.has_callback()
    }

    /// Bind the configured address on `port` and start receiving.
    pub fn start_listener(&self, port: u16) -> Result<SocketAddr> {
        if port == 0 {
            return Err(Error::InvalidPort(port));
        }
        if self.registry.is_dispatching_on_current_thread() {
            return Err(Error::ReentrantCall("start_listener"));
        }

        let _lifecycle = self.lifecycle.lock();
        let config = {
            let state = self.state.lock();
            match (state.phase, state.listener.as_ref()) {
                _ if !state.initialized => return Err(Error::NotInitialized),
                (TransportPhase::Listening, Some(listener)) => {
                    return Err(Error::AlreadyRunning(listener.local_addr()));
                }
                _ => state.config.clone(),
            }
        };

        let addr = SocketAddr::new(config.bind_address, port);
        let listener = UdpListener::spawn(addr, &config, self.registry.clone())?;
        let local_addr = listener.local_addr();

        let mut state = self.state.lock();
        state.listener = Some(listener);
        state.phase = TransportPhase::Listening;
        info!("SIP bridge listening on {}", local_addr);
        Ok(local_addr)
    }

    /// Send `payload` verbatim to `dest_ip:dest_port`.
    ///
    /// Returns the number of bytes sent. Safe to call from any thread,
    /// including from inside the event sink.
    pub fn send_datagram(
        &self,
        dest_ip: &str,
        dest_port: u16,
        payload: impl AsRef<[u8]>,
    ) -> Result<usize> {
        let destination = transport::parse_destination(dest_ip, dest_port)?;

        let listener = {
            let state = self.state.lock();
            if !state.initialized {
                return Err(Error::NotInitialized);
            }
            state
                .listener
                .as_ref()
                .map(|l| (l.send_socket(), l.local_addr()))
        };

        transport::send_datagram(
            listener.as_ref().map(|(socket, local)| (socket.as_ref(), *local)),
            payload.as_ref(),
            destination,
        )
    }

    /// Stop the listener, wait for its thread, and clear the event sink.
    ///
    /// Idempotent and valid in every phase. When this returns no further
    /// sink invocation can happen and the port can be bound again.
    pub fn shutdown(&self) -> Result<()> {
        if self.registry.is_dispatching_on_current_thread() {
            warn!("shutdown called from inside the event sink; hand it off to another thread");
            return Err(Error::ReentrantCall("shutdown"));
        }

        let _lifecycle = self.lifecycle.lock();
        let listener = {
            let mut state = self.state.lock();
            state.phase = TransportPhase::Stopped;
            state.listener.take()
        };

        // Joined without holding the state lock so a sink can still send
        if let Some(listener) = listener {
            let addr = listener.local_addr();
            listener.stop();
            info!("SIP bridge listener on {} shut down", addr);
        }

        self.registry.clear();
        Ok(())
    }

    /// Current lifecycle phase
    pub fn state(&self) -> TransportPhase {
        self.state.lock().phase
    }

    /// Whether a listener is running
    pub fn is_running(&self) -> bool {
        self.state.lock().phase == TransportPhase::Listening
    }

    /// Address of the running listener
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.state.lock().listener.as_ref().map(|l| l.local_addr())
    }

    /// Active configuration
    pub fn config(&self) -> TransportConfig {
        self.state.lock().config.clone()
    }
}

impl Default for SipBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SipBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.local_addr() {
            Some(addr) => write!(f, "SipBridge({}, {})", self.state(), addr),
            None => write!(f, "SipBridge({})", self.state()),
        }
    }
}

impl Drop for SipBridge {
    fn drop(&mut self) {
        if let Some(listener) = self.state.get_mut().listener.take() {
            if self.registry.is_dispatching_on_current_thread() {
                // Last reference dropped by the sink: the thread exits on its own.
                drop(listener);
            } else {
                listener.stop();
            }
        }
    }
}
