//! Callback slot shared between the consumer and the listener thread.
//!
//! Two locks cooperate here. `slot` holds the current sink and is only ever
//! held for a pointer copy. `invocation` is held by the dispatcher for the
//! whole sink call, and the slot is read while it is held. Register and clear
//! write the slot first and then pass through `invocation`, so by the time
//! they return any invocation that could have observed the previous sink has
//! finished, and every later invocation observes the new value.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::thread::{self, ThreadId};

use parking_lot::Mutex;
use tracing::{error, trace};

use crate::event::{EventSink, InboundEvent};

pub(crate) struct CallbackRegistry {
    slot: Mutex<Option<Arc<dyn EventSink>>>,
    invocation: Mutex<()>,
    dispatching: Mutex<Option<ThreadId>>,
}

impl CallbackRegistry {
    pub(crate) fn new() -> Self {
        Self {
            slot: Mutex::new(None),
            invocation: Mutex::new(()),
            dispatching: Mutex::new(None),
        }
    }

    /// Replace the sink. The previous sink is not invoked once this returns.
    pub(crate) fn set(&self, sink: Arc<dyn EventSink>) {
        let previous = self.slot.lock().replace(sink);
        self.wait_for_in_flight();
        drop(previous);
    }

    /// Remove the sink. Returns whether one was registered.
    pub(crate) fn clear(&self) -> bool {
        let previous = self.slot.lock().take();
        self.wait_for_in_flight();
        previous.is_some()
    }

    pub(crate) fn has_callback(&self) -> bool {
        self.slot.lock().is_some()
    }

    /// True while the calling thread is inside a sink invocation of this registry.
    pub(crate) fn is_dispatching_on_current_thread(&self) -> bool {
        *self.dispatching.lock() == Some(thread::current().id())
    }

    /// Invoke the registered sink, if any. Returns whether a sink was called.
    pub(crate) fn invoke_if_present(&self, event: &InboundEvent<'_>) -> bool {
        let _invocation = self.invocation.lock();

        let Some(sink) = self.slot.lock().clone() else {
            trace!("No sink registered, dropping {} event from {}", event.kind, event.source);
            return false;
        };

        let _marker = DispatchMarker::enter(&self.dispatching);
        if let Err(panic) = catch_unwind(AssertUnwindSafe(|| sink.on_event(event))) {
            error!(
                "Event sink panicked while handling {} event from {}: {}",
                event.kind,
                event.source,
                panic_message(&panic)
            );
        }
        true
    }

    fn wait_for_in_flight(&self) {
        // A sink replacing or clearing itself is the in-flight invocation.
        if self.is_dispatching_on_current_thread() {
            return;
        }
        drop(self.invocation.lock());
    }
}

/// Records the dispatching thread for the duration of one sink call.
struct DispatchMarker<'a> {
    dispatching: &'a Mutex<Option<ThreadId>>,
}

impl<'a> DispatchMarker<'a> {
    fn enter(dispatching: &'a Mutex<Option<ThreadId>>) -> Self {
        *dispatching.lock() = Some(thread::current().id());
        Self { dispatching }
    }
}

impl Drop for DispatchMarker<'_> {
    fn drop(&mut self) {
        *self.dispatching.lock() = None;
    }
}

fn panic_message(panic: &Box<dyn Any + Send>) -> &str {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "<non-string panic payload>"
    }
}
