//! C ABI over the process-wide bridge.
//!
//! Declared in `include/rsip_bridge.h`. Every entry point reports failure
//! through its return value and never unwinds into the caller.

use std::ffi::{CStr, CString, c_char};
use std::panic::{AssertUnwindSafe, catch_unwind};

use tracing::{error, warn};

use crate::api;
use crate::event::{EventKind, EventSink, InboundEvent};
use crate::logging::{self, LoggingConfig};

/// Event callback signature. Both strings are valid only during the call.
pub type RsipEventCallback = extern "C" fn(event: *const c_char, payload: *const c_char);

struct ForeignSink(RsipEventCallback);

impl EventSink for ForeignSink {
    fn on_event(&self, event: &InboundEvent<'_>) {
        let kind: &CStr = match event.kind {
            EventKind::SipRx => c"sip_rx",
            EventKind::Error => c"error",
        };
        let payload = to_c_string(event.payload);
        (self.0)(kind.as_ptr(), payload.as_ptr());
        // payload is freed here; the callee copies what it keeps
    }
}

/// C strings end at the first NUL, so the payload is cut there.
fn to_c_string(text: &str) -> CString {
    let text = match text.find('\0') {
        Some(end) => &text[..end],
        None => text,
    };
    CString::new(text).unwrap_or_default()
}

fn guarded<T>(name: &str, fallback: T, f: impl FnOnce() -> T) -> T {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => value,
        Err(_) => {
            error!("{} panicked; returning failure to the caller", name);
            fallback
        }
    }
}

/// Initialize the bridge. Safe to call more than once.
#[unsafe(no_mangle)]
pub extern "C" fn rsip_init() -> bool {
    guarded("rsip_init", false, || match api::initialize() {
        Ok(()) => true,
        Err(e) => {
            warn!("rsip_init failed: {}", e);
            false
        }
    })
}

/// Register the event callback; NULL clears it.
#[unsafe(no_mangle)]
pub extern "C" fn rsip_set_event_callback(cb: Option<RsipEventCallback>) {
    guarded("rsip_set_event_callback", (), || match cb {
        Some(cb) => api::set_callback(ForeignSink(cb)),
        None => api::clear_callback(),
    })
}

/// Remove the event callback, waiting for an invocation in progress.
#[unsafe(no_mangle)]
pub extern "C" fn rsip_clear_event_callback() {
    guarded("rsip_clear_event_callback", (), api::clear_callback)
}

/// Start the UDP listener on `port`.
#[unsafe(no_mangle)]
pub extern "C" fn rsip_start_udp_listener(port: u16) -> bool {
    guarded("rsip_start_udp_listener", false, || match api::start_listener(port) {
        Ok(_) => true,
        Err(e) => {
            warn!("rsip_start_udp_listener({}) failed: {}", port, e);
            false
        }
    })
}

/// Send the NUL-terminated `data` to `dest_ip:dest_port`.
///
/// # Safety
///
/// `dest_ip` and `data` must each be NULL or point to a NUL-terminated string
/// that stays valid for the duration of the call.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn rsip_send_udp(
    dest_ip: *const c_char,
    dest_port: u16,
    data: *const c_char,
) -> bool {
    if dest_ip.is_null() || data.is_null() {
        warn!("rsip_send_udp called with a NULL argument");
        return false;
    }
    // SAFETY: both pointers are non-null and NUL-terminated per the contract above.
    let (dest_ip, data) = unsafe { (CStr::from_ptr(dest_ip), CStr::from_ptr(data)) };

    guarded("rsip_send_udp", false, || {
        let Ok(dest_ip) = dest_ip.to_str() else {
            warn!("rsip_send_udp: destination is not valid UTF-8");
            return false;
        };
        match api::send_datagram(dest_ip, dest_port, data.to_bytes()) {
            Ok(_) => true,
            Err(e) => {
                warn!("rsip_send_udp to {}:{} failed: {}", dest_ip, dest_port, e);
                false
            }
        }
    })
}

/// Stop the listener and clear the callback. Blocks until the receive thread
/// has exited.
#[unsafe(no_mangle)]
pub extern "C" fn rsip_shutdown() {
    guarded("rsip_shutdown", (), || {
        if let Err(e) = api::shutdown() {
            warn!("rsip_shutdown failed: {}", e);
        }
    })
}

/// Static version string; never freed.
#[unsafe(no_mangle)]
pub extern "C" fn rsip_version() -> *const c_char {
    concat!(env!("CARGO_PKG_NAME"), "-", env!("CARGO_PKG_VERSION"), "\0")
        .as_ptr()
        .cast()
}

/// Install a log subscriber writing to stdout. `level` may be NULL for "info";
/// `json` selects one JSON object per line instead of plain text.
///
/// # Safety
///
/// `level` must be NULL or a valid NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn rsip_enable_logging(level: *const c_char, json: bool) -> bool {
    let level = if level.is_null() {
        "info"
    } else {
        // SAFETY: non-null and NUL-terminated per the contract above.
        match unsafe { CStr::from_ptr(level) }.to_str() {
            Ok(level) => level,
            Err(_) => return false,
        }
    };

    guarded("rsip_enable_logging", false, || {
        LoggingConfig::from_level_str(level)
            .and_then(|config| logging::setup_logging(config.with_json(json)))
            .is_ok()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_c_string_truncates_at_nul() {
        assert_eq!(to_c_string("INVITE").as_bytes(), b"INVITE");
        assert_eq!(to_c_string("SIP\0tail").as_bytes(), b"SIP");
        assert_eq!(to_c_string("").as_bytes(), b"");
    }

    #[test]
    fn test_version_is_static() {
        let version = unsafe { CStr::from_ptr(rsip_version()) };
        assert_eq!(version.to_str().unwrap(), crate::VERSION);
        assert_eq!(rsip_version(), rsip_version());
    }

    #[test]
    fn test_send_rejects_null_arguments() {
        let ip = c"127.0.0.1";
        unsafe {
            assert!(!rsip_send_udp(std::ptr::null(), 5060, c"x".as_ptr()));
            assert!(!rsip_send_udp(ip.as_ptr(), 5060, std::ptr::null()));
        }
    }

    #[test]
    fn test_enable_logging_rejects_unknown_level() {
        assert!(!unsafe { rsip_enable_logging(c"loud".as_ptr(), false) });
    }
}
