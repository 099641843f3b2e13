//! Exercises the C ABI the way a C host does: plain `extern "C"` callbacks,
//! NUL-terminated strings, boolean results.

use std::ffi::{CStr, c_char};
use std::net::UdpSocket;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serial_test::serial;

use rsip_bridge::ffi::{
    rsip_clear_event_callback, rsip_init, rsip_send_udp, rsip_set_event_callback, rsip_shutdown,
    rsip_start_udp_listener, rsip_version,
};

static EVENTS: Mutex<Vec<(String, String)>> = parking_lot::const_mutex(Vec::new());
static CALLS: AtomicUsize = AtomicUsize::new(0);

extern "C" fn capture_callback(event: *const c_char, payload: *const c_char) {
    // Copy out: both strings are freed when this returns
    let (event, payload) = unsafe {
        (
            CStr::from_ptr(event).to_string_lossy().into_owned(),
            CStr::from_ptr(payload).to_string_lossy().into_owned(),
        )
    };
    CALLS.fetch_add(1, Ordering::SeqCst);
    EVENTS.lock().push((event, payload));
}

fn reset() {
    EVENTS.lock().clear();
    CALLS.store(0, Ordering::SeqCst);
}

fn free_port() -> u16 {
    UdpSocket::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port()
}

fn wait_for_calls(n: usize) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if CALLS.load(Ordering::SeqCst) >= n {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    false
}

#[test]
#[serial]
fn test_version_linkage() {
    let version = unsafe { CStr::from_ptr(rsip_version()) }.to_str().unwrap();
    assert!(version.starts_with("rsip-bridge-"));
}

#[test]
#[serial]
fn test_init_and_shutdown_cycles() {
    for _ in 0..3 {
        assert!(rsip_init());
        rsip_shutdown();
    }
    rsip_shutdown();
}

#[test]
#[serial]
fn test_listener_lifecycle_delivers_sip_rx() {
    reset();
    assert!(rsip_init());
    rsip_set_event_callback(Some(capture_callback));

    let port = free_port();
    assert!(rsip_start_udp_listener(port));
    assert!(!rsip_start_udp_listener(port), "second listener must be rejected");

    let invite = "INVITE sip:test@localhost SIP/2.0\r\nVia: SIP/2.0/UDP 127.0.0.1\r\n\r\n";
    let client = UdpSocket::bind("127.0.0.1:0").unwrap();
    client.send_to(invite.as_bytes(), ("127.0.0.1", port)).unwrap();

    assert!(wait_for_calls(1));
    assert_eq!(EVENTS.lock()[0], ("sip_rx".to_string(), invite.to_string()));

    rsip_clear_event_callback();
    rsip_shutdown();
}

#[test]
#[serial]
fn test_send_udp_through_abi() {
    reset();
    assert!(rsip_init());
    rsip_set_event_callback(Some(capture_callback));

    let port = free_port();
    assert!(rsip_start_udp_listener(port));

    let sent = unsafe { rsip_send_udp(c"127.0.0.1".as_ptr(), port, c"PING".as_ptr()) };
    assert!(sent);
    assert!(wait_for_calls(1));
    assert_eq!(EVENTS.lock()[0].1, "PING");

    let rejected = unsafe { rsip_send_udp(c"not-an-ip".as_ptr(), 5060, c"x".as_ptr()) };
    assert!(!rejected);

    rsip_shutdown();
}

#[test]
#[serial]
fn test_null_callback_clears() {
    reset();
    assert!(rsip_init());
    rsip_set_event_callback(Some(capture_callback));
    rsip_set_event_callback(None);

    let port = free_port();
    assert!(rsip_start_udp_listener(port));
    UdpSocket::bind("127.0.0.1:0")
        .unwrap()
        .send_to(b"OPTIONS", ("127.0.0.1", port))
        .unwrap();

    thread::sleep(Duration::from_millis(200));
    assert_eq!(CALLS.load(Ordering::SeqCst), 0);
    rsip_shutdown();
}

#[test]
#[serial]
fn test_port_zero_rejected() {
    assert!(rsip_init());
    assert!(!rsip_start_udp_listener(0));
    rsip_shutdown();
}
