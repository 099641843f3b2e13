//! UDP socket management: the listener thread and the send path.

mod listener;
mod sender;

pub(crate) use listener::UdpListener;
pub(crate) use sender::{parse_destination, send_datagram};
