use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};

use tracing::{debug, trace};

use crate::config::MAX_UDP_PAYLOAD;
use crate::error::{Error, Result};

/// Parse `dest_ip:dest_port` into a socket address. Host names are not resolved.
pub(crate) fn parse_destination(dest_ip: &str, dest_port: u16) -> Result<SocketAddr> {
    if dest_port == 0 {
        return Err(Error::InvalidPort(dest_port));
    }
    let ip: IpAddr = dest_ip
        .trim()
        .parse()
        .map_err(|_| Error::invalid_address(dest_ip))?;
    Ok(SocketAddr::new(ip, dest_port))
}

/// Whether a socket bound to `local` can send to `destination`.
///
/// The address family must match, and a loopback-bound socket only reaches
/// loopback peers.
fn can_reach(local: SocketAddr, destination: SocketAddr) -> bool {
    local.is_ipv4() == destination.is_ipv4()
        && (!local.ip().is_loopback() || destination.ip().is_loopback())
}

/// Best-effort datagram send.
///
/// Uses the listener socket when one is given and it can reach the
/// destination, so replies leave from the SIP port. Otherwise an ephemeral
/// socket is bound for this one send.
pub(crate) fn send_datagram(
    listener: Option<(&UdpSocket, SocketAddr)>,
    payload: &[u8],
    destination: SocketAddr,
) -> Result<usize> {
    if payload.len() > MAX_UDP_PAYLOAD {
        return Err(Error::PacketTooLarge(payload.len(), MAX_UDP_PAYLOAD));
    }

    let sent = match listener {
        Some((socket, local)) if can_reach(local, destination) => {
            debug!("Sending {} bytes to {} from {}", payload.len(), destination, local);
            socket
                .send_to(payload, destination)
                .map_err(|e| Error::SendFailed(destination, e))?
        }
        _ => {
            let unspecified = if destination.is_ipv4() {
                IpAddr::V4(Ipv4Addr::UNSPECIFIED)
            } else {
                IpAddr::V6(Ipv6Addr::UNSPECIFIED)
            };
            let socket = UdpSocket::bind(SocketAddr::new(unspecified, 0))
                .map_err(|e| Error::SendFailed(destination, e))?;
            debug!("Sending {} bytes to {} from ephemeral socket", payload.len(), destination);
            socket
                .send_to(payload, destination)
                .map_err(|e| Error::SendFailed(destination, e))?
        }
    };

    trace!("Sent to {}: {}", destination, String::from_utf8_lossy(payload));
    Ok(sent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_parse_destination() {
        assert_eq!(
            parse_destination("127.0.0.1", 5060).unwrap(),
            "127.0.0.1:5060".parse::<SocketAddr>().unwrap()
        );
        assert_eq!(
            parse_destination("::1", 5060).unwrap(),
            "[::1]:5060".parse::<SocketAddr>().unwrap()
        );
        assert!(matches!(parse_destination("not-an-ip", 5060), Err(Error::InvalidAddress(_))));
        assert!(matches!(parse_destination("999.999.999.999", 5060), Err(Error::InvalidAddress(_))));
        assert!(matches!(parse_destination("", 5060), Err(Error::InvalidAddress(_))));
        assert!(matches!(parse_destination("127.0.0.1", 0), Err(Error::InvalidPort(0))));
    }

    #[test]
    fn test_can_reach() {
        let addr = |s: &str| s.parse::<SocketAddr>().unwrap();

        assert!(can_reach(addr("0.0.0.0:5060"), addr("192.0.2.10:5060")));
        assert!(can_reach(addr("0.0.0.0:5060"), addr("127.0.0.1:5060")));
        assert!(can_reach(addr("127.0.0.1:5060"), addr("127.0.0.1:5070")));
        assert!(can_reach(addr("[::1]:5060"), addr("[::1]:5070")));

        assert!(!can_reach(addr("127.0.0.1:5060"), addr("192.0.2.10:5060")));
        assert!(!can_reach(addr("[::1]:5060"), addr("[2001:db8::1]:5060")));
        assert!(!can_reach(addr("0.0.0.0:5060"), addr("[::1]:5060")));
    }

    #[test]
    fn test_loopback_listener_not_used_for_remote_peer() {
        // A remote destination falls through to an ephemeral socket; that
        // send may still fail without a route, but never with the listener's
        // EINVAL.
        let local = UdpSocket::bind("127.0.0.1:0").unwrap();
        let local_addr = local.local_addr().unwrap();
        let destination: SocketAddr = "192.0.2.10:5060".parse().unwrap();

        match send_datagram(Some((&local, local_addr)), b"OPTIONS", destination) {
            Ok(sent) => assert_eq!(sent, 7),
            Err(Error::SendFailed(addr, e)) => {
                assert_eq!(addr, destination);
                assert_ne!(e.kind(), std::io::ErrorKind::InvalidInput);
            }
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_oversized_payload_rejected() {
        let payload = vec![b'x'; MAX_UDP_PAYLOAD + 1];
        let err = send_datagram(None, &payload, "127.0.0.1:5060".parse().unwrap()).unwrap_err();
        assert!(matches!(err, Error::PacketTooLarge(n, MAX_UDP_PAYLOAD) if n == MAX_UDP_PAYLOAD + 1));
    }

    #[test]
    fn test_ephemeral_send_reaches_peer() {
        let peer = UdpSocket::bind("127.0.0.1:0").unwrap();
        peer.set_read_timeout(Some(Duration::from_secs(2))).unwrap();

        let sent = send_datagram(None, b"OPTIONS", peer.local_addr().unwrap()).unwrap();
        assert_eq!(sent, 7);

        let mut buf = [0u8; 64];
        let (len, _) = peer.recv_from(&mut buf).unwrap();
        assert_eq!(&buf[..len], b"OPTIONS");
    }

    #[test]
    fn test_listener_socket_is_source() {
        let peer = UdpSocket::bind("127.0.0.1:0").unwrap();
        peer.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
        let local = UdpSocket::bind("127.0.0.1:0").unwrap();
        let local_addr = local.local_addr().unwrap();

        send_datagram(Some((&local, local_addr)), b"SIP/2.0 200 OK", peer.local_addr().unwrap())
            .unwrap();

        let mut buf = [0u8; 64];
        let (_, from) = peer.recv_from(&mut buf).unwrap();
        assert_eq!(from, local_addr);
    }
}
