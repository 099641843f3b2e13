use std::net::{SocketAddr, UdpSocket as StdUdpSocket};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio::runtime::Builder;
use tokio::sync::watch;
use tracing::{debug, error, info, trace, warn};

use crate::config::TransportConfig;
use crate::dispatch::Dispatcher;
use crate::error::{Error, Result};
use crate::registry::CallbackRegistry;

/// A bound UDP socket plus the thread that reads it.
///
/// The thread owns a current-thread tokio runtime and waits on the socket and
/// the stop signal at the same time, so stopping never waits for traffic.
pub(crate) struct UdpListener {
    local_addr: SocketAddr,
    send_socket: Arc<StdUdpSocket>,
    stop_tx: watch::Sender<bool>,
    handle: Option<JoinHandle<()>>,
}

impl UdpListener {
    /// Bind `addr` and start the receive thread.
    pub(crate) fn spawn(
        addr: SocketAddr,
        config: &TransportConfig,
        registry: Arc<CallbackRegistry>,
    ) -> Result<Self> {
        let std_socket = bind_socket(addr, config)?;
        let local_addr = std_socket.local_addr()?;

        // Duplicated handle for sends from consumer threads
        let send_socket = Arc::new(std_socket.try_clone()?);

        let runtime = Builder::new_current_thread().enable_io().enable_time().build()?;
        let socket = {
            let _guard = runtime.enter();
            UdpSocket::from_std(std_socket)?
        };

        let (stop_tx, stop_rx) = watch::channel(false);
        let receive_loop = ReceiveLoop {
            socket,
            dispatcher: Dispatcher::new(registry, local_addr),
            stop_rx,
            buffer_size: config.max_datagram_size,
            error_backoff: config.error_backoff(),
            report_errors: config.report_receive_errors,
        };

        let handle = thread::Builder::new()
            .name(config.thread_name.clone())
            .spawn(move || {
                runtime.block_on(receive_loop.run());
                info!("UDP receive loop on {} terminated", local_addr);
            })?;

        info!("SIP UDP listener bound to {}", local_addr);

        Ok(Self {
            local_addr,
            send_socket,
            stop_tx,
            handle: Some(handle),
        })
    }

    pub(crate) fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub(crate) fn send_socket(&self) -> Arc<StdUdpSocket> {
        self.send_socket.clone()
    }

    /// Signal the receive loop and wait for the thread to exit.
    pub(crate) fn stop(mut self) {
        let _ = self.stop_tx.send(true);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("UDP receive thread for {} panicked", self.local_addr);
            }
        }
        debug!("UDP listener on {} stopped", self.local_addr);
    }
}

impl Drop for UdpListener {
    fn drop(&mut self) {
        // Without a join the thread is detached but still told to exit.
        let _ = self.stop_tx.send(true);
    }
}

fn bind_socket(addr: SocketAddr, config: &TransportConfig) -> Result<StdUdpSocket> {
    let socket = Socket::new(Domain::for_address(addr), Type::DGRAM, Some(Protocol::UDP))
        .map_err(|e| Error::BindFailed(addr, e))?;

    if let Some(size) = config.recv_buffer_size {
        if let Err(e) = socket.set_recv_buffer_size(size) {
            warn!("Failed to set receive buffer size {} on {}: {}", size, addr, e);
        }
    }

    socket.set_nonblocking(true)?;
    socket
        .bind(&addr.into())
        .map_err(|e| Error::BindFailed(addr, e))?;

    Ok(socket.into())
}

struct ReceiveLoop {
    socket: UdpSocket,
    dispatcher: Dispatcher,
    stop_rx: watch::Receiver<bool>,
    buffer_size: usize,
    error_backoff: Duration,
    report_errors: bool,
}

impl ReceiveLoop {
    async fn run(mut self) {
        let mut buffer = vec![0u8; self.buffer_size];

        loop {
            if *self.stop_rx.borrow() {
                break;
            }

            let received = tokio::select! {
                biased;
                _ = self.stop_rx.changed() => break,
                result = self.socket.recv_from(&mut buffer) => result,
            };

            match received {
                Ok((0, src)) => {
                    trace!("Ignoring empty datagram from {}", src);
                }
                Ok((len, src)) => {
                    debug!("Received {} byte datagram from {}", len, src);
                    self.dispatcher.datagram(&buffer[..len], src);
                }
                Err(e) => {
                    warn!("Error receiving UDP packet: {}", e);
                    if self.report_errors {
                        self.dispatcher.receive_error(&e);
                    }

                    tokio::select! {
                        biased;
                        _ = self.stop_rx.changed() => break,
                        _ = tokio::time::sleep(self.error_backoff) => {}
                    }
                }
            }
        }
    }
}
