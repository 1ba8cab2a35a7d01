//! The shared UDP socket: bound once, broadcast enabled, one receive thread.
//!
//! All inbound datagrams funnel through a single channel of
//! [`Datagram`] items consumed by the router's dispatch loop.  Decoupling
//! socket completion from protocol logic this way keeps the router
//! deterministic under test: a test feeds datagrams into the same channel
//! the receive thread would.
//!
//! The receive loop runs as a blocking task on a dedicated thread to avoid
//! tying up the Tokio runtime with synchronous socket I/O.  The socket is
//! configured with a 500 ms read timeout; on each timeout the loop checks
//! the shutdown flag and exits cleanly when the application is stopping.

use std::net::{SocketAddr, UdpSocket};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{error, info};

use crate::application::sender::DatagramSender;

/// One inbound datagram: raw bytes plus the sender's address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datagram {
    pub bytes: Vec<u8>,
    pub sender: SocketAddr,
}

/// Error type for transport setup.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The UDP socket could not be bound.
    #[error("failed to bind UDP socket on {addr}: {source}")]
    BindFailed {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// Broadcast mode could not be enabled on the socket.
    #[error("failed to enable broadcast mode: {0}")]
    Broadcast(#[source] std::io::Error),
}

/// The production transport: one `UdpSocket` shared by every sender and the
/// receive thread.
pub struct UdpTransport {
    socket: Arc<UdpSocket>,
}

impl UdpTransport {
    /// Binds the shared socket on all interfaces at `listen_port` and
    /// enables broadcast so the scanner can reach the whole subnet.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::BindFailed`] if the port is taken and
    /// [`TransportError::Broadcast`] if broadcast mode is refused.
    pub fn bind(listen_port: u16) -> Result<Self, TransportError> {
        let addr: SocketAddr = (std::net::Ipv4Addr::UNSPECIFIED, listen_port).into();
        let socket =
            UdpSocket::bind(addr).map_err(|source| TransportError::BindFailed { addr, source })?;
        socket.set_broadcast(true).map_err(TransportError::Broadcast)?;
        socket
            .set_read_timeout(Some(Duration::from_millis(500)))
            .ok();

        info!("UDP transport bound on {addr}");
        Ok(Self {
            socket: Arc::new(socket),
        })
    }

    /// The locally bound address (useful when binding port 0 in tests).
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Spawns the receive thread and returns the channel of inbound
    /// datagrams.  The thread exits when `running` clears or the channel's
    /// receiver is dropped.
    pub fn start_receiver(&self, running: Arc<AtomicBool>) -> mpsc::Receiver<Datagram> {
        let (tx, rx) = mpsc::channel(64);
        let socket = Arc::clone(&self.socket);

        std::thread::Builder::new()
            .name("atw-udp-recv".to_string())
            .spawn(move || {
                receive_loop(&socket, tx, running);
            })
            .expect("failed to spawn receive thread");

        rx
    }
}

impl DatagramSender for UdpTransport {
    fn send_to(&self, bytes: &[u8], dest: SocketAddr) -> std::io::Result<usize> {
        self.socket.send_to(bytes, dest)
    }
}

/// The blocking receive loop executed on the dedicated thread.
fn receive_loop(socket: &UdpSocket, tx: mpsc::Sender<Datagram>, running: Arc<AtomicBool>) {
    let mut buf = vec![0u8; 4096];

    while running.load(Ordering::Relaxed) {
        let (len, sender) = match socket.recv_from(&mut buf) {
            Ok(pair) => pair,
            Err(e) if is_timeout_error(&e) => continue,
            Err(e) => {
                error!("UDP recv error: {e}");
                continue;
            }
        };

        let datagram = Datagram {
            bytes: buf[..len].to_vec(),
            sender,
        };
        if tx.blocking_send(datagram).is_err() {
            // Receiver dropped – the application is shutting down.
            break;
        }
    }

    info!("UDP receive thread stopped");
}

/// Returns `true` for OS timeout / would-block errors that should be retried.
fn is_timeout_error(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
    )
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_timeout_error_recognises_timed_out_and_would_block() {
        assert!(is_timeout_error(&std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            "timed out"
        )));
        assert!(is_timeout_error(&std::io::Error::new(
            std::io::ErrorKind::WouldBlock,
            "would block"
        )));
        assert!(!is_timeout_error(&std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "refused"
        )));
    }

    #[test]
    fn test_bind_on_ephemeral_port_succeeds() {
        let transport = UdpTransport::bind(0).expect("bind must succeed on port 0");
        let addr = transport.local_addr().expect("local_addr");
        assert_ne!(addr.port(), 0, "OS must assign a real port");
    }

    #[test]
    fn test_send_to_loops_back_through_a_second_socket() {
        let transport = UdpTransport::bind(0).expect("bind sender");
        let receiver = UdpSocket::bind("127.0.0.1:0").expect("bind receiver");
        receiver
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        let dest = receiver.local_addr().unwrap();

        let sent = transport.send_to(b"hello", dest).expect("send_to");
        assert_eq!(sent, 5);

        let mut buf = [0u8; 16];
        let (len, _) = receiver.recv_from(&mut buf).expect("recv_from");
        assert_eq!(&buf[..len], b"hello");
    }

    #[tokio::test]
    async fn test_receiver_delivers_datagrams_over_the_channel() {
        let transport = UdpTransport::bind(0).expect("bind");
        let local = transport.local_addr().unwrap();
        let dest: SocketAddr = (std::net::Ipv4Addr::LOCALHOST, local.port()).into();

        let running = Arc::new(AtomicBool::new(true));
        let mut rx = transport.start_receiver(Arc::clone(&running));

        let sender = UdpSocket::bind("127.0.0.1:0").expect("bind test sender");
        sender.send_to(b"ping", dest).expect("send");

        let datagram = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("datagram must arrive within the timeout")
            .expect("channel open");
        assert_eq!(datagram.bytes, b"ping");

        running.store(false, Ordering::Relaxed);
    }
}
