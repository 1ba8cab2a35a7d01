//! The outbound transport seam.
//!
//! Application code never touches a socket directly: everything that sends
//! goes through [`DatagramSender`].  The production implementation wraps the
//! shared UDP socket (`infrastructure::network::transport::UdpTransport`);
//! test implementations record calls.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Sends one datagram to one destination.
///
/// Implementations must tolerate concurrent callers: the scanner, the
/// per-device poll tasks, and the command dispatcher all share one sender.
#[cfg_attr(test, mockall::automock)]
pub trait DatagramSender: Send + Sync {
    /// Sends `bytes` to `dest`, returning the number of bytes sent.
    fn send_to(&self, bytes: &[u8], dest: SocketAddr) -> std::io::Result<usize>;
}

/// A recording sender for tests: stores every datagram and can be switched
/// into a failing mode to exercise send-error paths.
#[derive(Debug, Default)]
pub struct RecordingSender {
    sent: Mutex<Vec<(Vec<u8>, SocketAddr)>>,
    failing: AtomicBool,
}

impl RecordingSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every datagram sent so far, in order.
    pub fn sent(&self) -> Vec<(Vec<u8>, SocketAddr)> {
        self.sent.lock().expect("sender poisoned").clone()
    }

    /// Number of datagrams sent so far.
    pub fn sent_count(&self) -> usize {
        self.sent.lock().expect("sender poisoned").len()
    }

    /// When `failing` is set, every send returns a broken-pipe error
    /// without recording anything.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Relaxed);
    }
}

impl DatagramSender for RecordingSender {
    fn send_to(&self, bytes: &[u8], dest: SocketAddr) -> std::io::Result<usize> {
        if self.failing.load(Ordering::Relaxed) {
            return Err(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "recording sender set to fail",
            ));
        }
        self.sent
            .lock()
            .expect("sender poisoned")
            .push((bytes.to_vec(), dest));
        Ok(bytes.len())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
