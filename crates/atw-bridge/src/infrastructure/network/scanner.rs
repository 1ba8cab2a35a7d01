//! The periodic discovery scanner.
//!
//! On each tick the scanner broadcasts the unencrypted `{"t":"scan"}`
//! datagram to the configured broadcast address on the fixed discovery port,
//! then increments its attempt counter.  The schedule stops — the task ends
//! and its timer with it — only once the counter *strictly exceeds*
//! `max_attempts`, so `max_attempts = 3` produces exactly four broadcasts
//! (attempt counts 0 through 3).
//!
//! Scanning never stops early on finding a device: discovery responses are
//! handled by the router independently of scan state, and a device answering
//! on attempt 0 does not silence the remaining broadcasts.  A send failure
//! is logged and non-fatal; the next tick is the retry.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use atw_core::protocol::envelope::scan_datagram;

use crate::application::sender::DatagramSender;

/// Scanner schedule parameters.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Broadcast destination, e.g. `192.168.1.255:7000`.
    pub broadcast_addr: SocketAddr,
    /// Delay between broadcasts.
    pub interval: Duration,
    /// The attempt count after which the schedule stops.
    pub max_attempts: u32,
}

/// Spawns the scan task.  The returned handle cancels it (`abort`).
pub fn start_scan(sender: Arc<dyn DatagramSender>, config: ScanConfig) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(config.interval);
        let mut attempts: u32 = 0;

        loop {
            ticker.tick().await;

            match sender.send_to(&scan_datagram(), config.broadcast_addr) {
                Ok(_) => debug!(
                    "[SCAN {attempts}] broadcast sent to {}",
                    config.broadcast_addr
                ),
                Err(e) => warn!("[SCAN {attempts}] broadcast failed: {e}"),
            }

            attempts += 1;
            if attempts > config.max_attempts {
                info!("scan finished after {attempts} attempts");
                break;
            }
        }
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
