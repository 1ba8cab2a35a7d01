//! The inbound message router: one dispatch loop, one error boundary.
//!
//! Every datagram the shared socket receives ends up here.  The router
//! parses the outer envelope, selects the decryption key (generic key for
//! discriminator `1`, the sender's session key otherwise), classifies the
//! inner payload, and routes it:
//!
//! - `dev`    → discovery-time registration: registry upsert + bind request.
//! - `bindok` → session key accepted; poll task cancelled-and-recreated.
//! - `dat`    → telemetry zipped into a patch and merged into the store.
//! - `res`    → command acknowledgment merged the same way.
//! - other    → logged and ignored.
//!
//! The router is the final error boundary for inbound processing: a
//! malformed or undecryptable datagram is logged and dropped, and the loop
//! moves on to the next datagram.  The device resends on its own schedule,
//! so at-least-once delivery makes dropping safe.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use atw_core::protocol::envelope::{self, EnvelopeError};
use atw_core::protocol::payload::{self, BindOk, PayloadError};
use atw_core::{BindState, InboundPayload};

use crate::application::registry::{self, DeviceRegistry};
use crate::application::sender::DatagramSender;
use crate::infrastructure::network::transport::Datagram;
use crate::infrastructure::storage::config::AppConfig;

/// Why one datagram was dropped.  Never escapes the router.
#[derive(Debug, Error)]
enum RouteFailure {
    #[error(transparent)]
    Envelope(#[from] EnvelopeError),
    #[error(transparent)]
    Payload(#[from] PayloadError),
}

/// The router owns the registry handle, the outbound sender (for bind
/// requests and poll tasks), and the configuration (for poll intervals).
pub struct Router {
    registry: Arc<Mutex<DeviceRegistry>>,
    sender: Arc<dyn DatagramSender>,
    config: Arc<AppConfig>,
}

impl Router {
    pub fn new(
        registry: Arc<Mutex<DeviceRegistry>>,
        sender: Arc<dyn DatagramSender>,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            registry,
            sender,
            config,
        }
    }

    /// Consumes datagrams until the channel closes.
    pub async fn run(self, mut rx: mpsc::Receiver<Datagram>) {
        info!("router dispatch loop started");
        while let Some(datagram) = rx.recv().await {
            self.handle_datagram(datagram).await;
        }
        info!("router dispatch loop stopped");
    }

    /// Processes one datagram.  Never fails: this is the error boundary.
    pub async fn handle_datagram(&self, datagram: Datagram) {
        let sender_addr = datagram.sender;
        if let Err(e) = self.process(datagram).await {
            debug!("dropped datagram from {sender_addr}: {e}");
        }
    }

    async fn process(&self, datagram: Datagram) -> Result<(), RouteFailure> {
        let envelope = envelope::open(&datagram.bytes)?;
        if !envelope.is_pack() {
            // Our own scan broadcast loops back through the shared socket.
            debug!("ignoring envelope type {:?} from {}", envelope.t, datagram.sender);
            return Ok(());
        }

        let mut registry = self.registry.lock().await;

        let session_key = registry
            .mac_for_addr(datagram.sender)
            .and_then(|mac| registry.get(&mac)?.session.key().map(String::from));
        let payload = envelope.open_payload(session_key.as_deref())?;

        match payload::classify(&payload)? {
            InboundPayload::DeviceInfo(info) => {
                self.register_device(&mut registry, &info, datagram.sender);
            }
            InboundPayload::BindOk(bind) => {
                self.complete_bind(&mut registry, datagram.sender, bind);
            }
            InboundPayload::Telemetry(telemetry) => {
                Self::merge_patch(&mut registry, datagram.sender, telemetry.to_patch(), "dat");
            }
            InboundPayload::CommandAck(ack) => {
                Self::merge_patch(&mut registry, datagram.sender, ack.to_patch(), "res");
            }
            InboundPayload::Unknown(tag) => {
                debug!("unhandled payload type {tag:?} from {}", datagram.sender);
            }
        }
        Ok(())
    }

    /// Discovery-time handling of a `dev` reply: upsert the device and, if
    /// it has no key yet and no bind in flight, send the bind request.
    ///
    /// `mark_binding` happens only after the send succeeds, so a failed
    /// bind send leaves the session `Unbound` and the next discovery reply
    /// is the retry.
    fn register_device(
        &self,
        registry: &mut DeviceRegistry,
        info: &payload::DeviceInfo,
        sender_addr: std::net::SocketAddr,
    ) {
        let entry = registry.upsert_discovered(info, sender_addr);
        if entry.session.state() != BindState::Unbound {
            return;
        }

        info!("[{}] discovered, sending bind request", entry.descriptor.label());
        let bind = payload::bind_request(&entry.descriptor.mac);
        match entry.seal(&bind) {
            Ok(bytes) => match self.sender.send_to(&bytes, entry.descriptor.addr) {
                Ok(_) => entry.session.mark_binding(),
                Err(e) => warn!(
                    "[{}] bind request send failed, will retry on rediscovery: {e}",
                    entry.descriptor.label()
                ),
            },
            Err(e) => warn!("[{}] could not seal bind request: {e}", entry.descriptor.label()),
        }
    }

    /// `bindok` handling: store the key (idempotently replacing any previous
    /// one) and cancel-then-recreate the poll task.  Both happen under the
    /// registry lock, so duplicate concurrent pollers cannot arise.
    fn complete_bind(
        &self,
        registry: &mut DeviceRegistry,
        sender_addr: std::net::SocketAddr,
        bind: BindOk,
    ) {
        let Some(mac) = registry.mac_for_addr(sender_addr) else {
            debug!("bindok from unknown sender {sender_addr}, dropped");
            return;
        };

        let interval = self.config.poll_interval(&mac);
        let poll_task = registry::arm_polling(
            Arc::clone(&self.registry),
            Arc::clone(&self.sender),
            mac.clone(),
            interval,
        );

        if let Some(entry) = registry.get_mut(&mac) {
            entry.session.accept_key(bind.key);
            entry.set_poll_task(poll_task);
            info!(
                "[{}] device bound, polling status every {interval:?}",
                entry.descriptor.label()
            );
        }
    }

    fn merge_patch(
        registry: &mut DeviceRegistry,
        sender_addr: std::net::SocketAddr,
        patch: atw_core::StatusPatch,
        kind: &str,
    ) {
        let Some(mac) = registry.mac_for_addr(sender_addr) else {
            debug!("{kind} from unknown sender {sender_addr}, dropped");
            return;
        };
        if let Some(entry) = registry.get_mut(&mac) {
            debug!("[{}] merging {kind} patch of {} fields", entry.descriptor.label(), patch.len());
            entry.store.merge(patch);
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
//
// The full discovery → bind → poll lifecycle is exercised end-to-end in
// `tests/bind_flow.rs`; these unit tests pin the boundary behavior.
