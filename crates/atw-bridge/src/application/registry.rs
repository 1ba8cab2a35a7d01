//! The device registry: the in-memory database of every appliance the
//! bridge has discovered.
//!
//! Entries are deduplicated by the device's MAC — the one identifier that
//! never changes.  Rediscovery refreshes the network address and metadata of
//! an existing entry; it never creates a duplicate.  Each entry owns the
//! pieces of per-device state the protocol needs:
//!
//! - the [`SecureSession`] (bind state + session key),
//! - the [`StatusStore`] (last-known field values),
//! - the handle of the device's periodic poll task, if one is running.
//!
//! # Poll task lifecycle
//!
//! Polling starts only after a successful bind.  Re-binding (the device
//! sends a fresh `bindok`) must never leave two concurrent poll loops, so
//! [`DeviceEntry::set_poll_task`] always aborts the previous task before
//! storing the new one; callers do both under the registry lock, which makes
//! the cancel-then-recreate step atomic with respect to every other task
//! touching the registry.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use atw_core::catalog;
use atw_core::protocol::envelope::{self, EnvelopeError};
use atw_core::protocol::payload::{self, DeviceInfo};
use atw_core::{SecureSession, StatusStore};

/// Static identity and addressing for one appliance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescriptor {
    /// Stable hardware identifier; never changes once discovered.
    pub mac: String,
    /// Current network address; refreshed on rediscovery.
    pub addr: SocketAddr,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub firmware: Option<String>,
    pub name: Option<String>,
}

impl DeviceDescriptor {
    /// Builds a descriptor from a discovery reply.
    pub fn from_info(info: &DeviceInfo, addr: SocketAddr) -> Self {
        Self {
            mac: info.mac.clone(),
            addr,
            brand: info.brand.clone(),
            model: info.model.clone(),
            firmware: info.ver.clone(),
            name: info.name.clone(),
        }
    }

    /// Log label: `mac -- address`.
    pub fn label(&self) -> String {
        format!("{} -- {}", self.mac, self.addr)
    }
}

/// Everything the bridge tracks for one appliance.
#[derive(Debug)]
pub struct DeviceEntry {
    pub descriptor: DeviceDescriptor,
    pub session: SecureSession,
    pub store: StatusStore,
    poll_task: Option<JoinHandle<()>>,
}

impl DeviceEntry {
    fn new(descriptor: DeviceDescriptor) -> Self {
        Self {
            descriptor,
            session: SecureSession::new(),
            store: StatusStore::new(),
            poll_task: None,
        }
    }

    /// Seals `payload` into an outbound envelope for this device, using the
    /// session key (and therefore discriminator) the session currently holds.
    pub fn seal(&self, payload: &serde_json::Value) -> Result<Vec<u8>, EnvelopeError> {
        envelope::seal(&self.descriptor.mac, payload, self.session.key())
    }

    /// Installs a new poll task, aborting any previous one first so two
    /// poll loops can never run concurrently for one device.
    pub fn set_poll_task(&mut self, task: JoinHandle<()>) {
        if let Some(previous) = self.poll_task.take() {
            previous.abort();
        }
        self.poll_task = Some(task);
    }

    /// `true` while a poll task is installed and has not finished.
    pub fn has_running_poll_task(&self) -> bool {
        self.poll_task
            .as_ref()
            .map(|task| !task.is_finished())
            .unwrap_or(false)
    }
}

impl Drop for DeviceEntry {
    fn drop(&mut self) {
        if let Some(task) = self.poll_task.take() {
            task.abort();
        }
    }
}

/// In-memory registry of all known appliances, keyed by MAC.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: HashMap<String, DeviceEntry>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a discovered device or refreshes an existing entry.
    ///
    /// New devices get a fresh session and empty store.  Known devices keep
    /// both — only the address and metadata are refreshed, so a device that
    /// moved to a new DHCP lease keeps its bind state.
    pub fn upsert_discovered(&mut self, info: &DeviceInfo, addr: SocketAddr) -> &mut DeviceEntry {
        let descriptor = DeviceDescriptor::from_info(info, addr);
        match self.devices.entry(info.mac.clone()) {
            std::collections::hash_map::Entry::Occupied(entry) => {
                let entry = entry.into_mut();
                debug!("rediscovered {}, refreshing address", descriptor.label());
                entry.descriptor = descriptor;
                entry
            }
            std::collections::hash_map::Entry::Vacant(slot) => {
                debug!("registering new device {}", descriptor.label());
                slot.insert(DeviceEntry::new(descriptor))
            }
        }
    }

    pub fn get(&self, mac: &str) -> Option<&DeviceEntry> {
        self.devices.get(mac)
    }

    pub fn get_mut(&mut self, mac: &str) -> Option<&mut DeviceEntry> {
        self.devices.get_mut(mac)
    }

    /// Resolves the device whose last-known address matches the sender.
    ///
    /// Matching is by IP only: appliances answer from ephemeral source
    /// ports, so the port is not identity.
    pub fn mac_for_addr(&self, addr: SocketAddr) -> Option<String> {
        self.devices
            .values()
            .find(|entry| entry.descriptor.addr.ip() == addr.ip())
            .map(|entry| entry.descriptor.mac.clone())
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

/// Spawns the periodic status-poll task for `mac`.
///
/// The first tick fires immediately, which doubles as the full status
/// request issued right after bind.  Each tick locks the registry, seals a
/// `status` request for the complete catalog poll list, and sends it.  A
/// send failure is logged and the next tick is the retry.  The task ends on
/// its own if the device disappears from the registry.
pub fn arm_polling(
    registry: Arc<Mutex<DeviceRegistry>>,
    sender: Arc<dyn crate::application::sender::DatagramSender>,
    mac: String,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;

            let registry = registry.lock().await;
            let Some(entry) = registry.get(&mac) else {
                debug!("device {mac} left the registry, stopping poll task");
                break;
            };

            let cols = catalog::poll_codes();
            let request = payload::status_request(&mac, &cols);
            match entry.seal(&request) {
                Ok(bytes) => {
                    if let Err(e) = sender.send_to(&bytes, entry.descriptor.addr) {
                        warn!("[{}] status poll send failed: {e}", entry.descriptor.label());
                    }
                }
                Err(e) => warn!("[{}] could not seal status poll: {e}", entry.descriptor.label()),
            }
        }
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::sender::RecordingSender;
    use atw_core::BindState;

    fn info(mac: &str) -> DeviceInfo {
        DeviceInfo {
            mac: mac.to_string(),
            brand: Some("gree".to_string()),
            model: Some("atw".to_string()),
            ver: Some("1.21".to_string()),
            name: None,
        }
    }

    fn addr(ip: &str) -> SocketAddr {
        format!("{ip}:7000").parse().unwrap()
    }

    #[test]
    fn test_registry_starts_empty() {
        let registry = DeviceRegistry::new();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_upsert_creates_one_entry_per_mac() {
        let mut registry = DeviceRegistry::new();
        registry.upsert_discovered(&info("f4911e000001"), addr("192.168.1.40"));
        registry.upsert_discovered(&info("f4911e000001"), addr("192.168.1.40"));
        registry.upsert_discovered(&info("f4911e000002"), addr("192.168.1.41"));

        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_rediscovery_refreshes_address_but_keeps_session_and_store() {
        let mut registry = DeviceRegistry::new();
        {
            let entry = registry.upsert_discovered(&info("f4911e000001"), addr("192.168.1.40"));
            entry.session.accept_key("0123456789abcdef".to_string());
            entry.store.merge(
                [("Pow".to_string(), atw_core::FieldValue::Int(1))]
                    .into_iter()
                    .collect(),
            );
        }

        let entry = registry.upsert_discovered(&info("f4911e000001"), addr("192.168.1.99"));
        assert_eq!(entry.descriptor.addr, addr("192.168.1.99"));
        assert_eq!(entry.session.state(), BindState::Bound, "session survives");
        assert!(entry.store.power(), "store survives");
    }

    #[test]
    fn test_mac_for_addr_matches_by_ip_not_port() {
        let mut registry = DeviceRegistry::new();
        registry.upsert_discovered(&info("f4911e000001"), addr("192.168.1.40"));

        let from_other_port: SocketAddr = "192.168.1.40:39201".parse().unwrap();
        assert_eq!(
            registry.mac_for_addr(from_other_port),
            Some("f4911e000001".to_string())
        );
        assert_eq!(registry.mac_for_addr(addr("192.168.1.41")), None);
    }

    #[test]
    fn test_entry_seal_uses_the_session_key_state() {
        let mut registry = DeviceRegistry::new();
        let entry = registry.upsert_discovered(&info("f4911e000001"), addr("192.168.1.40"));

        let datagram = entry.seal(&payload::bind_request("f4911e000001")).unwrap();
        let sealed = envelope::open(&datagram).unwrap();
        assert_eq!(sealed.i, 1, "unkeyed entries seal with the generic key");

        entry.session.accept_key("0123456789abcdef".to_string());
        let datagram = entry.seal(&payload::status_request("f4911e000001", &["Pow"])).unwrap();
        let sealed = envelope::open(&datagram).unwrap();
        assert_eq!(sealed.i, 0, "keyed entries seal with the session key");
    }

    #[tokio::test(start_paused = true)]
    async fn test_arm_polling_sends_an_immediate_full_status_request() {
        let registry = Arc::new(Mutex::new(DeviceRegistry::new()));
        let sender = Arc::new(RecordingSender::new());
        let key = "0123456789abcdef";

        {
            let mut guard = registry.lock().await;
            let entry = guard.upsert_discovered(&info("f4911e000001"), addr("192.168.1.40"));
            entry.session.accept_key(key.to_string());
        }

        let task = arm_polling(
            Arc::clone(&registry),
            sender.clone(),
            "f4911e000001".to_string(),
            Duration::from_secs(60),
        );

        // Let the first tick run.
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(sender.sent_count(), 1);

        let (bytes, dest) = sender.sent().remove(0);
        assert_eq!(dest, addr("192.168.1.40"));

        let sealed = envelope::open(&bytes).unwrap();
        let request = sealed.open_payload(Some(key)).unwrap();
        assert_eq!(request["t"], "status");
        let cols = request["cols"].as_array().unwrap();
        assert_eq!(cols.len(), catalog::poll_codes().len(), "full poll list");

        task.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_arm_polling_repeats_on_the_interval() {
        let registry = Arc::new(Mutex::new(DeviceRegistry::new()));
        let sender = Arc::new(RecordingSender::new());

        {
            let mut guard = registry.lock().await;
            let entry = guard.upsert_discovered(&info("f4911e000001"), addr("192.168.1.40"));
            entry.session.accept_key("0123456789abcdef".to_string());
        }

        let task = arm_polling(
            Arc::clone(&registry),
            sender.clone(),
            "f4911e000001".to_string(),
            Duration::from_secs(60),
        );

        tokio::time::sleep(Duration::from_secs(150)).await;
        // Ticks at 0s, 60s, and 120s.
        assert_eq!(sender.sent_count(), 3);

        task.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_arm_polling_send_failure_retries_on_next_tick() {
        let registry = Arc::new(Mutex::new(DeviceRegistry::new()));
        let sender = Arc::new(RecordingSender::new());
        sender.set_failing(true);

        {
            let mut guard = registry.lock().await;
            let entry = guard.upsert_discovered(&info("f4911e000001"), addr("192.168.1.40"));
            entry.session.accept_key("0123456789abcdef".to_string());
        }

        let task = arm_polling(
            Arc::clone(&registry),
            sender.clone(),
            "f4911e000001".to_string(),
            Duration::from_secs(60),
        );

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(sender.sent_count(), 0, "failed send records nothing");

        sender.set_failing(false);
        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(sender.sent_count(), 1, "next tick is the retry");

        task.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_poll_task_aborts_the_previous_task() {
        let registry = Arc::new(Mutex::new(DeviceRegistry::new()));
        let sender = Arc::new(RecordingSender::new());

        {
            let mut guard = registry.lock().await;
            let entry = guard.upsert_discovered(&info("f4911e000001"), addr("192.168.1.40"));
            entry.session.accept_key("0123456789abcdef".to_string());
        }

        let first = arm_polling(
            Arc::clone(&registry),
            sender.clone(),
            "f4911e000001".to_string(),
            Duration::from_secs(60),
        );
        {
            let mut guard = registry.lock().await;
            guard.get_mut("f4911e000001").unwrap().set_poll_task(first);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
        let after_first = sender.sent_count();

        // Re-bind: install a replacement task; the old one must stop.
        let second = arm_polling(
            Arc::clone(&registry),
            sender.clone(),
            "f4911e000001".to_string(),
            Duration::from_secs(60),
        );
        {
            let mut guard = registry.lock().await;
            let entry = guard.get_mut("f4911e000001").unwrap();
            entry.set_poll_task(second);
            assert!(entry.has_running_poll_task());
        }

        // Over two further intervals, only the replacement task may tick:
        // one immediate send plus two interval sends.
        tokio::time::sleep(Duration::from_secs(121)).await;
        assert_eq!(sender.sent_count(), after_first + 3);

        let mut guard = registry.lock().await;
        guard.get_mut("f4911e000001").unwrap().set_poll_task(tokio::spawn(async {}));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_task_stops_when_device_leaves_the_registry() {
        let registry = Arc::new(Mutex::new(DeviceRegistry::new()));
        let sender = Arc::new(RecordingSender::new());

        let task = arm_polling(
            Arc::clone(&registry),
            sender.clone(),
            "f4911e00dead".to_string(),
            Duration::from_secs(60),
        );

        // The device was never registered: the first tick ends the task.
        task.await.expect("poll task must end cleanly");
        assert_eq!(sender.sent_count(), 0);
    }
}
