//! Intention-level command operations against a bound device.
//!
//! The dispatcher turns "switch it on", "heat", "22 degrees" into single
//! `cmd` envelopes, enforcing the session preconditions first:
//!
//! - Every operation requires the device's session to be `Bound`; otherwise
//!   it fails with [`CommandError::NotBound`] and performs no I/O at all.
//! - `set_target_temperature` additionally requires the current mode to
//!   resolve to a heating or cooling direction, because the appliance keeps
//!   separate set-points per direction; otherwise
//!   [`CommandError::InvalidState`], again with zero network effect.
//!
//! On a successful send, the issued code/value pairs are optimistically
//! merged into the device's status store before any acknowledgment arrives,
//! so reads are immediately consistent with the just-issued command.  The
//! device's later `res` acknowledgment re-applies (and may correct) the
//! values through the normal merge path.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};

use atw_core::catalog::{OperatingMode, Power, Property};
use atw_core::protocol::envelope::EnvelopeError;
use atw_core::protocol::payload;
use atw_core::{FieldValue, StatusPatch};

use crate::application::registry::{DeviceEntry, DeviceRegistry};
use crate::application::sender::DatagramSender;

/// Error type for dispatcher operations.
#[derive(Debug, Error)]
pub enum CommandError {
    /// No device with this MAC has been discovered.
    #[error("unknown device: {mac}")]
    UnknownDevice { mac: String },

    /// The device has not completed key binding; the command was not sent.
    #[error("device {mac} is not bound yet")]
    NotBound { mac: String },

    /// A temperature command was issued while the mode resolves to neither
    /// heating nor cooling; the command was not sent.
    #[error("device {mac} mode resolves to neither heating nor cooling")]
    InvalidState { mac: String },

    /// The command envelope could not be sealed.
    #[error("failed to seal command envelope: {0}")]
    Seal(#[from] EnvelopeError),

    /// The transport refused the datagram.
    #[error("command send failed: {0}")]
    Send(#[source] std::io::Error),
}

/// Builds and sends outbound command envelopes for bound devices.
pub struct CommandDispatcher {
    registry: Arc<Mutex<DeviceRegistry>>,
    sender: Arc<dyn DatagramSender>,
}

impl CommandDispatcher {
    pub fn new(registry: Arc<Mutex<DeviceRegistry>>, sender: Arc<dyn DatagramSender>) -> Self {
        Self { registry, sender }
    }

    /// Switches the appliance on or off.
    pub async fn set_power(&self, mac: &str, on: bool) -> Result<(), CommandError> {
        let value = if on { Power::On } else { Power::Off };
        self.send_pairs(mac, &[(Property::Power, value.wire_value())])
            .await
    }

    /// Selects the operating mode.
    pub async fn set_mode(&self, mac: &str, mode: OperatingMode) -> Result<(), CommandError> {
        self.send_pairs(mac, &[(Property::Mode, mode.wire_value())])
            .await
    }

    /// Sets the home-circuit set-point for the direction the current mode
    /// implies.  `degrees` is rounded to whole degrees (ties away from
    /// zero, matching the status views) because settable temperatures are
    /// whole-degree scalars on the wire.
    pub async fn set_target_temperature(&self, mac: &str, degrees: f64) -> Result<(), CommandError> {
        let rounded = degrees.round() as i64;

        let mut registry = self.registry.lock().await;
        let entry = registry
            .get_mut(mac)
            .ok_or_else(|| CommandError::UnknownDevice { mac: mac.to_string() })?;
        if !entry.session.is_bound() {
            return Err(CommandError::NotBound { mac: mac.to_string() });
        }

        let set_point = match entry.store.mode() {
            Some(mode) if mode.is_cooling() => Property::CoolingWaterOutTempSet,
            Some(mode) if mode.is_heating() => Property::HeatingWaterOutTempSet,
            _ => return Err(CommandError::InvalidState { mac: mac.to_string() }),
        };

        Self::issue(entry, &self.sender, &[(set_point, rounded)])
    }

    async fn send_pairs(
        &self,
        mac: &str,
        pairs: &[(Property, i64)],
    ) -> Result<(), CommandError> {
        let mut registry = self.registry.lock().await;
        let entry = registry
            .get_mut(mac)
            .ok_or_else(|| CommandError::UnknownDevice { mac: mac.to_string() })?;
        if !entry.session.is_bound() {
            return Err(CommandError::NotBound { mac: mac.to_string() });
        }
        Self::issue(entry, &self.sender, pairs)
    }

    /// Seals one `cmd` envelope for `pairs`, sends it, and on success
    /// optimistically merges the pairs into the store.
    fn issue(
        entry: &mut DeviceEntry,
        sender: &Arc<dyn DatagramSender>,
        pairs: &[(Property, i64)],
    ) -> Result<(), CommandError> {
        let opt: Vec<&'static str> = pairs.iter().map(|(property, _)| property.code()).collect();
        let values: Vec<i64> = pairs.iter().map(|(_, value)| *value).collect();

        let command = payload::command_request(&entry.descriptor.mac, &opt, &values);
        let bytes = entry.seal(&command)?;
        sender
            .send_to(&bytes, entry.descriptor.addr)
            .map_err(CommandError::Send)?;

        let patch: StatusPatch = pairs
            .iter()
            .map(|(property, value)| (property.code().to_string(), FieldValue::Int(*value)))
            .collect();
        debug!("[{}] optimistic merge of {} issued pairs", entry.descriptor.label(), patch.len());
        entry.store.merge(patch);

        info!("[{}] cmd sent: {:?} = {:?}", entry.descriptor.label(), opt, values);
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
