//! Outer wire envelope codec.
//!
//! Wire format (JSON text datagram):
//! ```text
//! {"cid":"app","i":0|1,"t":"pack","uid":0,"tcid":"<device mac>","pack":"<base64>"}
//! ```
//!
//! The discriminator `i` selects the decryption key on both ends: `1` means
//! the payload is protected by the well-known generic key (pre-bind traffic),
//! `0` means the device-specific session key.  Outbound, the discriminator is
//! derived from key presence: a caller that holds no session key yet sends
//! `i = 1` and encrypts with the generic key.
//!
//! Discovery is the one unencrypted exchange: the scanner broadcasts the
//! plain datagram `{"t":"scan"}` to [`DISCOVERY_PORT`] and the appliance
//! answers with a regular `pack` envelope carrying a `dev` payload.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use crate::protocol::crypto::{self, CryptoError};

/// Fixed UDP port appliances listen on for discovery broadcasts.
pub const DISCOVERY_PORT: u16 = 7000;

/// Constant client identifier carried in every outbound envelope.
pub const CLIENT_ID: &str = "app";

/// Envelope type tag for encrypted payload traffic.
pub const PACK_TYPE: &str = "pack";

/// Errors produced while opening or sealing an envelope.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    /// The datagram is not a JSON envelope.
    #[error("malformed envelope: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The envelope type carries no payload (e.g., a stray `scan` echo).
    #[error("envelope type {0:?} carries no payload")]
    NotPack(String),

    /// A `pack` envelope arrived without its `pack` field.
    #[error("pack envelope is missing its payload field")]
    MissingPack,

    /// The payload could not be decrypted or parsed.
    #[error("payload decrypt failed: {0}")]
    Decrypt(#[from] CryptoError),
}

/// A parsed inbound envelope.
///
/// Appliances are sloppy about the outer fields (some firmware omits `cid`
/// or `tcid` entirely), so everything except `pack` defaults when absent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Envelope {
    /// Sequence discriminator: `1` = generic-key payload, `0` = session key.
    #[serde(default)]
    pub i: u8,
    /// Envelope type tag.
    #[serde(default)]
    pub t: String,
    /// Sender client identifier.
    #[serde(default)]
    pub cid: String,
    /// Target client identifier (the device MAC on outbound envelopes).
    #[serde(default)]
    pub tcid: String,
    /// Base64 ciphertext of the inner payload, absent on unencrypted types.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pack: Option<String>,
}

impl Envelope {
    /// Returns `true` when this envelope carries an encrypted payload.
    pub fn is_pack(&self) -> bool {
        self.t == PACK_TYPE
    }

    /// Decrypts the inner payload, selecting the key from the discriminator:
    /// generic key when `i == 1`, otherwise `session_key`.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::NotPack`] for non-payload envelope types,
    /// [`EnvelopeError::MissingPack`] when the `pack` field is absent, and
    /// [`EnvelopeError::Decrypt`] when decryption or inner parsing fails.
    pub fn open_payload(&self, session_key: Option<&str>) -> Result<Value, EnvelopeError> {
        if !self.is_pack() {
            return Err(EnvelopeError::NotPack(self.t.clone()));
        }
        let pack = self.pack.as_deref().ok_or(EnvelopeError::MissingPack)?;
        let key = if self.i == 1 { None } else { session_key };
        Ok(crypto::decrypt(pack, key)?)
    }
}

/// Parses the outer envelope of an inbound datagram.
///
/// # Errors
///
/// Returns [`EnvelopeError::Malformed`] when the datagram is not JSON.
pub fn open(datagram: &[u8]) -> Result<Envelope, EnvelopeError> {
    Ok(serde_json::from_slice(datagram)?)
}

/// Seals `payload` into an outbound `pack` envelope datagram for `tcid`.
///
/// The discriminator and encryption key are derived together from `key`:
/// `None` produces `i = 1` with generic-key encryption, `Some` produces
/// `i = 0` with session-key encryption.  This is the only place the pairing
/// is decided, so the two can never disagree on the wire.
///
/// # Errors
///
/// Returns [`EnvelopeError::Decrypt`] when the payload cannot be encrypted
/// (malformed key).
pub fn seal(tcid: &str, payload: &Value, key: Option<&str>) -> Result<Vec<u8>, EnvelopeError> {
    let pack = crypto::encrypt(payload, key)?;
    let discriminator: u8 = if key.is_none() { 1 } else { 0 };
    let envelope = json!({
        "cid": CLIENT_ID,
        "i": discriminator,
        "t": PACK_TYPE,
        "uid": 0,
        "tcid": tcid,
        "pack": pack,
    });
    Ok(envelope.to_string().into_bytes())
}

/// The unencrypted discovery broadcast datagram.
pub fn scan_datagram() -> Vec<u8> {
    br#"{"t":"scan"}"#.to_vec()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
