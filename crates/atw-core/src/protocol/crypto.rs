//! Symmetric payload cipher: AES-128-ECB with PKCS7 padding, base64-armored.
//!
//! # How the appliance encrypts payloads (for beginners)
//!
//! Every encrypted payload travels inside the envelope's `pack` field as a
//! base64 string.  The plaintext is the inner JSON object serialized to text.
//! The cipher is AES-128 in ECB mode with PKCS7 padding — not a construction
//! anyone would pick today, but it is what the appliance firmware speaks, so
//! the client must speak it too.
//!
//! Two keys exist per device:
//!
//! 1. The **generic key**, baked into every appliance of this family.  It
//!    protects the handshake messages (`bind`, `bindok`, `dev`) exchanged
//!    before a device-specific key is known.
//! 2. The **session key**, handed out by the device in its `bindok` reply.
//!    All later traffic for that device uses it.
//!
//! Callers pass `None` for the key to select the generic key; this mirrors
//! the device's own convention where the envelope discriminator `i = 1`
//! marks generic-key traffic.

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyInit};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::Value;
use thiserror::Error;

type Aes128EcbEnc = ecb::Encryptor<aes::Aes128>;
type Aes128EcbDec = ecb::Decryptor<aes::Aes128>;

/// The well-known generic key shared by every appliance of this family.
///
/// Used for all traffic sent or received before a device-specific session
/// key has been exchanged.
pub const GENERIC_KEY: &str = "a3K8Bx%2r8Y7#xDh";

/// Errors that can occur while encrypting or decrypting a payload.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// The key string is not exactly 16 bytes (AES-128 block key size).
    #[error("cipher key must be 16 bytes, got {0}")]
    KeyLength(usize),

    /// The `pack` field is not valid base64.
    #[error("ciphertext is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    /// Decryption produced invalid PKCS7 padding.  The usual cause is a
    /// wrong or stale key (e.g., traffic encrypted with a session key the
    /// client no longer holds).
    #[error("decryption produced invalid padding (wrong or stale key?)")]
    Padding,

    /// The decrypted plaintext is not a JSON object.
    #[error("decrypted payload is not valid JSON: {0}")]
    PayloadJson(#[from] serde_json::Error),
}

/// Encrypts `payload` and returns the base64 ciphertext for the `pack` field.
///
/// `key = None` selects [`GENERIC_KEY`].
///
/// # Errors
///
/// Returns [`CryptoError::KeyLength`] if the key is not 16 bytes.
pub fn encrypt(payload: &Value, key: Option<&str>) -> Result<String, CryptoError> {
    let key = key_bytes(key)?;
    let plaintext = payload.to_string();
    let cipher = Aes128EcbEnc::new_from_slice(key).map_err(|_| CryptoError::KeyLength(key.len()))?;
    let ciphertext = cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());
    Ok(BASE64.encode(ciphertext))
}

/// Decrypts a base64 `pack` field back into the inner JSON payload.
///
/// `key = None` selects [`GENERIC_KEY`].
///
/// # Errors
///
/// Returns [`CryptoError::Base64`] for invalid base64,
/// [`CryptoError::Padding`] when the key does not match the ciphertext, and
/// [`CryptoError::PayloadJson`] when the plaintext is not JSON.
pub fn decrypt(ciphertext: &str, key: Option<&str>) -> Result<Value, CryptoError> {
    let key = key_bytes(key)?;
    let raw = BASE64.decode(ciphertext)?;
    let cipher = Aes128EcbDec::new_from_slice(key).map_err(|_| CryptoError::KeyLength(key.len()))?;
    let plaintext = cipher
        .decrypt_padded_vec_mut::<Pkcs7>(&raw)
        .map_err(|_| CryptoError::Padding)?;
    Ok(serde_json::from_slice(&plaintext)?)
}

/// Resolves the effective key bytes, falling back to the generic key.
fn key_bytes(key: Option<&str>) -> Result<&[u8], CryptoError> {
    let bytes = key.unwrap_or(GENERIC_KEY).as_bytes();
    if bytes.len() != 16 {
        return Err(CryptoError::KeyLength(bytes.len()));
    }
    Ok(bytes)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
