//! The per-device bind state machine.
//!
//! Every device conversation starts unkeyed.  The client sends a `bind`
//! request encrypted with the generic key; the device answers `bindok`
//! carrying a device-specific session key, and everything after that uses
//! the new key.  This module tracks exactly that lifecycle:
//!
//! ```text
//! Unbound ──bind sent──► Binding ──bindok──► Bound
//!                                              │
//!                                   bindok (re-key, idempotent)
//! ```
//!
//! There is no transition out of `Bound` and no bind timeout: a device that
//! never answers parks the session in `Unbound`/`Binding` forever, and
//! recovery is rediscovery or process restart, not a retry loop inside the
//! session.

/// Bind lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindState {
    /// No key, no bind request in flight.
    Unbound,
    /// A bind request has been sent; awaiting `bindok`.
    Binding,
    /// A session key is held; normal traffic may flow.
    Bound,
}

/// Per-device secure session: the bind state and the key slot.
///
/// Exactly one key slot exists per device.  A later `bindok` overwrites the
/// slot — the device re-keys by sending a fresh `bindok`, never by
/// appending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecureSession {
    state: BindState,
    key: Option<String>,
}

impl SecureSession {
    pub fn new() -> Self {
        Self {
            state: BindState::Unbound,
            key: None,
        }
    }

    pub fn state(&self) -> BindState {
        self.state
    }

    /// The session key, absent until bind completes.
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn is_bound(&self) -> bool {
        self.state == BindState::Bound
    }

    /// Records that a bind request went out.  Meaningful only from
    /// `Unbound`; a session that is already `Binding` or `Bound` stays put.
    pub fn mark_binding(&mut self) {
        if self.state == BindState::Unbound {
            self.state = BindState::Binding;
        }
    }

    /// Accepts a `bindok` key: transitions to `Bound` from any state and
    /// replaces whatever key was held (device-initiated re-key).
    pub fn accept_key(&mut self, key: String) {
        self.key = Some(key);
        self.state = BindState::Bound;
    }

    /// The outbound sequence discriminator: `1` while no key exists, `0`
    /// once a key is held.
    pub fn discriminator(&self) -> u8 {
        if self.key.is_none() {
            1
        } else {
            0
        }
    }
}

impl Default for SecureSession {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
