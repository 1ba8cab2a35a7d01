//! # atw-core
//!
//! Shared library for ATW-Over-LAN containing the wire protocol codec, the
//! command catalog, and the device-state domain types.
//!
//! This crate is used by the bridge daemon and by its integration tests.
//! It has zero dependencies on OS APIs, network sockets, or the file system.
//!
//! # Architecture overview (for beginners)
//!
//! ATW-Over-LAN controls an air-to-water heat pump over the local network.
//! The appliance speaks a proprietary protocol: UDP datagrams carrying JSON
//! *envelopes* whose payload is an encrypted inner JSON object.  This crate
//! defines everything about that conversation except the sockets:
//!
//! - **`protocol`** – How bytes travel over the network.  The outer envelope
//!   format, the AES-128-ECB payload cipher, and the typed inner payloads
//!   (`bind`, `bindok`, `status`, `cmd`, `dat`, `res`, `dev`).
//!
//! - **`domain`** – Pure business logic with no I/O.  The command catalog
//!   (semantic property names mapped to opaque wire codes), the status
//!   snapshot with its derived read views, and the per-device bind state
//!   machine that tracks the session encryption key.

// Rust will look for each module in a subdirectory with the same name
// (e.g., src/protocol/mod.rs).
pub mod domain;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `atw_core::StatusStore` instead of `atw_core::domain::status::StatusStore`.
pub use domain::catalog::{self, CatalogError, OperatingMode, Power, Property};
pub use domain::session::{BindState, SecureSession};
pub use domain::status::{FieldValue, StatusPatch, StatusStore, TargetState};
pub use protocol::envelope::{Envelope, EnvelopeError, DISCOVERY_PORT};
pub use protocol::payload::InboundPayload;
