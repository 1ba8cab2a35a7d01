//! Infrastructure layer for the bridge daemon.
//!
//! Contains OS-facing adapters: the UDP socket, the periodic scanner, the
//! inbound message router, and configuration storage.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `atw_core`, but MUST NOT be imported by the application layer.

pub mod network;
pub mod storage;
