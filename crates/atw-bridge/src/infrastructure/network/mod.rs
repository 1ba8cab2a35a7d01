//! Network infrastructure for the bridge daemon.
//!
//! # Sub-modules
//!
//! - **`transport`** – The single shared UDP socket: bound once, broadcast
//!   enabled, with a dedicated receive thread feeding an async channel of
//!   `(raw bytes, sender address)` items.
//!
//! - **`scanner`** – The periodic discovery broadcast task.
//!
//! - **`router`** – The single dispatch loop that decrypts inbound envelopes
//!   and routes them to the matching device's session and status store.
//!   This is the final error boundary for all inbound processing.

pub mod router;
pub mod scanner;
pub mod transport;
