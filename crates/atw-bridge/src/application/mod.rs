//! Application layer for the bridge daemon.
//!
//! Use cases orchestrate the domain types from `atw-core` and depend on the
//! socket only through the [`sender::DatagramSender`] trait, so every use
//! case is unit-testable without a network.
//!
//! # Sub-modules
//!
//! - **`sender`** – The outbound transport seam: a trait for sending one
//!   datagram, implemented by the UDP socket in the infrastructure layer and
//!   by recording doubles in tests.
//!
//! - **`registry`** – The device registry: one entry per discovered device,
//!   deduplicated by MAC, owning that device's secure session, status store,
//!   and poll task.
//!
//! - **`dispatcher`** – Intention-level command operations (`set_power`,
//!   `set_mode`, `set_target_temperature`) with their session preconditions.
//!
//! - **`characteristics`** – The explicit table mapping semantic property
//!   names to typed read views for the presentation layer, validated for
//!   completeness at startup.

pub mod characteristics;
pub mod dispatcher;
pub mod registry;
pub mod sender;
