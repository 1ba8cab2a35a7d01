//! File-system storage for the bridge daemon: TOML configuration.

pub mod config;
