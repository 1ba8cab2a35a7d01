//! TOML-based configuration for the bridge daemon.
//!
//! Reads `AppConfig` from `$XDG_CONFIG_HOME/atw-bridge/config.toml`
//! (falling back to `~/.config/atw-bridge/config.toml`); a missing file
//! yields the built-in defaults so first run needs no setup.
//!
//! Every tunable resolves in the same order: per-device override (from a
//! `[[devices]]` entry matching the MAC) → platform-level value → built-in
//! default.  Fields annotated `#[serde(default = "…")]` supply the built-in
//! defaults when absent from the file, which also keeps old config files
//! working when newer fields appear.
//!
//! ```toml
//! [platform]
//! scan_address = "192.168.1.255"
//! status_poll_interval_secs = 60
//!
//! [[devices]]
//! mac = "f4911e000001"
//! name = "Garage heat pump"
//! status_poll_interval_secs = 15
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use atw_core::DISCOVERY_PORT;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The scan address is not a usable IP address.
    #[error("invalid scan address {addr:?}: {source}")]
    ScanAddress {
        addr: String,
        #[source]
        source: std::net::AddrParseError,
    },
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub platform: PlatformConfig,
    #[serde(default)]
    pub devices: Vec<DeviceOverride>,
}

/// Platform-level defaults shared by all devices.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlatformConfig {
    /// Display name for the bridge.
    #[serde(default = "default_name")]
    pub name: String,
    /// Local UDP port the shared socket binds.
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,
    /// Broadcast address scan datagrams go to.
    #[serde(default = "default_scan_address")]
    pub scan_address: String,
    /// Attempt count after which scanning stops.
    #[serde(default = "default_scan_count")]
    pub scan_count: u32,
    /// Delay between scan broadcasts, in milliseconds.
    #[serde(default = "default_scan_interval_ms")]
    pub scan_interval_ms: u64,
    /// Delay between status polls per bound device, in seconds.
    #[serde(default = "default_status_poll_interval_secs")]
    pub status_poll_interval_secs: u64,
    /// `tracing` log level: `"error"`, `"warn"`, `"info"`, `"debug"`, `"trace"`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Per-device overrides, matched by MAC.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeviceOverride {
    /// The device's stable hardware identifier.
    pub mac: String,
    /// Display name override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Poll interval override for this device.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_poll_interval_secs: Option<u64>,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_name() -> String {
    "ATW Bridge".to_string()
}
fn default_listen_port() -> u16 {
    7002
}
fn default_scan_address() -> String {
    "192.168.1.255".to_string()
}
fn default_scan_count() -> u32 {
    10
}
fn default_scan_interval_ms() -> u64 {
    3000
}
fn default_status_poll_interval_secs() -> u64 {
    60
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            listen_port: default_listen_port(),
            scan_address: default_scan_address(),
            scan_count: default_scan_count(),
            scan_interval_ms: default_scan_interval_ms(),
            status_poll_interval_secs: default_status_poll_interval_secs(),
            log_level: default_log_level(),
        }
    }
}

// ── Resolution ────────────────────────────────────────────────────────────────

impl AppConfig {
    /// The `[[devices]]` entry for `mac`, if one exists.
    pub fn device_override(&self, mac: &str) -> Option<&DeviceOverride> {
        self.devices.iter().find(|device| device.mac == mac)
    }

    /// The status poll interval for `mac`: device override → platform value
    /// (itself defaulted when absent from the file) → built-in 60 s.
    pub fn poll_interval(&self, mac: &str) -> Duration {
        let secs = self
            .device_override(mac)
            .and_then(|device| device.status_poll_interval_secs)
            .unwrap_or(self.platform.status_poll_interval_secs);
        Duration::from_secs(secs)
    }

    /// The display name for `mac`, if overridden.
    pub fn device_name(&self, mac: &str) -> Option<&str> {
        self.device_override(mac)?.name.as_deref()
    }

    /// The scan broadcast destination (`scan_address` on the fixed
    /// discovery port).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ScanAddress`] when the configured address
    /// does not parse.
    pub fn scan_target(&self) -> Result<SocketAddr, ConfigError> {
        let ip: std::net::IpAddr =
            self.platform
                .scan_address
                .parse()
                .map_err(|source| ConfigError::ScanAddress {
                    addr: self.platform.scan_address.clone(),
                    source,
                })?;
        Ok(SocketAddr::new(ip, DISCOVERY_PORT))
    }

    /// The scanner tick interval.
    pub fn scan_interval(&self) -> Duration {
        Duration::from_millis(self.platform.scan_interval_ms)
    }
}

// ── Loading ───────────────────────────────────────────────────────────────────

/// Resolves the default config file path from the environment.
pub fn config_file_path() -> Option<PathBuf> {
    let base = std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))?;
    Some(base.join("atw-bridge").join("config.toml"))
}

/// Loads configuration from `path`, returning `AppConfig::default()` when
/// the file does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than
/// "not found", and [`ConfigError::Parse`] when the TOML is malformed.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AppConfig::default()),
        Err(source) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
