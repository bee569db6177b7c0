//! TOML configuration file.
//!
//! Every field is optional; a missing file section or key falls back to the
//! same default as [`SessionConfig::default`].
//!
//! ```toml
//! [device]
//! address = "ws://192.168.4.1:81"
//!
//! [throttle]
//! outbound_interval_ms = 100
//! read_interval_ms = 200
//! analog_threshold = 2
//! drop_mismatched_reports = false
//!
//! [reconnect]
//! max_attempts = 10
//! base_delay_ms = 1000
//! growth_factor = 1.5
//! max_delay_ms = 30000
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use pinlink_core::{KindMismatchPolicy, ReconnectPolicy, SessionConfig};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

// ── Config schema types ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ConfigFile {
    #[serde(default)]
    pub device: DeviceSection,
    #[serde(default)]
    pub throttle: ThrottleSection,
    #[serde(default)]
    pub reconnect: ReconnectSection,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DeviceSection {
    /// WebSocket URL of the device, e.g. `ws://192.168.4.1:81`.
    #[serde(default)]
    pub address: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ThrottleSection {
    #[serde(default = "default_outbound_interval_ms")]
    pub outbound_interval_ms: u64,
    #[serde(default = "default_read_interval_ms")]
    pub read_interval_ms: u64,
    #[serde(default = "default_analog_threshold")]
    pub analog_threshold: u32,
    /// Discard inbound reports whose kind disagrees with the pin's
    /// registration instead of storing them.
    #[serde(default)]
    pub drop_mismatched_reports: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReconnectSection {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_growth_factor")]
    pub growth_factor: f64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_outbound_interval_ms() -> u64 {
    100
}
fn default_read_interval_ms() -> u64 {
    200
}
fn default_analog_threshold() -> u32 {
    2
}
fn default_max_attempts() -> u32 {
    10
}
fn default_base_delay_ms() -> u64 {
    1000
}
fn default_growth_factor() -> f64 {
    1.5
}
fn default_max_delay_ms() -> u64 {
    30_000
}

impl Default for ThrottleSection {
    fn default() -> Self {
        Self {
            outbound_interval_ms: default_outbound_interval_ms(),
            read_interval_ms: default_read_interval_ms(),
            analog_threshold: default_analog_threshold(),
            drop_mismatched_reports: false,
        }
    }
}

impl Default for ReconnectSection {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            growth_factor: default_growth_factor(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl ConfigFile {
    /// Parses TOML text.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Reads and parses the file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    pub fn into_session_config(self) -> SessionConfig {
        let throttle = self.throttle;
        let reconnect = self.reconnect;
        SessionConfig {
            outbound_interval: Duration::from_millis(throttle.outbound_interval_ms),
            read_interval: Duration::from_millis(throttle.read_interval_ms),
            analog_threshold: throttle.analog_threshold,
            reconnect: ReconnectPolicy {
                max_attempts: reconnect.max_attempts,
                base_delay: Duration::from_millis(reconnect.base_delay_ms),
                growth_factor: reconnect.growth_factor,
                max_delay: Duration::from_millis(reconnect.max_delay_ms),
            },
            kind_mismatch: if throttle.drop_mismatched_reports {
                KindMismatchPolicy::Drop
            } else {
                KindMismatchPolicy::Overwrite
            },
            ..SessionConfig::default()
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_matches_session_defaults() {
        let cfg = ConfigFile::parse("").unwrap();
        assert_eq!(cfg.device.address, None);
        assert_eq!(cfg.into_session_config(), SessionConfig::default());
    }

    #[test]
    fn test_partial_sections_fill_in_defaults() {
        let cfg = ConfigFile::parse(
            r#"
            [device]
            address = "ws://10.0.0.7:81"

            [throttle]
            analog_threshold = 8
            "#,
        )
        .unwrap();

        assert_eq!(cfg.device.address.as_deref(), Some("ws://10.0.0.7:81"));
        let session = cfg.into_session_config();
        assert_eq!(session.analog_threshold, 8);
        assert_eq!(session.outbound_interval, Duration::from_millis(100));
    }

    #[test]
    fn test_reconnect_section_maps_to_policy() {
        let cfg = ConfigFile::parse(
            r#"
            [reconnect]
            max_attempts = 3
            base_delay_ms = 250
            "#,
        )
        .unwrap();

        let policy = cfg.into_session_config().reconnect;
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.base_delay, Duration::from_millis(250));
        assert_eq!(policy.max_delay, Duration::from_millis(30_000));
    }

    #[test]
    fn test_drop_mismatched_reports_selects_drop_policy() {
        let cfg = ConfigFile::parse("[throttle]\ndrop_mismatched_reports = true\n").unwrap();
        assert_eq!(cfg.into_session_config().kind_mismatch, KindMismatchPolicy::Drop);
    }

    #[test]
    fn test_wrong_type_is_parse_error() {
        let result = ConfigFile::parse("[throttle]\nanalog_threshold = \"two\"\n");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = ConfigFile::load(Path::new("/nonexistent/pinlink.toml"));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }
}
