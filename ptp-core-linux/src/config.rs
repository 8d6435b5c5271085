//! TOML configuration surface (`ptp-core` itself never parses files).

use std::{os::unix::fs::PermissionsExt, path::PathBuf};

use log::warn;
use ptp_core::datastructures::{
    common::{ClockIdentity, ClockQuality},
    datasets::DelayMechanism,
};
use serde::{Deserialize, Deserializer};

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Config {
    #[serde(default = "default_domain")]
    pub domain: u8,
    #[serde(default, deserialize_with = "deserialize_clock_identity")]
    pub identity: Option<ClockIdentity>,
    #[serde(default = "default_priority1")]
    pub priority1: u8,
    #[serde(default = "default_priority2")]
    pub priority2: u8,
    #[serde(default)]
    pub slave_only: bool,
    #[serde(rename = "port")]
    pub ports: Vec<PortConfig>,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct PortConfig {
    pub interface: String,
    #[serde(default = "default_announce_interval")]
    pub log_announce_interval: i8,
    #[serde(default = "default_sync_interval")]
    pub log_sync_interval: i8,
    #[serde(default = "default_min_delay_req_interval")]
    pub log_min_delay_req_interval: i8,
    #[serde(default = "default_min_pdelay_req_interval")]
    pub log_min_pdelay_req_interval: i8,
    #[serde(default = "default_announce_receipt_timeout")]
    pub announce_receipt_timeout: u8,
    #[serde(default)]
    pub delay_mechanism: DelayType,
    #[serde(default)]
    pub two_step: Option<bool>,
    #[serde(default)]
    pub hardware_clock: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum DelayType {
    #[default]
    E2E,
    P2P,
    Disabled,
}

impl From<DelayType> for DelayMechanism {
    fn from(value: DelayType) -> Self {
        match value {
            DelayType::E2E => DelayMechanism::E2E,
            DelayType::P2P => DelayMechanism::P2P,
            DelayType::Disabled => DelayMechanism::Disabled,
        }
    }
}

fn deserialize_clock_identity<'de, D>(deserializer: D) -> Result<Option<ClockIdentity>, D::Error>
where
    D: Deserializer<'de>,
{
    use hex::FromHex;
    use serde::de::Error;

    let raw: String = Deserialize::deserialize(deserializer)?;
    let bytes = <[u8; 8]>::from_hex(raw).map_err(|e| D::Error::custom(format!("invalid clock identity: {e}")))?;
    Ok(Some(ClockIdentity(bytes)))
}

fn default_domain() -> u8 {
    0
}

fn default_priority1() -> u8 {
    128
}

fn default_priority2() -> u8 {
    128
}

fn default_announce_interval() -> i8 {
    1
}

fn default_sync_interval() -> i8 {
    0
}

fn default_min_delay_req_interval() -> i8 {
    0
}

fn default_min_pdelay_req_interval() -> i8 {
    0
}

fn default_announce_receipt_timeout() -> u8 {
    6
}

/// The default clock quality reported by this daemon when acting as a free
/// running grandmaster; overridden down by BMC once a better clock appears.
pub fn default_clock_quality() -> ClockQuality {
    ClockQuality {
        clock_class: 248,
        clock_accuracy: 0xFE,
        offset_scaled_log_variance: 0xFFFF,
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ObservabilityConfig {
    #[serde(default)]
    pub observation_path: Option<PathBuf>,
    #[serde(default = "default_observation_permissions")]
    pub observation_permissions: u32,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            observation_path: None,
            observation_permissions: default_observation_permissions(),
        }
    }
}

const fn default_observation_permissions() -> u32 {
    0o666
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Toml(toml::de::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "io error while reading config: {e}"),
            ConfigError::Toml(e) => write!(f, "config toml parsing error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    pub fn from_file(path: &std::path::Path) -> Result<Config, ConfigError> {
        let meta = std::fs::metadata(path).map_err(ConfigError::Io)?;
        if meta.permissions().mode() & 0o002 != 0 {
            warn!("unrestricted config file permissions: others can write");
        }

        let contents = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        let config: Config = toml::de::from_str(&contents).map_err(ConfigError::Toml)?;
        config.warn_when_unreasonable();
        Ok(config)
    }

    fn warn_when_unreasonable(&self) {
        if self.ports.is_empty() {
            warn!("no ports configured");
        }
        if self.ports.len() > 1 {
            warn!("only the first configured port is used; boundary-clock fan-out is not implemented");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_fills_in_defaults() {
        const MINIMAL: &str = r#"
[[port]]
interface = "eth0"
"#;
        let config: Config = toml::from_str(MINIMAL).unwrap();
        assert_eq!(config.domain, 0);
        assert_eq!(config.priority1, 128);
        assert_eq!(config.priority2, 128);
        assert!(!config.slave_only);
        assert_eq!(config.ports.len(), 1);
        assert_eq!(config.ports[0].interface, "eth0");
        assert_eq!(config.ports[0].log_announce_interval, 1);
        assert_eq!(config.ports[0].delay_mechanism, DelayType::E2E);
    }

    #[test]
    fn hex_identity_parses() {
        const WITH_IDENTITY: &str = r#"
identity = "0102030405060708"
[[port]]
interface = "eth0"
"#;
        let config: Config = toml::from_str(WITH_IDENTITY).unwrap();
        assert_eq!(config.identity, Some(ClockIdentity([1, 2, 3, 4, 5, 6, 7, 8])));
    }

    #[test]
    fn unknown_field_is_rejected() {
        const BAD: &str = r#"
bogus = true
[[port]]
interface = "eth0"
"#;
        assert!(toml::from_str::<Config>(BAD).is_err());
    }
}
