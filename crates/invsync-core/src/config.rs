//! Inventory configuration

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};

use invsync_api::{ConfigSummary, Domain};

use crate::error::CoreError;

/// Options recognized by the inventory engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryConfig {
    /// Master switch
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Time between passes
    #[serde(
        default = "default_interval",
        deserialize_with = "deserialize_interval",
        serialize_with = "serialize_interval"
    )]
    pub interval: Duration,
    /// Run a pass immediately when the loop starts
    #[serde(default = "default_true")]
    pub scan_on_start: bool,
    #[serde(default = "default_true")]
    pub hardware: bool,
    #[serde(default = "default_true")]
    pub system: bool,
    #[serde(default = "default_true")]
    pub networks: bool,
    #[serde(default = "default_true")]
    pub packages: bool,
    #[serde(default = "default_true")]
    pub ports: bool,
    /// Report every open socket instead of listening ones only
    #[serde(default = "default_true")]
    pub ports_all: bool,
    #[serde(default = "default_true")]
    pub processes: bool,
    #[serde(default = "default_true")]
    pub hotfixes: bool,
    /// SQLite file holding snapshots and metadata
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
    /// JSON file with package exclusion/dictionary rules
    #[serde(default)]
    pub normalizer_config_path: Option<PathBuf>,
    /// Variant selected from the rules file (`linux`, `windows`, `macos`)
    #[serde(default = "default_normalizer_type")]
    pub normalizer_type: String,
}

fn default_true() -> bool {
    true
}

fn default_interval() -> Duration {
    Duration::from_secs(3600)
}

fn default_database_path() -> PathBuf {
    PathBuf::from("inventory.db")
}

fn default_normalizer_type() -> String {
    std::env::consts::OS.to_string()
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: default_interval(),
            scan_on_start: true,
            hardware: true,
            system: true,
            networks: true,
            packages: true,
            ports: true,
            ports_all: true,
            processes: true,
            hotfixes: true,
            database_path: default_database_path(),
            normalizer_config_path: None,
            normalizer_type: default_normalizer_type(),
        }
    }
}

impl InventoryConfig {
    /// Whether scans for `domain` are switched on
    #[must_use]
    pub fn is_domain_enabled(&self, domain: Domain) -> bool {
        match domain {
            Domain::Hardware => self.hardware,
            Domain::System => self.system,
            Domain::Networks => self.networks,
            Domain::Packages => self.packages,
            Domain::Ports => self.ports,
            Domain::Processes => self.processes,
            Domain::Hotfixes => self.hotfixes,
        }
    }

    /// Enabled domains in scan order
    pub fn enabled_domains(&self) -> impl Iterator<Item = Domain> + '_ {
        Domain::ALL
            .into_iter()
            .filter(|d| self.is_domain_enabled(*d))
    }

    /// Check option consistency
    ///
    /// # Errors
    /// Returns an error for a zero interval or an empty database path.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.interval.is_zero() {
            return Err(CoreError::ConfigError(
                "interval must be greater than zero".to_string(),
            ));
        }
        if self.database_path.as_os_str().is_empty() {
            return Err(CoreError::ConfigError(
                "database_path must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Summary reported by the diagnostics dump
    #[must_use]
    pub fn summary(&self) -> ConfigSummary {
        ConfigSummary {
            enabled: self.enabled,
            interval_secs: self.interval.as_secs(),
            scan_on_start: self.scan_on_start,
            ports_all: self.ports_all,
            database_path: self.database_path.display().to_string(),
            normalizer_config_path: self
                .normalizer_config_path
                .as_ref()
                .map(|p| p.display().to_string()),
            normalizer_type: self.normalizer_type.clone(),
        }
    }
}

/// Parse `"90"`, `"30s"`, `"15m"`, `"1h"` or `"1d"`
///
/// # Errors
/// Returns an error for an empty value, an unknown unit, a non-numeric
/// amount, or a value overflowing `u64` seconds.
pub fn parse_interval(value: &str) -> Result<Duration, String> {
    let value = value.trim();
    let split = value
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(value.len());
    let (amount, unit) = value.split_at(split);

    let amount: u64 = amount
        .parse()
        .map_err(|_| format!("invalid interval: {value:?}"))?;
    let multiplier = match unit.trim() {
        "" | "s" => 1,
        "m" => 60,
        "h" => 3600,
        "d" => 86_400,
        other => return Err(format!("unknown interval unit: {other:?}")),
    };

    let secs = amount
        .checked_mul(multiplier)
        .ok_or_else(|| format!("interval too large: {value:?}"))?;
    Ok(Duration::from_secs(secs))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum IntervalValue {
    Seconds(u64),
    Text(String),
}

fn deserialize_interval<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    match IntervalValue::deserialize(deserializer)? {
        IntervalValue::Seconds(secs) => Ok(Duration::from_secs(secs)),
        IntervalValue::Text(text) => parse_interval(&text).map_err(serde::de::Error::custom),
    }
}

fn serialize_interval<S>(interval: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_u64(interval.as_secs())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_interval() {
        assert_eq!(parse_interval("90"), Ok(Duration::from_secs(90)));
        assert_eq!(parse_interval("30s"), Ok(Duration::from_secs(30)));
        assert_eq!(parse_interval("15m"), Ok(Duration::from_secs(900)));
        assert_eq!(parse_interval("1h"), Ok(Duration::from_secs(3600)));
        assert_eq!(parse_interval("2d"), Ok(Duration::from_secs(172_800)));
        assert!(parse_interval("h").is_err());
        assert!(parse_interval("10w").is_err());
        assert!(parse_interval("300000000000000000d").is_err());
        assert_eq!(
            parse_interval(&format!("{}", u64::MAX)),
            Ok(Duration::from_secs(u64::MAX))
        );
    }

    #[test]
    fn test_defaults_enable_everything() {
        let config = InventoryConfig::default();
        assert!(config.enabled);
        assert_eq!(config.enabled_domains().count(), Domain::ALL.len());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_deserialize_from_toml() {
        let config: InventoryConfig = toml::from_str(
            r#"
            interval = "10m"
            scan_on_start = false
            hotfixes = false
            ports_all = false
            database_path = "/var/lib/invsync/inventory.db"
            "#,
        )
        .unwrap();

        assert_eq!(config.interval, Duration::from_secs(600));
        assert!(!config.scan_on_start);
        assert!(!config.is_domain_enabled(Domain::Hotfixes));
        assert!(config.is_domain_enabled(Domain::Packages));
        assert!(!config.ports_all);
        assert_eq!(config.enabled_domains().count(), 6);
    }

    #[test]
    fn test_interval_as_integer_seconds() {
        let config: InventoryConfig = toml::from_str("interval = 120").unwrap();
        assert_eq!(config.interval, Duration::from_secs(120));
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let config = InventoryConfig {
            interval: Duration::ZERO,
            ..InventoryConfig::default()
        };
        assert!(matches!(config.validate(), Err(CoreError::ConfigError(_))));
    }
}
