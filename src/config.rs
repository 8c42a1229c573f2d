use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::scan::ScanOptions;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub scan: ScanSection,
    #[serde(default)]
    pub probe: ProbeSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanSection {
    #[serde(default = "default_item_limit")]
    pub item_limit: usize,
    #[serde(default = "default_largest_threshold_mb")]
    pub largest_threshold_mb: u64,
    #[serde(default = "default_largest_limit")]
    pub largest_limit: usize,
    #[serde(default = "default_sweep_timeout_secs")]
    pub sweep_timeout_secs: u64,
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
}

fn default_item_limit() -> usize {
    100
}

fn default_largest_threshold_mb() -> u64 {
    100
}

fn default_largest_limit() -> usize {
    20
}

fn default_sweep_timeout_secs() -> u64 {
    5
}

fn default_settle_delay_ms() -> u64 {
    500
}

impl Default for ScanSection {
    fn default() -> Self {
        Self {
            item_limit: default_item_limit(),
            largest_threshold_mb: default_largest_threshold_mb(),
            largest_limit: default_largest_limit(),
            sweep_timeout_secs: default_sweep_timeout_secs(),
            settle_delay_ms: default_settle_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProbeSection {
    #[serde(default)]
    pub du_path: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if config_path.exists() {
            let content = fs::read_to_string(&config_path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save()?;
            Ok(config)
        }
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path();

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(&config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tidyscan")
            .join("config.toml")
    }

    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            item_limit: self.scan.item_limit,
            largest_threshold: self.scan.largest_threshold_mb * 1024 * 1024,
            largest_limit: self.scan.largest_limit,
            sweep_timeout: Duration::from_secs(self.scan.sweep_timeout_secs),
            settle_delay: Duration::from_millis(self.scan.settle_delay_ms),
        }
    }

    pub fn du_path(&self) -> Option<PathBuf> {
        self.probe.du_path.as_ref().map(PathBuf::from)
    }

    pub fn set_value(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "scan.item_limit" => self.scan.item_limit = value.parse()?,
            "scan.largest_threshold_mb" => self.scan.largest_threshold_mb = value.parse()?,
            "scan.largest_limit" => self.scan.largest_limit = value.parse()?,
            "scan.sweep_timeout_secs" => self.scan.sweep_timeout_secs = value.parse()?,
            "scan.settle_delay_ms" => self.scan.settle_delay_ms = value.parse()?,
            "probe.du_path" => self.probe.du_path = Some(value.to_string()),
            _ => anyhow::bail!("unknown config key: {key}"),
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scan: ScanSection::default(),
            probe: ProbeSection::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_parses_with_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.scan.item_limit, 100);
        assert_eq!(config.scan.largest_threshold_mb, 100);
        assert_eq!(config.scan.sweep_timeout_secs, 5);
        assert!(config.probe.du_path.is_none());
    }

    #[test]
    fn test_scan_options_convert_units() {
        let config = Config::default();
        let options = config.scan_options();
        assert_eq!(options.largest_threshold, 100 * 1024 * 1024);
        assert_eq!(options.sweep_timeout, Duration::from_secs(5));
        assert_eq!(options.settle_delay, Duration::from_millis(500));
    }

    #[test]
    fn test_set_value_updates_known_keys() {
        let mut config = Config::default();
        config.set_value("scan.item_limit", "50").unwrap();
        config.set_value("probe.du_path", "/opt/bin/du").unwrap();
        assert_eq!(config.scan.item_limit, 50);
        assert_eq!(config.probe.du_path.as_deref(), Some("/opt/bin/du"));
    }

    #[test]
    fn test_set_value_rejects_unknown_keys() {
        let mut config = Config::default();
        assert!(config.set_value("scan.bogus", "1").is_err());
        assert!(config.set_value("scan.item_limit", "not a number").is_err());
    }
}
