// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/alarm-monitor

//! Configuration module

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::dashboard::DashboardConfig;
use crate::device::DeviceConfig;
use crate::source::SourceConfig;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Application name
    pub app_name: String,

    /// Application version
    pub version: String,

    /// Log level
    pub log_level: String,

    /// Show a toast on the TV for every new alarm
    pub toast_on_alarm: bool,

    /// Alarm timing
    pub alarm: AlarmConfig,

    /// Alarm source
    pub source: SourceConfig,

    /// Filter rules file
    pub filter: FilterConfig,

    /// Display device
    pub device: DeviceConfig,

    /// Dashboard browser check
    pub dashboard: DashboardConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_name: "AlarmMonitor".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            log_level: "info".to_string(),
            toast_on_alarm: false,
            alarm: AlarmConfig::default(),
            source: SourceConfig::default(),
            filter: FilterConfig::default(),
            device: DeviceConfig::default(),
            dashboard: DashboardConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Load or create default configuration
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            let config = Self::default();

            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            config.save(path)?;
            Ok(config)
        }
    }

    /// Get configuration directory
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|d| d.join("alarm-monitor"))
            .unwrap_or_else(|| PathBuf::from("./config"))
    }

    /// Get default configuration path
    pub fn default_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Filter file location for a configuration loaded from `config_path`.
    pub fn filter_path(&self, config_path: &Path) -> PathBuf {
        let base = config_path.parent().unwrap_or_else(|| Path::new("."));
        resolve_path(&self.filter.path, base)
    }
}

/// Expand a leading `~` and anchor relative paths at `base`.
pub fn resolve_path(path: &str, base: &Path) -> PathBuf {
    let expanded = match path.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') || rest.starts_with('\\') => {
            match dirs::home_dir() {
                Some(home) => home.join(rest.trim_start_matches(['/', '\\'])),
                None => PathBuf::from(path),
            }
        }
        _ => PathBuf::from(path),
    };

    if expanded.is_absolute() {
        expanded
    } else {
        base.join(expanded)
    }
}

/// Alarm timing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlarmConfig {
    /// How long after origination an alarm keeps the display on
    pub keep_active_secs: u64,

    /// Seconds between polls
    pub poll_interval_secs: u64,

    /// How far back the source is asked for alarms
    pub lookback_secs: u64,
}

impl Default for AlarmConfig {
    fn default() -> Self {
        Self {
            keep_active_secs: 1800,
            poll_interval_secs: 60,
            lookback_secs: 7200,
        }
    }
}

/// Filter file configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Rules file; relative to the config file's directory
    pub path: String,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            path: "filter.json".to_string(),
        }
    }
}
