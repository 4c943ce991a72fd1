use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::sampler::EnvironmentKind;
use crate::error::GravityError;

/// Sampler configuration consumed from collaborators.
///
/// Every field has a default, so a partial JSON file only overrides what it names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    /// Fixed length of one sampling cycle
    pub cycle_interval_ms: u64,
    pub cadences: CadenceConfig,
    pub alerts: AlertThresholds,
    /// Upper bound for any external command run by a slow probe
    pub command_timeout_secs: u64,
    pub top_process_count: usize,
    /// Forces a classification instead of auto-detecting (mostly for testing)
    pub environment_override: Option<EnvironmentKind>,
}

/// Number of sampling cycles between invocations of each slow probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CadenceConfig {
    pub disk: u64,
    pub temperature: u64,
    pub top_processes: u64,
    pub gpu: u64,
    pub storage_health: u64,
    pub firmware: u64,
    pub host_network: u64,
    pub connections: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertThresholds {
    pub memory_percent: f64,
    pub disk_percent: f64,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            cycle_interval_ms: 1000,
            cadences: CadenceConfig::default(),
            alerts: AlertThresholds::default(),
            command_timeout_secs: 10,
            top_process_count: 5,
            environment_override: None,
        }
    }
}

impl Default for CadenceConfig {
    fn default() -> Self {
        Self {
            disk: 5,
            temperature: 5,
            top_processes: 5,
            gpu: 10,
            storage_health: 30,
            firmware: 30,
            host_network: 1,
            connections: 5,
        }
    }
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            memory_percent: 90.0,
            disk_percent: 90.0,
        }
    }
}

impl SamplerConfig {
    /// Load from the default location, falling back to defaults when absent.
    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;
        Self::load_from(&config_path)
    }

    /// Load from an explicit path.
    ///
    /// A missing or empty file yields the defaults. A corrupted file also yields the
    /// defaults (with a warning) so a bad edit never stops sampling.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let data = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        if data.trim().is_empty() {
            return Ok(Self::default());
        }

        let config = serde_json::from_str(&data).unwrap_or_else(|e| {
            log::warn!("Ignoring unreadable config {:?}: {}", path, e);
            Self::default()
        });

        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let data = serde_json::to_string_pretty(self).with_context(|| "Failed to serialize config")?;

        fs::write(path, data)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;

        Ok(())
    }

    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir =
            dirs::config_dir().with_context(|| "Could not determine config directory")?;

        Ok(config_dir.join("gravity").join("config.json"))
    }

    /// Reject values that would make the loop or scheduler meaningless.
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.cycle_interval_ms == 0 {
            return Err(GravityError::config("cycle_interval_ms must be greater than zero"));
        }

        let c = &self.cadences;
        let cadences = [
            ("disk", c.disk),
            ("temperature", c.temperature),
            ("top_processes", c.top_processes),
            ("gpu", c.gpu),
            ("storage_health", c.storage_health),
            ("firmware", c.firmware),
            ("host_network", c.host_network),
            ("connections", c.connections),
        ];
        if let Some((name, _)) = cadences.iter().find(|(_, v)| *v == 0) {
            return Err(GravityError::config(format!("cadence for {} must be at least 1", name)));
        }

        Ok(())
    }

    pub fn cycle_interval(&self) -> Duration {
        Duration::from_millis(self.cycle_interval_ms)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}
