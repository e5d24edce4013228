use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub device: DeviceConfig,
    pub rig: RigConfig,
    pub runtime: RuntimeConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub name: String,
}

/// Which actuator model drives both axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActuatorKind {
    Feedback,
    Estimated,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RigConfig {
    pub actuator: ActuatorKind,
    /// Where the tracker's own settings are persisted.
    pub configuration: PathBuf,
    /// Start tracking as soon as both axes are referenced.
    pub auto_track: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    pub pump_period_ms: u64,
}

impl AppConfig {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        // Try external file first
        if path.exists() {
            let content = fs::read_to_string(path)?;
            let config: AppConfig = toml::from_str(&content)?;
            log::info!("Loaded configuration from {}", path.display());
            Ok(config)
        } else {
            // Fallback to embedded defaults
            let content = include_str!("../dual-tracker.toml.example");
            let config: AppConfig = toml::from_str(content)?;
            log::warn!("Using embedded default configuration");
            Ok(config)
        }
    }

    pub fn pump_period(&self) -> Duration {
        Duration::from_millis(self.runtime.pump_period_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_defaults_parse() {
        let config = AppConfig::load("does-not-exist.toml").unwrap();
        assert_eq!(config.rig.actuator, ActuatorKind::Feedback);
        assert_eq!(config.rig.configuration, PathBuf::from("tracker.toml"));
        assert_eq!(config.pump_period(), Duration::from_millis(20));
    }

    #[test]
    fn estimated_variant_parses() {
        let config: AppConfig = toml::from_str(
            "[device]\nname = \"bench\"\n[rig]\nactuator = \"estimated\"\nconfiguration = \"t.toml\"\nauto_track = false\n[runtime]\npump_period_ms = 5\n",
        )
        .unwrap();
        assert_eq!(config.rig.actuator, ActuatorKind::Estimated);
        assert!(!config.rig.auto_track);
    }
}
