mod settings;

use std::fs;
use std::path::{Path, PathBuf};

pub use settings::{AzimuthSettings, ElevationSettings, LocationSettings, Settings, TrackingSettings};

const DEFAULTS: &str = include_str!("../defaults.toml");

impl Settings {
    /// Defaults compiled into the binary.
    pub fn embedded() -> anyhow::Result<Self> {
        Ok(toml::from_str(DEFAULTS)?)
    }
}

fn update<T: PartialEq>(field: &mut T, value: T) -> bool {
    if *field == value {
        return false;
    }
    *field = value;
    true
}

/// Persisted tracker configuration with a dirty/save cycle. Setters only mark the
/// configuration dirty when a value actually changes.
#[derive(Debug, Clone)]
pub struct Configuration {
    settings: Settings,
    path: Option<PathBuf>,
    dirty: bool,
}

impl Configuration {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let settings = if path.exists() {
            let content = fs::read_to_string(path)?;
            let settings: Settings = toml::from_str(&content)?;
            log::info!("Loaded configuration from {}", path.display());
            settings
        } else {
            log::warn!(
                "{} not found, using embedded default configuration",
                path.display()
            );
            Settings::embedded()?
        };
        Ok(Configuration {
            settings,
            path: Some(path.to_path_buf()),
            dirty: false,
        })
    }

    /// Configuration that is never written anywhere; `save` only clears the dirty flag.
    pub fn in_memory(settings: Settings) -> Self {
        Configuration {
            settings,
            path: None,
            dirty: false,
        }
    }

    /// Writes pending changes. The dirty flag is cleared even if the write fails,
    /// the in-memory settings stay in effect either way.
    pub fn save(&mut self) -> anyhow::Result<()> {
        self.dirty = false;
        let Some(path) = &self.path else {
            return Ok(());
        };
        let content = toml::to_string_pretty(&self.settings)?;
        fs::write(path, content)?;
        log::info!("Configuration saved to {}", path.display());
        Ok(())
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn latitude(&self) -> f64 {
        self.settings.location.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.settings.location.longitude
    }

    pub fn utc_offset(&self) -> i32 {
        self.settings.location.utc_offset
    }

    pub fn is_dual(&self) -> bool {
        self.settings.tracking.dual
    }

    pub fn dead_band(&self) -> f32 {
        self.settings.tracking.dead_band
    }

    pub fn azimuth(&self) -> &AzimuthSettings {
        &self.settings.azimuth
    }

    pub fn elevation(&self) -> &ElevationSettings {
        &self.settings.elevation
    }

    fn touch(&mut self, changed: bool, what: &str) {
        if changed {
            log::info!("Configuration {} changed", what);
            self.dirty = true;
        }
    }

    pub fn set_location(&mut self, latitude: f64, longitude: f64) {
        let loc = &mut self.settings.location;
        let changed = update(&mut loc.latitude, latitude) | update(&mut loc.longitude, longitude);
        self.touch(changed, "location");
    }

    pub fn set_actuator_parameters(
        &mut self,
        azimuth_length: f32,
        elevation_length: f32,
        azimuth_speed: f32,
        elevation_speed: f32,
    ) {
        let s = &mut self.settings;
        let changed = update(&mut s.azimuth.length, azimuth_length)
            | update(&mut s.elevation.length, elevation_length)
            | update(&mut s.azimuth.speed, azimuth_speed)
            | update(&mut s.elevation.speed, elevation_speed);
        self.touch(changed, "actuator parameters");
    }

    pub fn set_limits(&mut self, east: f32, west: f32, min: f32, max: f32) {
        let s = &mut self.settings;
        let changed = update(&mut s.azimuth.east, east)
            | update(&mut s.azimuth.west, west)
            | update(&mut s.elevation.min, min)
            | update(&mut s.elevation.max, max);
        self.touch(changed, "limits");
    }

    pub fn set_utc_offset(&mut self, utc_offset: i32) {
        let changed = update(&mut self.settings.location.utc_offset, utc_offset);
        self.touch(changed, "UTC offset");
    }

    pub fn set_dual(&mut self, dual: bool) {
        let changed = update(&mut self.settings.tracking.dual, dual);
        self.touch(changed, "dual-axis flag");
    }

    pub fn set_dead_band(&mut self, dead_band: f32) {
        let changed = update(&mut self.settings.tracking.dead_band, dead_band);
        self.touch(changed, "dead-band");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_defaults_match_default_impl() {
        assert_eq!(Settings::embedded().unwrap(), Settings::default());
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Configuration::load(dir.path().join("tracker.toml")).unwrap();
        assert_eq!(config.settings(), &Settings::default());
        assert!(!config.is_dirty());
        assert!(!config.is_dual());
        assert_eq!(config.utc_offset(), -5);
    }

    #[test]
    fn setters_only_dirty_on_change() {
        let mut config = Configuration::in_memory(Settings::default());
        config.set_limits(90.0, 270.0, 0.0, 90.0);
        config.set_dual(false);
        assert!(!config.is_dirty());

        config.set_utc_offset(-4);
        assert!(config.is_dirty());
        config.save().unwrap();
        assert!(!config.is_dirty());
        assert_eq!(config.utc_offset(), -4);
    }

    #[test]
    fn save_then_reload_persists_changes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tracker.toml");

        let mut config = Configuration::load(&path).unwrap();
        config.set_limits(-90.0, 90.0, 10.0, 80.0);
        config.set_location(32.797868, -96.835597);
        config.set_dual(true);
        config.save().unwrap();
        assert!(path.exists());

        let reloaded = Configuration::load(&path).unwrap();
        assert_eq!(reloaded.azimuth().east, -90.0);
        assert_eq!(reloaded.azimuth().west, 90.0);
        assert_eq!(reloaded.elevation().min, 10.0);
        assert_eq!(reloaded.elevation().max, 80.0);
        assert_eq!(reloaded.latitude(), 32.797868);
        assert!(reloaded.is_dual());
        assert!(!reloaded.is_dirty());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tracker.toml");
        fs::write(&path, "[location]\nlatitude = \"north\"\n").unwrap();
        assert!(Configuration::load(&path).is_err());
    }

    #[test]
    fn failed_save_still_clears_dirty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("tracker.toml");
        let mut config = Configuration::load(&path).unwrap();
        config.set_dead_band(3.0);
        assert!(config.save().is_err());
        assert!(!config.is_dirty());
        assert_eq!(config.dead_band(), 3.0);
    }
}
