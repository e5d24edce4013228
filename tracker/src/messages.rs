// Outbound lines for the companion app: `Po|{...}`, `Cf|{...}`, `Dt|{...}`.

use configuration::Configuration;
use serde::Serialize;

use crate::states::TrackerState;

pub trait Message: Serialize {
    const PREFIX: &'static str;

    fn to_line(&self) -> anyhow::Result<String> {
        Ok(format!("{}|{}", Self::PREFIX, serde_json::to_string(self)?))
    }
}

/// Periodic position broadcast.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionMessage {
    pub tracker_az: f32,
    pub tracker_el: f32,
    pub sun_az: f32,
    pub sun_el: f32,
    pub is_dark: bool,
    pub state: &'static str,
}

impl Message for PositionMessage {
    const PREFIX: &'static str = "Po";
}

/// Full configuration, keyed like the inbound `set*` payloads.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigurationMessage {
    #[serde(rename = "a")]
    pub latitude: f64,
    #[serde(rename = "o")]
    pub longitude: f64,
    #[serde(rename = "u")]
    pub utc_offset: i32,
    #[serde(rename = "d")]
    pub dual: bool,
    #[serde(rename = "lh")]
    pub azimuth_length: f32,
    #[serde(rename = "lv")]
    pub elevation_length: f32,
    #[serde(rename = "sh")]
    pub azimuth_speed: f32,
    #[serde(rename = "sv")]
    pub elevation_speed: f32,
    #[serde(rename = "e")]
    pub east: f32,
    #[serde(rename = "w")]
    pub west: f32,
    #[serde(rename = "n")]
    pub min: f32,
    #[serde(rename = "x")]
    pub max: f32,
    #[serde(rename = "bd")]
    pub dead_band: f32,
    #[serde(rename = "s")]
    pub state: &'static str,
}

impl ConfigurationMessage {
    pub fn new(config: &Configuration, state: TrackerState) -> Self {
        let az = config.azimuth();
        let el = config.elevation();
        ConfigurationMessage {
            latitude: config.latitude(),
            longitude: config.longitude(),
            utc_offset: config.utc_offset(),
            dual: config.is_dual(),
            azimuth_length: az.length,
            elevation_length: el.length,
            azimuth_speed: az.speed,
            elevation_speed: el.speed,
            east: az.east,
            west: az.west,
            min: el.min,
            max: el.max,
            dead_band: config.dead_band(),
            state: state.name(),
        }
    }
}

impl Message for ConfigurationMessage {
    const PREFIX: &'static str = "Cf";
}

#[derive(Debug, Clone, Serialize)]
pub struct DateTimeMessage {
    /// Local wall time as seconds since 1970.
    pub dt: i64,
}

impl Message for DateTimeMessage {
    const PREFIX: &'static str = "Dt";
}

#[cfg(test)]
mod tests {
    use super::*;
    use configuration::Settings;

    #[test]
    fn position_line_uses_app_keys() {
        let msg = PositionMessage {
            tracker_az: 180.0,
            tracker_el: 45.0,
            sun_az: 181.5,
            sun_el: 44.0,
            is_dark: false,
            state: TrackerState::Tracking.name(),
        };
        assert_eq!(
            msg.to_line().unwrap(),
            r#"Po|{"trackerAz":180.0,"trackerEl":45.0,"sunAz":181.5,"sunEl":44.0,"isDark":false,"state":"Tracking"}"#
        );
    }

    #[test]
    fn configuration_line_mirrors_setters() {
        let config = Configuration::in_memory(Settings::default());
        let line = ConfigurationMessage::new(&config, TrackerState::Standby)
            .to_line()
            .unwrap();
        let (prefix, json) = line.split_once('|').unwrap();
        assert_eq!(prefix, "Cf");
        let value: serde_json::Value = serde_json::from_str(json).unwrap();
        assert_eq!(value["e"], 90.0);
        assert_eq!(value["w"], 270.0);
        assert_eq!(value["u"], -5);
        assert_eq!(value["d"], false);
        assert_eq!(value["s"], "Standby");
    }

    #[test]
    fn date_time_line() {
        let line = DateTimeMessage { dt: 1_718_973_296 }.to_line().unwrap();
        assert_eq!(line, r#"Dt|{"dt":1718973296}"#);
    }
}
