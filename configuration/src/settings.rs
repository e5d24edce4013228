use serde::{Deserialize, Serialize};

/// Everything the tracker persists across restarts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub location: LocationSettings,
    pub azimuth: AzimuthSettings,
    pub elevation: ElevationSettings,
    pub tracking: TrackingSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationSettings {
    pub latitude: f64,
    /// East-positive.
    pub longitude: f64,
    /// Whole hours from UTC.
    pub utc_offset: i32,
}

/// Horizontal axis. `east` is the retracted (home) end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AzimuthSettings {
    pub east: f32,
    pub west: f32,
    pub length: f32,
    pub speed: f32,
}

/// Vertical axis. `min` is the retracted (home) end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElevationSettings {
    pub min: f32,
    pub max: f32,
    pub length: f32,
    pub speed: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingSettings {
    pub dual: bool,
    /// Degrees of sun/tracker disagreement tolerated before a move is issued.
    pub dead_band: f32,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            location: LocationSettings {
                latitude: 45.936527,
                longitude: -75.091259,
                utc_offset: -5,
            },
            azimuth: AzimuthSettings {
                east: 90.0,
                west: 270.0,
                length: 12.0,
                speed: 0.31,
            },
            elevation: ElevationSettings {
                min: 0.0,
                max: 90.0,
                length: 8.0,
                speed: 0.31,
            },
            tracking: TrackingSettings {
                dual: false,
                dead_band: 2.0,
            },
        }
    }
}
