// Tracker-level states. The observed state is derived from the stored one plus live
// actuator health, see `Tracker::state`.

use std::fmt;
use std::time::Duration;

use crate::{CYCLING_INTERVAL, TRACKING_INTERVAL};

/// - Off: constructed, `initialize` not called yet
/// - Initializing: an actuator is referencing or has faulted
/// - Standby: ready, not following anything
/// - Moving: under manual control
/// - Cycling: sweeping a synthetic day for testing the rig
/// - Tracking: following the sun
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum TrackerState {
    Off,
    Initializing,
    Standby,
    Moving,
    Cycling,
    Tracking,
}

impl TrackerState {
    pub fn name(&self) -> &'static str {
        match self {
            TrackerState::Off => "Off",
            TrackerState::Initializing => "Initializing",
            TrackerState::Standby => "Standby",
            TrackerState::Moving => "Moving",
            TrackerState::Cycling => "Cycling",
            TrackerState::Tracking => "Tracking",
        }
    }

    /// Whether the tracker's own tick drives the actuators in this state.
    pub fn is_following(&self) -> bool {
        matches!(self, TrackerState::Cycling | TrackerState::Tracking)
    }

    /// Tick cadence while in this state.
    pub fn interval(&self) -> Duration {
        match self {
            TrackerState::Cycling => CYCLING_INTERVAL,
            _ => TRACKING_INTERVAL,
        }
    }
}

impl fmt::Display for TrackerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum Axis {
    Azimuth,
    Elevation,
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Axis::Azimuth => f.write_str("azimuth"),
            Axis::Elevation => f.write_str("elevation"),
        }
    }
}
