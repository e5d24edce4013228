// Dual-axis tracker state machine and the companion-app command protocol.

pub mod command;
pub mod messages;
pub mod states;
mod tracker;

use std::time::Duration;

pub use command::{Command, CommandError, Jog, Request};
pub use messages::{ConfigurationMessage, DateTimeMessage, Message, PositionMessage};
pub use states::{Axis, TrackerState};
pub use tracker::Tracker;

/// Tick cadence while tracking, and in every state that does not follow the sun.
pub const TRACKING_INTERVAL: Duration = Duration::from_secs(60);
/// Tick cadence while sweeping a synthetic day, one hour per tick.
pub const CYCLING_INTERVAL: Duration = Duration::from_secs(10);
/// Short cadence armed by `set*` commands so new configuration applies promptly.
pub const PENDING_RESET: Duration = Duration::from_secs(2);

/// Safe orientation held while an actuator is faulted: facing south, half raised.
pub const DEFAULT_AZIMUTH: f32 = 180.0;
pub const DEFAULT_ELEVATION: f32 = 45.0;
