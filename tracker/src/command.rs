// Remote command protocol: `NAME|payload` lines from the companion app.

use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};

pub const MAX_NAME: usize = 31;
pub const MAX_PAYLOAD: usize = 63;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum CommandError {
    #[error("unknown command `{0}`")]
    Unknown(String),
    #[error("malformed payload for `{command}`: {reason}")]
    MalformedPayload { command: String, reason: String },
    #[error("unknown direction `{0}`")]
    UnknownDirection(String),
    #[error("bad timestamp `{0}`")]
    BadTimestamp(String),
}

/// One inbound line split into bounded name and payload buffers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Command {
    pub name: heapless::String<MAX_NAME>,
    pub payload: heapless::String<MAX_PAYLOAD>,
}

fn fill<const N: usize>(dst: &mut heapless::String<N>, src: &str, what: &str) {
    for c in src.chars().filter(|c| *c != '\r' && *c != '\n') {
        if dst.push(c).is_err() {
            log::warn!("{} overflow, truncated to {} bytes", what, N);
            return;
        }
    }
}

impl Command {
    /// Splits on the first `|`. CR/LF are dropped, anything past a buffer's capacity
    /// is cut off.
    pub fn parse(line: &str) -> Self {
        let (name, payload) = line.split_once('|').unwrap_or((line, ""));
        let mut command = Command::default();
        fill(&mut command.name, name, "Command");
        fill(&mut command.payload, payload, "Payload");
        command
    }

    fn malformed(&self, reason: impl ToString) -> CommandError {
        CommandError::MalformedPayload {
            command: self.name.as_str().to_string(),
            reason: reason.to_string(),
        }
    }

    fn json<T: DeserializeOwned>(&self) -> Result<T, CommandError> {
        serde_json::from_str(&self.payload).map_err(|e| self.malformed(e))
    }
}

/// Manual jog directions. Elevation is linked in reverse: Up extends the actuator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Jog {
    East,
    West,
    Up,
    Down,
}

impl FromStr for Jog {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "East" => Ok(Jog::East),
            "West" => Ok(Jog::West),
            "Up" => Ok(Jog::Up),
            "Down" => Ok(Jog::Down),
            other => Err(CommandError::UnknownDirection(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Track,
    Cycle,
    Stop,
    GetConfiguration,
    GetDateTime,
    StartBroadcast,
    StopBroadcast,
    SetLocation {
        latitude: f64,
        longitude: f64,
    },
    SetActuatorParameters {
        azimuth_length: f32,
        elevation_length: f32,
        azimuth_speed: f32,
        elevation_speed: f32,
    },
    SetLimits {
        east: f32,
        west: f32,
        min: f32,
        max: f32,
    },
    SetOptions {
        utc_offset: i32,
        dual: bool,
    },
    SetDateTime(NaiveDateTime),
    MoveTo(Jog),
}

#[derive(Deserialize)]
struct LocationPayload {
    #[serde(rename = "a")]
    latitude: f64,
    #[serde(rename = "o")]
    longitude: f64,
}

#[derive(Deserialize)]
struct ActuatorPayload {
    lh: f32,
    lv: f32,
    sh: f32,
    sv: f32,
}

#[derive(Deserialize)]
struct LimitsPayload {
    e: f32,
    w: f32,
    n: f32,
    x: f32,
}

#[derive(Deserialize)]
struct OptionsPayload {
    #[serde(rename = "u")]
    utc_offset: i32,
    #[serde(rename = "d", deserialize_with = "flag")]
    dual: bool,
}

// The app sends the dual flag as either a JSON bool or 0/1.
fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
    }
    Ok(match Flag::deserialize(deserializer)? {
        Flag::Bool(b) => b,
        Flag::Int(i) => i != 0,
    })
}

impl TryFrom<&Command> for Request {
    type Error = CommandError;

    fn try_from(command: &Command) -> Result<Self, Self::Error> {
        let request = match command.name.as_str() {
            "track" => Request::Track,
            "cycle" => Request::Cycle,
            "stop" => Request::Stop,
            "getC" => Request::GetConfiguration,
            "getDT" => Request::GetDateTime,
            "bPos" => Request::StartBroadcast,
            "sBPos" => Request::StopBroadcast,
            "setC" => {
                let p: LocationPayload = command.json()?;
                if !(-90.0..=90.0).contains(&p.latitude) || !(-180.0..=180.0).contains(&p.longitude)
                {
                    return Err(command.malformed("location out of range"));
                }
                Request::SetLocation {
                    latitude: p.latitude,
                    longitude: p.longitude,
                }
            }
            "setA" => {
                let p: ActuatorPayload = command.json()?;
                if [p.lh, p.lv, p.sh, p.sv].iter().any(|v| *v <= 0.0) {
                    return Err(command.malformed("lengths and speeds must be positive"));
                }
                Request::SetActuatorParameters {
                    azimuth_length: p.lh,
                    elevation_length: p.lv,
                    azimuth_speed: p.sh,
                    elevation_speed: p.sv,
                }
            }
            "setL" => {
                let p: LimitsPayload = command.json()?;
                if p.e >= p.w || p.n >= p.x {
                    return Err(command.malformed("limits must be increasing"));
                }
                Request::SetLimits {
                    east: p.e,
                    west: p.w,
                    min: p.n,
                    max: p.x,
                }
            }
            "setO" => {
                let p: OptionsPayload = command.json()?;
                if !(-12..=14).contains(&p.utc_offset) {
                    return Err(command.malformed("UTC offset out of range"));
                }
                Request::SetOptions {
                    utc_offset: p.utc_offset,
                    dual: p.dual,
                }
            }
            "setDT" => {
                let raw = command.payload.trim();
                let at = raw
                    .parse::<i64>()
                    .ok()
                    .and_then(clock::from_timestamp)
                    .ok_or_else(|| CommandError::BadTimestamp(raw.to_string()))?;
                Request::SetDateTime(at)
            }
            "moveTo" => Request::MoveTo(command.payload.parse()?),
            other => return Err(CommandError::Unknown(other.to_string())),
        };
        Ok(request)
    }
}
