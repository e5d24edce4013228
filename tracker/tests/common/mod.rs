#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::convert::Infallible;
use std::rc::Rc;
use std::time::{Duration, Instant};

use actuator::{
    Actuator, ActuatorState, Calibration, Direction, Motor, PositionSensor, SharedActuator,
};
use chrono::{NaiveDate, NaiveDateTime};
use clock::ManualClock;
use configuration::{Configuration, Settings};
use link::MemoryLink;
use scheduler::{Schedule, Tickable};
use tracker::Tracker;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Initialize(Calibration),
    MoveTo(f32),
    MoveIn,
    MoveOut,
    Retract,
    Stop,
    Park(f32),
}

/// Actuator double: arrives instantly and records every call. Like the real
/// actuators it refuses `move_to` unless Ready or Moving, while `park_at` always lands.
pub struct FakeActuator {
    schedule: Schedule,
    pub state: ActuatorState,
    /// State taken on by `initialize`.
    pub after_init: ActuatorState,
    pub angle: f32,
    pub calls: Vec<Call>,
}

impl FakeActuator {
    pub fn shared() -> Rc<RefCell<FakeActuator>> {
        Rc::new(RefCell::new(FakeActuator {
            schedule: Schedule::new(Duration::from_millis(100)),
            state: ActuatorState::Initializing,
            after_init: ActuatorState::Ready,
            angle: 0.0,
            calls: Vec::new(),
        }))
    }

    pub fn count(&self, call: fn(&Call) -> bool) -> usize {
        self.calls.iter().filter(|c| call(c)).count()
    }

    pub fn last_move(&self) -> Option<f32> {
        self.calls.iter().rev().find_map(|c| match c {
            Call::MoveTo(angle) => Some(*angle),
            _ => None,
        })
    }

    pub fn last_park(&self) -> Option<f32> {
        self.calls.iter().rev().find_map(|c| match c {
            Call::Park(angle) => Some(*angle),
            _ => None,
        })
    }
}

impl Tickable for FakeActuator {
    fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    fn schedule_mut(&mut self) -> &mut Schedule {
        &mut self.schedule
    }

    fn tick(&mut self, _now: Instant) {}
}

impl Actuator for FakeActuator {
    fn initialize(&mut self, calibration: Calibration) {
        self.calls.push(Call::Initialize(calibration));
        self.state = self.after_init;
        self.angle = calibration.min_angle;
    }

    fn move_to(&mut self, angle: f32) {
        self.calls.push(Call::MoveTo(angle));
        if self.state.is_operational() {
            self.angle = angle;
        }
    }

    fn move_in(&mut self) {
        self.calls.push(Call::MoveIn);
    }

    fn move_out(&mut self) {
        self.calls.push(Call::MoveOut);
    }

    fn retract(&mut self) {
        self.calls.push(Call::Retract);
    }

    fn stop(&mut self) {
        self.calls.push(Call::Stop);
    }

    fn park_at(&mut self, angle: f32) {
        self.calls.push(Call::Park(angle));
        self.angle = angle;
    }

    fn current_angle(&self) -> f32 {
        self.angle
    }

    fn state(&self) -> ActuatorState {
        self.state
    }
}

/// Motor that goes nowhere, for running the real actuator models.
#[derive(Default)]
pub struct NullMotor;

impl Motor for NullMotor {
    fn drive(&mut self, _direction: Direction) {}

    fn stop(&mut self) {}
}

/// Potentiometer whose raw reading the test sets; 0 reads as a broken wiper.
#[derive(Clone, Default)]
pub struct SharedPot(Rc<Cell<u16>>);

impl SharedPot {
    pub fn set(&self, raw: u16) {
        self.0.set(raw);
    }
}

impl PositionSensor for SharedPot {
    type Error = Infallible;

    fn read_raw(&mut self) -> Result<u16, Infallible> {
        Ok(self.0.get())
    }
}

pub fn at(hour: u32, minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 6, 21)
        .unwrap()
        .and_hms_opt(hour, minute, 0)
        .unwrap()
}

pub fn noon() -> NaiveDateTime {
    at(12, 0)
}

pub fn midnight() -> NaiveDateTime {
    at(0, 0)
}

pub fn settings(dual: bool) -> Settings {
    let mut settings = Settings::default();
    settings.location.latitude = 45.0;
    settings.location.longitude = -75.0;
    settings.location.utc_offset = -5;
    settings.tracking.dual = dual;
    settings
}

pub struct Rig {
    pub tracker: Tracker,
    pub azimuth: Rc<RefCell<FakeActuator>>,
    pub elevation: Rc<RefCell<FakeActuator>>,
    pub clock: ManualClock,
    pub link: MemoryLink,
    pub t0: Instant,
}

impl Rig {
    /// Tracker constructed but not initialized.
    pub fn off(settings: Settings, now: NaiveDateTime) -> Self {
        let azimuth = FakeActuator::shared();
        let elevation = FakeActuator::shared();
        let clock = ManualClock::new(now);
        let link = MemoryLink::new();
        let az: SharedActuator = azimuth.clone();
        let el: SharedActuator = elevation.clone();
        let tracker = Tracker::new(
            Configuration::in_memory(settings),
            Box::new(clock.clone()),
            Box::new(link.clone()),
            az,
            el,
        );
        Rig {
            tracker,
            azimuth,
            elevation,
            clock,
            link,
            t0: Instant::now(),
        }
    }

    /// Initialized tracker in Standby, link output cleared.
    pub fn new(settings: Settings, now: NaiveDateTime) -> Self {
        let mut rig = Rig::off(settings, now);
        rig.tracker.initialize();
        rig.link.take();
        rig
    }

    pub fn command(&mut self, line: &str) {
        self.tracker.process_command(line, self.t0);
    }

    pub fn tick(&mut self) {
        self.tracker.tick(self.t0);
    }

    /// Last `prefix|{...}` line sent, parsed.
    pub fn last_message(&self, prefix: &str) -> Option<serde_json::Value> {
        self.link.lines().iter().rev().find_map(|line| {
            let (p, json) = line.split_once('|')?;
            if p != prefix {
                return None;
            }
            serde_json::from_str(json).ok()
        })
    }

    pub fn count_messages(&self, prefix: &str) -> usize {
        self.link
            .lines()
            .iter()
            .filter(|line| line.starts_with(&format!("{}|", prefix)))
            .count()
    }
}
