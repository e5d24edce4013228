use std::time::{Duration, Instant};

use scheduler::{Schedule, Tickable};

use crate::drive::{Direction, Motor};
use crate::sensor::{MedianFilter, PositionSensor, SensorRange};
use crate::states::ActuatorState;
use crate::{Actuator, Calibration, Goal, ACTUATOR_TICK, POSITION_TOLERANCE};

/// Window in which a driven actuator must show progress, and in which implausible
/// readings are tolerated before faulting.
const SENSOR_TIMEOUT: Duration = Duration::from_secs(5);
/// Filtered counts that count as movement in the commanded direction.
const MIN_PROGRESS: i32 = 8;

#[derive(Debug, Clone, Copy)]
struct Progress {
    reference: u16,
    since: Instant,
}

/// Park drive of a faulted actuator, bounded by the stall time.
#[derive(Debug, Clone, Copy)]
struct Parking {
    target: f32,
    last: Option<Instant>,
    elapsed: Duration,
}

/// Actuator with a potentiometer reporting its extension.
pub struct FeedbackActuator<M, S> {
    name: &'static str,
    motor: M,
    sensor: S,
    range: SensorRange,
    schedule: Schedule,
    calibration: Option<Calibration>,
    state: ActuatorState,
    angle: f32,
    goal: Option<Goal>,
    direction: Option<Direction>,
    filter: MedianFilter,
    raw: Option<u16>,
    progress: Option<Progress>,
    implausible_since: Option<Instant>,
    parking: Option<Parking>,
    pending_park: Option<f32>,
}

impl<M: Motor, S: PositionSensor> FeedbackActuator<M, S> {
    pub fn new(name: &'static str, motor: M, sensor: S) -> Self {
        Self::with_range(name, motor, sensor, SensorRange::default())
    }

    pub fn with_range(name: &'static str, motor: M, sensor: S, range: SensorRange) -> Self {
        FeedbackActuator {
            name,
            motor,
            sensor,
            range,
            schedule: Schedule::new(ACTUATOR_TICK),
            calibration: None,
            state: ActuatorState::Initializing,
            angle: 0.0,
            goal: None,
            direction: None,
            filter: MedianFilter::default(),
            raw: None,
            progress: None,
            implausible_since: None,
            parking: None,
            pending_park: None,
        }
    }

    pub fn motor(&self) -> &M {
        &self.motor
    }

    fn start(&mut self, goal: Goal, direction: Direction) {
        if self.direction != Some(direction) {
            self.motor.drive(direction);
            self.direction = Some(direction);
            self.progress = None;
            log::debug!("{}: driving {:?}", self.name, direction);
        }
        self.goal = Some(goal);
        self.state = ActuatorState::Moving;
    }

    fn halt(&mut self) {
        if self.direction.take().is_some() {
            self.motor.stop();
        }
        self.goal = None;
        self.progress = None;
        self.parking = None;
    }

    fn fault(&mut self, reason: &str) {
        log::error!("{}: {}, actuator disabled until re-initialized", self.name, reason);
        self.halt();
        self.state = ActuatorState::Error;
    }

    fn accepts_moves(&self) -> bool {
        if self.state.is_operational() {
            return true;
        }
        log::debug!("{}: ignoring move while {}", self.name, self.state.name());
        false
    }

    fn jog(&mut self, direction: Direction) {
        let Some(cal) = self.calibration else {
            return;
        };
        if !self.accepts_moves() {
            return;
        }
        if cal.at_extreme(self.angle, direction) {
            self.stop();
            return;
        }
        self.start(Goal::Extreme(direction), direction);
    }

    /// Reads the sensor. Returns the filtered reading, or `None` while it is implausible.
    fn sample(&mut self, now: Instant) -> Option<u16> {
        let reading = match self.sensor.read_raw() {
            Ok(raw) if self.range.is_plausible(raw) => Some(raw),
            Ok(raw) => {
                log::debug!("{}: implausible reading {}", self.name, raw);
                None
            }
            Err(e) => {
                log::debug!("{}: sensor read failed: {:?}", self.name, e);
                None
            }
        };

        match reading {
            Some(raw) => {
                self.implausible_since = None;
                let filtered = self.filter.push(raw);
                self.raw = Some(filtered);
                Some(filtered)
            }
            None => {
                let since = *self.implausible_since.get_or_insert(now);
                if now.saturating_duration_since(since) >= SENSOR_TIMEOUT {
                    self.fault("position sensor readings out of range");
                }
                None
            }
        }
    }

    fn check_progress(&mut self, raw: u16, direction: Direction, now: Instant) {
        let progress = *self.progress.get_or_insert(Progress {
            reference: raw,
            since: now,
        });
        let moved = (raw as i32 - progress.reference as i32) * direction.sign() as i32;
        if moved >= MIN_PROGRESS {
            self.progress = Some(Progress {
                reference: raw,
                since: now,
            });
        } else if now.saturating_duration_since(progress.since) >= SENSOR_TIMEOUT {
            self.fault("no movement reported while driving");
        }
    }

    /// Faulted park drive: follows the sensor while it reads plausibly, otherwise
    /// integrates travel from drive time.
    fn drive_parked(&mut self, cal: Calibration, now: Instant) {
        let (Some(mut park), Some(direction)) = (self.parking, self.direction) else {
            return;
        };
        let dt = park
            .last
            .map(|last| now.saturating_duration_since(last))
            .unwrap_or_default();
        park.last = Some(now);
        park.elapsed += dt;

        let sensed = match self.sensor.read_raw() {
            Ok(raw) if self.range.is_plausible(raw) => Some(raw),
            _ => None,
        };
        match sensed {
            Some(raw) => self.angle = cal.angle_at(self.range.fraction(raw)),
            None => {
                let travelled = direction.sign() * cal.degrees_per_second() * dt.as_secs_f32();
                self.angle = cal.clamp(self.angle + travelled);
            }
        }

        let arrived = match direction {
            Direction::Out => self.angle >= park.target - POSITION_TOLERANCE,
            Direction::In => self.angle <= park.target + POSITION_TOLERANCE,
        };
        if arrived {
            if sensed.is_none() {
                self.angle = park.target;
            }
            log::warn!("{}: parked at {:.1}°, still faulted", self.name, self.angle);
            self.halt();
        } else if park.elapsed > cal.stall_time() {
            log::error!("{}: park drive gave up at {:.1}°", self.name, self.angle);
            self.halt();
        } else {
            self.parking = Some(park);
        }
    }
}

impl<M: Motor, S: PositionSensor> Tickable for FeedbackActuator<M, S> {
    fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    fn schedule_mut(&mut self) -> &mut Schedule {
        &mut self.schedule
    }

    fn name(&self) -> &str {
        self.name
    }

    fn tick(&mut self, now: Instant) {
        let Some(cal) = self.calibration else {
            return;
        };
        if self.state.is_fault() {
            self.drive_parked(cal, now);
            return;
        }
        let Some(raw) = self.sample(now) else {
            return;
        };
        self.angle = cal.angle_at(self.range.fraction(raw));

        if self.state == ActuatorState::Initializing {
            log::info!("{}: position sensor reads {:.1}°, ready", self.name, self.angle);
            self.state = ActuatorState::Ready;
            if let Some(target) = self.pending_park.take() {
                self.move_to(target);
            }
            return;
        }

        let (Some(goal), Some(direction)) = (self.goal, self.direction) else {
            return;
        };
        let arrived = match goal {
            Goal::Angle(target) => match direction {
                Direction::Out => self.angle >= target - POSITION_TOLERANCE,
                Direction::In => self.angle <= target + POSITION_TOLERANCE,
            },
            Goal::Extreme(end) => cal.at_extreme(self.angle, end),
            Goal::Home => cal.at_extreme(self.angle, Direction::In),
        };
        if arrived {
            log::debug!("{}: arrived at {:.1}°", self.name, self.angle);
            self.halt();
            self.state = ActuatorState::Ready;
            return;
        }
        self.check_progress(raw, direction, now);
    }
}

impl<M: Motor, S: PositionSensor> Actuator for FeedbackActuator<M, S> {
    fn initialize(&mut self, calibration: Calibration) {
        let unchanged = self.calibration == Some(calibration);
        if unchanged && !self.state.is_fault() {
            log::debug!("{}: calibration unchanged", self.name);
            return;
        }

        self.halt();
        if !calibration.is_valid() {
            self.calibration = None;
            self.fault("invalid calibration");
            return;
        }

        log::info!(
            "{}: initializing {:.1}°..{:.1}°, waiting for position sensor",
            self.name,
            calibration.min_angle,
            calibration.max_angle
        );
        self.calibration = Some(calibration);
        self.angle = calibration.clamp(self.angle);
        self.state = ActuatorState::Initializing;
        self.pending_park = None;
        self.filter.reset();
        self.raw = None;
        self.implausible_since = None;
    }

    fn move_to(&mut self, angle: f32) {
        let Some(cal) = self.calibration else {
            return;
        };
        if !self.accepts_moves() {
            return;
        }
        let target = cal.clamp(angle);
        if (target - self.angle).abs() <= POSITION_TOLERANCE {
            if self.direction.is_some() {
                self.halt();
                self.state = ActuatorState::Ready;
            }
            return;
        }
        log::info!("{}: move {:.1}° -> {:.1}°", self.name, self.angle, target);
        self.start(Goal::Angle(target), Direction::toward(self.angle, target));
    }

    fn move_in(&mut self) {
        self.jog(Direction::In);
    }

    fn move_out(&mut self) {
        self.jog(Direction::Out);
    }

    fn retract(&mut self) {
        let Some(cal) = self.calibration else {
            return;
        };
        if !self.accepts_moves() {
            return;
        }
        if cal.at_extreme(self.angle, Direction::In) {
            self.stop();
            return;
        }
        log::info!("{}: retracting to home", self.name);
        self.start(Goal::Home, Direction::In);
    }

    fn stop(&mut self) {
        self.halt();
        self.pending_park = None;
        if self.state == ActuatorState::Moving {
            self.state = ActuatorState::Ready;
        }
    }

    fn park_at(&mut self, angle: f32) {
        let Some(cal) = self.calibration else {
            return;
        };
        let target = cal.clamp(angle);
        match self.state {
            ActuatorState::Ready | ActuatorState::Moving => self.move_to(target),
            ActuatorState::Initializing => self.pending_park = Some(target),
            ActuatorState::Error => {
                if (target - self.angle).abs() <= POSITION_TOLERANCE {
                    return;
                }
                if self.parking.map(|p| p.target) == Some(target) {
                    return;
                }
                log::warn!(
                    "{}: parking {:.1}° -> {:.1}° without position control",
                    self.name,
                    self.angle,
                    target
                );
                let direction = Direction::toward(self.angle, target);
                if self.direction != Some(direction) {
                    self.halt();
                    self.motor.drive(direction);
                    self.direction = Some(direction);
                }
                self.parking = Some(Parking {
                    target,
                    last: None,
                    elapsed: Duration::ZERO,
                });
            }
        }
    }

    fn current_angle(&self) -> f32 {
        self.angle
    }

    fn state(&self) -> ActuatorState {
        self.state
    }
}
