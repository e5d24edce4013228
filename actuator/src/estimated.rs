use std::time::{Duration, Instant};

use scheduler::{Schedule, Tickable};

use crate::drive::{Direction, Motor};
use crate::states::ActuatorState;
use crate::{Actuator, Calibration, Goal, ACTUATOR_TICK, POSITION_TOLERANCE};

// Homing overdrives the stroke so the end stop is reached even with a slow motor.
const HOMING_FACTOR: f32 = 1.1;

#[derive(Debug, Clone, Copy)]
struct Run {
    direction: Direction,
    elapsed: Duration,
}

/// Actuator without position feedback. The angle is integrated from drive time at
/// the configured speed, and re-referenced against the retracted end stop.
pub struct EstimatedActuator<M> {
    name: &'static str,
    motor: M,
    schedule: Schedule,
    calibration: Option<Calibration>,
    state: ActuatorState,
    angle: f32,
    goal: Option<Goal>,
    run: Option<Run>,
    last_sample: Option<Instant>,
    pending_park: Option<f32>,
}

impl<M: Motor> EstimatedActuator<M> {
    pub fn new(name: &'static str, motor: M) -> Self {
        EstimatedActuator {
            name,
            motor,
            schedule: Schedule::new(ACTUATOR_TICK),
            calibration: None,
            state: ActuatorState::Initializing,
            angle: 0.0,
            goal: None,
            run: None,
            last_sample: None,
            pending_park: None,
        }
    }

    pub fn motor(&self) -> &M {
        &self.motor
    }

    fn homing_time(cal: &Calibration) -> Duration {
        cal.full_stroke_time().mul_f32(HOMING_FACTOR)
    }

    fn is_homing(&self) -> bool {
        matches!(self.goal, Some(Goal::Home))
    }

    fn start(&mut self, goal: Goal, direction: Direction) {
        let same_direction = self.run.map(|r| r.direction) == Some(direction);
        if !same_direction {
            self.motor.drive(direction);
            self.run = Some(Run {
                direction,
                elapsed: Duration::ZERO,
            });
            // Travel is counted from the first tick that sees the run.
            self.last_sample = None;
            log::debug!("{}: driving {:?}", self.name, direction);
        }
        self.goal = Some(goal);
        if self.state.is_operational() {
            self.state = ActuatorState::Moving;
        }
    }

    fn halt(&mut self) {
        if self.run.take().is_some() {
            self.motor.stop();
        }
        self.goal = None;
    }

    fn accepts_moves(&self) -> bool {
        if self.state.is_operational() {
            return true;
        }
        log::debug!("{}: ignoring move while {}", self.name, self.state.name());
        false
    }

    fn jog(&mut self, direction: Direction) {
        if !self.accepts_moves() {
            return;
        }
        if let Some(cal) = self.calibration {
            if cal.at_extreme(self.angle, direction) {
                self.stop();
                return;
            }
        }
        self.start(Goal::Extreme(direction), direction);
    }

    fn fault(&mut self, reason: &str) {
        log::error!("{}: {}, actuator disabled until re-initialized", self.name, reason);
        self.halt();
        self.state = ActuatorState::Error;
    }

    fn finish(&mut self) {
        self.halt();
        match self.state {
            ActuatorState::Error => {
                log::warn!("{}: parked at {:.1}°, still faulted", self.name, self.angle);
            }
            ActuatorState::Initializing => {
                log::info!("{}: referenced at {:.1}°", self.name, self.angle);
                self.state = ActuatorState::Ready;
                if let Some(target) = self.pending_park.take() {
                    self.move_to(target);
                }
            }
            _ => self.state = ActuatorState::Ready,
        }
    }
}

impl<M: Motor> Tickable for EstimatedActuator<M> {
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
        let dt = self
            .last_sample
            .map(|last| now.saturating_duration_since(last))
            .unwrap_or_default();
        self.last_sample = Some(now);

        let (Some(cal), Some(mut run), Some(goal)) = (self.calibration, self.run, self.goal) else {
            return;
        };

        run.elapsed += dt;
        self.run = Some(run);
        if run.elapsed > cal.stall_time() {
            self.fault("drive exceeded the stall limit");
            return;
        }

        let travelled = run.direction.sign() * cal.degrees_per_second() * dt.as_secs_f32();
        self.angle = cal.clamp(self.angle + travelled);

        match goal {
            Goal::Angle(target) => {
                let arrived = match run.direction {
                    Direction::Out => self.angle >= target,
                    Direction::In => self.angle <= target,
                };
                if arrived {
                    self.angle = target;
                    self.finish();
                }
            }
            Goal::Extreme(direction) => {
                if cal.at_extreme(self.angle, direction) {
                    self.angle = match direction {
                        Direction::In => cal.min_angle,
                        Direction::Out => cal.max_angle,
                    };
                    self.finish();
                }
            }
            Goal::Home => {
                if run.elapsed >= Self::homing_time(&cal) {
                    self.angle = cal.min_angle;
                    self.finish();
                }
            }
        }
    }
}

impl<M: Motor> Actuator for EstimatedActuator<M> {
    fn initialize(&mut self, calibration: Calibration) {
        let unchanged = self.calibration == Some(calibration);
        let healthy = self.state.is_operational()
            || (self.state == ActuatorState::Initializing && self.is_homing());
        if unchanged && healthy {
            log::debug!("{}: calibration unchanged, keeping {:.1}°", self.name, self.angle);
            return;
        }

        self.halt();
        self.pending_park = None;
        if !calibration.is_valid() {
            self.calibration = None;
            self.fault("invalid calibration");
            return;
        }

        log::info!(
            "{}: initializing {:.1}°..{:.1}°, stroke {} at {}/s, homing",
            self.name,
            calibration.min_angle,
            calibration.max_angle,
            calibration.stroke_length,
            calibration.speed
        );
        self.calibration = Some(calibration);
        self.angle = calibration.clamp(self.angle);
        self.state = ActuatorState::Initializing;
        self.start(Goal::Home, Direction::In);
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
            if self.run.is_some() {
                self.finish();
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
        if !self.accepts_moves() {
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
                if self.goal == Some(Goal::Angle(target)) {
                    return;
                }
                log::warn!(
                    "{}: parking {:.1}° -> {:.1}° on estimated position",
                    self.name,
                    self.angle,
                    target
                );
                self.start(Goal::Angle(target), Direction::toward(self.angle, target));
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
