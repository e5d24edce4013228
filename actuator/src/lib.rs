// Linear actuator abstraction. Two variants honour one contract: a potentiometer
// feedback actuator and a time-estimated actuator for rigs without a sensor.

pub mod drive;
pub mod estimated;
pub mod feedback;
pub mod sensor;
pub mod states;

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use scheduler::Tickable;

pub use drive::{Direction, HBridge, Motor};
pub use estimated::EstimatedActuator;
pub use feedback::FeedbackActuator;
pub use sensor::{PositionSensor, SensorRange};
pub use states::ActuatorState;

/// How often the scheduler ticks an actuator.
pub const ACTUATOR_TICK: Duration = Duration::from_millis(100);

/// Angular tolerance for "arrived" and for ignoring tiny move requests.
pub const POSITION_TOLERANCE: f32 = 0.5;

// Any single drive running longer than this many full strokes is treated as a stall.
const STALL_FACTOR: f32 = 1.5;

/// Physical description of one axis: angle domain, stroke length and travel speed
/// (length units per second, same unit as the stroke).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    pub min_angle: f32,
    pub max_angle: f32,
    pub stroke_length: f32,
    pub speed: f32,
}

impl Calibration {
    pub fn new(min_angle: f32, max_angle: f32, stroke_length: f32, speed: f32) -> Self {
        Calibration {
            min_angle,
            max_angle,
            stroke_length,
            speed,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.min_angle < self.max_angle && self.stroke_length > 0.0 && self.speed > 0.0
    }

    pub fn clamp(&self, angle: f32) -> f32 {
        angle.clamp(self.min_angle, self.max_angle)
    }

    pub fn span(&self) -> f32 {
        self.max_angle - self.min_angle
    }

    /// Angle at a fraction of full extension.
    pub fn angle_at(&self, fraction: f32) -> f32 {
        self.min_angle + fraction.clamp(0.0, 1.0) * self.span()
    }

    /// Time to run the whole stroke at the configured speed.
    pub fn full_stroke_time(&self) -> Duration {
        Duration::from_secs_f32(self.stroke_length / self.speed)
    }

    /// Drives running longer than this are stalled.
    pub fn stall_time(&self) -> Duration {
        self.full_stroke_time().mul_f32(STALL_FACTOR)
    }

    pub fn degrees_per_second(&self) -> f32 {
        self.span() * self.speed / self.stroke_length
    }

    /// Whether `angle` sits on the extreme reached by driving in `direction`.
    pub fn at_extreme(&self, angle: f32, direction: Direction) -> bool {
        match direction {
            Direction::In => angle <= self.min_angle + POSITION_TOLERANCE,
            Direction::Out => angle >= self.max_angle - POSITION_TOLERANCE,
        }
    }
}

/// What the motor is currently working toward.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Goal {
    /// A clamped target angle.
    Angle(f32),
    /// Jog until stopped or the end of travel.
    Extreme(Direction),
    /// Drive fully in for long enough to hit the end stop and re-reference.
    Home,
}

/// Contract shared by both actuator variants. The tracker is written once against it.
pub trait Actuator: Tickable {
    /// Configure domain and motion model. Calling again with the same calibration on a
    /// healthy actuator changes nothing; after a fault or with new values it re-references.
    fn initialize(&mut self, calibration: Calibration);

    /// Drive toward `angle` (clamped to the domain). No-op inside the positioning tolerance.
    fn move_to(&mut self, angle: f32);

    /// Jog toward the minimum angle, replacing any active goal.
    fn move_in(&mut self);

    /// Jog toward the maximum angle, replacing any active goal.
    fn move_out(&mut self);

    /// Park at the home extreme (full east / lowest elevation).
    fn retract(&mut self);

    fn stop(&mut self);

    /// Drive to a fixed safe angle. Unlike `move_to` this also runs on a faulted
    /// actuator, open loop if need be, and leaves the health state as it is. While
    /// referencing, the park is taken up once the reference is known.
    fn park_at(&mut self, angle: f32);

    fn current_angle(&self) -> f32;

    fn state(&self) -> ActuatorState;
}

pub type SharedActuator = Rc<RefCell<dyn Actuator>>;

#[cfg(test)]
pub(crate) mod testing {
    use super::{Direction, Motor};

    /// Records motor commands; `None` is a stop.
    #[derive(Debug, Default)]
    pub struct FakeMotor {
        pub driving: Option<Direction>,
        pub commands: Vec<Option<Direction>>,
    }

    impl Motor for FakeMotor {
        fn drive(&mut self, direction: Direction) {
            self.driving = Some(direction);
            self.commands.push(Some(direction));
        }

        fn stop(&mut self) {
            self.driving = None;
            self.commands.push(None);
        }
    }
}
