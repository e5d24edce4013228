// Bench simulation of the physical rig: H-bridge pins feeding a linear actuator
// plant, with a potentiometer reading its extension back.

use std::cell::Cell;
use std::convert::Infallible;
use std::rc::Rc;
use std::time::{Duration, Instant};

use actuator::{HBridge, PositionSensor, SensorRange};
use embedded_hal::digital::{ErrorType, OutputPin};

/// Output pin backed by a shared cell so the plant sees what the firmware drives.
#[derive(Clone, Default)]
pub struct SimPin(Rc<Cell<bool>>);

impl SimPin {
    pub fn is_high(&self) -> bool {
        self.0.get()
    }
}

impl ErrorType for SimPin {
    type Error = Infallible;
}

impl OutputPin for SimPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.0.set(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.0.set(true);
        Ok(())
    }
}

pub type SimBridge = HBridge<SimPin, SimPin, SimPin>;

/// Wiper of the simulated potentiometer.
pub struct SimPot {
    extension: Rc<Cell<f32>>,
    range: SensorRange,
}

impl PositionSensor for SimPot {
    type Error = Infallible;

    fn read_raw(&mut self) -> Result<u16, Self::Error> {
        let span = (self.range.extended - self.range.retracted) as f32;
        Ok(self.range.retracted + (self.extension.get() * span).round() as u16)
    }
}

/// One actuator's mechanics: extension (0 retracted, 1 extended) integrates while
/// the bridge is enabled, at a fixed full-stroke time.
pub struct Plant {
    name: &'static str,
    enable: SimPin,
    in_a: SimPin,
    in_b: SimPin,
    extension: Rc<Cell<f32>>,
    stroke_time: Duration,
    last: Option<Instant>,
}

impl Plant {
    pub fn new(name: &'static str, stroke_length: f32, speed: f32, extension: f32) -> Self {
        Plant {
            name,
            enable: SimPin::default(),
            in_a: SimPin::default(),
            in_b: SimPin::default(),
            extension: Rc::new(Cell::new(extension.clamp(0.0, 1.0))),
            stroke_time: Duration::from_secs_f32(stroke_length / speed.max(f32::EPSILON)),
            last: None,
        }
    }

    pub fn bridge(&self) -> SimBridge {
        HBridge::new(self.enable.clone(), self.in_a.clone(), self.in_b.clone())
    }

    pub fn pot(&self) -> SimPot {
        SimPot {
            extension: self.extension.clone(),
            range: SensorRange::default(),
        }
    }

    pub fn extension(&self) -> f32 {
        self.extension.get()
    }

    pub fn update(&mut self, now: Instant) {
        let dt = self
            .last
            .map(|last| now.saturating_duration_since(last))
            .unwrap_or_default();
        self.last = Some(now);

        if !self.enable.is_high() {
            return;
        }
        let sign = match (self.in_a.is_high(), self.in_b.is_high()) {
            (true, false) => 1.0,
            (false, true) => -1.0,
            _ => {
                log::warn!("{}: bridge enabled with both inputs equal", self.name);
                return;
            }
        };
        let step = sign * dt.as_secs_f32() / self.stroke_time.as_secs_f32();
        self.extension
            .set((self.extension.get() + step).clamp(0.0, 1.0));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actuator::{Direction, Motor};

    #[test]
    fn plant_follows_the_bridge() {
        let t0 = Instant::now();
        let mut plant = Plant::new("az", 10.0, 1.0, 0.5);
        let mut bridge = plant.bridge();
        let mut pot = plant.pot();
        plant.update(t0);

        bridge.drive(Direction::Out);
        plant.update(t0 + Duration::from_secs(2));
        assert!((plant.extension() - 0.7).abs() < 1e-4);

        bridge.stop();
        plant.update(t0 + Duration::from_secs(4));
        assert!((plant.extension() - 0.7).abs() < 1e-4);

        bridge.drive(Direction::In);
        plant.update(t0 + Duration::from_secs(20));
        assert_eq!(plant.extension(), 0.0);
        assert_eq!(pot.read_raw().unwrap(), SensorRange::default().retracted);
    }
}
