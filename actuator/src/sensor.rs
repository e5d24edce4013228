use core::fmt::Debug;

/// Analog position feedback, typically the actuator's potentiometer wiper on an ADC.
pub trait PositionSensor {
    type Error: Debug;

    /// Raw 12-bit reading (0..=4095).
    fn read_raw(&mut self) -> Result<u16, Self::Error>;
}

/// Calibrated span of the potentiometer. Readings far outside it mean an open or
/// shorted wiper rather than a real position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorRange {
    pub retracted: u16,
    pub extended: u16,
    pub slack: u16,
}

impl Default for SensorRange {
    fn default() -> Self {
        SensorRange {
            retracted: 64,
            extended: 4031,
            slack: 32,
        }
    }
}

impl SensorRange {
    pub fn is_plausible(&self, raw: u16) -> bool {
        raw >= self.retracted.saturating_sub(self.slack)
            && raw <= self.extended.saturating_add(self.slack)
    }

    /// Extension as a fraction of the full stroke, 0.0 = retracted.
    pub fn fraction(&self, raw: u16) -> f32 {
        let span = self.extended.saturating_sub(self.retracted).max(1) as f32;
        ((raw as f32 - self.retracted as f32) / span).clamp(0.0, 1.0)
    }
}

/// Median of the last three samples, kills single-read spikes.
#[derive(Debug, Clone, Default)]
pub(crate) struct MedianFilter {
    history: [u16; 3],
    idx: usize,
    primed: bool,
}

impl MedianFilter {
    pub(crate) fn reset(&mut self) {
        self.primed = false;
        self.idx = 0;
    }

    pub(crate) fn push(&mut self, raw: u16) -> u16 {
        if !self.primed {
            self.history = [raw; 3];
            self.primed = true;
        } else {
            self.history[self.idx] = raw;
            self.idx = (self.idx + 1) % self.history.len();
        }
        let mut sorted = self.history;
        sorted.sort_unstable();
        sorted[1]
    }
}
