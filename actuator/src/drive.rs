use embedded_hal::digital::OutputPin;

/// Drive direction of a linear actuator. `In` retracts toward the minimum angle.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Direction {
    In,
    Out,
}

impl Direction {
    /// Direction that moves from `from` toward `to`.
    pub fn toward(from: f32, to: f32) -> Direction {
        if to > from {
            Direction::Out
        } else {
            Direction::In
        }
    }

    pub fn sign(&self) -> f32 {
        match self {
            Direction::In => -1.0,
            Direction::Out => 1.0,
        }
    }
}

/// Anything that can run an actuator motor in either direction.
pub trait Motor {
    fn drive(&mut self, direction: Direction);
    fn stop(&mut self);
}

/// A [`Motor`] behind an H-bridge with an enable pin and two direction inputs.
#[derive(Debug)]
pub struct HBridge<Enable, InA, InB> {
    enable: Enable,
    in_a: InA,
    in_b: InB,
}

fn set_output<P: OutputPin>(pin: &mut P, high: bool) {
    let result = if high { pin.set_high() } else { pin.set_low() };
    if let Err(e) = result {
        log::warn!("H-bridge pin write failed: {:?}", e);
    }
}

impl<Enable, InA, InB> HBridge<Enable, InA, InB>
where
    Enable: OutputPin,
    InA: OutputPin,
    InB: OutputPin,
{
    /// Takes ownership of the pins and leaves the bridge disabled.
    pub fn new(enable: Enable, in_a: InA, in_b: InB) -> Self {
        let mut bridge = HBridge {
            enable,
            in_a,
            in_b,
        };
        bridge.stop();
        bridge
    }

    pub fn release(self) -> (Enable, InA, InB) {
        (self.enable, self.in_a, self.in_b)
    }
}

impl<Enable, InA, InB> Motor for HBridge<Enable, InA, InB>
where
    Enable: OutputPin,
    InA: OutputPin,
    InB: OutputPin,
{
    fn drive(&mut self, direction: Direction) {
        let out = direction == Direction::Out;
        set_output(&mut self.in_a, out);
        set_output(&mut self.in_b, !out);
        set_output(&mut self.enable, true);
    }

    fn stop(&mut self) {
        set_output(&mut self.enable, false);
        set_output(&mut self.in_a, false);
        set_output(&mut self.in_b, false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal_mock::eh1::digital::{Mock as PinMock, State, Transaction};

    #[test]
    fn drive_sequences_match_bridge_wiring() {
        let enable = PinMock::new(&[
            Transaction::set(State::Low),
            Transaction::set(State::High),
            Transaction::set(State::Low),
            Transaction::set(State::High),
        ]);
        let in_a = PinMock::new(&[
            Transaction::set(State::Low),
            Transaction::set(State::High),
            Transaction::set(State::Low),
            Transaction::set(State::Low),
        ]);
        let in_b = PinMock::new(&[
            Transaction::set(State::Low),
            Transaction::set(State::Low),
            Transaction::set(State::Low),
            Transaction::set(State::High),
        ]);

        let mut bridge = HBridge::new(enable, in_a, in_b);
        bridge.drive(Direction::Out);
        bridge.stop();
        bridge.drive(Direction::In);

        let (mut enable, mut in_a, mut in_b) = bridge.release();
        enable.done();
        in_a.done();
        in_b.done();
    }

    #[test]
    fn toward_picks_direction_by_sign() {
        assert_eq!(Direction::toward(90.0, 180.0), Direction::Out);
        assert_eq!(Direction::toward(180.0, 90.0), Direction::In);
        assert_eq!(Direction::In.sign(), -1.0);
    }
}
