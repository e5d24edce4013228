// Health states shared by every actuator variant.

/// - Initializing: no reference position yet (homing, or waiting for a sensor sample)
/// - Ready: idle at a known angle
/// - Moving: motor is driving
/// - Error: fault detected, only `initialize` leaves this state
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum ActuatorState {
    Initializing,
    Ready,
    Moving,
    Error,
}

impl ActuatorState {
    pub fn is_fault(&self) -> bool {
        matches!(self, ActuatorState::Error)
    }

    /// Whether the actuator knows where it is and accepts move commands.
    pub fn is_operational(&self) -> bool {
        matches!(self, ActuatorState::Ready | ActuatorState::Moving)
    }

    pub fn name(&self) -> &'static str {
        match self {
            ActuatorState::Initializing => "Initializing",
            ActuatorState::Ready => "Ready",
            ActuatorState::Moving => "Moving",
            ActuatorState::Error => "Error",
        }
    }
}
