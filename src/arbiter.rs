// Decides the effective command for a tick
//
// Priority, highest first:
// 1. obstacle blocked -> Stop
// 2. IR remote
// 3. bus command
// 4. keep the held direction
// Unknown from either source counts as nothing received.

use crate::messages::{Command, ObstacleState};

/// Which rule produced the decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reason {
    Obstacle,
    Remote,
    Bus,
    Held,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub command: Command,
    pub reason: Reason,
}

impl Decision {
    /// Blocked ticks raise an alert
    pub fn alert(&self) -> bool {
        self.reason == Reason::Obstacle
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct CommandArbiter;

impl CommandArbiter {
    pub fn new() -> Self {
        Self
    }

    /// Pure: no I/O, same inputs give the same decision
    pub fn resolve(
        &self,
        obstacle: &ObstacleState,
        remote: Option<Command>,
        bus: Option<Command>,
        held: Command,
    ) -> Decision {
        if obstacle.blocked {
            return Decision {
                command: Command::Stop,
                reason: Reason::Obstacle,
            };
        }

        if let Some(command) = remote.and_then(Command::known) {
            return Decision {
                command,
                reason: Reason::Remote,
            };
        }

        if let Some(command) = bus.and_then(Command::known) {
            return Decision {
                command,
                reason: Reason::Bus,
            };
        }

        Decision {
            command: held,
            reason: Reason::Held,
        }
    }
}
