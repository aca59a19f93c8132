// Command -> motor group translation
//
// Keeps the direction the vehicle was last told to drive, so repeated
// commands do not re-issue motor writes once the groups match it.

use tracing::{info, warn};

use super::driver::{DriveOutputs, GroupDrive, MotorDriver, Side};
use crate::config::DUTY_MAX;
use crate::messages::Command;

/// Direction and speed the vehicle is currently driving with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotionState {
    pub active_direction: Command,
    pub speed_duty: u16,
}

/// Group drives (left, right) for a direction; None for Unknown
fn group_targets(command: Command) -> Option<(GroupDrive, GroupDrive)> {
    match command {
        Command::Forward => Some((GroupDrive::Forward, GroupDrive::Forward)),
        Command::Backward => Some((GroupDrive::Backward, GroupDrive::Backward)),
        Command::Left => Some((GroupDrive::Stop, GroupDrive::Forward)),
        Command::Right => Some((GroupDrive::Forward, GroupDrive::Stop)),
        Command::Stop => Some((GroupDrive::Stop, GroupDrive::Stop)),
        Command::Unknown => None,
    }
}

pub struct MotionController<O: DriveOutputs> {
    driver: MotorDriver<O>,
    state: MotionState,
}

impl<O: DriveOutputs> MotionController<O> {
    pub fn new(driver: MotorDriver<O>) -> Self {
        let state = MotionState {
            active_direction: Command::Stop,
            speed_duty: driver.duty(),
        };
        Self { driver, state }
    }

    /// Drive in `command`'s direction. Returns whether motor writes were issued.
    ///
    /// `active_direction` records the direction asked for, even when a write
    /// fails. A command is only skipped as a repeat when the groups already
    /// match it, so a failed or half-written command is written again on the
    /// next call.
    pub fn apply(&mut self, command: Command) -> Result<bool, O::Error> {
        let Some(target) = group_targets(command) else {
            warn!("Ignoring unknown command at motion controller");
            return Ok(false);
        };

        if command == self.state.active_direction && self.driver.groups() == target {
            return Ok(false);
        }

        if command != self.state.active_direction {
            info!(
                "Direction {:?} -> {:?}",
                self.state.active_direction, command
            );
            self.state.active_direction = command;
        }

        let (left, right) = target;
        self.driver.drive(Side::Left, left)?;
        self.driver.drive(Side::Right, right)?;
        Ok(true)
    }

    /// Set the shared duty cycle, clamped to 0-1023. Applies to both groups at once.
    pub fn set_speed(&mut self, duty: i32) -> Result<(), O::Error> {
        let duty = duty.clamp(0, DUTY_MAX as i32) as u16;
        self.driver.set_speed(duty)?;
        self.state.speed_duty = duty;
        info!("Speed set to duty cycle {}", duty);
        Ok(())
    }

    pub fn state(&self) -> MotionState {
        self.state
    }

    pub fn driver(&self) -> &MotorDriver<O> {
        &self.driver
    }

    pub fn driver_mut(&mut self) -> &mut MotorDriver<O> {
        &mut self.driver
    }
}
