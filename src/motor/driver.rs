// Two-sided motor driver for the carrito base
//
// Left and right motor groups each have two terminals (H-bridge inputs) and
// share one duty-cycle output for speed.

use tracing::{debug, info, warn};

use crate::config::DUTY_MAX;

/// Motor group, numbered as the bridge firmware addresses them
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left = 0,
    Right = 1,
}

/// What one motor group is doing. Having both terminals asserted is not
/// representable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GroupDrive {
    Forward,
    Backward,
    #[default]
    Stop,
}

impl GroupDrive {
    /// Terminal levels (in1, in2)
    pub fn terminals(self) -> (bool, bool) {
        match self {
            GroupDrive::Forward => (true, false),
            GroupDrive::Backward => (false, true),
            GroupDrive::Stop => (false, false),
        }
    }
}

/// Hardware outputs the driver writes to
pub trait DriveOutputs {
    type Error: std::error::Error;

    fn set_group(&mut self, side: Side, drive: GroupDrive) -> Result<(), Self::Error>;
    fn set_duty(&mut self, duty: u16) -> Result<(), Self::Error>;
}

/// Motor driver for the left/right groups and the shared duty output
pub struct MotorDriver<O: DriveOutputs> {
    outputs: O,
    left: GroupDrive,
    right: GroupDrive,
    duty: u16,
}

impl<O: DriveOutputs> MotorDriver<O> {
    /// Take ownership of the outputs and put them in a known state:
    /// both groups stopped, duty at `duty`
    pub fn new(outputs: O, duty: u16) -> Result<Self, O::Error> {
        let mut driver = Self {
            outputs,
            left: GroupDrive::Stop,
            right: GroupDrive::Stop,
            duty: 0,
        };
        driver.stop()?;
        driver.set_speed(duty)?;
        info!("Motor driver ready (duty {})", driver.duty);
        Ok(driver)
    }

    /// Write one group; its recorded drive only changes if the write succeeds
    pub fn drive(&mut self, side: Side, drive: GroupDrive) -> Result<(), O::Error> {
        self.outputs.set_group(side, drive)?;
        match side {
            Side::Left => self.left = drive,
            Side::Right => self.right = drive,
        }
        Ok(())
    }

    pub fn forward(&mut self, side: Side) -> Result<(), O::Error> {
        self.drive(side, GroupDrive::Forward)
    }

    pub fn backward(&mut self, side: Side) -> Result<(), O::Error> {
        self.drive(side, GroupDrive::Backward)
    }

    pub fn stop_side(&mut self, side: Side) -> Result<(), O::Error> {
        self.drive(side, GroupDrive::Stop)
    }

    /// Stop both groups
    pub fn stop(&mut self) -> Result<(), O::Error> {
        self.stop_side(Side::Left)?;
        self.stop_side(Side::Right)
    }

    /// Set the shared duty output, clamped to the PWM range
    pub fn set_speed(&mut self, duty: u16) -> Result<(), O::Error> {
        let duty = duty.min(DUTY_MAX);
        debug!("Setting duty cycle: {}", duty);
        self.outputs.set_duty(duty)?;
        self.duty = duty;
        Ok(())
    }

    /// Last drive written to each group (left, right)
    pub fn groups(&self) -> (GroupDrive, GroupDrive) {
        (self.left, self.right)
    }

    pub fn duty(&self) -> u16 {
        self.duty
    }

    pub fn outputs(&self) -> &O {
        &self.outputs
    }

    pub fn outputs_mut(&mut self) -> &mut O {
        &mut self.outputs
    }
}

impl<O: DriveOutputs> Drop for MotorDriver<O> {
    fn drop(&mut self) {
        // Never leave the vehicle driving when the runtime goes away
        if let Err(e) = self.stop() {
            warn!("Failed to stop motors on drop: {}", e);
        }
    }
}

/// A single write seen by `SimulatedOutputs`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputWrite {
    Group(Side, GroupDrive),
    Duty(u16),
}

/// Error raised by `SimulatedOutputs` when told to fail
#[derive(Debug, thiserror::Error)]
#[error("simulated output failure")]
pub struct SimulatedFault;

/// In-memory outputs used when no bridge is configured, and in tests
#[derive(Debug, Default)]
pub struct SimulatedOutputs {
    writes: Vec<OutputWrite>,
    failing: bool,
}

impl SimulatedOutputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn writes(&self) -> &[OutputWrite] {
        &self.writes
    }

    /// Make every following write fail (or succeed again)
    pub fn set_failing(&mut self, failing: bool) {
        self.failing = failing;
    }
}

impl DriveOutputs for SimulatedOutputs {
    type Error = SimulatedFault;

    fn set_group(&mut self, side: Side, drive: GroupDrive) -> Result<(), SimulatedFault> {
        if self.failing {
            return Err(SimulatedFault);
        }
        debug!("[sim] {:?} group -> {:?}", side, drive);
        self.writes.push(OutputWrite::Group(side, drive));
        Ok(())
    }

    fn set_duty(&mut self, duty: u16) -> Result<(), SimulatedFault> {
        if self.failing {
            return Err(SimulatedFault);
        }
        debug!("[sim] duty -> {}", duty);
        self.writes.push(OutputWrite::Duty(duty));
        Ok(())
    }
}
