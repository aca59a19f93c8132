// Motor control module for the carrito base
//
// Provides:
// - Serial line bridge protocol to the motor/sensor microcontroller
// - Two-sided motor driver (left/right groups, shared duty output)
// - Command -> motor translation with idempotent direction tracking

pub mod bridge;
mod driver;
mod motion;

pub use bridge::{BridgeError, LineBridge};
pub use driver::{
    DriveOutputs, GroupDrive, MotorDriver, OutputWrite, Side, SimulatedFault, SimulatedOutputs,
};
pub use motion::{MotionController, MotionState};
