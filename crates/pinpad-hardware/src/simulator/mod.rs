//! Simulated terminals for development and testing.
//!
//! The simulator stands in for any manufacturer's driver and can be scripted
//! to delay, fail, raise events or demand a reboot without physical hardware.

pub mod device;
pub mod script;

pub use device::{SIMULATOR_MODEL, SimulatorDevice, SimulatorHandle};
pub use script::{CallJournal, ScriptedBehavior, SimulatorCall};
