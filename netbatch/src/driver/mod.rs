//! Command runner and device resolution.
//!
//! The driver layer turns inventory entries into resolved devices and runs
//! a command batch against one device at a time, producing a result.

mod device;
mod response;
mod runner;

pub use device::{Device, DeviceEntry, Resolution, resolve_inventory};
pub use response::{CommandOutput, DeviceResult};
pub use runner::{CommandRunner, RunnerState, run_device};
