//! Scanning service module
//!
//! Wraps the sensor sampler and mute state machine in a start/stop lifecycle
//! driven by control commands.

mod command;
mod scanning;

pub use command::ControlCommand;
pub use scanning::{ScanningService, ServiceHandles, ServiceState};
