//! Shared types for the TinyG motion core: axis/position model, the
//! machine configuration store, HAL collaborator traits, and the wire
//! status-code vocabulary.

pub mod config;
pub mod consts;
pub mod hal;
pub mod position;
pub mod status;

pub mod prelude {
    pub use crate::config::{AxisConfig, AxisMode, GlobalConfig, MachineConfig, SwitchMode};
    pub use crate::consts::*;
    pub use crate::hal::{Direction, GpioDriver, HalError, NvStore, SerialDriver, TimerDriver};
    pub use crate::position::{Axis, CoordinateOffsets, CoordinateSystem, Position};
    pub use crate::status::StatusCode;
}
