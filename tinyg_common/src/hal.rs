//! Hardware-abstraction traits the motion core depends on (spec.md §6).
//!
//! These are the "external collaborators" spec.md §1 places out of scope
//! for the core pipeline: GPIO, a periodic timer, line-oriented serial
//! I/O, and a non-volatile config store. `tinyg_core` only ever talks to
//! these traits; `tinyg_main` supplies an in-memory simulated
//! implementation.

use thiserror::Error;

use crate::position::Axis;

/// Error type for HAL operations.
#[derive(Debug, Clone, Error)]
pub enum HalError {
    #[error("GPIO error: {0}")]
    Gpio(String),
    #[error("timer error: {0}")]
    Timer(String),
    #[error("serial error: {0}")]
    Serial(String),
    #[error("non-volatile store error: {0}")]
    NvStore(String),
}

/// Direction line state, per axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Positive,
    Negative,
}

/// Per-axis STEP/DIRECTION/ENABLE GPIO, as used by the step executor.
///
/// `step_pulse` is called once per step, from the step-pulse ISR; it must
/// be safe to call at the configured step rate (default 10 kHz, spec.md
/// §6) without blocking.
pub trait GpioDriver: Send {
    /// Assert the direction line for `axis`. Polarity inversion (per-axis
    /// `polarity_reversed`) is applied by the caller before this call.
    fn set_direction(&mut self, axis: Axis, direction: Direction) -> Result<(), HalError>;

    /// Enable or disable the driver for `axis`.
    fn set_enable(&mut self, axis: Axis, enabled: bool) -> Result<(), HalError>;

    /// Emit one step pulse on `axis`'s STEP line.
    fn step_pulse(&mut self, axis: Axis) -> Result<(), HalError>;

    /// Poll debounced limit-switch edges since the last call. Returns the
    /// axes whose limit switch transitioned to the tripped state.
    fn poll_limit_events(&mut self) -> Result<heapless::Vec<Axis, 6>, HalError>;
}

/// A periodic callback source (spec.md §6 "Timer").
pub trait TimerDriver: Send {
    /// Configure the callback rate, in Hz.
    fn set_rate_hz(&mut self, hz: u32) -> Result<(), HalError>;

    /// Block until the next tick boundary. `tinyg_main`'s simulated timer
    /// sleeps; real hardware would instead be driven by an interrupt and
    /// never call a blocking wait from this trait.
    fn wait_tick(&mut self) -> Result<(), HalError>;
}

/// Byte-level serial I/O; the core performs its own line assembly on top
/// of this (spec.md §6).
pub trait SerialDriver: Send {
    /// Read available bytes into `buf`, returning the count read (may be
    /// zero; this trait is non-blocking by contract).
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, HalError>;

    /// Write bytes, e.g. a status-report line.
    fn write(&mut self, buf: &[u8]) -> Result<(), HalError>;
}

/// Non-volatile configuration storage. The core reads once at init and
/// writes through on change (spec.md §6).
pub trait NvStore: Send {
    /// Load the persisted machine configuration, if any has been written.
    fn load(&self) -> Result<Option<crate::config::MachineConfig>, HalError>;

    /// Persist the machine configuration.
    fn store(&mut self, config: &crate::config::MachineConfig) -> Result<(), HalError>;
}
