//! Shared numeric constants for the motion pipeline.

/// Number of supported axes (X, Y, Z, A, B, C).
pub const NUM_AXES: usize = 6;

/// Letters identifying each axis, in storage order.
pub const AXIS_LETTERS: [char; NUM_AXES] = ['X', 'Y', 'Z', 'A', 'B', 'C'];

/// Number of persisted coordinate systems (G54 .. G59.3).
pub const NUM_COORDINATE_SYSTEMS: usize = 9;

/// Inches-to-millimeters conversion factor.
pub const MM_PER_INCH: f64 = 25.4;

/// Generic floating-point comparison tolerance used outside hot paths
/// (step-count/length agreement, arc center/radius consistency, tests).
pub const EPSILON: f64 = 1e-6;

/// Default segment generator tick, in seconds (~1 ms per spec.md §2).
pub const DEFAULT_SEGMENT_SECONDS: f64 = 0.001;

/// Default step-pulse ISR rate, in Hz (spec.md §6).
pub const DEFAULT_STEP_HZ: u32 = 10_000;
