//! Canonical-machine modal state: the mutually-exclusive G/M code groups
//! (spec.md §3 "GCode model state").

use tinyg_common::position::CoordinateSystem;

/// G-code modal group 1: motion mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionMode {
    Traverse,
    Feed,
    CwArc,
    CcwArc,
    Cancelled,
}

/// Modal group 3: distance mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistanceMode {
    Absolute,
    Incremental,
}

/// Modal group 5: feed-rate interpretation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedRateMode {
    UnitsPerMinute,
    InverseTime,
}

/// Modal group 6: length units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Units {
    Inches,
    Millimeters,
}

/// Modal group 2: active plane (for arcs).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Plane {
    Xy,
    Xz,
    Yz,
}

/// Modal group 13: path control / cornering behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathControl {
    ExactPath,
    ExactStop,
    Continuous,
}

/// Program execution state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgramFlow {
    Running,
    Paused,
    Completed,
}

/// Spindle rotation direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpindleMode {
    Off,
    Cw,
    Ccw,
}

/// Which canonical action, if any, this block's motion-related fields
/// should be applied through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextAction {
    Motion,
    Dwell,
    ReturnToHome,
    HomingCycle,
    OffsetCoordinates,
}

/// Arc winding direction (modal group 1's G2/G3 split, carried separately
/// from `MotionMode` so `arc_feed` doesn't need to re-derive it).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArcDirection {
    Clockwise,
    CounterClockwise,
}

impl Default for MotionMode {
    fn default() -> Self {
        MotionMode::Cancelled
    }
}
impl Default for DistanceMode {
    fn default() -> Self {
        DistanceMode::Absolute
    }
}
impl Default for FeedRateMode {
    fn default() -> Self {
        FeedRateMode::UnitsPerMinute
    }
}
impl Default for Units {
    fn default() -> Self {
        Units::Millimeters
    }
}
impl Default for Plane {
    fn default() -> Self {
        Plane::Xy
    }
}
impl Default for PathControl {
    fn default() -> Self {
        PathControl::Continuous
    }
}
impl Default for ProgramFlow {
    fn default() -> Self {
        ProgramFlow::Running
    }
}
impl Default for SpindleMode {
    fn default() -> Self {
        SpindleMode::Off
    }
}

/// The persistent canonical-machine modal state (`gm` in the source
/// firmware), as distinct from the per-block `NextBlock` model.
#[derive(Debug, Clone)]
pub struct ModalState {
    pub motion_mode: MotionMode,
    pub distance_mode: DistanceMode,
    pub feed_rate_mode: FeedRateMode,
    pub units: Units,
    pub plane: Plane,
    pub path_control: PathControl,
    pub program_flow: ProgramFlow,
    pub spindle_mode: SpindleMode,
    pub spindle_speed: f64,
    pub feed_rate: f64,
    pub tool: u32,
    pub line_number: u32,
    pub coordinate_system: CoordinateSystem,
}

impl Default for ModalState {
    fn default() -> Self {
        Self {
            motion_mode: MotionMode::default(),
            distance_mode: DistanceMode::default(),
            feed_rate_mode: FeedRateMode::default(),
            units: Units::default(),
            plane: Plane::default(),
            path_control: PathControl::default(),
            program_flow: ProgramFlow::default(),
            spindle_mode: SpindleMode::default(),
            spindle_speed: 0.0,
            feed_rate: 0.0,
            tool: 0,
            line_number: 0,
            coordinate_system: CoordinateSystem::G54,
        }
    }
}
