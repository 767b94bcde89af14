//! The next-block model.
//!
//! The source firmware carries two parallel structures, `gn` (values) and
//! `gf` (a same-shaped presence mask). Per Design Notes §9 this collapses
//! into one struct of `Option<T>` fields: "is this field set" is
//! `Option::is_some()`, never a float compared against an epsilon.

use crate::cm::types::{
    ArcDirection, DistanceMode, FeedRateMode, MotionMode, NextAction, PathControl, ProgramFlow,
    SpindleMode, Units,
};
use tinyg_common::position::Axis;

/// Values a block may set, alongside whether it set them.
#[derive(Debug, Clone, Default)]
pub struct NextBlock {
    pub next_action: Option<NextAction>,
    pub motion_mode: Option<MotionMode>,
    pub arc_direction: Option<ArcDirection>,
    pub distance_mode: Option<DistanceMode>,
    pub feed_rate_mode: Option<FeedRateMode>,
    pub units: Option<Units>,
    pub plane: Option<crate::cm::types::Plane>,
    pub path_control: Option<PathControl>,
    pub program_flow: Option<ProgramFlow>,
    pub spindle_mode: Option<SpindleMode>,
    pub spindle_speed: Option<f64>,
    pub feed_rate: Option<f64>,
    pub tool: Option<u32>,
    pub change_tool: Option<bool>,
    pub dwell_time: Option<f64>,
    pub absolute_override: bool,
    pub zero_targets: bool,
    pub line_number: Option<u32>,

    /// Per-axis target, `None` if the block didn't set it.
    pub target: [Option<f64>; 6],
    /// I, J, K arc-center offsets.
    pub arc_offset: [Option<f64>; 3],
    pub arc_radius: Option<f64>,
}

impl NextBlock {
    pub fn target_mut(&mut self, axis: Axis) -> &mut Option<f64> {
        &mut self.target[axis.index()]
    }

    pub fn target(&self, axis: Axis) -> Option<f64> {
        self.target[axis.index()]
    }
}
