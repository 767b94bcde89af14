//! The canonical machine (spec.md §4.2): owns the authoritative machine
//! position and modal state, converts user-unit G-code targets into
//! machine-unit (mm/deg) planner requests, and decomposes arcs into chord
//! sequences.

pub mod types;

use tinyg_common::config::MachineConfig;
use tinyg_common::consts::MM_PER_INCH;
use tinyg_common::position::{Axis, CoordinateSystem, Position};

use crate::error::CmError;
use crate::planner::{MotionPlanner, MoveLimits, MoveRequest};
use types::{ArcDirection, DistanceMode, ModalState, PathControl, Plane, Units};

/// Owns modal state and the authoritative machine position, and drives the
/// motion planner (spec.md §4.2).
pub struct CanonicalMachine {
    pub modal: ModalState,
    /// Machine position, post-offset, in millimeters/degrees — always the
    /// storage unit regardless of the active `Units` mode.
    position: Position,
    config: MachineConfig,
    absolute_override: bool,
}

impl CanonicalMachine {
    pub fn new(config: MachineConfig) -> Self {
        Self {
            modal: ModalState::default(),
            position: Position::ZERO,
            config,
            absolute_override: false,
        }
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn config(&self) -> &MachineConfig {
        &self.config
    }

    /// Mutable access to the live machine configuration, for the `$` config
    /// dialect (spec.md §6): a token write takes effect on the next move
    /// enqueued, since every kinematic limit is read from here fresh.
    pub fn config_mut(&mut self) -> &mut MachineConfig {
        &mut self.config
    }

    /// Convert a user-unit scalar to machine units (mm), per the active
    /// `Units` mode (spec.md §4.2: "when units = INCHES, inputs are
    /// scaled by 25.4").
    fn to_mm(&self, value: f64) -> f64 {
        match self.modal.units {
            Units::Inches => value * MM_PER_INCH,
            Units::Millimeters => value,
        }
    }

    /// Convert `rate` against `units` and store it as the active feed
    /// rate. `F` and `G20`/`G21` can appear on the same line, and
    /// `G20`/`G21` executes after `F` in table-8 order (spec.md §4.1) —
    /// the caller passes the block's *eventual* units (this block's
    /// `G20`/`G21` if present, else the current mode) so the word is
    /// interpreted the way the line actually reads rather than against
    /// whatever units were active before this line started.
    pub fn set_feed_rate_in_units(&mut self, rate: f64, units: Units) {
        let mm = match units {
            Units::Inches => rate * MM_PER_INCH,
            Units::Millimeters => rate,
        };
        self.modal.feed_rate = mm;
    }

    pub fn set_feed_rate_mode(&mut self, mode: types::FeedRateMode) {
        self.modal.feed_rate_mode = mode;
    }

    pub fn set_spindle_speed(&mut self, speed: f64) {
        self.modal.spindle_speed = speed;
    }

    pub fn select_tool(&mut self, tool: u32) {
        self.modal.tool = tool;
    }

    pub fn change_tool(&mut self) {
        tracing::info!(tool = self.modal.tool, "tool change");
    }

    pub fn start_spindle(&mut self, mode: types::SpindleMode) {
        self.modal.spindle_mode = mode;
    }

    pub fn stop_spindle(&mut self) {
        self.modal.spindle_mode = types::SpindleMode::Off;
    }

    pub fn set_units(&mut self, units: Units) {
        self.modal.units = units;
    }

    pub fn set_plane(&mut self, plane: Plane) {
        self.modal.plane = plane;
    }

    pub fn set_absolute_mode(&mut self, mode: DistanceMode) {
        self.modal.distance_mode = mode;
    }

    pub fn set_absolute_override(&mut self, on: bool) {
        self.absolute_override = on;
    }

    pub fn set_path_control(&mut self, path_control: PathControl) {
        self.modal.path_control = path_control;
    }

    /// G92: shift the G92 offset so the current machine position reads as
    /// `target` in the active work coordinate system. `zero` (G92.1)
    /// clears the offset instead.
    pub fn set_origin_offsets(&mut self, target: [Option<f64>; 6], zero: bool) {
        if zero {
            self.config.offsets.g92 = Position::ZERO;
            return;
        }
        let work_offset = self.config.offsets.systems[self.modal.coordinate_system.index()];
        for axis in Axis::ALL {
            if let Some(value) = target[axis.index()] {
                let mm = self.to_mm(value);
                self.config.offsets.g92[axis] = self.position[axis] - work_offset[axis] - mm;
            }
        }
    }

    pub fn message(&self, text: &str) {
        tracing::info!(message = text, "program message");
    }

    /// Resolve a per-axis target array (user units, `None` = unset) into
    /// an absolute machine-unit target, applying the fill rule (spec.md
    /// §4.1 "Target resolution": unset fields fill from the current
    /// position in absolute mode, stay at zero delta in incremental mode).
    ///
    /// A set axis in absolute mode is a *work*-coordinate value (spec.md
    /// §3 "Coordinate offsets"): it gets the active system's offset plus
    /// G92 added to land in machine coordinates, unless G53
    /// (`absolute_override`) asked for machine coordinates directly.
    pub fn resolve_target(&self, requested: [Option<f64>; 6]) -> Position {
        let absolute = self.modal.distance_mode == DistanceMode::Absolute || self.absolute_override;
        let offset = if self.absolute_override {
            Position::ZERO
        } else {
            self.config.offsets.total(self.modal.coordinate_system)
        };
        let mut out = self.position;
        for axis in Axis::ALL {
            let idx = axis.index();
            match requested[idx] {
                Some(value) => {
                    let mm = self.to_mm(value);
                    out[axis] = if absolute { mm + offset[axis] } else { self.position[axis] + mm };
                }
                None => {
                    if !absolute {
                        out[axis] = self.position[axis];
                    }
                    // absolute + unset: already filled from self.position above
                }
            }
        }
        out
    }

    /// A straight move at traverse (rapid) rate: G0.
    pub fn straight_traverse(
        &mut self,
        target: Position,
        planner: &mut MotionPlanner,
        line_number: u32,
    ) -> Result<(), CmError> {
        self.enqueue_linear(target, None, planner, line_number)
    }

    /// A straight move at the active feed rate: G1.
    pub fn straight_feed(
        &mut self,
        target: Position,
        planner: &mut MotionPlanner,
        line_number: u32,
    ) -> Result<(), CmError> {
        self.enqueue_linear(target, Some(self.modal.feed_rate), planner, line_number)
    }

    fn enqueue_linear(
        &mut self,
        target: Position,
        requested_feed: Option<f64>,
        planner: &mut MotionPlanner,
        line_number: u32,
    ) -> Result<(), CmError> {
        let delta = target.sub(&self.position);
        let length = self.participating_norm(&delta);
        if length <= 0.0 {
            return Ok(()); // zero-length move: a no-op, not an error
        }
        self.check_soft_limits(&target)?;

        let direction = self.unit_direction(&delta, length);
        let limits = self.move_limits(&direction)?;
        let steps = self.step_counts(&delta);

        let req = MoveRequest {
            target,
            direction,
            length,
            steps,
            requested_feed,
            path_control: self.modal.path_control,
            limits,
            line_number,
        };
        planner.enqueue(req).map_err(CmError::Planner)?;
        self.position = target; // optimistic position update (spec.md §4.2)
        Ok(())
    }

    /// G2/G3: decompose a circular arc into a chord sequence bounded by
    /// `mm_per_arc_segment` and enqueue each chord as a straight feed
    /// (spec.md §4.2).
    pub fn arc_feed(
        &mut self,
        target: Position,
        offset: [f64; 3],
        radius: Option<f64>,
        direction: ArcDirection,
        planner: &mut MotionPlanner,
        line_number: u32,
    ) -> Result<(), CmError> {
        let (u, v) = self.plane_axes();
        let start = self.position;

        let (center_u, center_v, arc_radius) = if let Some(r) = radius {
            self.center_from_radius(start, target, u, v, r, direction)?
        } else {
            let cu = start[u] + offset[plane_offset_index(u)];
            let cv = start[v] + offset[plane_offset_index(v)];
            let radius = ((start[u] - cu).powi(2) + (start[v] - cv).powi(2)).sqrt();
            let end_radius = ((target[u] - cu).powi(2) + (target[v] - cv).powi(2)).sqrt();
            if (radius - end_radius).abs() > 1e-3 {
                return Err(CmError::ArcSpecificationError(format!(
                    "start radius {radius:.4} != end radius {end_radius:.4}"
                )));
            }
            (cu, cv, radius)
        };

        let start_angle = (start[v] - center_v).atan2(start[u] - center_u);
        let mut end_angle = (target[v] - center_v).atan2(target[u] - center_u);
        let ccw = matches!(direction, ArcDirection::CounterClockwise);
        if ccw && end_angle <= start_angle {
            end_angle += std::f64::consts::TAU;
        }
        if !ccw && end_angle >= start_angle {
            end_angle -= std::f64::consts::TAU;
        }

        let sweep = (end_angle - start_angle).abs();
        let arc_length = arc_radius * sweep;
        let segment_length = self.config.global.mm_per_arc_segment.max(1e-6);
        let segments = ((arc_length / segment_length).ceil() as usize).max(1);

        for i in 1..=segments {
            let t = i as f64 / segments as f64;
            let angle = start_angle + (end_angle - start_angle) * t;
            let mut chord_target = if i == segments { target } else { start };
            chord_target[u] = center_u + arc_radius * angle.cos();
            chord_target[v] = center_v + arc_radius * angle.sin();
            self.enqueue_linear(chord_target, Some(self.modal.feed_rate), planner, line_number)?;
        }
        Ok(())
    }

    fn center_from_radius(
        &self,
        start: Position,
        target: Position,
        u: Axis,
        v: Axis,
        radius: f64,
        direction: ArcDirection,
    ) -> Result<(f64, f64, f64), CmError> {
        let dx = target[u] - start[u];
        let dy = target[v] - start[v];
        let chord = (dx * dx + dy * dy).sqrt();
        if chord > 2.0 * radius.abs() {
            return Err(CmError::ArcSpecificationError(format!(
                "chord {chord:.4} exceeds diameter {:.4}",
                2.0 * radius.abs()
            )));
        }
        let mid_u = (start[u] + target[u]) / 2.0;
        let mid_v = (start[v] + target[v]) / 2.0;
        let h = (radius * radius - (chord / 2.0).powi(2)).max(0.0).sqrt();
        let (perp_u, perp_v) = if chord > 0.0 { (-dy / chord, dx / chord) } else { (0.0, 0.0) };
        let sign = match (direction, radius.is_sign_positive()) {
            (ArcDirection::Clockwise, true) => -1.0,
            (ArcDirection::Clockwise, false) => 1.0,
            (ArcDirection::CounterClockwise, true) => 1.0,
            (ArcDirection::CounterClockwise, false) => -1.0,
        };
        Ok((mid_u + sign * h * perp_u, mid_v + sign * h * perp_v, radius.abs()))
    }

    fn plane_axes(&self) -> (Axis, Axis) {
        match self.modal.plane {
            Plane::Xy => (Axis::X, Axis::Y),
            Plane::Xz => (Axis::X, Axis::Z),
            Plane::Yz => (Axis::Y, Axis::Z),
        }
    }

    pub fn dwell(&self, seconds: f64) -> f64 {
        seconds.max(0.0)
    }

    pub fn return_to_home(&mut self) {
        self.position = Position::ZERO;
    }

    pub fn homing_cycle(&mut self) {
        self.position = Position::ZERO;
    }

    fn participating_norm(&self, delta: &Position) -> f64 {
        let mut sum = 0.0;
        for axis in Axis::ALL {
            let mut v = delta[axis];
            if axis.is_rotary() {
                if let Some(cfg) = self.config.axis_config(axis) {
                    v *= cfg.radius;
                }
            }
            sum += v * v;
        }
        sum.sqrt()
    }

    fn unit_direction(&self, delta: &Position, length: f64) -> [f64; 6] {
        let mut dir = [0.0; 6];
        for axis in Axis::ALL {
            dir[axis.index()] = delta[axis] / length;
        }
        dir
    }

    fn step_counts(&self, delta: &Position) -> [i64; 6] {
        let mut steps = [0i64; 6];
        for axis in Axis::ALL {
            if let Some(cfg) = self.config.axis_config(axis) {
                steps[axis.index()] = (delta[axis] * cfg.steps_per_unit()).round() as i64;
            }
        }
        steps
    }

    fn move_limits(&self, direction: &[f64; 6]) -> Result<MoveLimits, CmError> {
        let mut cruise_cap = f64::INFINITY;
        let mut amax = f64::INFINITY;
        let mut jmax = f64::INFINITY;
        let mut junction_deviation = f64::INFINITY;
        let mut any = false;

        for axis in Axis::ALL {
            let component = direction[axis.index()].abs();
            if component <= 1e-12 {
                continue;
            }
            let Some(cfg) = self.config.axis_config(axis) else {
                continue; // axis disabled in this machine profile: not actuated
            };
            any = true;
            cruise_cap = cruise_cap.min(cfg.velocity_max / component);
            amax = amax.min(cfg.accel_max);
            jmax = jmax.min(cfg.jerk_max);
            junction_deviation = junction_deviation.min(cfg.junction_deviation);
        }

        if !any {
            return Err(CmError::ArcSpecificationError("zero-length move direction".into()));
        }

        Ok(MoveLimits {
            cruise_cap,
            amax,
            jmax,
            junction_deviation,
        })
    }

    fn check_soft_limits(&self, target: &Position) -> Result<(), CmError> {
        for axis in Axis::ALL {
            if let Some(cfg) = self.config.axis_config(axis) {
                if cfg.travel_max > 0.0 && target[axis].abs() > cfg.travel_max {
                    return Err(CmError::SoftLimitExceeded(axis.index()));
                }
            }
        }
        Ok(())
    }

    pub fn set_coordinate_system(&mut self, system: CoordinateSystem) {
        self.modal.coordinate_system = system;
    }
}

fn plane_offset_index(axis: Axis) -> usize {
    match axis {
        Axis::X => 0,
        Axis::Y => 1,
        Axis::Z => 2,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tinyg_common::config::zen7x12_default;
    use crate::planner::MotionPlanner;

    fn machine() -> CanonicalMachine {
        CanonicalMachine::new(zen7x12_default())
    }

    #[test]
    fn g92_offset_shifts_subsequent_absolute_targets() {
        let mut cm = machine();
        let mut mp = MotionPlanner::new(16, 0.1);

        // Move to X=10 machine position, then declare it reads as X=0
        // (G92 X0): the offset should absorb the 10mm shift.
        let target = cm.resolve_target([Some(10.0), None, None, None, None, None]);
        cm.straight_traverse(target, &mut mp, 0).unwrap();
        assert_eq!(cm.position().0[0], 10.0);

        cm.set_origin_offsets([Some(0.0), None, None, None, None, None], false);

        let resolved = cm.resolve_target([Some(0.0), None, None, None, None, None]);
        assert!((resolved.0[0] - 10.0).abs() < 1e-9, "X0 in the new work frame is still machine X=10");

        let resolved_five = cm.resolve_target([Some(5.0), None, None, None, None, None]);
        assert!((resolved_five.0[0] - 15.0).abs() < 1e-9);
    }

    #[test]
    fn g92_1_clears_offset() {
        let mut cm = machine();
        cm.set_origin_offsets([Some(3.0), None, None, None, None, None], false);
        assert_ne!(cm.config().offsets.g92.0[0], 0.0);
        cm.set_origin_offsets([None; 6], true);
        assert_eq!(cm.config().offsets.g92.0[0], 0.0);
    }

    #[test]
    fn g53_override_bypasses_work_offset() {
        let mut cm = machine();
        cm.config.offsets.systems[CoordinateSystem::G55.index()].0[0] = 100.0;
        cm.set_coordinate_system(CoordinateSystem::G55);

        let worked = cm.resolve_target([Some(5.0), None, None, None, None, None]);
        assert!((worked.0[0] - 105.0).abs() < 1e-9);

        cm.set_absolute_override(true);
        let overridden = cm.resolve_target([Some(5.0), None, None, None, None, None]);
        assert!((overridden.0[0] - 5.0).abs() < 1e-9, "G53 targets machine coordinates directly");
    }
}
