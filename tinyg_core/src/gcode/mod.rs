//! The G-code parser (spec.md §4.1): normalize → extract statements →
//! populate the next-block model → execute in RS-274/NGC table-8 order.
//!
//! Per Design Notes §9, the macro-driven `SET_NEXT_STATE`/`CALL_CM_FUNC`
//! dispatch of the original firmware's `gcode_parser.c` is replaced with a
//! straight-line match over [`model::NextBlock`]'s `Option` fields, walked
//! once in [`GcodeParser::execute`] in the fixed table-8 order — a single
//! source of truth for the sequence instead of call-site ordering.

pub mod model;
pub mod normalize;
pub mod statement;

use std::collections::HashSet;

use tinyg_common::position::Axis;
use tinyg_common::status::StatusCode;

use crate::cm::CanonicalMachine;
use crate::cm::types::{ArcDirection, MotionMode, NextAction, ProgramFlow, SpindleMode};
use crate::error::{CmError, GcodeError};
use crate::planner::MotionPlanner;
use model::NextBlock;
use statement::next_statement;

/// Result of parsing and executing one block: the wire status code, plus
/// a dwell duration if the block was a G4 (the cycle runner is
/// responsible for actually waiting — the parser only computes it).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExecuteOutcome {
    pub status: StatusCode,
    pub dwell_seconds: Option<f64>,
}

impl ExecuteOutcome {
    const fn ok() -> Self {
        Self {
            status: StatusCode::Ok,
            dwell_seconds: None,
        }
    }

    const fn noop() -> Self {
        Self {
            status: StatusCode::Noop,
            dwell_seconds: None,
        }
    }
}

/// Owns the parser's session-local state: which ignored M-codes have
/// already been warned about (spec.md §10.6 "Ignored M-code warnings" —
/// one warning per code, not one per line).
#[derive(Debug, Default)]
pub struct GcodeParser {
    warned_m_codes: HashSet<u8>,
}

impl GcodeParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// `parse(line) -> status` (spec.md §4.1 "Contract"). Normalizes the
    /// line, extracts statements into a fresh next-block model, and
    /// invokes canonical-machine actions in table-8 order.
    pub fn parse(
        &mut self,
        line: &str,
        cm: &mut CanonicalMachine,
        planner: &mut MotionPlanner,
    ) -> Result<ExecuteOutcome, CmError> {
        let normalized = normalize::normalize(line);
        if normalized.deleted {
            return Ok(ExecuteOutcome::noop());
        }
        if let Some(message) = &normalized.message {
            cm.message(message);
        }
        if normalized.command.is_empty() {
            return Ok(ExecuteOutcome::noop());
        }

        let block = self.build_next_block(&normalized.command, cm)?;
        self.execute(block, cm, planner)
    }

    fn build_next_block(&mut self, command: &str, cm: &CanonicalMachine) -> Result<NextBlock, GcodeError> {
        let mut gn = NextBlock::default();
        let buf = command.as_bytes();
        let mut pos = 0;
        while let Some(stmt) = next_statement(buf, &mut pos)? {
            self.apply_statement(stmt, &mut gn)?;
        }

        // Motion mode is modal (spec.md §4.1): a bare "X10" line continues
        // whatever G0/G1/G2/G3 was last in effect.
        if gn.next_action.is_none() && gn.motion_mode.is_none() {
            let has_target = gn.target.iter().any(Option::is_some);
            if has_target && cm.modal.motion_mode != MotionMode::Cancelled {
                gn.motion_mode = Some(cm.modal.motion_mode);
                gn.next_action = Some(NextAction::Motion);
            }
        }
        Ok(gn)
    }

    fn apply_statement(
        &mut self,
        stmt: statement::Statement,
        gn: &mut NextBlock,
    ) -> Result<(), GcodeError> {
        use crate::cm::types::{DistanceMode, FeedRateMode, PathControl, Plane, Units};

        let code = stmt.value.trunc() as i32;
        match stmt.letter {
            'G' => match code {
                0 => {
                    gn.motion_mode = Some(MotionMode::Traverse);
                    gn.next_action = Some(NextAction::Motion);
                }
                1 => {
                    gn.motion_mode = Some(MotionMode::Feed);
                    gn.next_action = Some(NextAction::Motion);
                }
                2 => {
                    gn.motion_mode = Some(MotionMode::CwArc);
                    gn.arc_direction = Some(ArcDirection::Clockwise);
                    gn.next_action = Some(NextAction::Motion);
                }
                3 => {
                    gn.motion_mode = Some(MotionMode::CcwArc);
                    gn.arc_direction = Some(ArcDirection::CounterClockwise);
                    gn.next_action = Some(NextAction::Motion);
                }
                4 => gn.next_action = Some(NextAction::Dwell),
                17 => gn.plane = Some(Plane::Xy),
                18 => gn.plane = Some(Plane::Xz),
                19 => gn.plane = Some(Plane::Yz),
                20 => gn.units = Some(Units::Inches),
                21 => gn.units = Some(Units::Millimeters),
                28 => gn.next_action = Some(NextAction::ReturnToHome),
                30 => gn.next_action = Some(NextAction::HomingCycle),
                40 | 41 | 42 | 43 | 49 => {} // cutter comp: accepted, ignored (spec.md §4.1)
                53 => gn.absolute_override = true,
                61 => {
                    gn.path_control = Some(if stmt.fraction.abs() > f64::EPSILON {
                        PathControl::ExactStop // G61.1
                    } else {
                        PathControl::ExactPath
                    });
                }
                64 => gn.path_control = Some(PathControl::Continuous),
                80 => gn.motion_mode = Some(MotionMode::Cancelled),
                90 => gn.distance_mode = Some(DistanceMode::Absolute),
                91 => gn.distance_mode = Some(DistanceMode::Incremental),
                92 => {
                    gn.next_action = Some(NextAction::OffsetCoordinates);
                    if stmt.fraction.abs() > f64::EPSILON {
                        gn.zero_targets = true; // G92.1
                    }
                }
                93 => gn.feed_rate_mode = Some(FeedRateMode::InverseTime),
                94 => gn.feed_rate_mode = Some(FeedRateMode::UnitsPerMinute),
                _ => return Err(GcodeError::UnrecognizedCommand('G', code)),
            },
            'M' => match code {
                0 | 1 => gn.program_flow = Some(ProgramFlow::Paused),
                2 | 30 | 60 => gn.program_flow = Some(ProgramFlow::Completed),
                3 => gn.spindle_mode = Some(SpindleMode::Cw),
                4 => gn.spindle_mode = Some(SpindleMode::Ccw),
                5 => gn.spindle_mode = Some(SpindleMode::Off),
                6 => gn.change_tool = Some(true),
                7 | 8 | 9 | 48 | 49 => self.warn_ignored(code as u8),
                _ => return Err(GcodeError::UnrecognizedCommand('M', code)),
            },
            'T' => gn.tool = Some(stmt.value.trunc().max(0.0) as u32),
            'F' => gn.feed_rate = Some(stmt.value),
            'P' => gn.dwell_time = Some(stmt.value),
            'S' => gn.spindle_speed = Some(stmt.value),
            'X' | 'Y' | 'Z' | 'A' | 'B' | 'C' => {
                let axis = Axis::from_letter(stmt.letter).expect("matched axis letter");
                *gn.target_mut(axis) = Some(stmt.value);
            }
            'I' => gn.arc_offset[0] = Some(stmt.value),
            'J' => gn.arc_offset[1] = Some(stmt.value),
            'K' => gn.arc_offset[2] = Some(stmt.value),
            'R' => gn.arc_radius = Some(stmt.value),
            'N' => gn.line_number = Some(stmt.value.max(0.0) as u32),
            other => return Err(GcodeError::UnrecognizedCommand(other, code)),
        }
        Ok(())
    }

    /// Log an ignored M-code the first time it's seen this session
    /// (spec.md §10.6): avoids flooding the log on a long program.
    fn warn_ignored(&mut self, code: u8) {
        if self.warned_m_codes.insert(code) {
            tracing::warn!(code, "ignored modal code M{code}");
        }
    }

    /// Walk the populated next-block model in RS-274/NGC table-8 order
    /// (spec.md §4.1 "Execution order"), invoking CM primitives.
    fn execute(
        &mut self,
        gn: NextBlock,
        cm: &mut CanonicalMachine,
        planner: &mut MotionPlanner,
    ) -> Result<ExecuteOutcome, CmError> {
        // G53 applies to this block only (spec.md §4.1); reset regardless
        // of how execution concludes.
        cm.set_absolute_override(gn.absolute_override);
        let result = self.execute_in_order(&gn, cm, planner);
        cm.set_absolute_override(false);
        result
    }

    fn execute_in_order(
        &mut self,
        gn: &NextBlock,
        cm: &mut CanonicalMachine,
        planner: &mut MotionPlanner,
    ) -> Result<ExecuteOutcome, CmError> {
        if let Some(mode) = gn.feed_rate_mode {
            cm.set_feed_rate_mode(mode);
        }
        if let Some(feed) = gn.feed_rate {
            // `G20`/`G21` on this same line hasn't been applied yet at
            // this point in table-8 order, but it governs how this
            // block's `F` reads — use the block's eventual units.
            cm.set_feed_rate_in_units(feed, gn.units.unwrap_or(cm.modal.units));
        }
        if let Some(speed) = gn.spindle_speed {
            cm.set_spindle_speed(speed);
        }
        if let Some(tool) = gn.tool {
            cm.select_tool(tool);
        }
        if gn.change_tool == Some(true) {
            cm.change_tool();
        }
        if let Some(mode) = gn.spindle_mode {
            match mode {
                SpindleMode::Cw => cm.start_spindle(SpindleMode::Cw),
                SpindleMode::Ccw => cm.start_spindle(SpindleMode::Ccw),
                SpindleMode::Off => cm.stop_spindle(),
            }
        }

        let dwell_seconds = if gn.next_action == Some(NextAction::Dwell) {
            Some(cm.dwell(gn.dwell_time.unwrap_or(0.0)))
        } else {
            None
        };

        if let Some(plane) = gn.plane {
            cm.set_plane(plane);
        }
        if let Some(units) = gn.units {
            cm.set_units(units);
        }
        if let Some(path_control) = gn.path_control {
            cm.set_path_control(path_control);
        }
        if let Some(distance_mode) = gn.distance_mode {
            cm.set_absolute_mode(distance_mode);
        }

        if gn.motion_mode == Some(MotionMode::Cancelled) {
            cm.modal.motion_mode = MotionMode::Cancelled; // G80
        }

        match gn.next_action {
            Some(NextAction::ReturnToHome) => cm.return_to_home(),
            Some(NextAction::HomingCycle) => cm.homing_cycle(),
            Some(NextAction::OffsetCoordinates) => {
                let target = if gn.zero_targets {
                    [Some(0.0); 6]
                } else {
                    gn.target
                };
                cm.set_origin_offsets(target, gn.zero_targets);
            }
            _ => {}
        }

        if gn.next_action == Some(NextAction::Motion) {
            let line_number = gn.line_number.unwrap_or(cm.modal.line_number);
            if let Some(mode) = gn.motion_mode {
                cm.modal.motion_mode = mode;
            }
            match gn.motion_mode {
                Some(MotionMode::Traverse) => {
                    let target = cm.resolve_target(gn.target);
                    cm.straight_traverse(target, planner, line_number)?;
                }
                Some(MotionMode::Feed) => {
                    let target = cm.resolve_target(gn.target);
                    cm.straight_feed(target, planner, line_number)?;
                }
                Some(MotionMode::CwArc) | Some(MotionMode::CcwArc) => {
                    let target = cm.resolve_target(gn.target);
                    let direction = gn.arc_direction.unwrap_or(ArcDirection::Clockwise);
                    let offset = [
                        gn.arc_offset[0].unwrap_or(0.0),
                        gn.arc_offset[1].unwrap_or(0.0),
                        gn.arc_offset[2].unwrap_or(0.0),
                    ];
                    cm.arc_feed(target, offset, gn.arc_radius, direction, planner, line_number)?;
                }
                _ => {}
            }
        }

        if let Some(flow) = gn.program_flow {
            cm.modal.program_flow = flow;
        }
        if let Some(line_number) = gn.line_number {
            cm.modal.line_number = line_number;
        }

        let status = match gn.program_flow {
            Some(ProgramFlow::Completed) => StatusCode::Complete,
            _ => StatusCode::Ok,
        };
        Ok(ExecuteOutcome {
            status,
            dwell_seconds,
        })
    }
}
