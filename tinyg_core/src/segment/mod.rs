//! The segment generator (spec.md §4.4): slices one ACTIVE [`PlannerBlock`]
//! into fixed-duration segments, integrating the block's current S-curve
//! phase to a per-axis step increment via a carry-forward sub-step
//! accumulator.

use tinyg_common::consts::DEFAULT_SEGMENT_SECONDS;

use crate::planner::block::{BlockState, PlannerBlock};

/// One fixed-duration slice of an ACTIVE block, queued for the step
/// executor (spec.md §3 "Segment").
#[derive(Debug, Clone, Copy)]
pub struct Segment {
    /// Per-axis signed step count to emit during this segment.
    pub steps: [i32; 6],
    /// Segment duration, seconds.
    pub duration_s: f64,
    /// `true` if this is the final segment of its block.
    pub end_of_block: bool,
}

/// Which S-curve phase the generator is currently integrating within a
/// block (spec.md §4.4: "head -> body -> tail -> complete are driven by
/// elapsed time within the phase").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Head,
    Body,
    Tail,
}

/// Per-axis carry-forward fractional step accumulator plus the active
/// block's phase-tracking cursor.
pub struct SegmentGenerator {
    segment_seconds: f64,
    accumulator: [f64; 6],
    phase: Phase,
    /// Elapsed time since the start of the current phase, seconds.
    phase_elapsed_s: f64,
}

impl SegmentGenerator {
    pub fn new() -> Self {
        Self::with_segment_duration(DEFAULT_SEGMENT_SECONDS)
    }

    pub fn with_segment_duration(segment_seconds: f64) -> Self {
        Self {
            segment_seconds,
            accumulator: [0.0; 6],
            phase: Phase::Head,
            phase_elapsed_s: 0.0,
        }
    }

    /// Begin generating segments for a freshly-ACTIVE block. Resets the
    /// phase cursor; the sub-step accumulator is intentionally *not*
    /// reset, since fractional step error carries across block boundaries
    /// to avoid a systematic long-run position drift.
    pub fn start_block(&mut self) {
        self.phase = Phase::Head;
        self.phase_elapsed_s = 0.0;
    }

    /// Produce the next segment for `block`, advancing the phase cursor.
    /// Returns `None` once every phase has been fully consumed — the
    /// caller then marks the block COMPLETE and updates the CM position
    /// to `block.target` (spec.md §4.4).
    pub fn next_segment(&mut self, block: &PlannerBlock) -> Option<Segment> {
        debug_assert!(matches!(
            block.state,
            BlockState::Active | BlockState::RunningHead | BlockState::RunningBody | BlockState::RunningTail
        ));

        loop {
            let phase_duration = match self.phase {
                Phase::Head => block.head.duration(),
                Phase::Body => block.body_time_s,
                Phase::Tail => block.tail.duration(),
            };

            if self.phase_elapsed_s >= phase_duration {
                match self.advance_phase() {
                    Some(()) => continue,
                    None => return None,
                }
            }

            let remaining = phase_duration - self.phase_elapsed_s;
            let dt = remaining.min(self.segment_seconds);
            let t0 = self.phase_elapsed_s;
            let t1 = self.phase_elapsed_s + dt;

            // Head/tail ramps are mm/s-denominated (see `phase_split`);
            // the body phase runs at the block's mm/min cruise, so it
            // alone needs converting to match.
            let velocity_mm_per_s = match self.phase {
                Phase::Head => {
                    (block.head.velocity_at(t0) + block.head.velocity_at(t1)) / 2.0
                }
                Phase::Body => block.cruise / 60.0,
                Phase::Tail => {
                    (block.tail.velocity_at(t0) + block.tail.velocity_at(t1)) / 2.0
                }
            };
            let distance = velocity_mm_per_s * dt;
            let fraction = if block.length > 0.0 { distance / block.length } else { 0.0 };

            let mut steps = [0i32; 6];
            for axis in 0..6 {
                self.accumulator[axis] += fraction * block.steps[axis] as f64;
                let whole = self.accumulator[axis].trunc();
                self.accumulator[axis] -= whole;
                steps[axis] = whole as i32;
            }

            self.phase_elapsed_s = t1;
            let end_of_block = self.phase == Phase::Tail && t1 >= phase_duration;

            return Some(Segment {
                steps,
                duration_s: dt,
                end_of_block,
            });
        }
    }

    /// Move to the next phase, resetting the elapsed clock. Returns `None`
    /// once the tail phase itself is exhausted.
    fn advance_phase(&mut self) -> Option<()> {
        self.phase = match self.phase {
            Phase::Head => Phase::Body,
            Phase::Body => Phase::Tail,
            Phase::Tail => return None,
        };
        self.phase_elapsed_s = 0.0;
        Some(())
    }
}

impl Default for SegmentGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cm::types::PathControl;
    use crate::planner::scurve::SCurveRamp;
    use tinyg_common::position::Position;

    fn flat_block(length: f64, steps_per_axis: i64, cruise: f64) -> PlannerBlock {
        let amax = 50_000.0;
        let jmax = 5_000_000.0;
        PlannerBlock {
            target: Position::new([length, 0.0, 0.0, 0.0, 0.0, 0.0]),
            direction: [1.0, 0.0, 0.0, 0.0, 0.0, 0.0],
            length,
            steps: [steps_per_axis, 0, 0, 0, 0, 0],
            entry: cruise,
            cruise,
            exit: cruise,
            amax,
            jmax,
            path_control: PathControl::Continuous,
            state: BlockState::Active,
            head: SCurveRamp::new(cruise, cruise, amax, jmax),
            tail: SCurveRamp::new(cruise, cruise, amax, jmax),
            body_time_s: length / cruise * 60.0,
            line_number: 0,
        }
    }

    #[test]
    fn constant_velocity_block_emits_segments_until_exhausted() {
        let block = flat_block(10.0, 1000, 600.0);
        let mut sg = SegmentGenerator::new();
        sg.start_block();
        let mut total_steps = 0i64;
        let mut saw_end = false;
        for _ in 0..10_000 {
            match sg.next_segment(&block) {
                Some(seg) => {
                    total_steps += seg.steps[0] as i64;
                    if seg.end_of_block {
                        saw_end = true;
                        break;
                    }
                }
                None => break,
            }
        }
        assert!(saw_end);
        assert!((total_steps - 1000).abs() <= 2);
    }

    #[test]
    fn zero_length_block_terminates_immediately() {
        let mut block = flat_block(0.0, 0, 0.0);
        block.body_time_s = 0.0;
        block.head = SCurveRamp::new(0.0, 0.0, block.amax, block.jmax);
        block.tail = SCurveRamp::new(0.0, 0.0, block.amax, block.jmax);
        let mut sg = SegmentGenerator::new();
        sg.start_block();
        let seg = sg.next_segment(&block);
        assert!(seg.is_none() || seg.unwrap().end_of_block);
    }
}
