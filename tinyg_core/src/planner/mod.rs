//! The motion planner (spec.md §4.3): an indexed queue of [`PlannerBlock`]s,
//! junction-velocity-bounded backward/forward recomputation passes, and the
//! jerk-limited phase split that hands each block its head/body/tail
//! S-curve ramps.
//!
//! Unlike [`crate::ring`] (a pure FIFO used for the segment queue), the
//! planner needs indexed access into the tail of the queue to re-plan
//! entry/exit velocities across several still-pending blocks, so it is
//! backed by a fixed-capacity `VecDeque` guarded by the READY/ACTIVE state
//! split described in spec.md §4.3 "Re-planning rule": only READY blocks are
//! ever mutated by a backward/forward pass, never an ACTIVE one.

pub mod block;
pub mod junction;
pub mod scurve;

use std::collections::VecDeque;
use std::time::Instant;

use tinyg_common::position::Position;

use crate::cm::types::PathControl;
use crate::error::PlannerError;
use block::{BlockState, PlannerBlock};
use junction::junction_velocity;
use scurve::SCurveRamp;

/// One axis's kinematic limits as seen by the planner, already reduced to
/// the minimum across participating axes for a given move (spec.md §4.3
/// step 3: "acceleration, jerk limits derived min across participating
/// axes").
#[derive(Debug, Clone, Copy)]
pub struct MoveLimits {
    pub cruise_cap: f64,
    pub amax: f64,
    pub jmax: f64,
    pub junction_deviation: f64,
}

/// Parameters for one motion the canonical machine wants planned.
pub struct MoveRequest {
    pub target: Position,
    pub direction: [f64; 6],
    pub length: f64,
    pub steps: [i64; 6],
    pub requested_feed: Option<f64>,
    pub path_control: PathControl,
    pub limits: MoveLimits,
    pub line_number: u32,
}

/// Bounded queue of planner blocks plus the starvation-guard clock
/// (spec.md §4.3 "Starvation guard").
pub struct MotionPlanner {
    queue: VecDeque<PlannerBlock>,
    capacity: usize,
    empty_since: Option<Instant>,
    starvation_threshold_s: f64,
}

impl MotionPlanner {
    pub fn new(capacity: usize, starvation_threshold_s: f64) -> Self {
        assert!(capacity > 0, "planner capacity must be nonzero");
        Self {
            queue: VecDeque::with_capacity(capacity),
            capacity,
            empty_since: None,
            starvation_threshold_s,
        }
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.queue.len() >= self.capacity
    }

    /// Plan and enqueue one move (spec.md §4.3 "Per-block planning").
    /// Returns [`PlannerError::QueueFull`] with no side effects if the
    /// queue has no room — the caller (CM) rolls its optimistic position
    /// update back on this path.
    pub fn enqueue(&mut self, req: MoveRequest) -> Result<(), PlannerError> {
        if self.is_full() {
            return Err(PlannerError::QueueFull);
        }

        let cruise = match req.requested_feed {
            Some(feed) => feed.min(req.limits.cruise_cap),
            None => req.limits.cruise_cap,
        };

        let deviation = match req.path_control {
            PathControl::ExactStop => 0.0,
            PathControl::ExactPath | PathControl::Continuous => req.limits.junction_deviation,
        };

        let junction = if let Some(prev) = self.queue.back() {
            if deviation <= 0.0 {
                0.0
            } else {
                junction_velocity(prev.direction, req.direction, deviation, req.limits.amax)
                    .min(prev.cruise)
                    .min(cruise)
            }
        } else {
            0.0
        };

        let block = PlannerBlock {
            target: req.target,
            direction: req.direction,
            length: req.length,
            steps: req.steps,
            entry: junction,
            cruise,
            exit: 0.0,
            amax: req.limits.amax,
            jmax: req.limits.jmax,
            path_control: req.path_control,
            state: BlockState::Planning,
            head: SCurveRamp::new(0.0, 0.0, req.limits.amax, req.limits.jmax),
            tail: SCurveRamp::new(0.0, 0.0, req.limits.amax, req.limits.jmax),
            body_time_s: 0.0,
            line_number: req.line_number,
        };

        // Wire the new block's entry back into the previous block: the
        // predecessor's exit must match this block's entry (Velocity
        // continuity invariant, spec.md §3).
        if let Some(prev) = self.queue.back_mut() {
            if prev.state == BlockState::Planning || prev.state == BlockState::Ready {
                prev.exit = junction;
            }
        }

        self.queue.push_back(block);
        self.replan();
        self.empty_since = None;
        Ok(())
    }

    /// Re-run the backward and forward passes over every non-ACTIVE block,
    /// then phase-split each, and mark fixpoint-reached blocks READY
    /// (spec.md §4.3 "Re-planning rule").
    fn replan(&mut self) {
        self.backward_pass();
        self.forward_pass();

        for block in self.queue.iter_mut() {
            if block.state == BlockState::Planning {
                phase_split(block);
                block.state = BlockState::Ready;
            }
        }
    }

    /// Walking from the newest block back through non-ACTIVE blocks, lower
    /// each block's entry if it cannot decelerate to the successor's entry
    /// within its own length (spec.md §4.3 "Backward pass").
    fn backward_pass(&mut self) {
        let len = self.queue.len();
        if len < 2 {
            return;
        }
        for i in (0..len - 1).rev() {
            let (exit, amax, length) = {
                let next = &self.queue[i + 1];
                let this = &self.queue[i];
                (next.entry, this.amax, this.length)
            };
            let block = &mut self.queue[i];
            if block.state == BlockState::Active || is_downstream_of_active(&self.queue, i) {
                continue;
            }
            let entry_max = (exit * exit + 2.0 * amax * length).sqrt();
            if block.entry > entry_max {
                block.entry = entry_max;
            }
        }
        // Second left-to-right sweep to propagate the tightened entries
        // into each predecessor's `exit` field (A.exit == B.entry).
        for i in 0..len.saturating_sub(1) {
            let next_entry = self.queue[i + 1].entry;
            if self.queue[i].state != BlockState::Active {
                self.queue[i].exit = next_entry;
            }
        }
    }

    /// Walking forward, raise each block's exit where its predecessor can
    /// accelerate into it, capped by the successor's entry (spec.md §4.3
    /// "Forward pass").
    fn forward_pass(&mut self) {
        let len = self.queue.len();
        if len < 2 {
            return;
        }
        for i in 0..len - 1 {
            let (entry, amax, length, cruise) = {
                let this = &self.queue[i];
                (this.entry, this.amax, this.length, this.cruise)
            };
            let successor_entry_cap = self.queue[i + 1].entry;
            let exit_max = (entry * entry + 2.0 * amax * length).sqrt();
            let raised = exit_max.min(cruise).min(successor_entry_cap);
            if self.queue[i].state != BlockState::Active && raised > self.queue[i].exit {
                self.queue[i].exit = raised;
                if self.queue[i + 1].state != BlockState::Active {
                    self.queue[i + 1].entry = raised;
                }
            }
        }
    }

    /// Mark the head-of-queue block ACTIVE and return a clone for the
    /// segment generator to consume. Applies the starvation guard
    /// (spec.md §4.3): if the queue has been empty longer than the
    /// configured threshold and a block just arrived, its exit (and the
    /// new head's entry) is forced to zero rather than trusting a junction
    /// velocity planned against a predecessor that may never arrive.
    pub fn activate_next(&mut self) -> Option<PlannerBlock> {
        let starved = self
            .empty_since
            .map(|since| since.elapsed().as_secs_f64() >= self.starvation_threshold_s)
            .unwrap_or(false);

        let block = self.queue.front_mut()?;
        if block.state != BlockState::Ready {
            return None;
        }
        if starved {
            block.entry = 0.0;
            phase_split(block);
        }
        block.state = BlockState::Active;
        Some(block.clone())
    }

    /// Remove the completed head-of-queue block, releasing its slot.
    pub fn complete_head(&mut self) {
        self.queue.pop_front();
        if self.queue.is_empty() {
            self.empty_since = Some(Instant::now());
        }
    }

    /// Force the in-flight (ACTIVE) block to decelerate to a full stop,
    /// and every still-READY block behind it to enter at zero (spec.md §5
    /// "Cancellation": feed-hold forces EXACT_STOP semantics).
    pub fn feed_hold(&mut self) {
        let mut force_zero_entry = false;
        for block in self.queue.iter_mut() {
            if block.state == BlockState::Active {
                block.force_stop_exit();
                phase_split(block);
                force_zero_entry = true;
                continue;
            }
            if force_zero_entry {
                block.entry = 0.0;
                phase_split(block);
                force_zero_entry = false; // only the immediate successor
            }
        }
    }

    /// Hard reset: drop every queued block regardless of state (spec.md §5
    /// "Cancellation": hard reset flushes all queues).
    pub fn reset(&mut self) {
        self.queue.clear();
        self.empty_since = Some(Instant::now());
    }
}

fn is_downstream_of_active(queue: &VecDeque<PlannerBlock>, idx: usize) -> bool {
    queue
        .iter()
        .take(idx)
        .any(|b| b.state == BlockState::Active)
}

/// Split a block's entry→cruise→exit velocity profile into head/body/tail
/// phases (spec.md §4.3 "Phase split"). If a full head+tail would exceed
/// the block's length, cruise is lowered to the largest feasible value and
/// the body collapses to zero duration.
pub fn phase_split(block: &mut PlannerBlock) {
    let amax = block.amax;
    let jmax = block.jmax;
    let entry = block.entry;
    let exit = block.exit;
    let length = block.length;

    let accel_distance = |v0: f64, v1: f64| -> f64 {
        if v1 <= v0 {
            return 0.0;
        }
        (v1 * v1 - v0 * v0) / (2.0 * amax)
    };

    let mut cruise = block.cruise.max(entry).max(exit);
    let est_head_dist = accel_distance(entry, cruise);
    let est_tail_dist = accel_distance(exit, cruise);

    if est_head_dist + est_tail_dist > length {
        // Solve L = (V^2 - entry^2)/(2a) + (V^2 - exit^2)/(2a) for V. This
        // const-accel estimate is only a starting point for `cruise` — the
        // jerk-limited ramps built below are what actually get integrated.
        let v_sq = amax * length + (entry * entry + exit * exit) / 2.0;
        cruise = v_sq.max(0.0).sqrt().max(entry).max(exit);
    }

    block.cruise = cruise;

    // `SCurveRamp` operates in mm/s and seconds; block entry/cruise/exit
    // and amax/jmax are mm/min-denominated (spec.md §3 "Planner block"),
    // so convert at this boundary rather than carrying mixed units into
    // the segment generator's per-tick integration.
    let amax_per_s2 = amax / 3600.0;
    let jmax_per_s3 = jmax / 216_000.0;
    block.head = SCurveRamp::new(entry / 60.0, cruise / 60.0, amax_per_s2, jmax_per_s3);
    block.tail = SCurveRamp::new(cruise / 60.0, exit / 60.0, amax_per_s2, jmax_per_s3);

    // The segment generator integrates these ramps directly (not the
    // const-accel estimate above), and a jerk-limited S-curve covers more
    // ground than a const-accel ramp between the same endpoints. Size the
    // body off the ramps' own displacement so head + body + tail sums to
    // `length` exactly, instead of leaking the difference into overshoot.
    let head_dist = block.head.displacement();
    let tail_dist = block.tail.displacement();
    let body_dist = (length - head_dist - tail_dist).max(0.0);
    block.body_time_s = if cruise > 0.0 { body_dist / cruise * 60.0 } else { 0.0 };
}

#[cfg(test)]
mod tests {
    use super::*;
    use tinyg_common::position::Position;

    fn limits() -> MoveLimits {
        MoveLimits {
            cruise_cap: 1000.0,
            amax: 50_000.0,
            jmax: 5_000_000.0,
            junction_deviation: 0.05,
        }
    }

    fn move_x(length: f64, feed: Option<f64>, path_control: PathControl) -> MoveRequest {
        MoveRequest {
            target: Position::new([length, 0.0, 0.0, 0.0, 0.0, 0.0]),
            direction: [1.0, 0.0, 0.0, 0.0, 0.0, 0.0],
            length,
            steps: [0; 6],
            requested_feed: feed,
            path_control,
            limits: limits(),
            line_number: 0,
        }
    }

    #[test]
    fn single_block_enters_and_exits_at_zero() {
        let mut mp = MotionPlanner::new(8, 0.1);
        mp.enqueue(move_x(100.0, Some(500.0), PathControl::ExactStop))
            .unwrap();
        let block = &mp.queue[0];
        assert_eq!(block.state, BlockState::Ready);
        assert_eq!(block.entry, 0.0);
        assert_eq!(block.exit, 0.0);
    }

    #[test]
    fn queue_full_is_rejected_without_side_effects() {
        let mut mp = MotionPlanner::new(1, 0.1);
        mp.enqueue(move_x(10.0, None, PathControl::Continuous))
            .unwrap();
        let err = mp.enqueue(move_x(10.0, None, PathControl::Continuous));
        assert_eq!(err, Err(PlannerError::QueueFull));
        assert_eq!(mp.len(), 1);
    }

    #[test]
    fn continuous_path_control_gives_nonzero_junction_velocity() {
        let mut mp = MotionPlanner::new(8, 0.1);
        mp.enqueue(move_x(100.0, Some(500.0), PathControl::Continuous))
            .unwrap();
        let mut second = move_x(100.0, Some(500.0), PathControl::Continuous);
        second.direction = [0.0, 1.0, 0.0, 0.0, 0.0, 0.0];
        mp.enqueue(second).unwrap();
        assert!(mp.queue[0].exit > 0.0);
        assert_eq!(mp.queue[0].exit, mp.queue[1].entry);
    }

    #[test]
    fn exact_stop_forces_zero_junction_velocity() {
        let mut mp = MotionPlanner::new(8, 0.1);
        mp.enqueue(move_x(100.0, Some(500.0), PathControl::ExactStop))
            .unwrap();
        let mut second = move_x(100.0, Some(500.0), PathControl::ExactStop);
        second.direction = [0.0, 1.0, 0.0, 0.0, 0.0, 0.0];
        mp.enqueue(second).unwrap();
        assert_eq!(mp.queue[0].exit, 0.0);
        assert_eq!(mp.queue[1].entry, 0.0);
    }

    #[test]
    fn short_block_lowers_cruise_instead_of_overshooting_length() {
        let mut block = PlannerBlock {
            target: Position::ZERO,
            direction: [1.0, 0.0, 0.0, 0.0, 0.0, 0.0],
            length: 0.01,
            steps: [0; 6],
            entry: 0.0,
            cruise: 10_000.0,
            exit: 0.0,
            amax: 50_000.0,
            jmax: 5_000_000.0,
            path_control: PathControl::Continuous,
            state: BlockState::Planning,
            head: SCurveRamp::new(0.0, 0.0, 50_000.0, 5_000_000.0),
            tail: SCurveRamp::new(0.0, 0.0, 50_000.0, 5_000_000.0),
            body_time_s: 0.0,
            line_number: 0,
        };
        phase_split(&mut block);
        assert!(block.cruise < 10_000.0);
        assert_eq!(block.body_time_s, 0.0);
    }

    #[test]
    fn activate_next_only_takes_ready_head() {
        let mut mp = MotionPlanner::new(8, 0.1);
        mp.enqueue(move_x(100.0, Some(500.0), PathControl::ExactStop))
            .unwrap();
        let active = mp.activate_next();
        assert!(active.is_some());
        assert_eq!(mp.queue[0].state, BlockState::Active);
        assert!(mp.activate_next().is_none());
    }

    #[test]
    fn feed_hold_zeroes_active_block_exit() {
        let mut mp = MotionPlanner::new(8, 0.1);
        mp.enqueue(move_x(100.0, Some(500.0), PathControl::Continuous))
            .unwrap();
        mp.enqueue(move_x(100.0, Some(500.0), PathControl::Continuous))
            .unwrap();
        mp.activate_next();
        mp.feed_hold();
        assert_eq!(mp.queue[0].exit, 0.0);
        assert_eq!(mp.queue[1].entry, 0.0);
    }

    #[test]
    fn reset_clears_queue_regardless_of_state() {
        let mut mp = MotionPlanner::new(8, 0.1);
        mp.enqueue(move_x(100.0, Some(500.0), PathControl::Continuous))
            .unwrap();
        mp.activate_next();
        mp.reset();
        assert!(mp.is_empty());
    }
}
