//! Cross-module integration tests exercising the full
//! parser → canonical-machine → planner → segment-generator → step-executor
//! pipeline, mirroring the scenarios in spec.md §8 that need more than one
//! module wired together (S2 cornering, S5 queue back-pressure, S6
//! feed-hold/resume).

use tinyg_common::config::zen7x12_default;
use tinyg_common::hal::{Direction, GpioDriver, HalError};
use tinyg_common::position::Axis;
use tinyg_common::status::StatusCode;

use tinyg_core::cm::CanonicalMachine;
use tinyg_core::error::CmError;
use tinyg_core::gcode::GcodeParser;
use tinyg_core::planner::MotionPlanner;
use tinyg_core::ring::ring;
use tinyg_core::segment::SegmentGenerator;
use tinyg_core::stepper::StepExecutor;

#[derive(Default)]
struct RecordingGpio {
    pulses: std::collections::HashMap<Axis, u32>,
}

impl GpioDriver for RecordingGpio {
    fn set_direction(&mut self, _axis: Axis, _direction: Direction) -> Result<(), HalError> {
        Ok(())
    }
    fn set_enable(&mut self, _axis: Axis, _enabled: bool) -> Result<(), HalError> {
        Ok(())
    }
    fn step_pulse(&mut self, axis: Axis) -> Result<(), HalError> {
        *self.pulses.entry(axis).or_insert(0) += 1;
        Ok(())
    }
    fn poll_limit_events(&mut self) -> Result<heapless::Vec<Axis, 6>, HalError> {
        Ok(heapless::Vec::new())
    }
}

/// Expected X-axis pulse count for a move of `length_mm` on the
/// `zen7x12_default` profile, per spec.md §8 property 3: summed segment
/// steps must equal the block's target step count exactly.
fn expected_x_steps(length_mm: f64) -> u32 {
    let steps_per_unit = zen7x12_default()
        .axis_config(Axis::X)
        .expect("X axis present in default profile")
        .steps_per_unit();
    (length_mm * steps_per_unit).round() as u32
}

fn harness() -> (GcodeParser, CanonicalMachine, MotionPlanner) {
    (
        GcodeParser::new(),
        CanonicalMachine::new(zen7x12_default()),
        MotionPlanner::new(16, 0.1),
    )
}

/// Feed every segment of a single activated block through the step
/// executor to completion, the way `CycleRunner::tick_planner_and_segments`
/// and its stepper ticks do together over many cycles.
fn drain_block(
    block: &tinyg_core::planner::block::PlannerBlock,
    gpio: &mut RecordingGpio,
) {
    let (tx, rx) = ring(256);
    let mut se = StepExecutor::new(rx, [false; 6]);
    let mut sg = SegmentGenerator::new();
    sg.start_block();

    loop {
        match sg.next_segment(block) {
            Some(segment) => {
                let end = segment.end_of_block;
                tx.push(segment).expect("segment ring has room for one block");
                if end {
                    break;
                }
            }
            None => break,
        }
    }
    while se.tick(gpio).unwrap() {}
}

/// Activate and drain every block currently in the planner queue, the way
/// the cycle runner does across many cycles.
fn run_to_completion(mp: &mut MotionPlanner, gpio: &mut RecordingGpio) {
    while let Some(block) = mp.activate_next() {
        drain_block(&block, gpio);
        mp.complete_head();
    }
}

#[test]
fn s2_cornering_chains_exit_to_entry_velocity() {
    let (mut gp, mut cm, mut mp) = harness();
    gp.parse("G1 F600 X10", &mut cm, &mut mp).unwrap();
    gp.parse("G1 Y10", &mut cm, &mut mp).unwrap();
    assert_eq!(mp.len(), 2);

    let first = mp.activate_next().expect("first block ready");
    assert!(first.exit > 0.0, "cornering should carry nonzero junction velocity");
    let delta = 0.05_f64; // junction_deviation in zen7x12_default
    let sin_half = 45f64.to_radians().sin();
    let bound = (first.amax * delta * sin_half / (1.0 - sin_half)).sqrt();
    assert!(first.exit <= bound + 1e-6);

    mp.complete_head();
    let second = mp.activate_next().expect("second block ready");
    assert!((first.exit - second.entry).abs() < 1e-6);
}

#[test]
fn s5_queue_back_pressure_preserves_position_until_drained() {
    let mut gp = GcodeParser::new();
    let mut cm = CanonicalMachine::new(zen7x12_default());
    let mut mp = MotionPlanner::new(1, 0.1);

    gp.parse("G0 X10", &mut cm, &mut mp).unwrap();
    let position_after_first = cm.position();

    let err = gp.parse("G0 X20", &mut cm, &mut mp).unwrap_err();
    assert!(matches!(err, CmError::Planner(_)));
    assert_eq!(StatusCode::from(err), StatusCode::QueueFull);
    assert_eq!(
        cm.position().0,
        position_after_first.0,
        "position must not advance on QUEUE_FULL"
    );

    // Drain the queue (simulating the segment generator consuming it),
    // then retry: it must now succeed and reach the correct endpoint.
    let mut gpio = RecordingGpio::default();
    run_to_completion(&mut mp, &mut gpio);
    assert!(mp.is_empty());
    assert_eq!(gpio.pulses[&Axis::X], expected_x_steps(10.0));

    gp.parse("G0 X20", &mut cm, &mut mp).unwrap();
    run_to_completion(&mut mp, &mut gpio);
    assert!((cm.position().0[0] - 20.0).abs() < 1e-9);
    assert_eq!(
        gpio.pulses[&Axis::X],
        expected_x_steps(10.0) + expected_x_steps(10.0),
        "summed pulses must equal the summed target step counts exactly"
    );
}

#[test]
fn s6_feed_hold_then_resume_reaches_same_endpoint() {
    let (mut gp, mut cm, mut mp) = harness();
    gp.parse("G1 F600 X50", &mut cm, &mut mp).unwrap();
    gp.parse("G1 X100", &mut cm, &mut mp).unwrap();

    let mut gpio = RecordingGpio::default();

    // Activate the head block, then hold: feed_hold reshapes whichever
    // block is ACTIVE in the live queue, forcing its tail to a full stop
    // and the still-READY successor's entry to zero. `activate_next`
    // hands out a clone and won't reissue one for an already-ACTIVE
    // block, so mirror the same reshape on our clone before draining it.
    let mut held = mp.activate_next().expect("first block ready");
    mp.feed_hold();
    held.force_stop_exit();
    tinyg_core::planner::phase_split(&mut held);
    assert_eq!(held.exit, 0.0, "a held block must decelerate to a full stop");
    drain_block(&held, &mut gpio);
    mp.complete_head();

    // Resume: the successor now enters at zero and should still complete
    // to the same planned endpoint.
    run_to_completion(&mut mp, &mut gpio);
    assert!(mp.is_empty());
    assert!((cm.position().0[0] - 100.0).abs() < 1e-9);
    assert_eq!(
        gpio.pulses[&Axis::X],
        expected_x_steps(100.0),
        "feed-hold and resume must not lose or duplicate steps"
    );
}
