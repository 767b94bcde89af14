//! The cycle runner: ties G-code parsing, the canonical machine, the
//! motion planner, the segment generator, and the step executor into one
//! runnable loop (spec.md §5 "Concurrency model").
//!
//! Three domains run inside [`CycleRunner::run`]:
//! - the **cooperative main loop**, draining whatever G-code lines the
//!   [`SerialDriver`] has buffered and feeding them to the parser;
//! - the **planner/segment-generator tick**, run once per cycle, which
//!   tops up the segment ring from the active planner block;
//! - the **step executor**, ticked `step_hz / cycle_hz` times per cycle
//!   against the injected [`TimerDriver`], standing in for the
//!   preemptive step-pulse ISR.
//!
//! RT setup (`mlockall`, CPU affinity, `SCHED_FIFO`) lives here behind the
//! `rt` Cargo feature, with a no-op fallback in simulation builds — the
//! same split the control-unit cycle loop this is grounded on uses.

use std::time::Instant;

use tinyg_common::config::MachineConfig;
use tinyg_common::hal::{GpioDriver, HalError, SerialDriver, TimerDriver};
use tinyg_common::status::StatusCode;

use crate::cm::CanonicalMachine;
use crate::error::CmError;
use crate::gcode::GcodeParser;
use crate::planner::MotionPlanner;
use crate::planner::block::PlannerBlock;
use crate::ring::{ring, Consumer, Producer};
use crate::segment::{Segment, SegmentGenerator};
use crate::stepper::StepExecutor;

/// O(1) per-cycle timing statistics, updated with no allocation.
#[derive(Debug, Clone, Copy)]
pub struct CycleStats {
    pub cycle_count: u64,
    pub last_cycle_ns: i64,
    pub min_cycle_ns: i64,
    pub max_cycle_ns: i64,
    pub sum_cycle_ns: i64,
    pub overruns: u64,
}

impl CycleStats {
    pub const fn new() -> Self {
        Self {
            cycle_count: 0,
            last_cycle_ns: 0,
            min_cycle_ns: i64::MAX,
            max_cycle_ns: 0,
            sum_cycle_ns: 0,
            overruns: 0,
        }
    }

    #[inline]
    pub fn record(&mut self, duration_ns: i64) {
        self.cycle_count += 1;
        self.last_cycle_ns = duration_ns;
        self.min_cycle_ns = self.min_cycle_ns.min(duration_ns);
        self.max_cycle_ns = self.max_cycle_ns.max(duration_ns);
        self.sum_cycle_ns += duration_ns;
    }

    #[inline]
    pub fn avg_cycle_ns(&self) -> i64 {
        if self.cycle_count == 0 {
            0
        } else {
            self.sum_cycle_ns / self.cycle_count as i64
        }
    }
}

impl Default for CycleStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Errors during RT setup or the cycle loop.
#[derive(Debug)]
pub enum CycleError {
    RtSetup(String),
    Hal(HalError),
}

impl std::fmt::Display for CycleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RtSetup(msg) => write!(f, "RT setup error: {msg}"),
            Self::Hal(e) => write!(f, "HAL error: {e}"),
        }
    }
}

impl std::error::Error for CycleError {}

impl From<HalError> for CycleError {
    fn from(e: HalError) -> Self {
        Self::Hal(e)
    }
}

// ─── RT setup ──────────────────────────────────────────────────────

#[cfg(feature = "rt")]
fn rt_mlockall() -> Result<(), CycleError> {
    use nix::sys::mman::{mlockall, MlockallFlags};
    mlockall(MlockallFlags::MCL_CURRENT | MlockallFlags::MCL_FUTURE)
        .map_err(|e| CycleError::RtSetup(format!("mlockall failed: {e}")))
}

#[cfg(not(feature = "rt"))]
fn rt_mlockall() -> Result<(), CycleError> {
    Ok(())
}

#[cfg(feature = "rt")]
fn rt_set_affinity(cpu: usize) -> Result<(), CycleError> {
    use nix::sched::{sched_setaffinity, CpuSet};
    use nix::unistd::Pid;

    let mut cpuset = CpuSet::new();
    cpuset
        .set(cpu)
        .map_err(|e| CycleError::RtSetup(format!("CpuSet::set({cpu}) failed: {e}")))?;
    sched_setaffinity(Pid::from_raw(0), &cpuset)
        .map_err(|e| CycleError::RtSetup(format!("sched_setaffinity failed: {e}")))
}

#[cfg(not(feature = "rt"))]
fn rt_set_affinity(_cpu: usize) -> Result<(), CycleError> {
    Ok(())
}

#[cfg(feature = "rt")]
fn rt_set_scheduler(priority: i32) -> Result<(), CycleError> {
    let param = libc::sched_param {
        sched_priority: priority,
    };
    let ret = unsafe { libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) };
    if ret != 0 {
        let err = std::io::Error::last_os_error();
        return Err(CycleError::RtSetup(format!(
            "sched_setscheduler(SCHED_FIFO, {priority}) failed: {err}"
        )));
    }
    Ok(())
}

#[cfg(not(feature = "rt"))]
fn rt_set_scheduler(_priority: i32) -> Result<(), CycleError> {
    Ok(())
}

/// Lock pages, pin to a CPU core, and request `SCHED_FIFO`. No-op in
/// simulation builds (no `rt` feature).
pub fn rt_setup(cpu_core: usize, rt_priority: i32) -> Result<(), CycleError> {
    rt_mlockall()?;
    rt_set_affinity(cpu_core)?;
    rt_set_scheduler(rt_priority)?;
    Ok(())
}

/// Hook for host-specific line-protocol prefixes (spec.md §6): given a raw
/// input line and the live cycle runner, either handle it and return the
/// text to write back to the host, or return `None` to let the line fall
/// through to ordinary G-code parsing. `tinyg_main` uses this to splice in
/// its `?` status-report and `$` config dialect without `tinyg_core`
/// needing to know either exists.
pub trait LineFilter {
    fn intercept(&mut self, cr: &mut CycleRunner, line: &str) -> Option<String>;
}

impl<F> LineFilter for F
where
    F: FnMut(&mut CycleRunner, &str) -> Option<String>,
{
    fn intercept(&mut self, cr: &mut CycleRunner, line: &str) -> Option<String> {
        self(cr, line)
    }
}

/// A [`LineFilter`] that never intercepts anything; every line reaches the
/// G-code parser. The default for callers with no host protocol to splice in.
pub struct NoFilter;

impl LineFilter for NoFilter {
    fn intercept(&mut self, _cr: &mut CycleRunner, _line: &str) -> Option<String> {
        None
    }
}

// ─── Cycle runner ──────────────────────────────────────────────────

/// Ties the five pipeline stages together and owns their shared queues.
pub struct CycleRunner {
    cm: CanonicalMachine,
    planner: MotionPlanner,
    gcode: GcodeParser,
    segment_gen: SegmentGenerator,
    active_block: Option<PlannerBlock>,
    segment_tx: Producer<Segment>,
    stepper: StepExecutor,
    stats: CycleStats,
    cycle_time_ns: i64,
    step_hz: u32,
    steps_per_cycle: u32,
    /// Seconds remaining on an in-progress G4 dwell; while `Some`, new
    /// G-code lines are held rather than parsed (spec.md §4.2 "Dwell").
    dwell_remaining_s: Option<f64>,
}

const SEGMENT_RING_CAPACITY: usize = 64;

impl CycleRunner {
    pub fn new(
        config: MachineConfig,
        cycle_hz: u32,
        step_hz: u32,
        planner_capacity: usize,
        polarity_reversed: [bool; 6],
    ) -> Self {
        let (segment_tx, segment_rx): (Producer<Segment>, Consumer<Segment>) =
            ring(SEGMENT_RING_CAPACITY);
        let starvation_threshold_s = config.global.starvation_threshold;
        Self {
            cm: CanonicalMachine::new(config),
            planner: MotionPlanner::new(planner_capacity, starvation_threshold_s),
            gcode: GcodeParser::new(),
            segment_gen: SegmentGenerator::new(),
            active_block: None,
            segment_tx,
            stepper: StepExecutor::new(segment_rx, polarity_reversed),
            stats: CycleStats::new(),
            cycle_time_ns: 1_000_000_000 / cycle_hz.max(1) as i64,
            step_hz,
            steps_per_cycle: (step_hz / cycle_hz.max(1)).max(1),
            dwell_remaining_s: None,
        }
    }

    pub fn canonical_machine(&self) -> &CanonicalMachine {
        &self.cm
    }

    pub fn canonical_machine_mut(&mut self) -> &mut CanonicalMachine {
        &mut self.cm
    }

    pub fn stats(&self) -> &CycleStats {
        &self.stats
    }

    pub fn planner_len(&self) -> usize {
        self.planner.len()
    }

    /// Parse and execute one line now (used directly by tests and by the
    /// host when it wants synchronous feedback instead of going through
    /// `run`'s serial-driven loop).
    pub fn submit_line(&mut self, line: &str) -> Result<StatusCode, CmError> {
        if self.dwell_remaining_s.is_some() {
            return Ok(StatusCode::Eagain);
        }
        let outcome = self.gcode.parse(line, &mut self.cm, &mut self.planner)?;
        if let Some(seconds) = outcome.dwell_seconds {
            if seconds > 0.0 {
                self.dwell_remaining_s = Some(seconds);
            }
        }
        Ok(outcome.status)
    }

    pub fn feed_hold(&mut self) {
        self.planner.feed_hold();
    }

    pub fn reset(&mut self) {
        self.planner.reset();
        self.active_block = None;
        self.dwell_remaining_s = None;
    }

    /// Enter the cycle loop: drains `serial` for G-code lines, advances
    /// the planner/segment-generator domain once per cycle, and ticks the
    /// step executor `step_hz / cycle_hz` times against `timer` each
    /// cycle. Never returns under normal operation.
    pub fn run(
        &mut self,
        serial: &mut dyn SerialDriver,
        gpio: &mut dyn GpioDriver,
        timer: &mut dyn TimerDriver,
        filter: &mut dyn LineFilter,
    ) -> Result<(), CycleError> {
        timer.set_rate_hz(self.step_hz)?;

        loop {
            let cycle_start = Instant::now();

            self.drain_serial(serial, filter)?;
            self.tick_planner_and_segments();
            for _ in 0..self.steps_per_cycle {
                timer.wait_tick()?;
                self.stepper.tick(gpio)?;
            }

            let duration_ns = cycle_start.elapsed().as_nanos() as i64;
            self.stats.record(duration_ns);
            if duration_ns > self.cycle_time_ns {
                self.stats.overruns += 1;
            }

            let remaining = self.cycle_time_ns - duration_ns;
            if remaining > 0 {
                std::thread::sleep(std::time::Duration::from_nanos(remaining as u64));
            }
        }
    }

    fn drain_serial(
        &mut self,
        serial: &mut dyn SerialDriver,
        filter: &mut dyn LineFilter,
    ) -> Result<(), CycleError> {
        if let Some(remaining) = self.dwell_remaining_s {
            let elapsed = 1.0 / (1_000_000_000.0 / self.cycle_time_ns as f64);
            let left = remaining - elapsed;
            self.dwell_remaining_s = if left > 0.0 { Some(left) } else { None };
            return Ok(());
        }

        let mut buf = [0u8; 256];
        let n = serial.read(&mut buf)?;
        if n == 0 {
            return Ok(());
        }
        if let Ok(text) = std::str::from_utf8(&buf[..n]) {
            for line in text.lines() {
                if line.is_empty() {
                    continue;
                }
                if let Some(response) = filter.intercept(self, line) {
                    serial.write(response.as_bytes())?;
                    serial.write(b"\n")?;
                    continue;
                }
                let status = match self.submit_line(line) {
                    Ok(status) => status,
                    Err(e) => StatusCode::from(e),
                };
                let report = format!("{status:?}\n");
                serial.write(report.as_bytes())?;
            }
        }
        Ok(())
    }

    /// Run one tick of the planner/segment-generator domain: activate the
    /// next READY block if none is active, generate segments until the
    /// ring is full or the active block completes, and advance the
    /// machine position when a block finishes (spec.md §4.3, §4.4).
    fn tick_planner_and_segments(&mut self) {
        loop {
            if self.active_block.is_none() {
                self.active_block = self.planner.activate_next();
                if self.active_block.is_some() {
                    self.segment_gen.start_block();
                }
            }
            let Some(block) = &self.active_block else {
                return;
            };
            if self.segment_tx.is_full() {
                return;
            }
            match self.segment_gen.next_segment(block) {
                Some(segment) => {
                    let end_of_block = segment.end_of_block;
                    let _ = self.segment_tx.push(segment);
                    if end_of_block {
                        self.planner.complete_head();
                        self.active_block = None;
                    }
                }
                None => {
                    self.planner.complete_head();
                    self.active_block = None;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use heapless::Vec as HVec;
    use tinyg_common::config::zen7x12_default;
    use tinyg_common::hal::Direction;
    use tinyg_common::position::Axis;

    struct NullGpio;
    impl GpioDriver for NullGpio {
        fn set_direction(&mut self, _axis: Axis, _direction: Direction) -> Result<(), HalError> {
            Ok(())
        }
        fn set_enable(&mut self, _axis: Axis, _enabled: bool) -> Result<(), HalError> {
            Ok(())
        }
        fn step_pulse(&mut self, _axis: Axis) -> Result<(), HalError> {
            Ok(())
        }
        fn poll_limit_events(&mut self) -> Result<HVec<Axis, 6>, HalError> {
            Ok(HVec::new())
        }
    }

    fn runner() -> CycleRunner {
        CycleRunner::new(zen7x12_default(), 1000, 50_000, 16, [false; 6])
    }

    #[test]
    fn submit_line_enqueues_and_reports_ok() {
        let mut cr = runner();
        let status = cr.submit_line("G0 X10").unwrap();
        assert_eq!(status, StatusCode::Ok);
        assert_eq!(cr.planner_len(), 1);
    }

    #[test]
    fn scenario_s5_queue_back_pressure_reports_queue_full() {
        let mut cr = CycleRunner::new(zen7x12_default(), 1000, 50_000, 1, [false; 6]);
        cr.submit_line("G0 X10").unwrap();
        let err = cr.submit_line("G0 X20").unwrap_err();
        assert_eq!(StatusCode::from(err), StatusCode::QueueFull);
    }

    #[test]
    fn dwell_blocks_subsequent_lines_until_elapsed() {
        let mut cr = runner();
        cr.submit_line("G4 P10").unwrap();
        let status = cr.submit_line("G0 X1").unwrap();
        assert_eq!(status, StatusCode::Eagain);
    }

    #[test]
    fn tick_drives_a_block_to_completion() {
        let mut cr = runner();
        cr.submit_line("G0 X1 F600").unwrap();
        let mut gpio = NullGpio;
        for _ in 0..500 {
            cr.tick_planner_and_segments();
        }
        assert_eq!(cr.planner_len(), 0);
        let _ = &mut gpio; // consumed only to mirror run()'s call shape
    }

    #[test]
    fn feed_hold_then_reset_clears_queue() {
        let mut cr = runner();
        cr.submit_line("G0 X10").unwrap();
        cr.feed_hold();
        cr.reset();
        assert_eq!(cr.planner_len(), 0);
    }
}
