//! The step executor (spec.md §4.5): runs from the periodic timer ISR,
//! pops the head segment of the segment queue, and pulses each axis's
//! STEP/DIRECTION lines the configured number of times.

use tinyg_common::hal::{Direction, GpioDriver, HalError};
use tinyg_common::position::Axis;

use crate::ring::Consumer;
use crate::segment::Segment;

/// Per-axis residual step count within the segment currently being
/// distributed across timer ticks.
struct AxisResidual {
    remaining: i32,
    direction: Direction,
}

/// Consumes segments from the SG→SE queue and distributes their steps one
/// pulse per ISR tick per axis, matching real stepper-driver pulse-width
/// constraints (one pulse per tick, never more).
pub struct StepExecutor {
    segments: Consumer<Segment>,
    residual: [AxisResidual; 6],
    polarity_reversed: [bool; 6],
}

impl StepExecutor {
    pub fn new(segments: Consumer<Segment>, polarity_reversed: [bool; 6]) -> Self {
        Self {
            segments,
            residual: std::array::from_fn(|_| AxisResidual {
                remaining: 0,
                direction: Direction::Positive,
            }),
            polarity_reversed,
        }
    }

    /// Run one ISR tick: if every axis's residual is drained, pop the next
    /// segment and latch its per-axis step counts and directions; then
    /// emit at most one pulse per axis this tick (spec.md §4.5: "Periodic
    /// timer ISR ... pulses the step line, and decrements the residual").
    ///
    /// Returns `true` if a pulse was emitted on any axis this tick.
    pub fn tick(&mut self, gpio: &mut dyn GpioDriver) -> Result<bool, HalError> {
        if self.residual.iter().all(|r| r.remaining == 0) {
            match self.segments.pop() {
                Some(seg) => self.load_segment(gpio, &seg)?,
                None => return Ok(false), // queue empty: a hold, no pulses
            }
        }

        let mut pulsed = false;
        for axis in Axis::ALL {
            let r = &mut self.residual[axis.index()];
            if r.remaining > 0 {
                gpio.step_pulse(axis)?;
                r.remaining -= 1;
                pulsed = true;
            }
        }
        Ok(pulsed)
    }

    fn load_segment(&mut self, gpio: &mut dyn GpioDriver, seg: &Segment) -> Result<(), HalError> {
        for axis in Axis::ALL {
            let idx = axis.index();
            let steps = seg.steps[idx];
            let logical_positive = steps >= 0;
            let direction = if logical_positive ^ self.polarity_reversed[idx] {
                Direction::Positive
            } else {
                Direction::Negative
            };
            self.residual[idx] = AxisResidual {
                remaining: steps.unsigned_abs() as i32,
                direction,
            };
            if steps != 0 {
                gpio.set_direction(axis, direction)?;
            }
        }
        Ok(())
    }
}
