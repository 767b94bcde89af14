//! Position vectors and persisted coordinate-system offsets.
//!
//! Storage units are always millimeters (linear axes) or degrees (rotary
//! axes A/B/C), regardless of the G-code program's active unit mode —
//! unit conversion happens once, in the canonical machine.

use serde::{Deserialize, Serialize};
use std::ops::{Index, IndexMut};

use crate::consts::{AXIS_LETTERS, NUM_AXES, NUM_COORDINATE_SYSTEMS};

/// One of the six supported axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    X,
    Y,
    Z,
    A,
    B,
    C,
}

impl Axis {
    /// All axes, in storage order.
    pub const ALL: [Axis; NUM_AXES] = [Axis::X, Axis::Y, Axis::Z, Axis::A, Axis::B, Axis::C];

    /// Index into a [`Position`] or per-axis config array.
    #[inline]
    pub const fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
            Axis::A => 3,
            Axis::B => 4,
            Axis::C => 5,
        }
    }

    /// Whether this axis is rotary (A/B/C) rather than linear (X/Y/Z).
    #[inline]
    pub const fn is_rotary(self) -> bool {
        matches!(self, Axis::A | Axis::B | Axis::C)
    }

    /// Parse from a single uppercase G-code axis letter.
    pub const fn from_letter(letter: char) -> Option<Self> {
        match letter {
            'X' => Some(Axis::X),
            'Y' => Some(Axis::Y),
            'Z' => Some(Axis::Z),
            'A' => Some(Axis::A),
            'B' => Some(Axis::B),
            'C' => Some(Axis::C),
            _ => None,
        }
    }

    /// The G-code letter for this axis.
    #[inline]
    pub const fn letter(self) -> char {
        AXIS_LETTERS[self.index()]
    }
}

/// A position in all six axes. Linear axes in millimeters, rotary axes
/// in degrees. `Default` is the machine origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position(pub [f64; NUM_AXES]);

impl Position {
    /// The zero position.
    pub const ZERO: Position = Position([0.0; NUM_AXES]);

    /// Build from an explicit per-axis array.
    pub const fn new(values: [f64; NUM_AXES]) -> Self {
        Position(values)
    }

    /// Elementwise sum.
    pub fn add(&self, other: &Position) -> Position {
        let mut out = [0.0; NUM_AXES];
        for i in 0..NUM_AXES {
            out[i] = self.0[i] + other.0[i];
        }
        Position(out)
    }

    /// Elementwise difference (`self - other`).
    pub fn sub(&self, other: &Position) -> Position {
        let mut out = [0.0; NUM_AXES];
        for i in 0..NUM_AXES {
            out[i] = self.0[i] - other.0[i];
        }
        Position(out)
    }
}

impl Default for Position {
    fn default() -> Self {
        Position::ZERO
    }
}

impl Index<Axis> for Position {
    type Output = f64;
    fn index(&self, axis: Axis) -> &f64 {
        &self.0[axis.index()]
    }
}

impl IndexMut<Axis> for Position {
    fn index_mut(&mut self, axis: Axis) -> &mut f64 {
        &mut self.0[axis.index()]
    }
}

/// One of the nine work coordinate systems, G54 through G59.3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CoordinateSystem {
    G54,
    G55,
    G56,
    G57,
    G58,
    G59,
    G59_1,
    G59_2,
    G59_3,
}

impl CoordinateSystem {
    /// All nine systems, in persisted-array order.
    pub const ALL: [CoordinateSystem; NUM_COORDINATE_SYSTEMS] = [
        CoordinateSystem::G54,
        CoordinateSystem::G55,
        CoordinateSystem::G56,
        CoordinateSystem::G57,
        CoordinateSystem::G58,
        CoordinateSystem::G59,
        CoordinateSystem::G59_1,
        CoordinateSystem::G59_2,
        CoordinateSystem::G59_3,
    ];

    /// Index into [`CoordinateOffsets::systems`].
    #[inline]
    pub const fn index(self) -> usize {
        match self {
            CoordinateSystem::G54 => 0,
            CoordinateSystem::G55 => 1,
            CoordinateSystem::G56 => 2,
            CoordinateSystem::G57 => 3,
            CoordinateSystem::G58 => 4,
            CoordinateSystem::G59 => 5,
            CoordinateSystem::G59_1 => 6,
            CoordinateSystem::G59_2 => 7,
            CoordinateSystem::G59_3 => 8,
        }
    }
}

impl Default for CoordinateSystem {
    fn default() -> Self {
        CoordinateSystem::G54
    }
}

/// Persisted per-system work offsets, plus the G92 origin offset.
///
/// Machine position = work position + `systems[active]` + `g92`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinateOffsets {
    pub systems: [Position; NUM_COORDINATE_SYSTEMS],
    #[serde(default)]
    pub g92: Position,
}

impl Default for CoordinateOffsets {
    fn default() -> Self {
        Self {
            systems: [Position::ZERO; NUM_COORDINATE_SYSTEMS],
            g92: Position::ZERO,
        }
    }
}

impl CoordinateOffsets {
    /// Total offset (work-system + G92) for the given active system.
    pub fn total(&self, active: CoordinateSystem) -> Position {
        self.systems[active.index()].add(&self.g92)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn axis_index_roundtrip() {
        for axis in Axis::ALL {
            assert_eq!(Axis::from_letter(axis.letter()), Some(axis));
        }
    }

    #[test]
    fn rotary_classification() {
        assert!(!Axis::X.is_rotary());
        assert!(!Axis::Z.is_rotary());
        assert!(Axis::A.is_rotary());
        assert!(Axis::C.is_rotary());
    }

    #[test]
    fn position_add_sub_roundtrip() {
        let a = Position::new([1.0, 2.0, 3.0, 0.0, 0.0, 0.0]);
        let b = Position::new([0.5, 0.5, 0.5, 0.0, 0.0, 0.0]);
        let sum = a.add(&b);
        assert_eq!(sum.sub(&b).0, a.0);
    }

    #[test]
    fn coordinate_offsets_combine_g92() {
        let mut offsets = CoordinateOffsets::default();
        offsets.systems[CoordinateSystem::G55.index()] = Position::new([10.0; 6]);
        offsets.g92 = Position::new([1.0; 6]);
        let total = offsets.total(CoordinateSystem::G55);
        assert_eq!(total.0, [11.0; 6]);
    }
}
