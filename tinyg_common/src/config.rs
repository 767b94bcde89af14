//! Machine configuration: per-axis tunables, global settings, and
//! steps-per-unit derivation (spec.md §6 "Config surface").
//!
//! Load path is read → `toml::from_str` → `validate()`, matching this
//! workspace's existing config-loader shape.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::position::{Axis, CoordinateOffsets};
use crate::status::ConfigError;

fn default_true() -> bool {
    true
}

/// Whether an axis is actively driven or disabled in this machine profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AxisMode {
    Standard,
    Disabled,
}

impl Default for AxisMode {
    fn default() -> Self {
        AxisMode::Standard
    }
}

/// Per-axis configuration: kinematic limits and the motor-mapping inputs
/// that derive `steps_per_unit`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AxisConfig {
    /// Which of the six axis slots this entry configures.
    pub axis: Axis,

    #[serde(default)]
    pub mode: AxisMode,

    /// Max G0 traverse velocity, user units/min.
    pub velocity_max: f64,
    /// Max G1 feed rate, user units/min.
    pub feedrate_max: f64,
    /// Travel limit between switches/crashes, user units (negative = unbounded).
    pub travel_max: f64,
    /// Max jerk, user units/min^3.
    pub jerk_max: f64,
    /// Max acceleration, user units/min^2. Not part of the original
    /// firmware's persisted config (which derives an implicit per-move
    /// accel from jerk); the jerk-limited S-curve phase split needs an
    /// explicit per-axis bound, so this is a supplemented field (see
    /// DESIGN.md).
    pub accel_max: f64,
    /// Junction deviation, user units (corner-velocity model input).
    pub junction_deviation: f64,

    /// Radius used to fold a rotary axis into the linear length norm,
    /// user units (ignored for linear axes).
    #[serde(default = "default_radius")]
    pub radius: f64,

    /// Homing: negative-direction switch mode at the min end.
    #[serde(default)]
    pub switch_mode_min: SwitchMode,
    /// Homing: switch mode at the max end.
    #[serde(default)]
    pub switch_mode_max: SwitchMode,
    /// Homing search velocity, user units/min.
    pub search_velocity: f64,
    /// Homing latch velocity, user units/min.
    pub latch_velocity: f64,
    /// Homing latch backoff distance, user units.
    pub latch_backoff: f64,
    /// Homing zero backoff distance, user units.
    pub zero_backoff: f64,

    /// Motor step angle, degrees per full step.
    pub step_angle: f64,
    /// Linear travel (or rotary degrees) per motor revolution.
    pub travel_per_rev: f64,
    /// Microstep multiplier (1, 2, 4, 8, ...).
    pub microsteps: u16,
    /// `true` reverses the direction-line polarity for this axis.
    #[serde(default)]
    pub polarity_reversed: bool,
}

fn default_radius() -> f64 {
    1.0
}

/// Limit-switch behavior for one end of an axis's travel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwitchMode {
    Disabled,
    Homing,
    Limit,
    HomingLimit,
}

impl Default for SwitchMode {
    fn default() -> Self {
        SwitchMode::Disabled
    }
}

impl AxisConfig {
    /// Derive steps per user-unit from the motor-mapping inputs, the way
    /// the original firmware's motor-mapping macros do:
    /// `(360 / step_angle / microsteps) / travel_per_rev`.
    pub fn steps_per_unit(&self) -> f64 {
        (360.0 / self.step_angle / self.microsteps as f64) / self.travel_per_rev
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let positive_finite = [
            ("velocity_max", self.velocity_max),
            ("feedrate_max", self.feedrate_max),
            ("jerk_max", self.jerk_max),
            ("accel_max", self.accel_max),
            ("junction_deviation", self.junction_deviation),
            ("search_velocity", self.search_velocity),
            ("latch_velocity", self.latch_velocity),
            ("latch_backoff", self.latch_backoff),
            ("zero_backoff", self.zero_backoff),
            ("step_angle", self.step_angle),
            ("travel_per_rev", self.travel_per_rev),
        ];
        for (name, value) in positive_finite {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::ValidationError(format!(
                    "axis {}: {name} must be positive and finite, got {value}",
                    self.axis.letter()
                )));
            }
        }
        if self.microsteps == 0 {
            return Err(ConfigError::ValidationError(format!(
                "axis {}: microsteps must be nonzero",
                self.axis.letter()
            )));
        }
        Ok(())
    }
}

/// Global (non-per-axis) settings, spec.md §6.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// Maximum chord length when decomposing an arc, user units.
    pub mm_per_arc_segment: f64,
    /// Centripetal acceleration assumed for the junction-velocity model.
    pub junction_acceleration: f64,
    /// `true` if the machine's default unit mode is inches.
    #[serde(default)]
    pub default_inches: bool,
    /// Status-report interval, seconds.
    #[serde(default = "default_status_interval")]
    pub status_report_interval: f64,
    /// Starvation-guard threshold (spec.md §4.3): planner idle time, in
    /// seconds, after which a READY block may begin executing before the
    /// queue fills.
    #[serde(default = "default_starvation_threshold")]
    pub starvation_threshold: f64,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_status_interval() -> f64 {
    0.25
}

fn default_starvation_threshold() -> f64 {
    0.1
}

/// The full persisted machine configuration: axes, globals, and the
/// G54..G59.3 coordinate-system offsets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MachineConfig {
    pub axes: Vec<AxisConfig>,
    pub global: GlobalConfig,
    #[serde(default)]
    pub offsets: CoordinateOffsets,
}

impl MachineConfig {
    /// Validate axis-letter uniqueness and per-field bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.axes.is_empty() {
            return Err(ConfigError::NoAxesDefined);
        }
        let mut seen = HashSet::new();
        for axis in &self.axes {
            if !seen.insert(axis.axis.letter()) {
                return Err(ConfigError::DuplicateAxis(axis.axis.letter()));
            }
            axis.validate()?;
        }
        if !self.global.mm_per_arc_segment.is_finite() || self.global.mm_per_arc_segment <= 0.0 {
            return Err(ConfigError::ValidationError(
                "global.mm_per_arc_segment must be positive and finite".into(),
            ));
        }
        if !self.global.junction_acceleration.is_finite()
            || self.global.junction_acceleration <= 0.0
        {
            return Err(ConfigError::ValidationError(
                "global.junction_acceleration must be positive and finite".into(),
            ));
        }
        Ok(())
    }

    /// Look up an axis's configuration, if the machine profile enables it.
    pub fn axis_config(&self, axis: Axis) -> Option<&AxisConfig> {
        self.axes
            .iter()
            .find(|a| a.axis == axis && a.mode != AxisMode::Disabled)
    }
}

/// Read, parse, and validate a machine configuration TOML file.
pub fn load_machine_config(path: &Path) -> Result<MachineConfig, ConfigError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::FileNotFound(format!("{}: {e}", path.display())))?;
    let config: MachineConfig =
        toml::from_str(&text).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    config.validate()?;
    Ok(config)
}

/// The Zen Toolworks 7x12 default profile, carried over from
/// `settings_zen7x12.h` (see DESIGN.md) so a demonstration binary has a
/// working machine without requiring a hand-authored config file.
pub fn zen7x12_default() -> MachineConfig {
    const JERK_LINEAR: f64 = 100_000_000.0;
    const JERK_ROTARY: f64 = 10_000_000_000.0;
    const JUNCTION_DEVIATION: f64 = 0.05;

    // Characteristic acceleration derived so a jerk-limited ramp from 0
    // to velocity_max spends its entire jerk-up phase reaching amax,
    // i.e. amax = sqrt(jerk_max * velocity_max) (see DESIGN.md).
    let accel_for = |jerk_max: f64, velocity_max: f64| (jerk_max * velocity_max).sqrt();

    let linear = |axis: Axis, velocity_max, travel_max| AxisConfig {
        axis,
        mode: AxisMode::Standard,
        velocity_max,
        feedrate_max: velocity_max,
        travel_max,
        jerk_max: JERK_LINEAR,
        accel_max: accel_for(JERK_LINEAR, velocity_max),
        junction_deviation: JUNCTION_DEVIATION,
        radius: 1.0,
        switch_mode_min: SwitchMode::Homing,
        switch_mode_max: SwitchMode::Disabled,
        search_velocity: velocity_max * 0.8,
        latch_velocity: 100.0,
        latch_backoff: 2.0,
        zero_backoff: 1.0,
        step_angle: 1.8,
        travel_per_rev: 1.25,
        microsteps: 8,
        polarity_reversed: false,
    };

    let mut offsets = CoordinateOffsets::default();
    offsets.systems[crate::position::CoordinateSystem::G55.index()] =
        crate::position::Position::new([475.0 / 2.0, 200.0 / 2.0, 0.0, 0.0, 0.0, 0.0]);

    MachineConfig {
        axes: vec![
            linear(Axis::X, 600.0, 475.0),
            linear(Axis::Y, 600.0, 200.0),
            linear(Axis::Z, 500.0, 75.0),
            AxisConfig {
                axis: Axis::A,
                mode: AxisMode::Standard,
                velocity_max: 144_000.0,
                feedrate_max: 144_000.0,
                travel_max: -1.0,
                jerk_max: JERK_ROTARY,
                accel_max: accel_for(JERK_ROTARY, 144_000.0),
                junction_deviation: JUNCTION_DEVIATION,
                radius: 1.0,
                switch_mode_min: SwitchMode::Homing,
                switch_mode_max: SwitchMode::Disabled,
                search_velocity: 72_000.0,
                latch_velocity: 360.0,
                latch_backoff: 5.0,
                zero_backoff: 2.0,
                step_angle: 1.8,
                travel_per_rev: 360.0,
                microsteps: 8,
                polarity_reversed: false,
            },
            AxisConfig {
                axis: Axis::B,
                mode: AxisMode::Disabled,
                velocity_max: 3600.0,
                feedrate_max: 3600.0,
                travel_max: -1.0,
                jerk_max: JERK_ROTARY,
                accel_max: accel_for(JERK_ROTARY, 3600.0),
                junction_deviation: JUNCTION_DEVIATION,
                radius: 1.0,
                switch_mode_min: SwitchMode::Disabled,
                switch_mode_max: SwitchMode::Disabled,
                search_velocity: 1800.0,
                latch_velocity: 180.0,
                latch_backoff: 5.0,
                zero_backoff: 2.0,
                step_angle: 1.8,
                travel_per_rev: 360.0,
                microsteps: 8,
                polarity_reversed: false,
            },
            AxisConfig {
                axis: Axis::C,
                mode: AxisMode::Disabled,
                velocity_max: 3600.0,
                feedrate_max: 3600.0,
                travel_max: -1.0,
                jerk_max: JERK_ROTARY,
                accel_max: accel_for(JERK_ROTARY, 3600.0),
                junction_deviation: JUNCTION_DEVIATION,
                radius: 1.0,
                switch_mode_min: SwitchMode::Disabled,
                switch_mode_max: SwitchMode::Disabled,
                search_velocity: 1800.0,
                latch_velocity: 180.0,
                latch_backoff: 5.0,
                zero_backoff: 2.0,
                step_angle: 1.8,
                travel_per_rev: 360.0,
                microsteps: 8,
                polarity_reversed: false,
            },
        ],
        global: GlobalConfig {
            mm_per_arc_segment: 0.1,
            junction_acceleration: 100_000.0,
            default_inches: false,
            status_report_interval: default_status_interval(),
            starvation_threshold: default_starvation_threshold(),
            enabled: true,
        },
        offsets,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zen7x12_default_validates() {
        zen7x12_default().validate().expect("default profile valid");
    }

    #[test]
    fn steps_per_unit_matches_motor_mapping_formula() {
        let cfg = zen7x12_default();
        let x = cfg.axis_config(Axis::X).unwrap();
        let expected = (360.0 / 1.8 / 8.0) / 1.25;
        assert!((x.steps_per_unit() - expected).abs() < 1e-9);
    }

    #[test]
    fn duplicate_axis_letter_rejected() {
        let mut cfg = zen7x12_default();
        let mut dup = cfg.axes[0].clone();
        dup.axis = cfg.axes[1].axis;
        cfg.axes.push(dup);
        assert!(matches!(cfg.validate(), Err(ConfigError::DuplicateAxis(_))));
    }

    #[test]
    fn non_positive_field_rejected() {
        let mut cfg = zen7x12_default();
        cfg.axes[0].velocity_max = 0.0;
        assert!(matches!(cfg.validate(), Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn load_from_disk_round_trips() {
        let cfg = zen7x12_default();
        let toml_text = toml::to_string(&cfg).expect("serialize");
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("machine.toml");
        std::fs::write(&path, toml_text).expect("write");
        let loaded = load_machine_config(&path).expect("load");
        assert_eq!(loaded.axes.len(), cfg.axes.len());
    }

    #[test]
    fn missing_file_reports_not_found() {
        let path = Path::new("/nonexistent/machine.toml");
        assert!(matches!(
            load_machine_config(path),
            Err(ConfigError::FileNotFound(_))
        ));
    }
}
