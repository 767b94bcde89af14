//! Stage-specific error taxonomy (spec.md §7), each convertible into the
//! shared [`StatusCode`] wire vocabulary.

use thiserror::Error;
use tinyg_common::status::StatusCode;

/// Errors raised while parsing a G-code block.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum GcodeError {
    #[error("expected command letter at byte {0}")]
    ExpectedCommandLetter(usize),
    #[error("bad number format at byte {0}")]
    BadNumberFormat(usize),
    #[error("unrecognized command {0}{1}")]
    UnrecognizedCommand(char, i32),
}

impl From<GcodeError> for StatusCode {
    fn from(e: GcodeError) -> Self {
        match e {
            GcodeError::ExpectedCommandLetter(_) => StatusCode::ExpectedCommandLetter,
            GcodeError::BadNumberFormat(_) => StatusCode::BadNumberFormat,
            GcodeError::UnrecognizedCommand(_, _) => StatusCode::UnrecognizedCommand,
        }
    }
}

/// Errors raised applying a parsed block to the canonical machine.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CmError {
    #[error("target exceeds soft travel limit on axis index {0}")]
    SoftLimitExceeded(usize),
    #[error("arc specification inconsistent: {0}")]
    ArcSpecificationError(String),
    #[error("planner: {0}")]
    Planner(#[from] PlannerError),
    #[error("parse: {0}")]
    Gcode(#[from] GcodeError),
}

impl From<CmError> for StatusCode {
    fn from(e: CmError) -> Self {
        match e {
            CmError::SoftLimitExceeded(_) => StatusCode::SoftLimitExceeded,
            CmError::ArcSpecificationError(_) => StatusCode::ArcSpecificationError,
            CmError::Planner(p) => p.into(),
            CmError::Gcode(g) => g.into(),
        }
    }
}

/// Errors raised by the motion planner.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PlannerError {
    #[error("planner queue is full")]
    QueueFull,
    #[error("internal invariant violated: {0}")]
    Internal(String),
}

impl From<PlannerError> for StatusCode {
    fn from(e: PlannerError) -> Self {
        match e {
            PlannerError::QueueFull => StatusCode::QueueFull,
            PlannerError::Internal(_) => StatusCode::InternalError,
        }
    }
}
