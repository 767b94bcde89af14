//! Wire status codes (spec.md §6) and the config error taxonomy.
//!
//! `StatusCode` is the single vocabulary the line-protocol handler answers
//! with, regardless of which pipeline stage produced the underlying error.
//! Stage-specific error enums (`GcodeError`, `CmError`, `PlannerError`) live
//! in `tinyg_core`, each with a `From<_> for StatusCode` conversion so the
//! protocol handler can match on one type.

use thiserror::Error;

/// Wire status code returned for every submitted block or config command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    /// Block accepted and applied (or enqueued).
    Ok,
    /// Block had no effect (deleted block, empty line).
    Noop,
    /// Program flow reached M2/M30/M60.
    Complete,
    /// Caller should retry; no side effects occurred.
    Eagain,
    /// A statement did not start with an uppercase letter.
    ExpectedCommandLetter,
    /// A statement's numeric value could not be parsed.
    BadNumberFormat,
    /// An unknown letter/code pair was encountered.
    UnrecognizedCommand,
    /// Arc center/endpoint/radius were inconsistent beyond tolerance.
    ArcSpecificationError,
    /// A target exceeds a configured travel limit.
    SoftLimitExceeded,
    /// The planner or segment queue is full.
    QueueFull,
    /// An internal invariant was violated; the system requires reset.
    InternalError,
}

/// Error type for configuration loading and validation.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    #[error("failed to parse configuration: {0}")]
    ParseError(String),

    #[error("configuration validation failed: {0}")]
    ValidationError(String),

    #[error("duplicate axis letter: {0}")]
    DuplicateAxis(char),

    #[error("no axes defined in machine configuration")]
    NoAxesDefined,
}

impl From<ConfigError> for StatusCode {
    fn from(_: ConfigError) -> Self {
        StatusCode::InternalError
    }
}
