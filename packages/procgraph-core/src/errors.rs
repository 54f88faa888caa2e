//! Error types for procgraph-core
//!
//! Provides unified error handling across the crate.
//!
//! Only `InputFormat` and `InconsistentEfsm` (plus the I/O and parse errors
//! that wrap them at the boundaries) are meant to reach the user. Guard,
//! update, and solver errors are recovered close to where they occur: the
//! conformance replayer reclassifies a failed guard evaluation as
//! `undefined`, the simulator treats it as a non-firing transition, and the
//! guard synthesiser rejects the offending candidate and moves on.

use thiserror::Error;

/// Main error type for procgraph operations
#[derive(Debug, Error)]
pub enum ProcgraphError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Unreadable event log or unknown input format
    #[error("input format error: {0}")]
    InputFormat(String),

    /// A transition references a state outside the state set
    #[error("inconsistent EFSM: {0}")]
    InconsistentEfsm(String),

    /// A value of unexpected type was substituted into a guard
    #[error("guard evaluation error: {0}")]
    GuardEval(String),

    /// An update expression failed at evaluation time
    #[error("update evaluation error: {0}")]
    UpdateEval(String),

    /// The validation solver exceeded its per-check budget
    #[error("solver timed out")]
    SolverTimeout,

    /// Textual form (guard, update, PNML) could not be parsed
    #[error("parse error: {0}")]
    Parse(String),

    /// Configuration value out of range
    #[error("configuration error: {0}")]
    Config(String),
}

impl ProcgraphError {
    /// Create an input format error
    pub fn input_format(msg: impl Into<String>) -> Self {
        ProcgraphError::InputFormat(msg.into())
    }

    /// Create an inconsistent-EFSM error
    pub fn inconsistent(msg: impl Into<String>) -> Self {
        ProcgraphError::InconsistentEfsm(msg.into())
    }

    /// Create a guard evaluation error
    pub fn guard_eval(msg: impl Into<String>) -> Self {
        ProcgraphError::GuardEval(msg.into())
    }

    /// Create an update evaluation error
    pub fn update_eval(msg: impl Into<String>) -> Self {
        ProcgraphError::UpdateEval(msg.into())
    }

    /// Create a parse error
    pub fn parse(msg: impl Into<String>) -> Self {
        ProcgraphError::Parse(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        ProcgraphError::Config(msg.into())
    }
}

/// Result type alias for procgraph operations
pub type Result<T> = std::result::Result<T, ProcgraphError>;
