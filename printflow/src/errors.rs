//! Error types for the printflow pipeline.
//!
//! The taxonomy separates errors that are rejected at the request boundary
//! (`ValidationError`), errors raised by remote collaborators
//! (`BackendError`), and best-effort persistence failures
//! (`PersistenceError`) that must never mask the pipeline's own status.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::result::PipelineStage;

/// Lower bound for the requested physical model size.
pub const MIN_SIZE_MM: f64 = 10.0;
/// Upper bound for the requested physical model size.
pub const MAX_SIZE_MM: f64 = 500.0;

/// Error raised when request parameters are rejected before any stage runs.
///
/// A validation failure never reaches a remote backend.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ValidationError {
    /// The requested size is outside the printable range.
    #[error("size_mm {value} out of range [{min}, {max}]")]
    SizeOutOfRange {
        /// The rejected value.
        value: f64,
        /// Lower bound of the accepted range.
        min: f64,
        /// Upper bound of the accepted range.
        max: f64,
    },

    /// An unrecognized style tag was supplied.
    #[error("unrecognized style '{0}'")]
    UnknownStyle(String),

    /// An unrecognized mesh format was supplied.
    #[error("unrecognized mesh format '{0}'")]
    UnknownFormat(String),

    /// The request supplies no starting artifact at all.
    #[error("request has no starting artifact: supply a prompt, an image, or a mesh")]
    MissingEntryArtifact,
}

impl ValidationError {
    /// Creates a size-out-of-range error against the standard bounds.
    #[must_use]
    pub fn size_out_of_range(value: f64) -> Self {
        Self::SizeOutOfRange {
            value,
            min: MIN_SIZE_MM,
            max: MAX_SIZE_MM,
        }
    }
}

/// Error raised by a remote collaborator (image, mesh, or print backend).
///
/// Carries the opaque provider message; the orchestrator adds stage context
/// when recording the failure on the [`crate::result::PipelineResult`].
#[derive(Debug, Error)]
pub enum BackendError {
    /// The provider rejected the call.
    #[error("api error: {message}")]
    Api {
        /// HTTP status code, when one was received.
        status: Option<u16>,
        /// Opaque provider message.
        message: String,
    },

    /// The request never produced a usable response.
    #[error("network error: {0}")]
    Network(String),

    /// The provider responded with something we could not interpret.
    #[error("unexpected response: {0}")]
    Decode(String),

    /// A polling operation exceeded its wait budget.
    #[error("{operation} did not complete within {budget_seconds}s")]
    Timeout {
        /// What was being waited on (e.g. a task id).
        operation: String,
        /// The configured budget in seconds.
        budget_seconds: u64,
    },

    /// Local IO needed by the backend failed (reading a mesh, saving an image).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl BackendError {
    /// Creates an API error.
    #[must_use]
    pub fn api(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Creates a decode error.
    #[must_use]
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode(message.into())
    }

    /// Creates a timeout error.
    #[must_use]
    pub fn timeout(operation: impl Into<String>, budget_seconds: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            budget_seconds,
        }
    }

    /// Whether this failure was a wait-budget exhaustion.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// The error kind used when recording this failure on a result.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        if self.is_timeout() {
            ErrorKind::Timeout
        } else {
            ErrorKind::Backend
        }
    }
}

#[cfg(feature = "http")]
impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(err.to_string())
    }
}

/// Error raised when a best-effort local save fails.
///
/// Persistence failures are logged and reported separately; they never
/// substitute for the pipeline's own success or failure status.
#[derive(Debug, Error)]
#[error("failed to persist pipeline result: {message}")]
pub struct PersistenceError {
    /// What went wrong.
    pub message: String,
}

impl PersistenceError {
    /// Creates a new persistence error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for PersistenceError {
    fn from(err: std::io::Error) -> Self {
        Self::new(err.to_string())
    }
}

impl From<serde_json::Error> for PersistenceError {
    fn from(err: serde_json::Error) -> Self {
        Self::new(err.to_string())
    }
}

/// Coarse classification of a terminal failure, stable in serialized output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Request parameters were rejected before any stage ran.
    Validation,
    /// A remote dependency rejected the call.
    Backend,
    /// A polling stage exceeded its wait budget.
    Timeout,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation => write!(f, "validation"),
            Self::Backend => write!(f, "backend"),
            Self::Timeout => write!(f, "timeout"),
        }
    }
}

/// The terminal error recorded on a [`crate::result::PipelineResult`]
/// when a run stops early.
///
/// Names the failing stage so the caller can resume from the last
/// successful artifact instead of restarting from the prompt.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[error("stage {stage} failed ({kind}): {message}")]
pub struct StageFailure {
    /// The stage that failed.
    pub stage: PipelineStage,
    /// Coarse error classification.
    pub kind: ErrorKind,
    /// Underlying message.
    pub message: String,
}

impl StageFailure {
    /// Records a backend error against the stage it occurred in.
    #[must_use]
    pub fn from_backend(stage: PipelineStage, err: &BackendError) -> Self {
        Self {
            stage,
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}
