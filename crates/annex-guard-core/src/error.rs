//! Error types for the matching pipeline.
//!
//! Per-token classification never fails; only input-level problems
//! surface as [`AnalysisError`] and move a job to `FAILED`. Dataset
//! conflicts found while building the index are reported as
//! [`DatasetIntegrityError`] values and never abort construction.

use serde::Serialize;
use thiserror::Error;

/// Input-level failure that prevents an ingredient list from being analyzed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalysisError {
    #[error("no ingredients found in the submitted text")]
    EmptyInput,

    #[error("unsupported input origin: '{0}' (expected text or ocr)")]
    UnsupportedOrigin(String),

    #[error("input is {len} characters long; the limit is {max}")]
    InputTooLong { len: usize, max: usize },
}

impl AnalysisError {
    /// Machine-readable kind used in [`JobError`].
    pub fn kind(&self) -> &'static str {
        match self {
            AnalysisError::EmptyInput => "empty_input",
            AnalysisError::UnsupportedOrigin(_) => "unsupported_origin",
            AnalysisError::InputTooLong { .. } => "input_too_long",
        }
    }
}

/// Human-readable error descriptor attached to a failed job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobError {
    pub kind: String,
    pub message: String,
}

impl From<&AnalysisError> for JobError {
    fn from(err: &AnalysisError) -> Self {
        JobError {
            kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }
}

/// Two dataset rows normalize to the same lookup key but carry different
/// regulation identifiers. The first row wins.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("key '{key}' maps to both {kept_regulation} and {dropped_regulation}; keeping {kept_regulation}")]
pub struct DatasetIntegrityError {
    pub key: String,
    pub kept_regulation: String,
    pub dropped_regulation: String,
}
