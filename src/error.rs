//! Error types for loading and analysis.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the loader and the analysis stages.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// The source dataset could not be read. Fatal for the whole run.
    #[error("data unavailable at {}: {reason}", path.display())]
    DataUnavailable { path: PathBuf, reason: String },

    /// Not enough usable rows for one analysis. The caller skips that
    /// analysis and keeps going.
    #[error("insufficient data: {0}")]
    InsufficientData(String),
}

impl AnalysisError {
    pub(crate) fn unavailable(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        AnalysisError::DataUnavailable {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn insufficient(reason: impl Into<String>) -> Self {
        AnalysisError::InsufficientData(reason.into())
    }
}
