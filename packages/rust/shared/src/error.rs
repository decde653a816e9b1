//! Error types for Dossier.
//!
//! Library crates use [`DossierError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.
//!
//! Only [`DossierError::Config`], [`DossierError::Validation`] and
//! [`DossierError::Synthesis`] ever cross the pipeline boundary. The other
//! variants are produced by clients and absorbed inside a run.

use std::path::PathBuf;

use crate::types::Phase;

/// Top-level error type for all Dossier operations.
#[derive(Debug, thiserror::Error)]
pub enum DossierError {
    /// Missing or invalid provider configuration. Fatal for a run.
    #[error("config error: {message}")]
    Config { message: String },

    /// A single search query failed. Recoverable: the query contributes no evidence.
    #[error("query failed ({query}): {message}")]
    QueryExecution { query: String, message: String },

    /// No refinement was possible for a phase. Recoverable: zero new queries.
    #[error("refinement for {phase} skipped: {reason}")]
    RefinementSkipped { phase: Phase, reason: String },

    /// The final synthesis call failed. Fatal; no report is produced.
    #[error("synthesis failed after gathering {evidence_count} evidence items: {message}")]
    Synthesis {
        evidence_count: usize,
        message: String,
    },

    /// Transport-level HTTP failure (connect, timeout, body read).
    #[error("network error: {0}")]
    Network(String),

    /// The remote provider answered with a non-success status.
    #[error("provider returned HTTP {status}: {message}")]
    Provider { status: u16, message: String },

    /// The remote provider answered with a body we could not interpret.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Input validation error (blank subject name, bad tier, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, DossierError>;

impl DossierError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Wrap any failure of the final model call, keeping the evidence count.
    pub fn synthesis(evidence_count: usize, msg: impl Into<String>) -> Self {
        Self::Synthesis {
            evidence_count,
            message: msg.into(),
        }
    }

    /// Whether this error ends a pipeline run.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Config { .. } | Self::Validation { .. } | Self::Synthesis { .. }
        )
    }

    /// Evidence gathered before a synthesis failure, if this is one.
    pub fn evidence_count(&self) -> Option<usize> {
        match self {
            Self::Synthesis { evidence_count, .. } => Some(*evidence_count),
            _ => None,
        }
    }
}
