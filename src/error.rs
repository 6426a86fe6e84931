/// Error taxonomy for the MapScope pipeline.
///
/// Load-time failures (`SourceNotFound`, `SchemaMismatch`) are fatal for the
/// caller. Computation-time failures (`InsufficientData`, `EmptyGroupSet`)
/// describe a result that cannot be charted and are reported as recoverable;
/// the pipeline turns them into a placeholder instead of propagating them.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExplorerError {
    #[error("Dataset source not found: {}", path.display())]
    SourceNotFound { path: PathBuf },

    #[error("Column '{column}' not found in dataset schema")]
    SchemaMismatch { column: String },

    #[error("Insufficient data in '{column}': {distinct} distinct values, need at least {required}")]
    InsufficientData {
        column: String,
        distinct: usize,
        required: usize,
    },

    #[error("No group reached the minimum size of {min_group_size} ({groups} groups considered)")]
    EmptyGroupSet { groups: usize, min_group_size: usize },

    #[error("Malformed dataset: {0}")]
    Malformed(String),

    #[error("Invalid value in column '{column}': {details}")]
    InvalidValue { column: String, details: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Coarse grouping of errors for callers that map them onto their own
/// error types (the Python bindings raise one exception class per kind).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Schema,
    /// `InsufficientData` and `EmptyGroupSet`
    Recoverable,
    Invalid,
}

impl ExplorerError {
    pub fn schema_mismatch(column: impl Into<String>) -> Self {
        ExplorerError::SchemaMismatch {
            column: column.into(),
        }
    }

    /// True for conditions the presentation layer renders as an
    /// informational placeholder rather than a blocking error.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ExplorerError::InsufficientData { .. } | ExplorerError::EmptyGroupSet { .. }
        )
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ExplorerError::SourceNotFound { .. } => ErrorKind::NotFound,
            ExplorerError::SchemaMismatch { .. } => ErrorKind::Schema,
            _ if self.is_recoverable() => ErrorKind::Recoverable,
            _ => ErrorKind::Invalid,
        }
    }
}

pub type Result<T> = std::result::Result<T, ExplorerError>;
