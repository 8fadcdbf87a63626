use thiserror::Error;

/// Errors raised by the snapshot, queue and data-source layers.
#[derive(Error, Debug)]
pub enum CueError {
    /// A stored line carries a label that no schema field owns.
    #[error("Unknown field label '{label}' in stored issue {key}")]
    SchemaViolation { key: String, label: String },

    #[error("Malformed issue record: {reason}")]
    MalformedRecord { reason: String },

    /// The issue tracker could not be reached or answered garbage.
    #[error("Issue source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Issue not found: {key}")]
    NotFound { key: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CueError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedRecord {
            reason: reason.into(),
        }
    }

    pub fn unavailable(reason: impl std::fmt::Display) -> Self {
        Self::SourceUnavailable(reason.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CueError>;
