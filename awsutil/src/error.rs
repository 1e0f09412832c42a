//! Error types shared by the queue, topic and secret operations.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Result type alias for awsutil operations
pub type AppResult<T> = Result<T, AppError>;

/// Errors surfaced by the client wrappers and the operations built on them
#[derive(Error, Debug)]
pub enum AppError {
    /// Network or service fault reported by a remote call. Never retried here.
    #[error("{operation} failed: {reason}")]
    TransientService {
        /// Remote operation that failed, e.g. `ReceiveMessage`
        operation: &'static str,
        /// Rendered SDK error chain
        reason: String,
    },

    /// A remote resource (receipt handle, secret) does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Queue message body is not the expected double-encoded notification
    #[error("malformed message: {0}")]
    MalformedMessage(String),

    /// Publish input file is missing required fields
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// Local input file does not exist
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// Local file could not be read or appended to
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// File being accessed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

impl AppError {
    pub(crate) fn service(operation: &'static str, reason: impl Into<String>) -> Self {
        Self::TransientService {
            operation,
            reason: reason.into(),
        }
    }

    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            return Self::FileNotFound(path.to_path_buf());
        }
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Whether this error only concerns a single queue message
    #[must_use]
    pub const fn is_malformed_message(&self) -> bool {
        matches!(self, Self::MalformedMessage(_))
    }
}
