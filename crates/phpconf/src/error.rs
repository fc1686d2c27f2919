//! Error types for config document operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for config document operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while reading or writing a config document.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid document syntax
    #[error("invalid config syntax at line {line}, column {column}: {message}")]
    Parse {
        /// Line number where the parse error occurred (1-indexed)
        line: usize,
        /// Column where the parse error occurred (1-indexed)
        column: usize,
        /// Description of the syntax error
        message: String,
    },

    /// Document file not found at the specified path
    #[error("config document not found: {0}")]
    NotFound(PathBuf),

    /// IO error with the path involved
    #[error("IO error on {path}: {source}")]
    Io {
        /// Path being read or written
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// JSON conversion error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Wrap an IO error with the path it concerns
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this is a syntax error in the document
    pub fn is_parse(&self) -> bool {
        matches!(self, Self::Parse { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_display() {
        let err = Error::Parse {
            line: 3,
            column: 7,
            message: "unclosed string".into(),
        };
        assert_eq!(
            err.to_string(),
            "invalid config syntax at line 3, column 7: unclosed string"
        );
        assert!(err.is_parse());
    }
}
