//! Error types for repath.
//!
//! Library crates use [`RepathError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all repath operations.
#[derive(Debug, thiserror::Error)]
pub enum RepathError {
    /// No pack exists for the requested identifier.
    #[error("pack not found: {pack_id}")]
    NotFound { pack_id: String },

    /// A pack appears in its own `extends` ancestry.
    #[error("pack inheritance cycle detected: {}", chain.join(" -> "))]
    Cycle { chain: Vec<String> },

    /// The decision request is missing a pack id or query.
    #[error("invalid request: {message}")]
    InvalidRequest { message: String },

    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Pack document could not be parsed.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, RepathError>;

impl RepathError {
    /// Create a not-found error for a pack identifier.
    pub fn not_found(pack_id: impl Into<String>) -> Self {
        Self::NotFound {
            pack_id: pack_id.into(),
        }
    }

    /// Create an invalid-request error from any displayable message.
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: msg.into(),
        }
    }

    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
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
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = RepathError::not_found("repath.muni.nowhere.v1");
        assert_eq!(err.to_string(), "pack not found: repath.muni.nowhere.v1");

        let err = RepathError::invalid_request("packId is required");
        assert!(err.to_string().contains("packId is required"));
    }

    #[test]
    fn cycle_error_names_full_chain() {
        let err = RepathError::Cycle {
            chain: vec!["a".into(), "b".into(), "c".into(), "a".into()],
        };
        assert_eq!(
            err.to_string(),
            "pack inheritance cycle detected: a -> b -> c -> a"
        );
    }
}
