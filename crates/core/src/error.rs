//! Error types for wagon-core
//!
//! Every backend call returns a [`BackendError`]: an untyped account of what
//! went wrong inside an SDK, a child process or the local filesystem. At the
//! operation boundary it is translated, exactly once, into the transport's
//! [`Error`] taxonomy. Values that are already an [`Error`] never pass through
//! the translation again.

use thiserror::Error;

/// Result type alias for wagon-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Result type alias for raw backend calls
pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Transport error taxonomy
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed repository descriptor or configuration, raised before any backend I/O
    #[error("Configuration error: {0}")]
    Config(String),

    /// Credential, permission or backend-binding failure
    #[error("Authorization failed for {context}: {source}")]
    Auth {
        context: String,
        #[source]
        source: BackendError,
    },

    /// Requested object, source file or bucket does not exist
    #[error("Resource does not exist: {0}")]
    NotFound(String),

    /// I/O or backend failure during an otherwise valid operation
    #[error("Transfer failed: {context}")]
    Transfer {
        context: String,
        #[source]
        source: Option<BackendError>,
    },

    /// Operation the transport variant does not implement
    #[error("Unsupported operation: {0}")]
    Unsupported(String),
}

impl Error {
    /// Transfer failure without an underlying backend cause
    pub fn transfer(context: impl Into<String>) -> Self {
        Error::Transfer {
            context: context.into(),
            source: None,
        }
    }

    /// Get the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Config(_) => 2,
            Error::Transfer { .. } => 3,
            Error::Auth { .. } => 4,
            Error::NotFound(_) => 5,
            Error::Unsupported(_) => 6,
        }
    }

    /// Whether the caller may reasonably skip this resource and continue
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}

/// Where a backend failure originated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Credential resolution, client construction, bucket lookup
    Setup,
    /// Any data or metadata call on a bound backend
    Transfer,
}

/// Raw failure reported by a backend implementation
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("credentials unavailable: {0}")]
    Credentials(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("service error: {0}")]
    Service(String),

    #[error("command failed: {0}")]
    Command(String),
}

impl BackendError {
    /// Translate into the transport taxonomy, keeping `self` as the cause.
    pub fn translate(self, phase: Phase, context: impl Into<String>) -> Error {
        let context = context.into();
        match (phase, self) {
            (_, BackendError::NotFound(_)) => Error::NotFound(context),
            (Phase::Setup, source) => Error::Auth { context, source },
            (Phase::Transfer, source @ BackendError::PermissionDenied(_))
            | (Phase::Transfer, source @ BackendError::Credentials(_)) => {
                Error::Auth { context, source }
            }
            (Phase::Transfer, source @ BackendError::Io(_))
            | (Phase::Transfer, source @ BackendError::Service(_))
            | (Phase::Transfer, source @ BackendError::Command(_)) => Error::Transfer {
                context,
                source: Some(source),
            },
        }
    }
}

/// Attach translation to backend results so call sites read as one chain.
pub trait Translate<T> {
    fn translate(self, phase: Phase, context: impl FnOnce() -> String) -> Result<T>;
}

impl<T> Translate<T> for BackendResult<T> {
    fn translate(self, phase: Phase, context: impl FnOnce() -> String) -> Result<T> {
        self.map_err(|e| e.translate(phase, context()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_setup_failures_become_auth() {
        let err = BackendError::Service("boom".into()).translate(Phase::Setup, "s3://bucket");
        assert!(matches!(err, Error::Auth { .. }));

        let err = BackendError::Io(std::io::Error::other("dns")).translate(Phase::Setup, "x");
        assert!(matches!(err, Error::Auth { .. }));
    }

    #[test]
    fn test_missing_bucket_during_setup_is_not_found() {
        let err = BackendError::NotFound("bucket".into()).translate(Phase::Setup, "s3://bucket/repo");
        match err {
            Error::NotFound(ctx) => assert_eq!(ctx, "s3://bucket/repo"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_transfer_phase_classification() {
        let denied = BackendError::PermissionDenied("403".into()).translate(Phase::Transfer, "k");
        assert!(matches!(denied, Error::Auth { .. }));

        let io = BackendError::Io(std::io::Error::other("reset")).translate(Phase::Transfer, "k");
        assert!(matches!(io, Error::Transfer { source: Some(_), .. }));

        let cmd = BackendError::Command("Exit code 1 - nope".into()).translate(Phase::Transfer, "k");
        assert!(matches!(cmd, Error::Transfer { .. }));
    }

    #[test]
    fn test_cause_is_retained() {
        let err = BackendError::Service("SlowDown".into()).translate(Phase::Transfer, "a -> b");
        assert_eq!(err.to_string(), "Transfer failed: a -> b");
        let source = err.source().expect("cause");
        assert_eq!(source.to_string(), "service error: SlowDown");
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(Error::Config("x".into()).exit_code(), 2);
        assert_eq!(Error::transfer("x").exit_code(), 3);
        assert_eq!(Error::NotFound("x".into()).exit_code(), 5);
        assert_eq!(Error::Unsupported("x".into()).exit_code(), 6);
    }
}
