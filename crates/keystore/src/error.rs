//! Key source error types and result alias.
//!
//! Every [`KeySource`](crate::KeySource) implementation maps its internal
//! failures to these variants. None of them are retried by callers; a source
//! backed by a flaky secret store is expected to retry internally before
//! reporting an error.
//!
//! # Example
//!
//! ```
//! use asperitas_keystore::{KeyError, KeyResult};
//!
//! fn lookup(kid: &str) -> KeyResult<String> {
//!     Err(KeyError::not_found(kid))
//! }
//!
//! assert!(matches!(lookup("k1"), Err(KeyError::NotFound { .. })));
//! ```

use std::{path::PathBuf, sync::Arc};

use thiserror::Error;

/// A boxed error type for source chain tracking.
pub type BoxError = Arc<dyn std::error::Error + Send + Sync>;

/// Result type alias for key source operations.
pub type KeyResult<T> = Result<T, KeyError>;

/// Errors that can occur while looking up key material.
///
/// # Non-exhaustive
///
/// New variants may be added without a semver-breaking change. Downstream
/// match expressions must include a wildcard arm (`_ =>`).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum KeyError {
    /// No key pair is registered under the requested key id.
    #[error("Key not found: {kid}")]
    NotFound {
        /// Key id that was looked up.
        kid: String,
    },

    /// Key material exists but cannot be parsed or encoded.
    #[error("Invalid key {kid}: {message}")]
    InvalidKey {
        /// Key id of the offending key.
        kid: String,
        /// Description of the parse or encode failure.
        message: String,
    },

    /// Reading key material from disk failed.
    #[error("I/O error reading {}: {source}", path.display())]
    Io {
        /// File or directory being read.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The backing secret store could not be reached.
    #[error("Connection error: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
        /// The underlying error that caused this connection failure.
        #[source]
        source: Option<BoxError>,
    },

    /// The backing secret store did not answer in time.
    #[error("Operation timeout")]
    Timeout,

    /// Catch-all for source-specific failures.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
        /// The underlying error, if any.
        #[source]
        source: Option<BoxError>,
    },
}

impl KeyError {
    /// Creates a new `NotFound` error for the given key id.
    #[must_use]
    pub fn not_found(kid: impl Into<String>) -> Self {
        Self::NotFound { kid: kid.into() }
    }

    /// Creates a new `InvalidKey` error.
    #[must_use]
    pub fn invalid_key(kid: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidKey { kid: kid.into(), message: message.into() }
    }

    /// Creates a new `Io` error for the given path.
    #[must_use]
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }

    /// Creates a new `Connection` error with the given message.
    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection { message: message.into(), source: None }
    }

    /// Creates a new `Connection` error with a message and source error.
    #[must_use]
    pub fn connection_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Connection { message: message.into(), source: Some(Arc::new(source)) }
    }

    /// Creates a new `Timeout` error.
    #[must_use]
    pub fn timeout() -> Self {
        Self::Timeout
    }

    /// Creates a new `Internal` error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into(), source: None }
    }

    /// Returns `true` for failures that may succeed if repeated later
    /// (connection and timeout errors).
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::Timeout)
    }
}
