//! Authentication error types.
//!
//! Every failure inside signature, expiry, or claim verification surfaces as
//! [`AuthError::AuthenticationFailed`], and every negative or errored policy
//! decision surfaces as [`AuthError::AuthorizationFailed`]. The remaining
//! variants describe structural problems found before any trust decision is
//! made.

use asperitas_keystore::KeyError;
use thiserror::Error;

/// Token issuance, authentication and authorization errors.
///
/// # Non-exhaustive
///
/// This enum is marked `#[non_exhaustive]`; downstream match expressions
/// must include a wildcard arm (`_ =>`).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AuthError {
    /// The `Authorization` value is not exactly `Bearer <token>`.
    #[error("expected authorization header format: Bearer <token>")]
    MalformedHeader,

    /// The token is not a parsable signed structure.
    #[error("Invalid token format: {message}")]
    TokenParse {
        /// What made the token unparsable.
        message: String,
    },

    /// The token header carries no `kid`.
    #[error("kid missing from token header")]
    MissingKid,

    /// The token header `kid` is not a string.
    #[error("kid in token header is not a string")]
    KidType,

    /// The key source could not provide key material for `kid`.
    #[error("Key lookup failed for {kid}: {source}")]
    KeyLookup {
        /// Key id that was looked up.
        kid: String,
        /// The underlying key source error.
        #[source]
        source: KeyError,
    },

    /// The private key PEM for `kid` is malformed.
    #[error("Invalid private key for {kid}: {source}")]
    KeyParse {
        /// Key id of the malformed key.
        kid: String,
        /// The underlying parse error.
        #[source]
        source: jsonwebtoken::errors::Error,
    },

    /// Signing the claims failed.
    #[error("Signing token failed: {source}")]
    Signing {
        /// The underlying signing error.
        #[source]
        source: jsonwebtoken::errors::Error,
    },

    /// The token was rejected. Deliberately carries no reason.
    #[error("Authentication failed")]
    AuthenticationFailed,

    /// The caller is not allowed to perform the action. Deliberately carries
    /// no reason.
    #[error("Authorization failed")]
    AuthorizationFailed,
}

impl AuthError {
    /// Creates a new `TokenParse` error.
    #[must_use]
    pub fn token_parse(message: impl Into<String>) -> Self {
        Self::TokenParse { message: message.into() }
    }

    /// Creates a new `KeyLookup` error.
    #[must_use]
    pub fn key_lookup(kid: impl Into<String>, source: KeyError) -> Self {
        Self::KeyLookup { kid: kid.into(), source }
    }

    /// Creates a new `KeyParse` error.
    #[must_use]
    pub fn key_parse(kid: impl Into<String>, source: jsonwebtoken::errors::Error) -> Self {
        Self::KeyParse { kid: kid.into(), source }
    }

    /// Creates a new `Signing` error.
    #[must_use]
    pub fn signing(source: jsonwebtoken::errors::Error) -> Self {
        Self::Signing { source }
    }

    /// Returns `true` if the error was raised before any trust decision,
    /// i.e. the request itself was malformed.
    #[must_use]
    pub fn is_malformed_request(&self) -> bool {
        matches!(
            self,
            Self::MalformedHeader | Self::TokenParse { .. } | Self::MissingKid | Self::KidType
        )
    }
}

/// Result type alias for authentication operations.
pub type Result<T> = std::result::Result<T, AuthError>;
