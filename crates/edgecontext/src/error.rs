//! Error types for edge context token validation and key rotation.

use thiserror::Error;

/// Errors returned by [`TokenValidator::validate`](crate::validator::TokenValidator::validate).
///
/// Every variant is terminal for the call. Callers decide whether the absence
/// of a valid identity is fatal for their request (reject) or merely means
/// the caller is anonymous.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// No key ring has been installed yet (no rotation has succeeded).
    #[error("no public keys loaded")]
    NoKeysLoaded,

    /// The token is the empty string.
    ///
    /// Kept apart from [`ValidationError::MalformedToken`] because an empty
    /// token is a caller bug, not a garbled or hostile token.
    #[error("empty JWT token")]
    EmptyToken,

    /// Token size exceeds the configured maximum. Checked before any parsing.
    #[error("token exceeds maximum allowed size")]
    TokenTooLarge,

    /// Token is not a structurally valid JWT (segments, base64, JSON).
    #[error("malformed token")]
    MalformedToken,

    /// The token header names an algorithm other than RS256.
    #[error("unsupported signing algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// The signature does not verify against the resolved key.
    #[error("invalid token signature")]
    InvalidSignature,

    /// The token is expired or not yet valid.
    #[error("token is expired or not yet valid")]
    ExpiredToken,
}

impl ValidationError {
    /// Stable, machine-readable classification for logs and metric labels.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            ValidationError::NoKeysLoaded => "no_keys_loaded",
            ValidationError::EmptyToken => "empty_token",
            ValidationError::TokenTooLarge => "token_too_large",
            ValidationError::MalformedToken => "malformed_token",
            ValidationError::UnsupportedAlgorithm(_) => "unsupported_algorithm",
            ValidationError::InvalidSignature => "invalid_signature",
            ValidationError::ExpiredToken => "expired_token",
        }
    }
}

/// Key-level errors raised while loading or fingerprinting public keys.
///
/// These never reach validation callers: rotation logs them and skips the
/// offending candidate.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    /// The candidate is not a PEM-encoded RSA public key.
    #[error("failed to parse RSA public key: {0}")]
    Parse(String),

    /// The key could not be encoded for fingerprinting.
    #[error("failed to encode public key: {0}")]
    Encoding(String),
}

/// Errors reading a secret out of a secret-store snapshot.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SecretsError {
    /// No secret exists at the requested path.
    #[error("secret not found: {0}")]
    NotFound(String),

    /// The secret exists but has a different type than requested.
    #[error("secret {path} has type {actual}, expected {expected}")]
    WrongType {
        path: String,
        expected: &'static str,
        actual: &'static str,
    },

    /// The secret-store document could not be parsed.
    #[error("failed to parse secrets document: {0}")]
    Parse(String),
}

/// Errors building an [`EdgeRequestContext`](crate::context::EdgeRequestContext).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContextError {
    /// The LoID does not carry the `t2_` prefix.
    #[error("loid should have t2_ prefix")]
    LoIdWrongPrefix,

    /// The locale code does not look like `en` or `en_US`.
    #[error("locale code should match format: en, en_US")]
    InvalidLocaleCode,

    /// The country code is not ISO 3166-1 alpha-2 (e.g. `US`).
    #[error("country code should be ISO 3166-1 alpha-2, e.g. US")]
    InvalidCountryCode,
}

/// Raised by identity accessors when the request carries no valid
/// authentication for the requested fact.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("no valid authentication for this request")]
pub struct NoAuthentication;
