//! Authentication token validation.
//!
//! Validates RS256-signed JWTs against the active [`KeyRing`] snapshot.
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - Only RS256 is accepted. The expected algorithm is fixed here and
//!   compared against the token header; it is never taken from the header
//! - Key selection uses the header `kid` only as a lookup hint into a
//!   trusted ring, falling back to the current key
//! - Token contents are never logged

use crate::claims::AuthenticationTokenClaims;
use crate::config::{Config, DEFAULT_LEEWAY, DEFAULT_MAX_TOKEN_BYTES};
use crate::error::ValidationError;
use crate::keyring::KeyRing;
use crate::store::KeyRingStore;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, Algorithm, Validation};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

/// The only accepted signing algorithm.
pub const JWT_ALGORITHM: &str = "RS256";

/// JWT header carrying the key id (RFC 7515 section 4.1.4).
pub const JWT_HEADER_KEY_ID: &str = "kid";

/// The parts of a JWT header needed to pick a verification key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenHeader {
    /// Algorithm named by the token.
    pub alg: String,

    /// Key id hint; `None` when absent, null, or empty.
    pub kid: Option<String>,
}

/// Parse the header segment of a JWT without verifying anything.
///
/// # Errors
///
/// Returns [`ValidationError::MalformedToken`] if the token does not have
/// exactly three segments, the header is not base64url JSON, it lacks a
/// string `alg`, or its `kid` is neither a string nor null.
pub fn parse_header(token: &str) -> Result<TokenHeader, ValidationError> {
    let mut parts = token.split('.');
    let (Some(header_part), Some(_), Some(_), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        debug!(target: "edgecontext.validator", "Token rejected: invalid JWT format");
        return Err(ValidationError::MalformedToken);
    };

    let header_bytes = URL_SAFE_NO_PAD.decode(header_part).map_err(|e| {
        debug!(target: "edgecontext.validator", error = %e, "Failed to decode JWT header base64");
        ValidationError::MalformedToken
    })?;

    let header: serde_json::Value = serde_json::from_slice(&header_bytes).map_err(|e| {
        debug!(target: "edgecontext.validator", error = %e, "Failed to parse JWT header JSON");
        ValidationError::MalformedToken
    })?;

    let alg = header
        .get("alg")
        .and_then(|v| v.as_str())
        .map(ToString::to_string)
        .ok_or_else(|| {
            debug!(target: "edgecontext.validator", "JWT header missing alg");
            ValidationError::MalformedToken
        })?;

    let kid = match header.get(JWT_HEADER_KEY_ID) {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(kid)) if kid.is_empty() => None,
        Some(serde_json::Value::String(kid)) => Some(kid.clone()),
        Some(_) => {
            debug!(target: "edgecontext.validator", "JWT header kid is not a string");
            return Err(ValidationError::MalformedToken);
        }
    };

    Ok(TokenHeader { alg, kid })
}

/// Validates authentication tokens against the keys in a [`KeyRingStore`].
///
/// Stateless apart from reading the store, so one validator can serve any
/// number of concurrent callers.
#[derive(Debug, Clone)]
pub struct TokenValidator {
    store: Arc<KeyRingStore>,
    leeway: Duration,
    max_token_bytes: usize,
}

impl TokenValidator {
    /// Create a validator with default leeway and size limit.
    #[must_use]
    pub fn new(store: Arc<KeyRingStore>) -> Self {
        Self {
            store,
            leeway: DEFAULT_LEEWAY,
            max_token_bytes: DEFAULT_MAX_TOKEN_BYTES,
        }
    }

    /// Create a validator using the leeway and size limit from `config`.
    #[must_use]
    pub fn with_config(store: Arc<KeyRingStore>, config: &Config) -> Self {
        Self {
            store,
            leeway: config.leeway,
            max_token_bytes: config.max_token_bytes,
        }
    }

    /// The store this validator reads keys from.
    #[must_use]
    pub fn store(&self) -> &Arc<KeyRingStore> {
        &self.store
    }

    /// Validate a token and return its claims.
    ///
    /// # Errors
    ///
    /// Checks run in this order, each failure terminal:
    /// 1. `NoKeysLoaded` - no key ring installed yet
    /// 2. `EmptyToken` - `token` is empty
    /// 3. `TokenTooLarge` - over the configured size limit
    /// 4. `MalformedToken` - not a structurally valid JWT
    /// 5. `UnsupportedAlgorithm` - header algorithm is not RS256
    /// 6. `InvalidSignature` - signature does not verify against the key
    ///    resolved from `kid` (or the fallback key)
    /// 7. `ExpiredToken` - `exp` passed or `nbf` not reached
    #[instrument(skip_all)]
    pub fn validate(&self, token: &str) -> Result<AuthenticationTokenClaims, ValidationError> {
        let ring = self.store.current().ok_or_else(|| {
            debug!(target: "edgecontext.validator", "Validation attempted before keys were loaded");
            ValidationError::NoKeysLoaded
        })?;

        if token.is_empty() {
            return Err(ValidationError::EmptyToken);
        }

        if token.len() > self.max_token_bytes {
            debug!(
                target: "edgecontext.validator",
                token_size = token.len(),
                max_size = self.max_token_bytes,
                "Token rejected: size exceeds maximum allowed"
            );
            return Err(ValidationError::TokenTooLarge);
        }

        self.verify(&ring, token)
    }

    fn verify(
        &self,
        ring: &KeyRing,
        token: &str,
    ) -> Result<AuthenticationTokenClaims, ValidationError> {
        let header = parse_header(token)?;

        if header.alg != JWT_ALGORITHM {
            debug!(
                target: "edgecontext.validator",
                alg = %header.alg,
                "Token rejected: unsupported algorithm"
            );
            return Err(ValidationError::UnsupportedAlgorithm(header.alg));
        }

        let key = ring.resolve(header.kid.as_deref());

        // Time claims are checked on the decoded claims below; the library
        // only understands unsigned integer timestamps.
        let mut validation = Validation::new(Algorithm::RS256);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        let token_data = decode::<AuthenticationTokenClaims>(token, key.decoding_key(), &validation)
            .map_err(|e| {
                let err = classify(e.kind(), &header.alg);
                debug!(
                    target: "edgecontext.validator",
                    error = %e,
                    kind = err.kind(),
                    kid_present = header.kid.is_some(),
                    "Token verification failed"
                );
                err
            })?;

        let leeway = i64::try_from(self.leeway.as_secs()).unwrap_or(i64::MAX);
        check_time_claims(&token_data.claims, Utc::now().timestamp(), leeway)?;

        debug!(target: "edgecontext.validator", "Token validated successfully");
        Ok(token_data.claims)
    }
}

/// Reject tokens whose `exp` has passed or whose `nbf` is still ahead,
/// allowing `leeway` seconds of skew. Absent claims are not checked.
fn check_time_claims(
    claims: &AuthenticationTokenClaims,
    now: i64,
    leeway: i64,
) -> Result<(), ValidationError> {
    if let Some(exp) = claims.exp {
        if exp < now.saturating_sub(leeway) {
            debug!(target: "edgecontext.validator", exp, now, "Token rejected: expired");
            return Err(ValidationError::ExpiredToken);
        }
    }
    if let Some(nbf) = claims.nbf {
        if nbf > now.saturating_add(leeway) {
            debug!(target: "edgecontext.validator", nbf, now, "Token rejected: not yet valid");
            return Err(ValidationError::ExpiredToken);
        }
    }
    Ok(())
}

/// Map a JWT library failure onto the validation taxonomy. `alg` is the
/// algorithm named by the token header.
fn classify(kind: &ErrorKind, alg: &str) -> ValidationError {
    match kind {
        ErrorKind::InvalidSignature
        | ErrorKind::InvalidRsaKey(_)
        | ErrorKind::InvalidKeyFormat
        | ErrorKind::Crypto(_) => ValidationError::InvalidSignature,
        ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
            ValidationError::UnsupportedAlgorithm(alg.to_string())
        }
        ErrorKind::ExpiredSignature | ErrorKind::ImmatureSignature => ValidationError::ExpiredToken,
        _ => ValidationError::MalformedToken,
    }
}
