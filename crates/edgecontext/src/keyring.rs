//! Immutable snapshots of the trusted token verification keys.
//!
//! A [`KeyRing`] is built wholesale from one versioned secret (ordered
//! current, previous, next PEM candidates) and never mutated afterwards. The
//! next rotation builds a fresh ring and swaps it in through
//! [`KeyRingStore`](crate::store::KeyRingStore).
//!
//! # Key resolution
//!
//! Tokens name their signing key through the JWT `kid` header, set to the
//! key's [`KeyFingerprint`]. When the header is missing or names a key this
//! ring does not hold, [`KeyRing::resolve`] returns the fallback key: the first
//! candidate that parsed, conventionally the current key. Tokens issued
//! before the `kid` convention existed still get a verification attempt
//! against the current key. Only the fallback is tried; the ring does not
//! iterate over every known key.

use crate::error::KeyError;
use crate::fingerprint::{fingerprint, KeyFingerprint};
use jsonwebtoken::DecodingKey;
use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::pkcs8::DecodePublicKey;
use rsa::traits::PublicKeyParts;
use rsa::RsaPublicKey;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{error, warn};

/// A parsed RSA public key ready for RS256 signature verification.
///
/// Immutable once constructed.
#[derive(Clone)]
pub struct PublicKey {
    rsa: RsaPublicKey,
    decoding_key: DecodingKey,
}

impl PublicKey {
    /// Parse a PEM-encoded RSA public key.
    ///
    /// Accepts SubjectPublicKeyInfo (`BEGIN PUBLIC KEY`) and PKCS#1
    /// (`BEGIN RSA PUBLIC KEY`) documents. Surrounding whitespace is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Parse`] if the input is not a PEM RSA public key.
    pub fn from_pem(pem: &str) -> Result<Self, KeyError> {
        let pem = pem.trim();
        let rsa = RsaPublicKey::from_public_key_pem(pem)
            .or_else(|spki_err| {
                RsaPublicKey::from_pkcs1_pem(pem).map_err(|pkcs1_err| {
                    KeyError::Parse(format!("not SPKI ({spki_err}) or PKCS#1 ({pkcs1_err})"))
                })
            })?;
        Ok(Self::from_rsa(rsa))
    }

    /// Wrap an already-parsed RSA public key.
    #[must_use]
    pub fn from_rsa(rsa: RsaPublicKey) -> Self {
        let decoding_key =
            DecodingKey::from_rsa_raw_components(&rsa.n().to_bytes_be(), &rsa.e().to_bytes_be());
        Self { rsa, decoding_key }
    }

    /// The underlying RSA key.
    #[must_use]
    pub fn rsa(&self) -> &RsaPublicKey {
        &self.rsa
    }

    /// Modulus size in bits.
    #[must_use]
    pub fn bits(&self) -> usize {
        self.rsa.size() * 8
    }

    /// Compute this key's fingerprint.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Encoding`] if the key cannot be SSH-encoded.
    pub fn fingerprint(&self) -> Result<KeyFingerprint, KeyError> {
        fingerprint(&self.rsa)
    }

    pub(crate) fn decoding_key(&self) -> &DecodingKey {
        &self.decoding_key
    }
}

impl PartialEq for PublicKey {
    fn eq(&self, other: &Self) -> bool {
        self.rsa == other.rsa
    }
}

impl Eq for PublicKey {}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublicKey")
            .field("bits", &self.bits())
            .field("fingerprint", &self.fingerprint().ok())
            .finish()
    }
}

/// Immutable snapshot of trusted verification keys plus a fallback key.
///
/// A ring always has a fallback; a rotation that yields no usable key never
/// produces a ring (see [`KeyRing::build`]).
#[derive(Clone)]
pub struct KeyRing {
    by_fingerprint: HashMap<KeyFingerprint, Arc<PublicKey>>,
    fallback: Arc<PublicKey>,
}

impl KeyRing {
    /// Build a ring from ordered PEM candidates.
    ///
    /// Each candidate that fails to parse is logged with its position and
    /// skipped; one bad key never aborts the batch. The first candidate that
    /// parses becomes the fallback. A parsed key whose fingerprint cannot be
    /// computed is left out of the fingerprint index but may still serve as
    /// the fallback.
    ///
    /// Returns `None` (and logs) when no candidate parses. The caller keeps
    /// whatever ring it already had.
    pub fn build<I, S>(candidates: I) -> Option<KeyRing>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut by_fingerprint = HashMap::new();
        let mut fallback: Option<Arc<PublicKey>> = None;

        for (key_index, candidate) in candidates.into_iter().enumerate() {
            let key = match PublicKey::from_pem(candidate.as_ref()) {
                Ok(key) => Arc::new(key),
                Err(e) => {
                    warn!(
                        target: "edgecontext.keyring",
                        key_index,
                        error = %e,
                        "Failed to parse key"
                    );
                    continue;
                }
            };

            if fallback.is_none() {
                fallback = Some(Arc::clone(&key));
            }

            match key.fingerprint() {
                Ok(fp) => {
                    by_fingerprint.insert(fp, key);
                }
                Err(e) => {
                    warn!(
                        target: "edgecontext.keyring",
                        key_index,
                        error = %e,
                        "Failed to get fingerprint of key"
                    );
                }
            }
        }

        let Some(fallback) = fallback else {
            error!(target: "edgecontext.keyring", "No valid keys in secrets store");
            return None;
        };

        Some(KeyRing {
            by_fingerprint,
            fallback,
        })
    }

    /// Select the verification key for a token's `kid` header.
    ///
    /// Returns the indexed key when `kid` names one, otherwise the fallback.
    /// Never fails.
    #[must_use]
    pub fn resolve(&self, kid: Option<&str>) -> &PublicKey {
        kid.and_then(|kid| self.by_fingerprint.get(kid))
            .unwrap_or(&self.fallback)
    }

    /// The fallback key (first parsed candidate of the rotation).
    #[must_use]
    pub fn fallback(&self) -> &PublicKey {
        &self.fallback
    }

    /// Look up a key by exact fingerprint, without falling back.
    #[must_use]
    pub fn get(&self, fingerprint: &str) -> Option<&PublicKey> {
        self.by_fingerprint.get(fingerprint).map(|key| &**key)
    }

    /// Fingerprints of all indexed keys, in no particular order.
    pub fn fingerprints(&self) -> impl Iterator<Item = &KeyFingerprint> {
        self.by_fingerprint.keys()
    }

    /// Number of keys in the fingerprint index.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_fingerprint.len()
    }

    /// Whether the fingerprint index is empty. The fallback is always present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_fingerprint.is_empty()
    }
}

impl fmt::Debug for KeyRing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut fingerprints: Vec<&str> = self
            .by_fingerprint
            .keys()
            .map(KeyFingerprint::as_str)
            .collect();
        fingerprints.sort_unstable();
        f.debug_struct("KeyRing")
            .field("fingerprints", &fingerprints)
            .field("fallback", &self.fallback)
            .finish()
    }
}
