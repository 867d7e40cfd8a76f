//! RSA public key fingerprints.
//!
//! Fingerprints follow the OpenSSH `SHA256:` convention: the SHA-256 digest
//! of the key's SSH wire encoding (`string "ssh-rsa"`, `mpint e`, `mpint n`),
//! rendered as unpadded standard base64 with a `SHA256:` prefix. The token
//! issuer computes the same value independently and places it in the JWT
//! `kid` header, so the format here is fixed, not a local choice.

use crate::error::KeyError;
use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine};
use rsa::traits::PublicKeyParts;
use rsa::RsaPublicKey;
use sha2::{Digest, Sha256};
use std::borrow::Borrow;
use std::fmt;

/// SSH key type identifier for RSA keys.
pub const SSH_RSA_KEY_TYPE: &str = "ssh-rsa";

/// Prefix of every SHA-256 fingerprint.
pub const FINGERPRINT_PREFIX: &str = "SHA256:";

/// Stable identifier of a public key, e.g.
/// `SHA256:lZ0hkWRsDpapeBu2ekX9WY2oYInHwdRaXTwtBecDicI`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyFingerprint(String);

impl KeyFingerprint {
    /// The fingerprint as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for KeyFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// Lets `HashMap<KeyFingerprint, _>` be queried with the raw `kid` string.
impl Borrow<str> for KeyFingerprint {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<KeyFingerprint> for String {
    fn from(fingerprint: KeyFingerprint) -> Self {
        fingerprint.0
    }
}

/// Compute the SHA-256 fingerprint of an RSA public key.
///
/// # Errors
///
/// Returns [`KeyError::Encoding`] if the key cannot be expressed in SSH wire
/// format (a component longer than a 32-bit length prefix allows).
pub fn fingerprint(key: &RsaPublicKey) -> Result<KeyFingerprint, KeyError> {
    let wire = ssh_wire_encoding(key)?;
    let digest = Sha256::digest(&wire);
    Ok(KeyFingerprint(format!(
        "{FINGERPRINT_PREFIX}{}",
        STANDARD_NO_PAD.encode(digest)
    )))
}

/// SSH wire encoding of an RSA public key (RFC 4253 section 6.6).
fn ssh_wire_encoding(key: &RsaPublicKey) -> Result<Vec<u8>, KeyError> {
    let mut out = Vec::with_capacity(key.size() + 32);
    put_string(&mut out, SSH_RSA_KEY_TYPE.as_bytes())?;
    put_mpint(&mut out, &key.e().to_bytes_be())?;
    put_mpint(&mut out, &key.n().to_bytes_be())?;
    Ok(out)
}

fn put_string(out: &mut Vec<u8>, bytes: &[u8]) -> Result<(), KeyError> {
    let len = u32::try_from(bytes.len())
        .map_err(|_| KeyError::Encoding(format!("component too long: {} bytes", bytes.len())))?;
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(bytes);
    Ok(())
}

/// Write an unsigned big-endian integer as an SSH `mpint` (RFC 4251 section 5).
///
/// Leading zero bytes are dropped, zero encodes as an empty string, and a
/// `0x00` byte is prepended when the high bit is set so the value stays
/// positive in two's complement.
fn put_mpint(out: &mut Vec<u8>, magnitude: &[u8]) -> Result<(), KeyError> {
    let start = magnitude
        .iter()
        .position(|&b| b != 0)
        .unwrap_or(magnitude.len());
    let trimmed = magnitude.get(start..).unwrap_or_default();

    match trimmed.first() {
        Some(&high) if high & 0x80 != 0 => {
            let mut padded = Vec::with_capacity(trimmed.len() + 1);
            padded.push(0);
            padded.extend_from_slice(trimmed);
            put_string(out, &padded)
        }
        _ => put_string(out, trimmed),
    }
}
