//! Decoded payload of a validated authentication token.

use chrono::{DateTime, Utc};
use serde::de::{self, Unexpected, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Prefix carried by user account identifiers (subjects and LoIDs).
pub const USER_PREFIX: &str = "t2_";

/// Prefix carried by service subjects.
pub const SERVICE_PREFIX: &str = "service/";

/// Claims of an authentication token.
///
/// Only produced by successful validation. The `sub` field is redacted in
/// `Debug` output.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticationTokenClaims {
    /// Subject: a user account (`t2_...`), a service (`service/...`), or
    /// absent for anonymous tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,

    /// Expiration timestamp (Unix epoch seconds).
    #[serde(
        default,
        deserialize_with = "numeric_date",
        skip_serializing_if = "Option::is_none"
    )]
    pub exp: Option<i64>,

    /// Issued-at timestamp (Unix epoch seconds).
    #[serde(
        default,
        deserialize_with = "numeric_date",
        skip_serializing_if = "Option::is_none"
    )]
    pub iat: Option<i64>,

    /// Not-before timestamp (Unix epoch seconds).
    #[serde(
        default,
        deserialize_with = "numeric_date",
        skip_serializing_if = "Option::is_none"
    )]
    pub nbf: Option<i64>,

    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub roles: Vec<String>,

    /// OAuth client id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    /// OAuth client type (e.g. `third_party`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_type: Option<String>,

    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub scopes: Vec<String>,

    /// LoID embedded by the issuer, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loid: Option<LoId>,
}

/// Logged-out/logged-in identifier embedded in a token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoId {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Creation time in Unix epoch milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_ms: Option<i64>,
}

impl LoId {
    /// Creation time, if present and representable.
    #[must_use]
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_ms.and_then(DateTime::from_timestamp_millis)
    }
}

impl AuthenticationTokenClaims {
    /// The raw subject.
    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.sub.as_deref()
    }

    /// Whether the token grants `role`. The query is lowercased; roles in
    /// the token are compared as issued.
    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        let role = role.to_lowercase();
        self.roles.iter().any(|r| *r == role)
    }

    #[must_use]
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.iter().any(|s| s == scope)
    }

    /// LoID carried by the token, if any.
    #[must_use]
    pub fn loid_id(&self) -> Option<&str> {
        self.loid.as_ref().and_then(|loid| loid.id.as_deref())
    }

    #[must_use]
    pub fn loid_created_ms(&self) -> Option<i64> {
        self.loid.as_ref().and_then(|loid| loid.created_ms)
    }

    /// Expiration as a timestamp, if present.
    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.exp.and_then(|exp| DateTime::from_timestamp(exp, 0))
    }
}

impl fmt::Debug for AuthenticationTokenClaims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthenticationTokenClaims")
            .field("sub", &self.sub.as_ref().map(|_| "[REDACTED]"))
            .field("exp", &self.exp)
            .field("iat", &self.iat)
            .field("nbf", &self.nbf)
            .field("roles", &self.roles)
            .field("client_id", &self.client_id)
            .field("client_type", &self.client_type)
            .field("scopes", &self.scopes)
            .field("loid", &self.loid)
            .finish()
    }
}

/// Decode JSON `null` as the type's default (issuers emit `"scopes": null`).
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Decode a JWT NumericDate (RFC 7519 section 2).
///
/// Integers and fractional numbers are both accepted. Fractions are
/// truncated to whole seconds and values past `i64::MAX` saturate.
fn numeric_date<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<NumericDate>::deserialize(deserializer)?.map(|date| date.0))
}

struct NumericDate(i64);

impl<'de> Deserialize<'de> for NumericDate {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(NumericDateVisitor)
    }
}

struct NumericDateVisitor;

impl Visitor<'_> for NumericDateVisitor {
    type Value = NumericDate;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a number of seconds since the Unix epoch")
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<NumericDate, E> {
        Ok(NumericDate(value))
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<NumericDate, E> {
        Ok(NumericDate(i64::try_from(value).unwrap_or(i64::MAX)))
    }

    // `as` saturates at the i64 bounds.
    #[allow(clippy::cast_possible_truncation)]
    fn visit_f64<E: de::Error>(self, value: f64) -> Result<NumericDate, E> {
        if !value.is_finite() {
            return Err(E::invalid_value(Unexpected::Float(value), &self));
        }
        Ok(NumericDate(value.trunc() as i64))
    }
}
