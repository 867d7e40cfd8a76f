//! Secret-store snapshot model.
//!
//! The secret store publishes a JSON document mapping paths to typed
//! secrets:
//!
//! ```json
//! {
//!   "secrets": {
//!     "secret/authentication/public-key": {
//!       "type": "versioned",
//!       "current": "-----BEGIN PUBLIC KEY-----...",
//!       "previous": "-----BEGIN PUBLIC KEY-----..."
//!     },
//!     "secret/some/api-key": {"type": "simple", "value": "..."}
//!   }
//! }
//! ```
//!
//! Each publication is parsed into one immutable [`Secrets`] snapshot.
//! Unknown top-level sections and unknown per-secret fields are ignored.

use crate::error::SecretsError;
use crate::secret::SecretString;
use serde::Deserialize;
use std::collections::HashMap;

/// A secret with rotation slots.
///
/// `current` is always present. During a rotation window `previous` holds
/// the retiring value and `next` the upcoming one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct VersionedSecret {
    pub current: String,

    #[serde(default)]
    pub previous: Option<String>,

    #[serde(default)]
    pub next: Option<String>,
}

impl VersionedSecret {
    /// A secret with only a current value.
    pub fn new(current: impl Into<String>) -> Self {
        Self {
            current: current.into(),
            previous: None,
            next: None,
        }
    }

    #[must_use]
    pub fn with_previous(mut self, previous: impl Into<String>) -> Self {
        self.previous = Some(previous.into());
        self
    }

    #[must_use]
    pub fn with_next(mut self, next: impl Into<String>) -> Self {
        self.next = Some(next.into());
        self
    }

    /// All versions in priority order: current, previous, next.
    ///
    /// `current` is always yielded. `previous` and `next` are skipped when
    /// absent or empty.
    #[must_use]
    pub fn all_versions(&self) -> Vec<&str> {
        let mut versions = Vec::with_capacity(3);
        versions.push(self.current.as_str());
        versions.extend(
            [self.previous.as_deref(), self.next.as_deref()]
                .into_iter()
                .flatten()
                .filter(|v| !v.is_empty()),
        );
        versions
    }
}

/// One secret-store entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Secret {
    Simple { value: SecretString },
    Versioned(VersionedSecret),
    Credential {
        username: String,
        password: SecretString,
    },
}

impl Secret {
    /// The `type` tag as written in the secret-store document.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Secret::Simple { .. } => "simple",
            Secret::Versioned(_) => "versioned",
            Secret::Credential { .. } => "credential",
        }
    }
}

/// One snapshot of the secret store.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Secrets {
    #[serde(default)]
    secrets: HashMap<String, Secret>,
}

impl Secrets {
    /// An empty snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a secret-store JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`SecretsError::Parse`] if the document is not valid JSON or
    /// an entry has an unknown type or missing fields.
    pub fn from_json(json: &str) -> Result<Self, SecretsError> {
        serde_json::from_str(json).map_err(|e| SecretsError::Parse(e.to_string()))
    }

    /// Add or replace a versioned secret.
    #[must_use]
    pub fn with_versioned(mut self, path: impl Into<String>, secret: VersionedSecret) -> Self {
        self.secrets.insert(path.into(), Secret::Versioned(secret));
        self
    }

    /// Add or replace a simple secret.
    #[must_use]
    pub fn with_simple(mut self, path: impl Into<String>, value: SecretString) -> Self {
        self.secrets.insert(path.into(), Secret::Simple { value });
        self
    }

    /// Raw entry at `path`, if any.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&Secret> {
        self.secrets.get(path)
    }

    /// The versioned secret at `path`.
    ///
    /// # Errors
    ///
    /// - [`SecretsError::NotFound`] if nothing is stored at `path`
    /// - [`SecretsError::WrongType`] if the entry is not versioned
    pub fn versioned(&self, path: &str) -> Result<&VersionedSecret, SecretsError> {
        match self.lookup(path)? {
            Secret::Versioned(secret) => Ok(secret),
            other => Err(wrong_type(path, "versioned", other)),
        }
    }

    /// The simple secret at `path`.
    ///
    /// # Errors
    ///
    /// - [`SecretsError::NotFound`] if nothing is stored at `path`
    /// - [`SecretsError::WrongType`] if the entry is not simple
    pub fn simple(&self, path: &str) -> Result<&SecretString, SecretsError> {
        match self.lookup(path)? {
            Secret::Simple { value } => Ok(value),
            other => Err(wrong_type(path, "simple", other)),
        }
    }

    /// Number of entries in the snapshot.
    #[must_use]
    pub fn len(&self) -> usize {
        self.secrets.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.secrets.is_empty()
    }

    fn lookup(&self, path: &str) -> Result<&Secret, SecretsError> {
        self.secrets
            .get(path)
            .ok_or_else(|| SecretsError::NotFound(path.to_string()))
    }
}

fn wrong_type(path: &str, expected: &'static str, actual: &Secret) -> SecretsError {
    SecretsError::WrongType {
        path: path.to_string(),
        expected,
        actual: actual.type_name(),
    }
}
