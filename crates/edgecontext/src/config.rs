//! Edge context configuration.
//!
//! Configuration is loaded from environment variables, with defaults that
//! match the production secret-store layout.

use std::collections::HashMap;
use std::env;
use std::time::Duration;
use thiserror::Error;

/// Default secret-store path of the versioned token verification keys.
pub const DEFAULT_PUBLIC_KEY_SECRET_PATH: &str = "secret/authentication/public-key";

/// Default clock skew tolerance for `exp` / `nbf` checks.
pub const DEFAULT_LEEWAY: Duration = Duration::from_secs(0);

/// Maximum allowed clock skew tolerance (10 minutes).
///
/// Prevents a misconfiguration from accepting long-expired tokens.
pub const MAX_LEEWAY: Duration = Duration::from_secs(600);

/// Default maximum token size in bytes (8KB).
///
/// Tokens above this size are rejected before base64 decoding or any
/// cryptographic work. Typical tokens are well under 1KB.
pub const DEFAULT_MAX_TOKEN_BYTES: usize = 8192;

/// Edge context configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Secret-store path holding the versioned public keys.
    pub public_key_secret_path: String,

    /// Clock skew tolerance applied to `exp` and `nbf`.
    pub leeway: Duration,

    /// Tokens longer than this are rejected as `TokenTooLarge`.
    pub max_token_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            public_key_secret_path: DEFAULT_PUBLIC_KEY_SECRET_PATH.to_string(),
            leeway: DEFAULT_LEEWAY,
            max_token_bytes: DEFAULT_MAX_TOKEN_BYTES,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid JWT leeway configuration: {0}")]
    InvalidLeeway(String),

    #[error("Invalid max token size configuration: {0}")]
    InvalidMaxTokenBytes(String),

    #[error("Invalid secret path configuration: {0}")]
    InvalidSecretPath(String),
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is present but invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is present but invalid.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let public_key_secret_path = match vars.get("EDGECONTEXT_PUBLIC_KEY_SECRET_PATH") {
            Some(path) if path.trim().is_empty() => {
                return Err(ConfigError::InvalidSecretPath(
                    "EDGECONTEXT_PUBLIC_KEY_SECRET_PATH must not be empty".to_string(),
                ));
            }
            Some(path) => path.clone(),
            None => DEFAULT_PUBLIC_KEY_SECRET_PATH.to_string(),
        };

        let leeway = if let Some(value_str) = vars.get("EDGECONTEXT_JWT_LEEWAY_SECONDS") {
            let secs: u64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidLeeway(format!(
                    "EDGECONTEXT_JWT_LEEWAY_SECONDS must be a non-negative integer, got '{value_str}': {e}"
                ))
            })?;
            let leeway = Duration::from_secs(secs);
            if leeway > MAX_LEEWAY {
                return Err(ConfigError::InvalidLeeway(format!(
                    "EDGECONTEXT_JWT_LEEWAY_SECONDS must not exceed {} seconds, got {secs}",
                    MAX_LEEWAY.as_secs()
                )));
            }
            leeway
        } else {
            DEFAULT_LEEWAY
        };

        let max_token_bytes = if let Some(value_str) = vars.get("EDGECONTEXT_MAX_TOKEN_BYTES") {
            let value: usize = value_str.parse().map_err(|e| {
                ConfigError::InvalidMaxTokenBytes(format!(
                    "EDGECONTEXT_MAX_TOKEN_BYTES must be a valid integer, got '{value_str}': {e}"
                ))
            })?;
            if value == 0 {
                return Err(ConfigError::InvalidMaxTokenBytes(
                    "EDGECONTEXT_MAX_TOKEN_BYTES must be positive".to_string(),
                ));
            }
            value
        } else {
            DEFAULT_MAX_TOKEN_BYTES
        };

        Ok(Self {
            public_key_secret_path,
            leeway,
            max_token_bytes,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = Config::from_vars(&HashMap::new()).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(
            config.public_key_secret_path,
            "secret/authentication/public-key"
        );
        assert_eq!(config.leeway, Duration::ZERO);
        assert_eq!(config.max_token_bytes, 8192);
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_vars(&vars(&[
            ("EDGECONTEXT_PUBLIC_KEY_SECRET_PATH", "secret/custom/keys"),
            ("EDGECONTEXT_JWT_LEEWAY_SECONDS", "30"),
            ("EDGECONTEXT_MAX_TOKEN_BYTES", "4096"),
        ]))
        .unwrap();

        assert_eq!(config.public_key_secret_path, "secret/custom/keys");
        assert_eq!(config.leeway, Duration::from_secs(30));
        assert_eq!(config.max_token_bytes, 4096);
    }

    #[test]
    fn test_leeway_at_max_is_accepted() {
        let config =
            Config::from_vars(&vars(&[("EDGECONTEXT_JWT_LEEWAY_SECONDS", "600")])).unwrap();
        assert_eq!(config.leeway, MAX_LEEWAY);
    }

    #[test]
    fn test_leeway_above_max_is_rejected() {
        let result = Config::from_vars(&vars(&[("EDGECONTEXT_JWT_LEEWAY_SECONDS", "601")]));
        assert!(matches!(result, Err(ConfigError::InvalidLeeway(_))));
    }

    #[test]
    fn test_negative_leeway_is_rejected() {
        let result = Config::from_vars(&vars(&[("EDGECONTEXT_JWT_LEEWAY_SECONDS", "-5")]));
        assert!(matches!(result, Err(ConfigError::InvalidLeeway(_))));
    }

    #[test]
    fn test_zero_max_token_bytes_is_rejected() {
        let result = Config::from_vars(&vars(&[("EDGECONTEXT_MAX_TOKEN_BYTES", "0")]));
        assert!(matches!(result, Err(ConfigError::InvalidMaxTokenBytes(_))));
    }

    #[test]
    fn test_non_numeric_max_token_bytes_is_rejected() {
        let result = Config::from_vars(&vars(&[("EDGECONTEXT_MAX_TOKEN_BYTES", "lots")]));
        assert!(matches!(result, Err(ConfigError::InvalidMaxTokenBytes(_))));
    }

    #[test]
    fn test_empty_secret_path_is_rejected() {
        let result = Config::from_vars(&vars(&[("EDGECONTEXT_PUBLIC_KEY_SECRET_PATH", " ")]));
        assert!(matches!(result, Err(ConfigError::InvalidSecretPath(_))));
    }
}
