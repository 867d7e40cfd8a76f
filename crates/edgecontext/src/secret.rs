//! Secret types for values that must never reach logs.
//!
//! Re-exports from the [`secrecy`] crate. Raw authentication tokens and
//! simple or credential secrets from the secret store are carried as
//! [`SecretString`], whose `Debug` output is redacted. Any struct deriving
//! `Debug` over one of these fields is therefore safe to log with `{:?}`.
//!
//! ```rust
//! use edgecontext::secret::{ExposeSecret, SecretString};
//!
//! let token = SecretString::from("eyJhbGciOiJSUzI1NiJ9.e30.sig");
//! assert!(!format!("{token:?}").contains("eyJ"));
//! assert!(token.expose_secret().starts_with("eyJ"));
//! ```

pub use secrecy::{ExposeSecret, SecretString};
