//! # Edge Context Test Utilities
//!
//! Shared test utilities for the `edgecontext` crate.
//!
//! This crate provides:
//! - Deterministic crypto fixtures (fixed RSA key pairs with known
//!   fingerprints, tokens minted by the production issuer)
//! - Test token builders (`TestTokenBuilder` signing RS256, HS256 or
//!   nothing at all)
//! - Test tracing setup
//!
//! ## Usage
//!
//! ```rust,ignore
//! use edgecontext_test_utils::*;
//!
//! #[test]
//! fn test_example() {
//!     init_test_tracing();
//!
//!     let token = TestTokenBuilder::new()
//!         .for_subject("t2_alice")
//!         .with_kid(KEY_2.fingerprint)
//!         .sign_rs256(KEY_2.private_pem);
//! }
//! ```

pub mod crypto_fixtures;
pub mod logging;
pub mod token_builders;

// Re-export commonly used items
pub use crypto_fixtures::*;
pub use logging::*;
pub use token_builders::*;
