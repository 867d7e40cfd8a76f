//! Edge request context and authentication token validation.
//!
//! Services validate the RS256 authentication tokens carried by inbound
//! requests against a set of public keys that rotate at runtime:
//!
//! - [`rotation::KeyRotationHandler`] turns each secret-store snapshot into
//!   an immutable [`keyring::KeyRing`] and installs it
//! - [`store::KeyRingStore`] hot-swaps the active ring without blocking
//!   readers
//! - [`validator::TokenValidator`] verifies tokens against the active ring
//! - [`context::EdgeRequestContext`] exposes the validated identity to
//!   request handlers
//!
//! ```rust,ignore
//! use edgecontext::config::Config;
//! use edgecontext::rotation::{spawn_rotation_listener, KeyRotationHandler};
//! use edgecontext::store::KeyRingStore;
//! use edgecontext::validator::TokenValidator;
//! use std::sync::Arc;
//!
//! let config = Config::from_env()?;
//! let store = Arc::new(KeyRingStore::new());
//! let handler = KeyRotationHandler::from_config(Arc::clone(&store), &config);
//! let _listener = spawn_rotation_listener(handler, secrets_rx);
//!
//! let validator = TokenValidator::with_config(store, &config);
//! let claims = validator.validate(&token)?;
//! ```

#![warn(clippy::pedantic)]

/// Module for token claims
pub mod claims;

/// Module for validator configuration
pub mod config;

/// Module for the per-request edge context
pub mod context;

/// Module for error types
pub mod error;

/// Module for SSH-style public key fingerprints
pub mod fingerprint;

/// Module for immutable key ring snapshots
pub mod keyring;

/// Module for applying secret rotations to the key ring store
pub mod rotation;

/// Module for secret types that prevent accidental logging
pub mod secret;

/// Module for secret-store snapshots
pub mod secrets;

/// Module for the hot-swappable key ring holder
pub mod store;

/// Module for token validation
pub mod validator;
