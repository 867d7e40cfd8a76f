//! Key rotation.
//!
//! Turns secret-store updates into fresh [`KeyRing`] snapshots:
//!
//! 1. Read the versioned public-key secret from the snapshot
//! 2. Build a ring from its versions (current, previous, next)
//! 3. Install the ring, or keep the existing one when no key parsed
//!
//! A rotation that yields no usable key never clears the store. Validation
//! keeps working against the last good ring until a good rotation arrives.
//!
//! # Driving rotation
//!
//! Embedders that receive secret-store snapshots through a
//! `tokio::sync::watch` channel can hand the receiver to
//! [`spawn_rotation_listener`]. Others call
//! [`SecretsHandler::on_secrets`] or [`KeyRotationHandler::on_rotate`]
//! directly from their own notification path.

use crate::config::Config;
use crate::keyring::KeyRing;
use crate::secrets::{Secrets, VersionedSecret};
use crate::store::KeyRingStore;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument};

/// Receives every new secret-store snapshot.
///
/// Handlers run synchronously on the notifying task and must not block.
pub trait SecretsHandler: Send + Sync {
    /// Apply a snapshot. Returns whether the handler changed its state.
    fn on_secrets(&self, secrets: &Secrets) -> bool;
}

impl<H: SecretsHandler + ?Sized> SecretsHandler for Arc<H> {
    fn on_secrets(&self, secrets: &Secrets) -> bool {
        (**self).on_secrets(secrets)
    }
}

/// Installs a new [`KeyRing`] into a [`KeyRingStore`] on each rotation.
#[derive(Debug, Clone)]
pub struct KeyRotationHandler {
    store: Arc<KeyRingStore>,
    secret_path: String,
}

impl KeyRotationHandler {
    /// Create a handler that reads keys from `secret_path`.
    pub fn new(store: Arc<KeyRingStore>, secret_path: impl Into<String>) -> Self {
        Self {
            store,
            secret_path: secret_path.into(),
        }
    }

    /// Create a handler that reads keys from the configured secret path.
    #[must_use]
    pub fn from_config(store: Arc<KeyRingStore>, config: &Config) -> Self {
        Self::new(store, config.public_key_secret_path.clone())
    }

    #[must_use]
    pub fn secret_path(&self) -> &str {
        &self.secret_path
    }

    /// Build a ring from `secret` and install it.
    ///
    /// Returns `true` if a new ring was installed. Returns `false` when no
    /// version parsed, in which case the store keeps its previous ring (or
    /// stays empty).
    #[instrument(skip_all)]
    pub fn on_rotate(&self, secret: &VersionedSecret) -> bool {
        let Some(ring) = KeyRing::build(secret.all_versions()) else {
            return false;
        };

        let fallback = ring
            .fallback()
            .fingerprint()
            .map_or_else(|_| "<unavailable>".to_string(), String::from);
        info!(
            target: "edgecontext.rotation",
            key_count = ring.len(),
            fallback = %fallback,
            "Installed rotated public keys"
        );

        self.store.install(ring);
        true
    }
}

impl SecretsHandler for KeyRotationHandler {
    /// Look up the configured path in `secrets` and rotate.
    ///
    /// A missing or non-versioned secret is logged and leaves the store
    /// untouched.
    #[instrument(skip_all)]
    fn on_secrets(&self, secrets: &Secrets) -> bool {
        match secrets.versioned(&self.secret_path) {
            Ok(secret) => self.on_rotate(secret),
            Err(e) => {
                error!(
                    target: "edgecontext.rotation",
                    secret_path = %self.secret_path,
                    error = %e,
                    "Failed to get public key secret"
                );
                false
            }
        }
    }
}

/// Apply secret-store snapshots from `secrets_rx` to `handler`.
///
/// The snapshot already in the channel is applied immediately, then every
/// later change. The task ends when the sender is dropped. Consecutive
/// updates that arrive while a rotation is running are coalesced into the
/// latest one.
pub fn spawn_rotation_listener<H>(
    handler: H,
    mut secrets_rx: watch::Receiver<Secrets>,
) -> JoinHandle<()>
where
    H: SecretsHandler + 'static,
{
    tokio::spawn(async move {
        loop {
            // Clone out so the watch borrow is released before rotating.
            let snapshot = secrets_rx.borrow_and_update().clone();
            handler.on_secrets(&snapshot);

            if secrets_rx.changed().await.is_err() {
                debug!(
                    target: "edgecontext.rotation",
                    "Secrets sender dropped, stopping rotation listener"
                );
                break;
            }
        }
    })
}
