//! Key rotation integration tests.
//!
//! Drives `KeyRotationHandler` with versioned secrets built from the RSA
//! fixtures and checks what `TokenValidator` accepts afterwards.

// Test code is allowed to use expect/unwrap for assertions
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

use anyhow::Result;
use edgecontext::error::ValidationError;
use edgecontext::keyring::KeyRing;
use edgecontext::rotation::{spawn_rotation_listener, KeyRotationHandler, SecretsHandler};
use edgecontext::secrets::{Secrets, VersionedSecret};
use edgecontext::store::KeyRingStore;
use edgecontext::validator::TokenValidator;
use edgecontext_test_utils::{
    init_test_tracing, TestTokenBuilder, KEY_1, KEY_2, KEY_3, TEST_KEYS, TRUNCATED_PUBLIC_PEM,
};
use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;
use std::thread;
use tokio::sync::watch;

const PUBLIC_KEY_PATH: &str = "secret/authentication/public-key";

struct Harness {
    store: Arc<KeyRingStore>,
    handler: KeyRotationHandler,
    validator: TokenValidator,
}

impl Harness {
    fn new() -> Self {
        init_test_tracing();
        let store = Arc::new(KeyRingStore::new());
        Self {
            handler: KeyRotationHandler::new(Arc::clone(&store), PUBLIC_KEY_PATH),
            validator: TokenValidator::new(Arc::clone(&store)),
            store,
        }
    }

    fn fallback_fingerprint(&self) -> String {
        self.store
            .current()
            .expect("a ring should be installed")
            .fallback()
            .fingerprint()
            .unwrap()
            .to_string()
    }
}

fn all_three() -> VersionedSecret {
    VersionedSecret::new(KEY_1.public_pem)
        .with_previous(KEY_2.public_pem)
        .with_next(KEY_3.public_pem)
}

// =============================================================================
// Rotation scenarios
// =============================================================================

#[test]
fn test_rotation_with_three_valid_keys() -> Result<()> {
    let h = Harness::new();

    assert!(h.handler.on_rotate(&all_three()));

    let ring = h.store.current().unwrap();
    assert_eq!(ring.len(), 3);
    assert_eq!(h.fallback_fingerprint(), KEY_1.fingerprint);
    for key in TEST_KEYS {
        assert!(ring.get(key.fingerprint).is_some());
    }

    let with_kid = TestTokenBuilder::new()
        .for_subject("t2_rotated")
        .with_kid(KEY_2.fingerprint)
        .sign_rs256(KEY_2.private_pem);
    assert_eq!(
        h.validator.validate(&with_kid)?.subject(),
        Some("t2_rotated")
    );

    let without_kid = TestTokenBuilder::new().sign_rs256(KEY_2.private_pem);
    assert_eq!(
        h.validator.validate(&without_kid),
        Err(ValidationError::InvalidSignature)
    );
    Ok(())
}

#[test]
fn test_rotation_where_only_previous_parses() {
    let h = Harness::new();
    let secret = VersionedSecret::new(TRUNCATED_PUBLIC_PEM)
        .with_previous(KEY_2.public_pem)
        .with_next("not a key");

    assert!(h.handler.on_rotate(&secret));

    let ring = h.store.current().unwrap();
    assert_eq!(ring.len(), 1);
    assert_eq!(h.fallback_fingerprint(), KEY_2.fingerprint);

    // Without a kid the only parsed key is used.
    let token = TestTokenBuilder::new().sign_rs256(KEY_2.private_pem);
    assert!(h.validator.validate(&token).is_ok());
}

#[test]
fn test_failed_rotation_keeps_serving_last_good_keys() {
    let h = Harness::new();
    assert!(h.handler.on_rotate(&VersionedSecret::new(KEY_1.public_pem)));
    let before = h.store.current().unwrap();

    assert!(!h
        .handler
        .on_rotate(&VersionedSecret::new("garbage").with_previous(TRUNCATED_PUBLIC_PEM)));

    let after = h.store.current().unwrap();
    assert!(Arc::ptr_eq(&before, &after));

    let token = TestTokenBuilder::new().sign_rs256(KEY_1.private_pem);
    assert!(h.validator.validate(&token).is_ok());
}

#[test]
fn test_failed_first_rotation_leaves_no_keys() {
    let h = Harness::new();

    assert!(!h.handler.on_rotate(&VersionedSecret::new("garbage")));

    let token = TestTokenBuilder::new().sign_rs256(KEY_1.private_pem);
    assert_eq!(
        h.validator.validate(&token),
        Err(ValidationError::NoKeysLoaded)
    );
}

#[test]
fn test_promoting_next_key_to_current() {
    let h = Harness::new();
    assert!(h.handler.on_rotate(&all_three()));

    // Key 3 becomes current, key 1 becomes previous, key 2 is retired.
    assert!(h.handler.on_rotate(
        &VersionedSecret::new(KEY_3.public_pem).with_previous(KEY_1.public_pem)
    ));

    assert_eq!(h.fallback_fingerprint(), KEY_3.fingerprint);

    let from_new_current = TestTokenBuilder::new().sign_rs256(KEY_3.private_pem);
    assert!(h.validator.validate(&from_new_current).is_ok());

    let from_previous = TestTokenBuilder::new()
        .with_kid(KEY_1.fingerprint)
        .sign_rs256(KEY_1.private_pem);
    assert!(h.validator.validate(&from_previous).is_ok());

    let from_retired = TestTokenBuilder::new()
        .with_kid(KEY_2.fingerprint)
        .sign_rs256(KEY_2.private_pem);
    assert_eq!(
        h.validator.validate(&from_retired),
        Err(ValidationError::InvalidSignature)
    );
}

#[test]
fn test_on_secrets_from_secret_store_document() -> Result<()> {
    let h = Harness::new();
    let document = serde_json::json!({
        "secrets": {
            (PUBLIC_KEY_PATH): {
                "type": "versioned",
                "current": KEY_1.public_pem,
                "previous": KEY_2.public_pem,
            }
        }
    });
    let secrets = Secrets::from_json(&document.to_string())?;

    assert!(h.handler.on_secrets(&secrets));
    assert_eq!(h.store.current().unwrap().len(), 2);
    Ok(())
}

#[test]
fn test_validation_during_rotation_sees_whole_rings() {
    let h = Harness::new();
    assert!(h.handler.on_rotate(&VersionedSecret::new(KEY_1.public_pem)));

    // Every ring installed below keeps key 1 as the fallback, so a token
    // signed by key 1 must validate no matter which ring a reader observes.
    let token = TestTokenBuilder::new().sign_rs256(KEY_1.private_pem);

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let validator = h.validator.clone();
            let token = token.clone();
            thread::spawn(move || {
                for _ in 0..50 {
                    validator.validate(&token).expect("token should validate");
                }
            })
        })
        .collect();

    for i in 0..50 {
        let secret = if i % 2 == 0 {
            all_three()
        } else {
            VersionedSecret::new(KEY_1.public_pem)
        };
        assert!(h.handler.on_rotate(&secret));
    }

    for reader in readers {
        reader.join().unwrap();
    }
}

// =============================================================================
// Rotation listener
// =============================================================================

#[tokio::test]
async fn test_listener_tracks_secret_store_updates() {
    let h = Harness::new();
    let (tx, rx) = watch::channel(
        Secrets::new().with_versioned(PUBLIC_KEY_PATH, VersionedSecret::new(KEY_1.public_pem)),
    );

    let listener = spawn_rotation_listener(h.handler.clone(), rx);

    tx.send(Secrets::new().with_versioned(
        PUBLIC_KEY_PATH,
        VersionedSecret::new(KEY_2.public_pem).with_previous(KEY_1.public_pem),
    ))
    .unwrap();
    drop(tx);
    listener.await.unwrap();

    assert_eq!(h.fallback_fingerprint(), KEY_2.fingerprint);
    let token = TestTokenBuilder::new().sign_rs256(KEY_2.private_pem);
    assert!(h.validator.validate(&token).is_ok());
}

#[tokio::test]
async fn test_listener_ignores_snapshot_without_keys() {
    let h = Harness::new();
    let (tx, rx) = watch::channel(
        Secrets::new().with_versioned(PUBLIC_KEY_PATH, VersionedSecret::new(KEY_1.public_pem)),
    );

    let listener = spawn_rotation_listener(Arc::new(h.handler.clone()), rx);

    tx.send(Secrets::new()).unwrap();
    drop(tx);
    listener.await.unwrap();

    assert_eq!(h.fallback_fingerprint(), KEY_1.fingerprint);
}

// =============================================================================
// Property tests
// =============================================================================

#[derive(Debug, Clone)]
enum Candidate {
    Valid(usize),
    Invalid(String),
}

impl Candidate {
    fn pem(&self) -> &str {
        match self {
            Candidate::Valid(i) => TEST_KEYS[*i].public_pem,
            Candidate::Invalid(s) => s,
        }
    }
}

fn candidate() -> impl Strategy<Value = Candidate> {
    prop_oneof![
        (0..TEST_KEYS.len()).prop_map(Candidate::Valid),
        any::<String>().prop_map(Candidate::Invalid),
        Just(Candidate::Invalid(TRUNCATED_PUBLIC_PEM.to_string())),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_fallback_is_first_parseable_candidate(
        candidates in prop::collection::vec(candidate(), 0..6)
    ) {
        let ring = KeyRing::build(candidates.iter().map(Candidate::pem));

        let valid: Vec<usize> = candidates
            .iter()
            .filter_map(|c| match c {
                Candidate::Valid(i) => Some(*i),
                Candidate::Invalid(_) => None,
            })
            .collect();

        match valid.first() {
            None => prop_assert!(ring.is_none()),
            Some(&first) => {
                let ring = ring.expect("ring with a parseable candidate");
                let fallback_fp = ring.fallback().fingerprint().unwrap();
                prop_assert_eq!(
                    fallback_fp.as_str(),
                    TEST_KEYS[first].fingerprint
                );
                let distinct: HashSet<usize> = valid.iter().copied().collect();
                prop_assert_eq!(ring.len(), distinct.len());
                prop_assert_eq!(ring.resolve(Some("SHA256:unknown")), ring.fallback());
                prop_assert_eq!(ring.resolve(None), ring.fallback());
            }
        }
    }
}
