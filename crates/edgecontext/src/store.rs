//! Hot-swappable holder for the active [`KeyRing`].
//!
//! Readers take a snapshot with [`KeyRingStore::current`] without locking;
//! the rotation handler replaces the whole ring with [`KeyRingStore::install`].
//! A reader sees either the old ring or the new one, never a partial ring,
//! and a snapshot it already holds stays valid after a newer ring is
//! installed.

use crate::keyring::KeyRing;
use arc_swap::ArcSwapOption;
use std::fmt;
use std::sync::Arc;

/// Holds the latest [`KeyRing`], or nothing before the first rotation.
///
/// Share one store (behind an `Arc`) between the
/// [`TokenValidator`](crate::validator::TokenValidator) and the
/// [`KeyRotationHandler`](crate::rotation::KeyRotationHandler).
#[derive(Default)]
pub struct KeyRingStore {
    current: ArcSwapOption<KeyRing>,
}

impl KeyRingStore {
    /// Create an empty store. Validation fails with `NoKeysLoaded` until a
    /// ring is installed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the active ring, if any.
    #[must_use]
    pub fn current(&self) -> Option<Arc<KeyRing>> {
        self.current.load_full()
    }

    /// Replace the active ring.
    pub fn install(&self, ring: KeyRing) {
        self.current.store(Some(Arc::new(ring)));
    }

    /// Whether a ring has ever been installed.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.current.load().is_some()
    }
}

impl fmt::Debug for KeyRingStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyRingStore")
            .field("current", &self.current.load().as_deref())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    const KEY_A: &str = "-----BEGIN PUBLIC KEY-----
MIIBIjANBgkqhkiG9w0BAQEFAAOCAQ8AMIIBCgKCAQEAtzMnDEQPd75QZByogNlB
NY2auyr4sy8UNTDARs79Edq/Jw5tb7ub412mOB61mVrcuFZW6xfmCRt0ILgoaT66
Tp1RpuEfghD+e7bYZ+Q2pckC1ZaVPIVVf/ZcCZ0tKQHoD8EpyyFINKjCh516VrCx
KuOm2fALPB/xDwDBEdeVJlh5/3HHP2V35scdvDRkvr2qkcvhzoy0+7wUWFRZ2n6H
TFrxMHQoHg0tutAJEkjsMw9xfN7V07c952SHNRZvu80V5EEpnKw/iYKXUjCmoXm8
tpJv5kXH6XPgfvOirSbTfuo+0VGqVIx9gcomzJ0I5WfGTD22dAxDiRT7q7KZnNgt
TwIDAQAB
-----END PUBLIC KEY-----";

    const KEY_B: &str = "-----BEGIN PUBLIC KEY-----
MIIBIjANBgkqhkiG9w0BAQEFAAOCAQ8AMIIBCgKCAQEAycU1W/hMRWNLkaJPEwWg
j36URuSaRTV0BEvY+L0nRseCnEdlIsj8LCI+ydk3HlJqj3QicuCP9U0W5JAP4PYB
Xs+dV/J38fqdYfI1myXRG2wU5USziF3OC3YYZIXiPe41IltP7LSUmyRO/F6jAcUj
ZmRP2sxhIjY/77nQbx1F3ZMF2i91CRyaIfyd2pC8pwA4VElBTZaP9j3xXEsA8VIX
F/PSVcDsm3GoxVkwQbJTr54GedsRMoex574rvt8iujiNQ7Cb0uXWFIfnlD1thnne
4ws5ekuVhT6lq1KDB2z4e/pN2cOEzzSmfJJK1AWS79R4sAO8Fm/8cpWx6MRhlAbv
HwIDAQAB
-----END PUBLIC KEY-----";

    #[test]
    fn test_new_store_is_empty() {
        let store = KeyRingStore::new();
        assert!(store.current().is_none());
        assert!(!store.is_loaded());
    }

    #[test]
    fn test_install_then_current() {
        let store = KeyRingStore::new();
        store.install(KeyRing::build([KEY_A]).unwrap());

        let ring = store.current().unwrap();
        assert!(store.is_loaded());
        assert_eq!(ring.len(), 1);
    }

    #[test]
    fn test_held_snapshot_survives_replacement() {
        let store = KeyRingStore::new();
        store.install(KeyRing::build([KEY_A]).unwrap());
        let old = store.current().unwrap();

        store.install(KeyRing::build([KEY_B, KEY_A]).unwrap());
        let new = store.current().unwrap();

        assert_eq!(old.len(), 1);
        assert_eq!(new.len(), 2);
        assert_ne!(old.fallback(), new.fallback());
    }

    #[test]
    fn test_concurrent_readers_see_whole_rings() {
        let store = Arc::new(KeyRingStore::new());
        let ring_a = KeyRing::build([KEY_A]).unwrap();
        let ring_ab = KeyRing::build([KEY_B, KEY_A]).unwrap();
        store.install(ring_a.clone());

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for _ in 0..1_000 {
                        let ring = store.current().unwrap();
                        // Either the single-key ring or the two-key ring.
                        assert!(ring.len() == 1 || ring.len() == 2);
                    }
                })
            })
            .collect();

        for i in 0..200 {
            if i % 2 == 0 {
                store.install(ring_ab.clone());
            } else {
                store.install(ring_a.clone());
            }
        }

        for reader in readers {
            reader.join().unwrap();
        }
    }
}
