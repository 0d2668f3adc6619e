//! Registry of successfully written keys.
//!
//! Writes append their key after the store acknowledges them; reads sample a
//! key uniformly at random. The registry only grows during a run and is owned
//! by that run, so concurrent runs never share keys.

use std::sync::Arc;

use parking_lot::Mutex;
use rand::seq::SliceRandom;
use rand::Rng;
use surge_core::RecordKey;

/// Shared, append-only set of written keys.
///
/// Cloning yields another handle to the same registry.
#[derive(Debug, Clone, Default)]
pub struct KeyRegistry {
    keys: Arc<Mutex<Vec<RecordKey>>>,
}

impl KeyRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a key.
    pub fn record(&self, key: RecordKey) {
        self.keys.lock().push(key);
    }

    /// Returns a uniformly random key, or `None` if the registry is empty.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<RecordKey> {
        self.keys.lock().choose(rng).copied()
    }

    /// Returns up to `count` distinct keys chosen uniformly at random.
    pub fn sample_many<R: Rng + ?Sized>(&self, count: usize, rng: &mut R) -> Vec<RecordKey> {
        let keys = self.keys.lock();
        keys.choose_multiple(rng, count).copied().collect()
    }

    /// Returns the number of registered keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.lock().len()
    }

    /// Returns true if no key has been registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.lock().is_empty()
    }
}
