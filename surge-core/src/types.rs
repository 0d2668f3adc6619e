//! Strongly-typed identifiers for Surge entities.
//!
//! Explicit types prevent bugs from mixing up a worker lane with a store node.

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Macro to generate strongly-typed ID wrappers.
///
/// Each ID type wraps a u64 and provides:
/// - Type safety (can't mix `WorkerId` with `NodeId`)
/// - Debug/Display formatting
/// - Transparent serialization (a plain number in the result log)
macro_rules! define_id {
    ($name:ident, $prefix:expr, $doc:expr) => {
        #[doc = $doc]
        #[derive(
            Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        #[repr(transparent)]
        pub struct $name(u64);

        impl $name {
            /// Creates a new ID from a raw u64 value.
            #[inline]
            #[must_use]
            pub const fn new(value: u64) -> Self {
                Self(value)
            }

            /// Returns the raw u64 value.
            #[inline]
            #[must_use]
            pub const fn get(self) -> u64 {
                self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", $prefix, self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}-{}", $prefix, self.0)
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self::new(value)
            }
        }

        impl From<$name> for u64 {
            fn from(id: $name) -> Self {
                id.get()
            }
        }
    };
}

define_id!(WorkerId, "worker", "Identifier of the worker lane that issued an operation.");
define_id!(NodeId, "node", "Identifier of the store node an operation was routed to.");

/// Access key of a synthetic record.
///
/// Keys are UUIDv7: the high bits carry the creation time in milliseconds and
/// the remaining 74 bits come from the caller's RNG, so keys are time-ordered
/// and unique with overwhelming probability.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordKey(Uuid);

impl RecordKey {
    /// Mints a new time-ordered key.
    ///
    /// # Arguments
    ///
    /// * `unix_millis` - Creation time in milliseconds since the Unix epoch.
    /// * `rng` - Source of the random bits.
    #[must_use]
    pub fn generate<R: Rng + ?Sized>(unix_millis: u64, rng: &mut R) -> Self {
        let mut random = [0u8; 10];
        rng.fill(&mut random);
        Self(uuid::Builder::from_unix_timestamp_millis(unix_millis, &random).into_uuid())
    }

    /// Wraps an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Debug for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "key({})", self.0)
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_id_type_safety() {
        let worker = WorkerId::new(1);
        let node = NodeId::new(1);

        // Different types even with the same value.
        assert_eq!(worker.get(), node.get());
    }

    #[test]
    fn test_id_display() {
        let node = NodeId::new(42);
        assert_eq!(format!("{node}"), "node-42");
        assert_eq!(format!("{node:?}"), "node(42)");
    }

    #[test]
    fn test_id_serializes_as_number() {
        let json = serde_json::to_string(&WorkerId::new(7)).unwrap();
        assert_eq!(json, "7");
    }

    #[test]
    fn test_record_key_is_time_ordered() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let earlier = RecordKey::generate(1_000, &mut rng);
        let later = RecordKey::generate(2_000, &mut rng);

        assert!(earlier < later);
        assert_eq!(earlier.as_uuid().get_version_num(), 7);
    }

    #[test]
    fn test_record_keys_unique_within_same_millisecond() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let keys: std::collections::HashSet<_> =
            (0..1_000).map(|_| RecordKey::generate(5_000, &mut rng)).collect();
        assert_eq!(keys.len(), 1_000);
    }
}
