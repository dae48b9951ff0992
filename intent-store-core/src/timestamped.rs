//! Timestamped values
//!
//! The merge primitive of a replicated map: when a remote update arrives for a
//! key, the map keeps whichever `Timestamped` is newer and drops the other,
//! without coordinating with anyone.

use core::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// A value paired with its timestamp.
///
/// Equality and hashing look at the timestamp only, never at the payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Timestamped<T, S> {
    value: T,
    timestamp: S,
}

impl<T, S: Ord> Timestamped<T, S> {
    /// Create a timestamped value
    pub fn new(value: T, timestamp: S) -> Self {
        Self { value, timestamp }
    }

    /// The value
    pub fn value(&self) -> &T {
        &self.value
    }

    /// The timestamp
    pub fn timestamp(&self) -> &S {
        &self.timestamp
    }

    /// Split into value and timestamp
    pub fn into_parts(self) -> (T, S) {
        (self.value, self.timestamp)
    }

    /// Tests whether this value is strictly newer than `other`
    pub fn is_newer(&self, other: &Timestamped<T, S>) -> bool {
        self.timestamp > other.timestamp
    }

    /// Tests whether this value is strictly newer than a bare timestamp
    pub fn is_newer_than(&self, timestamp: &S) -> bool {
        self.timestamp > *timestamp
    }
}

impl<T, S: PartialEq> PartialEq for Timestamped<T, S> {
    fn eq(&self, other: &Self) -> bool {
        self.timestamp == other.timestamp
    }
}

impl<T, S: Eq> Eq for Timestamped<T, S> {}

impl<T, S: Hash> Hash for Timestamped<T, S> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.timestamp.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn newer_timestamp_wins() {
        let old = Timestamped::new("a", 1u64);
        let new = Timestamped::new("b", 2u64);

        assert!(new.is_newer(&old));
        assert!(!old.is_newer(&new));
        assert!(!old.is_newer(&old));
    }

    #[test]
    fn equality_ignores_payload() {
        let a = Timestamped::new("a", 7u64);
        let b = Timestamped::new("b", 7u64);

        assert_eq!(a, b);

        let mut set = HashSet::new();
        set.insert(a);
        assert!(!set.insert(b));
    }
}
