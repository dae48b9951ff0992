//! Logical clocks and version stamps
//!
//! Two timestamp flavors are used by the store:
//!
//! - [`WallClockTimestamp`]: wall time plus a per-node counter and the node id as
//!   tie breaker. Issued by [`HybridClock`] when a request is submitted; it is the
//!   version of the record and the timestamp of the pending map, where every
//!   update is first written by its origin.
//! - [`MultiValuedTimestamp`]: the record version followed by a per-writer
//!   counter and the writer id. Used by the current map, where whichever node
//!   masters a key may overwrite it.
//!
//! Both derive `Ord` field by field, so comparison is a strict total order and
//! two stamps are equal only when every component is equal.
//!
//! Replicated maps do not inspect values to stamp them; they call the
//! [`LogicalClock`] strategy they were built with.

use core::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::ids::NodeId;

/// Wall-clock based version stamp
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WallClockTimestamp {
    unix_millis: u64,
    counter: u32,
    node: NodeId,
}

impl WallClockTimestamp {
    /// Create a stamp from its components
    pub fn new(unix_millis: u64, counter: u32, node: NodeId) -> Self {
        Self {
            unix_millis,
            counter,
            node,
        }
    }

    /// Wall time component (milliseconds since the Unix epoch)
    pub fn unix_millis(&self) -> u64 {
        self.unix_millis
    }

    /// Logical counter within the same millisecond
    pub fn counter(&self) -> u32 {
        self.counter
    }

    /// Node that issued the stamp
    pub fn node(&self) -> &NodeId {
        &self.node
    }
}

/// Multi-valued version stamp: record version, then writer counter, then writer.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MultiValuedTimestamp {
    version: Option<WallClockTimestamp>,
    counter: u64,
    writer: NodeId,
}

impl MultiValuedTimestamp {
    /// Create a stamp from its components
    pub fn new(version: Option<WallClockTimestamp>, counter: u64, writer: NodeId) -> Self {
        Self {
            version,
            counter,
            writer,
        }
    }

    /// Record version this stamp was derived from
    pub fn version(&self) -> Option<&WallClockTimestamp> {
        self.version.as_ref()
    }

    /// Writer-local counter
    pub fn counter(&self) -> u64 {
        self.counter
    }

    /// Node that wrote the value
    pub fn writer(&self) -> &NodeId {
        &self.writer
    }
}

/// Hybrid logical clock issuing [`WallClockTimestamp`]s for one node.
///
/// Every stamp is strictly greater than the previous one from the same clock,
/// even if the wall clock goes backward or several stamps share a millisecond.
#[derive(Debug, Clone)]
pub struct HybridClock {
    node: NodeId,
    wall_ms: u64,
    counter: u32,
}

impl HybridClock {
    /// Create a clock for `node`
    pub fn new(node: NodeId) -> Self {
        Self {
            node,
            wall_ms: 0,
            counter: 0,
        }
    }

    /// Issue the next stamp given the current wall time in milliseconds
    pub fn tick(&mut self, now_ms: u64) -> WallClockTimestamp {
        if now_ms > self.wall_ms {
            self.wall_ms = now_ms;
            self.counter = 0;
        } else if self.counter == u32::MAX {
            self.wall_ms += 1;
            self.counter = 0;
        } else {
            self.counter += 1;
        }
        WallClockTimestamp::new(self.wall_ms, self.counter, self.node.clone())
    }

    /// Observe a remote stamp so the next tick sorts after it
    pub fn observe(&mut self, remote: &WallClockTimestamp) {
        if remote.unix_millis > self.wall_ms {
            self.wall_ms = remote.unix_millis;
            self.counter = remote.counter;
        } else if remote.unix_millis == self.wall_ms && remote.counter > self.counter {
            self.counter = remote.counter;
        }
    }

    /// Node this clock issues stamps for
    pub fn node(&self) -> &NodeId {
        &self.node
    }
}

/// Values that carry their own version
pub trait Versioned {
    /// Version of the value, if stamped
    fn version(&self) -> Option<&WallClockTimestamp>;
}

/// Per-map timestamping strategy.
///
/// A replicated map asks its strategy for the timestamp of every local put or
/// remove; remote entries arrive already stamped.
pub trait LogicalClock<K, V>: Send + Sync {
    /// Timestamp type stored next to each entry
    type Timestamp: Ord + Clone + core::fmt::Debug + Send + Sync + 'static;

    /// Stamp a local write of `value` under `key`
    fn timestamp(&self, key: &K, value: &V) -> Self::Timestamp;
}

/// Strategy for the pending map: the timestamp is the record's own version.
///
/// Unversioned values get the smallest possible stamp, so any versioned
/// revision of the same key supersedes them.
#[derive(Debug, Clone, Default)]
pub struct RecordVersionClock;

impl<K, V: Versioned> LogicalClock<K, V> for RecordVersionClock {
    type Timestamp = Option<WallClockTimestamp>;

    fn timestamp(&self, _key: &K, value: &V) -> Self::Timestamp {
        value.version().cloned()
    }
}

/// Strategy for the current map: record version plus a writer-local counter.
///
/// Revisions of the same version written by different masters are still
/// ordered, and a re-write by the same node always sorts after its previous
/// write.
#[derive(Debug)]
pub struct LogicalRecordClock {
    writer: NodeId,
    sequence: AtomicU64,
}

impl LogicalRecordClock {
    /// Create a strategy stamping writes as `writer`
    pub fn new(writer: NodeId) -> Self {
        Self {
            writer,
            sequence: AtomicU64::new(0),
        }
    }
}

impl<K, V: Versioned> LogicalClock<K, V> for LogicalRecordClock {
    type Timestamp = MultiValuedTimestamp;

    fn timestamp(&self, _key: &K, value: &V) -> Self::Timestamp {
        let counter = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        MultiValuedTimestamp::new(value.version().cloned(), counter, self.writer.clone())
    }
}
