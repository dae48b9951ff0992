//! Replicated map and communication traits
//!
//! These are the narrow interfaces the intent store consumes. The map's
//! transport, anti-entropy schedule and wire format stay behind them.

use std::sync::Arc;

use intent_store_core::ids::NodeId;

use crate::Result;

/// Kind of change observed on a replicated map
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapEventKind {
    /// A value was stored, locally or by a merged remote update
    Put,
    /// A value was removed
    Remove,
}

/// A change observed on a replicated map
#[derive(Debug, Clone)]
pub struct MapEvent<K, V> {
    /// What happened
    pub kind: MapEventKind,
    /// Affected key
    pub key: K,
    /// Stored value for `Put`, last value for `Remove`
    pub value: V,
}

/// Change listener; invoked after the map released its internal lock
pub type MapListener<K, V> = Arc<dyn Fn(&MapEvent<K, V>) + Send + Sync>;

/// Chooses the peers an update of `(key, value)` is gossiped to
pub type PeerSelector<K, V> = Arc<dyn Fn(&K, &V) -> Vec<NodeId> + Send + Sync>;

/// Handler for inbound gossip payloads
pub type MessageHandler = Arc<dyn Fn(&NodeId, &[u8]) + Send + Sync>;

/// A key/value map replicated across the cluster by gossip.
///
/// Every operation is local and non-blocking; replication happens in the
/// background. Implementations must be safe to call from many threads.
pub trait ReplicatedRecordMap<K, V>: Send + Sync {
    /// Store `value` under `key` and replicate it
    fn put(&self, key: K, value: V);

    /// Current value for `key`
    fn get(&self, key: &K) -> Option<V>;

    /// Remove `key` only if its current value equals `expected`.
    ///
    /// Returns whether a value was removed.
    fn remove(&self, key: &K, expected: &V) -> bool;

    /// Snapshot of all values
    fn values(&self) -> Vec<V>;

    /// Number of live entries
    fn size(&self) -> usize;

    /// Register a change listener
    fn add_listener(&self, listener: MapListener<K, V>);

    /// Stop replicating and release every listener
    fn destroy(&self);
}

/// Point-to-point messaging between cluster members
pub trait ClusterCommunicator: Send + Sync {
    /// Send `payload` on `subject` to `to`
    fn unicast(&self, subject: &str, to: &NodeId, payload: Vec<u8>) -> Result<()>;

    /// Deliver inbound messages on `subject` to `handler`
    fn subscribe(&self, subject: &str, handler: MessageHandler);

    /// Stop delivering messages on `subject`
    fn unsubscribe(&self, subject: &str);
}
