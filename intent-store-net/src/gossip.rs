//! Eventually consistent gossip map
//!
//! Each node holds a full copy of the map. Local writes are stamped by the
//! map's [`LogicalClock`] strategy and pushed to the peers chosen by the
//! map's peer selector; inbound entries are merged by keeping whichever
//! [`Timestamped`] value is newer. Anti-entropy pushes the whole map to one
//! random member, so every member converges even if no selector picks it.
//!
//! ## Merge rules
//!
//! - A live value replaces the stored entry only if its timestamp is strictly newer.
//!   A local put may also restate a live entry with an equal timestamp; it is
//!   sent again and listeners see it again.
//! - A tombstone replaces the stored entry if its timestamp is newer or equal,
//!   so a removal stamped with the removed value's own timestamp still wins.
//! - Tombstones are kept so late gossip of the removed value cannot revive it.
//!
//! Listeners run after the entry lock is released, on the thread that applied
//! the change. A local change is sent to peers before listeners see it, so
//! writes made by a listener reach peers after the change that caused them.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use rand::seq::SliceRandom;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use intent_store_core::clock::LogicalClock;
use intent_store_core::cluster::ClusterService;
use intent_store_core::ids::NodeId;
use intent_store_core::timestamped::Timestamped;

use crate::protocol::{GossipEntry, GossipEnvelope};
use crate::traits::{
    ClusterCommunicator, MapEvent, MapEventKind, MapListener, PeerSelector, ReplicatedRecordMap,
};

/// Stored slot: the value (or last value, for tombstones) and whether it was removed
#[derive(Debug, Clone)]
struct Slot<V> {
    value: V,
    removed: bool,
}

type Entry<V, T> = Timestamped<Slot<V>, T>;

struct Inner<K, V, C: LogicalClock<K, V>> {
    name: String,
    local: NodeId,
    cluster: Arc<dyn ClusterService>,
    clock: C,
    peers: PeerSelector<K, V>,
    communicator: Arc<dyn ClusterCommunicator>,
    entries: Mutex<HashMap<K, Entry<V, C::Timestamp>>>,
    listeners: RwLock<Vec<MapListener<K, V>>>,
    destroyed: AtomicBool,
}

/// In-memory replicated map merging by timestamp
pub struct GossipMap<K, V, C: LogicalClock<K, V>> {
    inner: Arc<Inner<K, V, C>>,
}

impl<K, V, C> GossipMap<K, V, C>
where
    K: Eq + Hash + Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
    V: Clone + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static,
    C: LogicalClock<K, V> + 'static,
    C::Timestamp: Serialize + DeserializeOwned,
{
    /// Create a map and subscribe it to gossip addressed to `name`.
    ///
    /// `cluster` supplies the local identity and the members anti-entropy
    /// picks from.
    pub fn new(
        name: impl Into<String>,
        cluster: Arc<dyn ClusterService>,
        communicator: Arc<dyn ClusterCommunicator>,
        clock: C,
        peers: PeerSelector<K, V>,
    ) -> Self {
        let inner = Arc::new(Inner {
            name: name.into(),
            local: cluster.local_node().id,
            cluster,
            clock,
            peers,
            communicator,
            entries: Mutex::new(HashMap::new()),
            listeners: RwLock::new(Vec::new()),
            destroyed: AtomicBool::new(false),
        });

        let weak: Weak<Inner<K, V, C>> = Arc::downgrade(&inner);
        inner.communicator.subscribe(
            &inner.name,
            Arc::new(move |sender: &NodeId, payload: &[u8]| {
                if let Some(inner) = weak.upgrade() {
                    inner.receive(sender, payload);
                }
            }),
        );

        Self { inner }
    }

    /// Name of the map
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Push every entry, tombstones included, to one random member other
    /// than the local node.
    ///
    /// Repairs replicas that missed earlier gossip or that no peer selector
    /// ever picks. Returns the member the snapshot was sent to.
    pub fn anti_entropy(&self) -> Option<NodeId> {
        if self.inner.is_destroyed() {
            return None;
        }
        let others: Vec<NodeId> = self
            .inner
            .cluster
            .nodes()
            .into_iter()
            .map(|node| node.id)
            .filter(|id| *id != self.inner.local)
            .collect();
        let peer = others.choose(&mut rand::thread_rng())?.clone();

        let snapshot: Vec<GossipEntry<K, V, C::Timestamp>> = self
            .inner
            .entries
            .lock()
            .iter()
            .map(|(key, entry)| GossipEntry {
                key: key.clone(),
                value: entry.value().value.clone(),
                removed: entry.value().removed,
                timestamp: entry.timestamp().clone(),
            })
            .collect();
        if !snapshot.is_empty() {
            debug!(map = %self.inner.name, peer = %peer, entries = snapshot.len(), "anti-entropy push");
            self.inner.send(&peer, &snapshot);
        }
        Some(peer)
    }

    /// Merge an inbound gossip payload
    pub fn receive(&self, sender: &NodeId, payload: &[u8]) {
        self.inner.receive(sender, payload);
    }
}

impl<K, V, C> Inner<K, V, C>
where
    K: Eq + Hash + Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
    V: Clone + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static,
    C: LogicalClock<K, V> + 'static,
    C::Timestamp: Serialize + DeserializeOwned,
{
    fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    /// Apply `incoming` under the merge rules; returns whether it was stored.
    ///
    /// `restate` lets a live value replace a live entry of equal timestamp.
    fn merge(
        entries: &mut HashMap<K, Entry<V, C::Timestamp>>,
        key: K,
        incoming: Entry<V, C::Timestamp>,
        restate: bool,
    ) -> bool {
        let apply = match entries.get(&key) {
            None => true,
            Some(existing) if incoming.value().removed => {
                incoming.timestamp() >= existing.timestamp()
            }
            Some(existing) if restate && !existing.value().removed => {
                incoming.timestamp() >= existing.timestamp()
            }
            Some(existing) => incoming.is_newer(existing),
        };
        if apply {
            entries.insert(key, incoming);
        }
        apply
    }

    fn notify(&self, event: MapEvent<K, V>) {
        let listeners = self.listeners.read().clone();
        for listener in listeners {
            listener(&event);
        }
    }

    fn replicate(&self, entry: GossipEntry<K, V, C::Timestamp>) {
        let targets: Vec<NodeId> = (self.peers)(&entry.key, &entry.value)
            .into_iter()
            .filter(|peer| *peer != self.local)
            .collect();
        if targets.is_empty() {
            return;
        }

        let entries = [entry];
        for peer in &targets {
            self.send(peer, &entries);
        }
    }

    fn send(&self, peer: &NodeId, entries: &[GossipEntry<K, V, C::Timestamp>]) {
        let bytes = match GossipEnvelope::pack(&self.name, self.local.clone(), entries)
            .and_then(|envelope| envelope.serialize())
        {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(map = %self.name, error = %e, "failed to encode gossip entries");
                return;
            }
        };
        if let Err(e) = self.communicator.unicast(&self.name, peer, bytes) {
            debug!(map = %self.name, peer = %peer, error = %e, "gossip send failed");
        }
    }

    fn receive(&self, sender: &NodeId, payload: &[u8]) {
        if self.is_destroyed() {
            return;
        }
        let entries: Vec<GossipEntry<K, V, C::Timestamp>> =
            match GossipEnvelope::deserialize(payload).and_then(|env| env.unpack(&self.name)) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(map = %self.name, sender = %sender, error = %e, "dropping malformed gossip");
                    return;
                }
            };

        let mut events = Vec::new();
        {
            let mut stored = self.entries.lock();
            for entry in entries {
                let kind = if entry.removed {
                    MapEventKind::Remove
                } else {
                    MapEventKind::Put
                };
                let slot = Slot {
                    value: entry.value.clone(),
                    removed: entry.removed,
                };
                if Self::merge(
                    &mut stored,
                    entry.key.clone(),
                    Timestamped::new(slot, entry.timestamp),
                    false,
                ) {
                    events.push(MapEvent {
                        kind,
                        key: entry.key,
                        value: entry.value,
                    });
                }
            }
        }

        for event in events {
            self.notify(event);
        }
    }
}

impl<K, V, C> ReplicatedRecordMap<K, V> for GossipMap<K, V, C>
where
    K: Eq + Hash + Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
    V: Clone + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static,
    C: LogicalClock<K, V> + 'static,
    C::Timestamp: Serialize + DeserializeOwned,
{
    fn put(&self, key: K, value: V) {
        let inner = &self.inner;
        if inner.is_destroyed() {
            debug!(map = %inner.name, "put on destroyed map ignored");
            return;
        }
        let timestamp = inner.clock.timestamp(&key, &value);
        let slot = Slot {
            value: value.clone(),
            removed: false,
        };

        let stored = Inner::<K, V, C>::merge(
            &mut inner.entries.lock(),
            key.clone(),
            Timestamped::new(slot, timestamp.clone()),
            true,
        );
        if !stored {
            debug!(map = %inner.name, "local put superseded by a newer entry");
            return;
        }

        inner.replicate(GossipEntry {
            key: key.clone(),
            value: value.clone(),
            removed: false,
            timestamp,
        });
        inner.notify(MapEvent {
            kind: MapEventKind::Put,
            key,
            value,
        });
    }

    fn get(&self, key: &K) -> Option<V> {
        let entries = self.inner.entries.lock();
        entries
            .get(key)
            .filter(|entry| !entry.value().removed)
            .map(|entry| entry.value().value.clone())
    }

    fn remove(&self, key: &K, expected: &V) -> bool {
        let inner = &self.inner;
        if inner.is_destroyed() {
            return false;
        }

        let timestamp = {
            let mut entries = inner.entries.lock();
            let matches = entries
                .get(key)
                .map(|entry| !entry.value().removed && entry.value().value == *expected)
                .unwrap_or(false);
            if !matches {
                return false;
            }
            let timestamp = inner.clock.timestamp(key, expected);
            let slot = Slot {
                value: expected.clone(),
                removed: true,
            };
            if !Inner::<K, V, C>::merge(
                &mut entries,
                key.clone(),
                Timestamped::new(slot, timestamp.clone()),
                false,
            ) {
                return false;
            }
            timestamp
        };

        inner.replicate(GossipEntry {
            key: key.clone(),
            value: expected.clone(),
            removed: true,
            timestamp,
        });
        inner.notify(MapEvent {
            kind: MapEventKind::Remove,
            key: key.clone(),
            value: expected.clone(),
        });
        true
    }

    fn values(&self) -> Vec<V> {
        self.inner
            .entries
            .lock()
            .values()
            .filter(|entry| !entry.value().removed)
            .map(|entry| entry.value().value.clone())
            .collect()
    }

    fn size(&self) -> usize {
        self.inner
            .entries
            .lock()
            .values()
            .filter(|entry| !entry.value().removed)
            .count()
    }

    fn add_listener(&self, listener: MapListener<K, V>) {
        self.inner.listeners.write().push(listener);
    }

    fn destroy(&self) {
        if self.inner.destroyed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.inner.communicator.unsubscribe(&self.inner.name);
        self.inner.listeners.write().clear();
        self.inner.entries.lock().clear();
    }
}
