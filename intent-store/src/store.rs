//! Gossip-replicated intent record store
//!
//! The store owns two replicated maps keyed by [`IntentKey`]:
//!
//! - **current**: the authoritative record of every intent, written only
//!   through [`IntentRecordStore::write`] after the acceptance check
//! - **pending**: submitted requests waiting for the partition leader to
//!   process them
//!
//! A request enters with [`IntentRecordStore::add_pending`], gossips to the
//! partition leader, and is handed to the [`StoreDelegate`] there. Processing
//! ends with a `write` that moves the record into the current map and removes
//! the matching pending revision.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use intent_store_core::acceptance::{is_update_acceptable, Acceptance};
use intent_store_core::clock::{HybridClock, LogicalRecordClock, RecordVersionClock};
use intent_store_core::cluster::{ClusterService, PartitionService};
use intent_store_core::event::IntentEvent;
use intent_store_core::ids::{IntentKey, NodeId};
use intent_store_core::record::{Intent, IntentRecord, IntentState};
use intent_store_net::gossip::GossipMap;
use intent_store_net::traits::{ClusterCommunicator, MapEvent, MapEventKind, ReplicatedRecordMap};
use intent_store_runtime::StoreRuntime;

use crate::config::StoreConfig;
use crate::peers::peer_selector;

/// Shared handle to one of the store's maps
pub type RecordMap = Arc<dyn ReplicatedRecordMap<IntentKey, IntentRecord>>;

/// Pending map backed by gossip, stamped with the record version
pub type PendingGossipMap = GossipMap<IntentKey, IntentRecord, RecordVersionClock>;

/// Current map backed by gossip, stamped with multi-valued timestamps
pub type CurrentGossipMap = GossipMap<IntentKey, IntentRecord, LogicalRecordClock>;

/// Receiver of the store's work items and lifecycle events
pub trait StoreDelegate: Send + Sync {
    /// A pending record whose partition this node leads
    fn process(&self, record: IntentRecord);

    /// A lifecycle event for a record that reached one of the maps
    fn notify(&self, event: IntentEvent);
}

type DelegateSlot = Arc<RwLock<Option<Arc<dyn StoreDelegate>>>>;

struct GossipMaps {
    current: Arc<CurrentGossipMap>,
    pending: Arc<PendingGossipMap>,
}

/// The intent record store
pub struct IntentRecordStore {
    config: StoreConfig,
    local: NodeId,
    partitions: Arc<dyn PartitionService>,
    runtime: Arc<dyn StoreRuntime>,
    clock: Arc<Mutex<HybridClock>>,
    current: RecordMap,
    pending: RecordMap,
    gossip: Option<GossipMaps>,
    delegate: DelegateSlot,
    started: AtomicBool,
    stopped: AtomicBool,
}

impl IntentRecordStore {
    /// Create a store over already constructed maps
    pub fn new(
        config: StoreConfig,
        cluster: Arc<dyn ClusterService>,
        partitions: Arc<dyn PartitionService>,
        runtime: Arc<dyn StoreRuntime>,
        current: RecordMap,
        pending: RecordMap,
    ) -> Self {
        let local = cluster.local_node().id;
        Self {
            config,
            clock: Arc::new(Mutex::new(HybridClock::new(local.clone()))),
            local,
            partitions,
            runtime,
            current,
            pending,
            gossip: None,
            delegate: Arc::new(RwLock::new(None)),
            started: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
        }
    }

    /// Create a store whose maps replicate by gossip over `communicator`
    pub fn with_gossip(
        config: StoreConfig,
        cluster: Arc<dyn ClusterService>,
        partitions: Arc<dyn PartitionService>,
        communicator: Arc<dyn ClusterCommunicator>,
        runtime: Arc<dyn StoreRuntime>,
    ) -> Self {
        let local = cluster.local_node().id;
        let peers = peer_selector(Arc::clone(&cluster), Arc::clone(&partitions));

        let current = Arc::new(GossipMap::new(
            config.current_map_name.clone(),
            Arc::clone(&cluster),
            Arc::clone(&communicator),
            LogicalRecordClock::new(local),
            Arc::clone(&peers),
        ));
        let pending = Arc::new(GossipMap::new(
            config.pending_map_name.clone(),
            Arc::clone(&cluster),
            communicator,
            RecordVersionClock,
            peers,
        ));

        let mut store = Self::new(
            config,
            cluster,
            partitions,
            runtime,
            Arc::clone(&current) as RecordMap,
            Arc::clone(&pending) as RecordMap,
        );
        store.gossip = Some(GossipMaps { current, pending });
        store
    }

    /// Attach `delegate` and start listening to both maps
    pub fn start(&self, delegate: Arc<dyn StoreDelegate>) {
        if self.stopped.load(Ordering::Acquire) {
            warn!(node = %self.local, "cannot restart a stopped intent store");
            return;
        }
        if self.started.swap(true, Ordering::AcqRel) {
            warn!(node = %self.local, "intent store already started");
            return;
        }
        *self.delegate.write() = Some(delegate);

        let clock = Arc::clone(&self.clock);
        let slot = Arc::clone(&self.delegate);
        self.current.add_listener(Arc::new(move |event: &MapEvent<IntentKey, IntentRecord>| {
            if event.kind != MapEventKind::Put {
                return;
            }
            if let Some(version) = event.value.version() {
                clock.lock().observe(version);
            }
            notify(&slot, &event.value);
        }));

        let clock = Arc::clone(&self.clock);
        let slot = Arc::clone(&self.delegate);
        let partitions = Arc::clone(&self.partitions);
        self.pending.add_listener(Arc::new(move |event: &MapEvent<IntentKey, IntentRecord>| {
            if event.kind != MapEventKind::Put {
                return;
            }
            if let Some(version) = event.value.version() {
                clock.lock().observe(version);
            }
            notify(&slot, &event.value);
            if partitions.is_mine(&event.key) {
                let delegate = slot.read().clone();
                if let Some(delegate) = delegate {
                    delegate.process(event.value.clone());
                }
            }
        }));

        info!(
            node = %self.local,
            current = %self.config.current_map_name,
            pending = %self.config.pending_map_name,
            "intent store started"
        );
    }

    /// Destroy both maps and detach the delegate
    pub fn stop(&self) {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return;
        }
        self.current.destroy();
        self.pending.destroy();
        self.delegate.write().take();
        info!(node = %self.local, "intent store stopped");
    }

    fn is_stopped(&self) -> bool {
        let stopped = self.stopped.load(Ordering::Acquire);
        if stopped {
            debug!(node = %self.local, "intent store stopped; operation ignored");
        }
        stopped
    }

    /// This node
    pub fn local_id(&self) -> &NodeId {
        &self.local
    }

    /// Store configuration
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Number of records in the current map
    pub fn get_intent_count(&self) -> usize {
        self.current.size()
    }

    /// Every intent in the current map
    pub fn get_intents(&self) -> Vec<Intent> {
        self.current
            .values()
            .into_iter()
            .map(|record| record.intent().clone())
            .collect()
    }

    /// Intent stored under `key`
    pub fn get_intent(&self, key: &IntentKey) -> Option<Intent> {
        self.current.get(key).map(|record| record.intent().clone())
    }

    /// Full current record stored under `key`
    pub fn get_intent_data(&self, key: &IntentKey) -> Option<IntentRecord> {
        self.current.get(key)
    }

    /// Lifecycle state of the current record under `key`
    pub fn get_intent_state(&self, key: &IntentKey) -> Option<IntentState> {
        self.current.get(key).map(|record| record.state())
    }

    /// Compiled installables of the current record under `key`
    pub fn get_installable_intents(&self, key: &IntentKey) -> Option<Vec<Intent>> {
        self.current
            .get(key)
            .and_then(|record| record.installables().map(<[Intent]>::to_vec))
    }

    /// Apply `new` to the current map if the acceptance check allows it.
    ///
    /// An accepted write also retires the matching revision from the pending
    /// map. Rejected writes are dropped.
    pub fn write(&self, new: IntentRecord) {
        if self.is_stopped() {
            return;
        }
        let key = new.key().clone();
        let current = self.current.get(&key);

        match is_update_acceptable(current.as_ref(), &new) {
            Acceptance::Rejected(rejection) if rejection.is_anomaly() => {
                warn!(
                    key = %key,
                    state = ?new.state(),
                    current = ?current.as_ref().map(|c| c.state()),
                    reason = %rejection,
                    "dropping intent update"
                );
            }
            Acceptance::Rejected(rejection) => {
                debug!(key = %key, state = ?new.state(), reason = %rejection, "dropping intent update");
            }
            accepted => {
                debug!(key = %key, state = ?new.state(), acceptance = ?accepted, "writing intent");
                self.current.put(key.clone(), new.clone());
                self.pending.remove(&key, &new);
            }
        }
    }

    /// Write each update independently
    pub fn batch_write(&self, updates: impl IntoIterator<Item = IntentRecord>) {
        for update in updates {
            self.write(update);
        }
    }

    /// Submit `record` for processing.
    ///
    /// Stamps a fresh version unless one is already set, and records this node
    /// as the origin.
    pub fn add_pending(&self, mut record: IntentRecord) {
        if self.is_stopped() {
            return;
        }
        if record.version().is_none() {
            let now = self.runtime.now_millis();
            record.set_version(self.clock.lock().tick(now));
        }
        record.set_origin(self.local.clone());

        debug!(key = %record.key(), state = ?record.state(), version = ?record.version(), "adding pending intent");
        self.pending.put(record.key().clone(), record);
    }

    /// Intents waiting to be processed
    pub fn get_pending(&self) -> Vec<Intent> {
        self.pending
            .values()
            .into_iter()
            .map(|record| record.intent().clone())
            .collect()
    }

    /// Full pending records
    pub fn get_pending_data(&self) -> Vec<IntentRecord> {
        self.pending.values()
    }

    /// Whether this node leads the partition of `key`
    pub fn is_master(&self, key: &IntentKey) -> bool {
        self.partitions.is_mine(key)
    }

    /// Remove `key` from the current map if it is withdrawn or failed
    pub fn purge(&self, key: &IntentKey) {
        if self.is_stopped() {
            return;
        }
        match self.current.get(key) {
            Some(record) if record.state().is_purgeable() => {
                if self.current.remove(key, &record) {
                    debug!(key = %key, state = ?record.state(), "purged intent");
                }
            }
            Some(record) => {
                debug!(key = %key, state = ?record.state(), "intent not purgeable");
            }
            None => {}
        }
    }

    /// Re-submit pending records whose partition this node now leads.
    ///
    /// Covers requests that arrived while another node was leader.
    /// Returns how many records were handed to the delegate.
    pub fn check_pending(&self) -> usize {
        if self.is_stopped() {
            return 0;
        }
        let delegate = match self.delegate.read().clone() {
            Some(delegate) => delegate,
            None => return 0,
        };
        let mine: Vec<IntentRecord> = self
            .pending
            .values()
            .into_iter()
            .filter(|record| self.partitions.is_mine(record.key()))
            .collect();

        let count = mine.len();
        for record in mine {
            delegate.process(record);
        }
        if count > 0 {
            info!(node = %self.local, count, "resubmitted pending intents");
        }
        count
    }

    /// Push both gossip maps' full contents to a random member each.
    ///
    /// No-op for stores built over injected maps.
    pub fn anti_entropy(&self) {
        if self.is_stopped() {
            return;
        }
        if let Some(maps) = &self.gossip {
            maps.current.anti_entropy();
            maps.pending.anti_entropy();
        }
    }
}

fn notify(slot: &DelegateSlot, record: &IntentRecord) {
    let event = match IntentEvent::from_record(record) {
        Some(event) => event,
        None => return,
    };
    let delegate = slot.read().clone();
    if let Some(delegate) = delegate {
        delegate.notify(event);
    }
}
