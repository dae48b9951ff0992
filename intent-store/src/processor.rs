//! Intent processor
//!
//! Store delegate that turns pending requests into processing chains and
//! fans lifecycle events out to subscribers.

use std::sync::{Arc, Weak};

use tokio::sync::broadcast;
use tracing::{debug, info};

use intent_store_core::event::IntentEvent;
use intent_store_core::ids::IntentKey;
use intent_store_core::record::{Intent, IntentRecord, IntentState};
use intent_store_runtime::StoreRuntime;

use crate::dataplane::{
    CompileError, FlowRuleError, FlowRuleOperations, FlowRuleService, IntentCompiler,
};
use crate::phase::{self, Context, PhaseContext};
use crate::store::{IntentRecordStore, StoreDelegate};

/// Drives processing chains for one store
pub struct IntentProcessor {
    this: Weak<IntentProcessor>,
    store: Weak<IntentRecordStore>,
    compiler: Arc<dyn IntentCompiler>,
    flow_rules: Arc<dyn FlowRuleService>,
    runtime: Arc<dyn StoreRuntime>,
    recheck_mastership: bool,
    events: broadcast::Sender<IntentEvent>,
}

impl IntentProcessor {
    /// Create a processor for `store`.
    ///
    /// The processor only holds a weak reference to the store; attach it with
    /// [`IntentRecordStore::start`].
    pub fn new(
        store: &Arc<IntentRecordStore>,
        compiler: Arc<dyn IntentCompiler>,
        flow_rules: Arc<dyn FlowRuleService>,
        runtime: Arc<dyn StoreRuntime>,
    ) -> Arc<Self> {
        let processing = &store.config().processing;
        let (events, _) = broadcast::channel(processing.event_capacity.max(1));
        let recheck_mastership = processing.recheck_mastership;

        Arc::new_cyclic(|this| Self {
            this: this.clone(),
            store: Arc::downgrade(store),
            compiler,
            flow_rules,
            runtime,
            recheck_mastership,
            events,
        })
    }

    /// Subscribe to lifecycle events observed by this node
    pub fn subscribe(&self) -> broadcast::Receiver<IntentEvent> {
        self.events.subscribe()
    }

    /// Request installation of `intent`
    pub fn submit(&self, intent: Intent) {
        self.request(intent, IntentState::InstallReq);
    }

    /// Request withdrawal of `intent`
    pub fn withdraw(&self, intent: Intent) {
        self.request(intent, IntentState::WithdrawReq);
    }

    fn request(&self, intent: Intent, state: IntentState) {
        if let Some(store) = self.store.upgrade() {
            store.add_pending(IntentRecord::new(intent, state, None));
        }
    }
}

impl StoreDelegate for IntentProcessor {
    fn process(&self, record: IntentRecord) {
        let ctx: Context = match self.this.upgrade() {
            Some(this) => this as Context,
            None => return,
        };
        let key = record.key().clone();
        let state = record.state();

        match phase::initial_phase(ctx, record) {
            Some(initial) => {
                debug!(key = %key, state = ?state, "processing intent");
                self.runtime.spawn_blocking(Box::new(move || {
                    phase::run_chain(initial);
                }));
            }
            None => debug!(key = %key, state = ?state, "nothing to process"),
        }
    }

    fn notify(&self, event: IntentEvent) {
        debug!(key = %event.key, kind = ?event.kind, "intent event");
        // no subscribers is fine
        let _ = self.events.send(event);
    }
}

impl PhaseContext for IntentProcessor {
    fn compile(&self, intent: &Intent, previous: Option<&[Intent]>) -> Result<Vec<Intent>, CompileError> {
        self.compiler.compile(intent, previous)
    }

    fn apply_flow_rules(&self, operations: FlowRuleOperations) -> Result<(), FlowRuleError> {
        self.flow_rules.apply(operations)
    }

    fn current(&self, key: &IntentKey) -> Option<IntentRecord> {
        self.store.upgrade()?.get_intent_data(key)
    }

    fn commit(&self, record: IntentRecord) -> bool {
        let store = match self.store.upgrade() {
            Some(store) => store,
            None => return false,
        };
        if self.recheck_mastership && !store.is_master(record.key()) {
            info!(
                key = %record.key(),
                state = ?record.state(),
                "no longer master; abandoning intent processing"
            );
            return false;
        }
        store.write(record);
        true
    }
}
