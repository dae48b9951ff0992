//! In-process cluster harness shared by the integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast;

use intent_store::mock::{MemoryFlowRules, SplitCompiler};
use intent_store::net::{MockNetwork, PartitionTable, StaticCluster};
use intent_store::prelude::*;
use intent_store::runtime::mock_runtime::MockRuntime;

pub struct TestNode {
    pub id: NodeId,
    pub store: Arc<IntentRecordStore>,
    pub processor: Arc<IntentProcessor>,
    pub flow_rules: Arc<MemoryFlowRules>,
    pub compiler: Arc<SplitCompiler>,
    events: Mutex<broadcast::Receiver<IntentEvent>>,
}

impl TestNode {
    /// Lifecycle events received since the last call
    pub fn events(&self) -> Vec<IntentEventKind> {
        let mut events = self.events.lock();
        let mut kinds = Vec::new();
        while let Ok(event) = events.try_recv() {
            kinds.push(event.kind);
        }
        kinds
    }

    pub fn state(&self, key: &str) -> Option<IntentState> {
        self.store.get_intent_state(&IntentKey::new(key))
    }
}

pub struct TestCluster {
    pub network: Arc<MockNetwork>,
    pub partitions: Arc<PartitionTable>,
    pub runtime: Arc<MockRuntime>,
    pub nodes: Vec<TestNode>,
}

impl TestCluster {
    /// Cluster of `size` nodes named `n1..` whose chains run inline
    pub fn new(size: usize) -> Self {
        Self::build(size, MockRuntime::new())
    }

    /// Cluster whose chains wait for [`TestCluster::settle`] or `runtime.run_pending()`
    pub fn deferred(size: usize) -> Self {
        Self::build(size, MockRuntime::deferred())
    }

    fn build(size: usize, runtime: MockRuntime) -> Self {
        let members: Vec<NodeId> = (1..=size).map(|i| NodeId::new(format!("n{i}"))).collect();
        let network = MockNetwork::new();
        let partitions = PartitionTable::new(&members);
        runtime.set_time(1_000);
        let runtime = Arc::new(runtime);

        let nodes = members
            .iter()
            .map(|id| {
                let store = Arc::new(IntentRecordStore::with_gossip(
                    StoreConfig::default(),
                    Arc::new(StaticCluster::new(id.clone(), &members)),
                    Arc::new(partitions.view(id.clone())),
                    network.endpoint(id.clone()),
                    runtime.clone(),
                ));
                let flow_rules = Arc::new(MemoryFlowRules::new());
                let compiler = Arc::new(SplitCompiler::new(2));
                let processor =
                    IntentProcessor::new(&store, compiler.clone(), flow_rules.clone(), runtime.clone());
                let events = Mutex::new(processor.subscribe());
                store.start(processor.clone());
                TestNode {
                    id: id.clone(),
                    store,
                    processor,
                    flow_rules,
                    compiler,
                    events,
                }
            })
            .collect();

        Self {
            network,
            partitions,
            runtime,
            nodes,
        }
    }

    pub fn node(&self, id: &str) -> &TestNode {
        self.nodes
            .iter()
            .find(|n| n.id.as_str() == id)
            .unwrap_or_else(|| panic!("no node {id}"))
    }

    /// Make `leader` lead the partition of `key`
    pub fn pin(&self, key: &str, leader: &str) {
        self.partitions.pin(IntentKey::new(key), NodeId::new(leader));
    }

    /// Deliver messages and run queued chains until nothing is left
    pub fn settle(&self) {
        loop {
            let delivered = self.network.deliver_all();
            let ran = self.runtime.run_pending();
            if delivered == 0 && ran == 0 {
                return;
            }
        }
    }
}

pub fn intent(key: &str) -> Intent {
    Intent::new(IntentKey::new(key), "org.test", vec![1, 2, 3])
}

pub fn record(key: &str, state: IntentState, millis: u64) -> IntentRecord {
    IntentRecord::new(
        intent(key),
        state,
        Some(WallClockTimestamp::new(millis, 0, NodeId::new("n1"))),
    )
}
