use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use intent_store::mock::{MemoryFlowRules, SplitCompiler};
use intent_store::net::{MockNetwork, PartitionTable, StaticCluster};
use intent_store::prelude::*;

const NODES: [&str; 3] = ["c1", "c2", "c3"];
const INTENTS: usize = 4;

fn usage() -> ! {
    eprintln!("Usage: intent_store_sim [config.json]");
    eprintln!();
    eprintln!("Runs a three-controller cluster in one process, installs and");
    eprintln!("withdraws a few intents, and prints where each one ended up.");
    std::process::exit(2);
}

struct Controller {
    store: Arc<IntentRecordStore>,
    processor: Arc<IntentProcessor>,
    flow_rules: Arc<MemoryFlowRules>,
}

fn load_config() -> StoreConfig {
    let mut args = std::env::args().skip(1).collect::<Vec<_>>();
    if args.len() > 1 {
        usage();
    }
    match args.pop() {
        None => StoreConfig::default(),
        Some(path) => match StoreConfig::from_json_file(&path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("error: {path}: {e}");
                std::process::exit(1);
            }
        },
    }
}

async fn wait_for(what: &str, check: impl Fn() -> bool) {
    for _ in 0..200 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    warn!("timed out waiting for {what}");
}

#[tokio::main]
async fn main() {
    let config = load_config();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_filter)),
        )
        .init();

    let members: Vec<NodeId> = NODES.iter().map(|n| NodeId::new(*n)).collect();
    let network = MockNetwork::new();
    let partitions = PartitionTable::new(&members);
    let runtime: Arc<dyn StoreRuntime> = Arc::new(TokioRuntime::new(Handle::current()));

    let controllers: Vec<Controller> = members
        .iter()
        .map(|id| {
            let store = Arc::new(IntentRecordStore::with_gossip(
                config.clone(),
                Arc::new(StaticCluster::new(id.clone(), &members)),
                Arc::new(partitions.view(id.clone())),
                network.endpoint(id.clone()),
                Arc::clone(&runtime),
            ));
            let flow_rules = Arc::new(MemoryFlowRules::new());
            let processor = IntentProcessor::new(
                &store,
                Arc::new(SplitCompiler::new(2)),
                flow_rules.clone(),
                Arc::clone(&runtime),
            );
            store.start(processor.clone());
            Controller {
                store,
                processor,
                flow_rules,
            }
        })
        .collect();

    for controller in &controllers {
        let mut events = controller.processor.subscribe();
        let node = controller.store.local_id().clone();
        tokio::spawn(async move {
            while let Ok(event) = events.recv().await {
                info!(node = %node, key = %event.key, kind = ?event.kind, "lifecycle event");
            }
        });
    }

    let pump = Arc::clone(&network);
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(Duration::from_millis(5));
        loop {
            tick.tick().await;
            pump.deliver_all();
        }
    });

    let stores: Vec<Arc<IntentRecordStore>> = controllers.iter().map(|c| c.store.clone()).collect();
    let repair = stores.clone();
    let period = config.gossip.anti_entropy_interval();
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(period);
        loop {
            tick.tick().await;
            for store in &repair {
                store.anti_entropy();
            }
        }
    });

    let client = &controllers[0];
    let intents: Vec<Intent> = (0..INTENTS)
        .map(|i| Intent::new(IntentKey::new(format!("intent-{i}")), "org.example.sim", vec![i as u8]))
        .collect();

    for intent in &intents {
        client.processor.submit(intent.clone());
    }
    wait_for("installation", || {
        intents
            .iter()
            .all(|i| client.store.get_intent_state(&i.key) == Some(IntentState::Installed))
    })
    .await;

    let withdrawn = intents[0].clone();
    client.processor.withdraw(withdrawn.clone());
    wait_for("withdrawal", || {
        client.store.get_intent_state(&withdrawn.key) == Some(IntentState::Withdrawn)
    })
    .await;
    client.store.purge(&withdrawn.key);

    println!("{:<10} {:<8} {:<12} {:<8}", "intent", "leader", "state", "rules");
    for intent in &intents {
        let leader = partitions.leader(&intent.key);
        let rules = controllers
            .iter()
            .find(|c| Some(c.store.local_id()) == leader.as_ref())
            .map(|c| c.flow_rules.rules().iter().filter(|r| r.id.0.starts_with(intent.key.as_str())).count())
            .unwrap_or(0);
        let state = client
            .store
            .get_intent_state(&intent.key)
            .map(|s| format!("{s:?}"))
            .unwrap_or_else(|| "purged".to_string());
        let leader = leader.map(|l| l.to_string()).unwrap_or_default();
        println!("{:<10} {:<8} {:<12} {:<8}", intent.key, leader, state, rules);
    }

    for store in &stores {
        store.stop();
    }
}
