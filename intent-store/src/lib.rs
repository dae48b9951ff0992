//! # Intent Store
//!
//! **Gossip-replicated intent state for a cluster of network controllers.**
//!
//! Every controller keeps a full copy of two eventually consistent maps: the
//! authoritative *current* record of each intent, and *pending* requests
//! waiting for their partition leader. The leader runs each request through a
//! chain of processing phases and writes the outcome back; concurrent writes
//! are reconciled by version comparison and a small state machine, never by
//! a coordinator.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use intent_store::prelude::*;
//!
//! let store = Arc::new(IntentRecordStore::with_gossip(
//!     StoreConfig::default(),
//!     cluster,
//!     partitions,
//!     communicator,
//!     Arc::new(TokioRuntime::new(handle)),
//! ));
//! let processor = IntentProcessor::new(&store, compiler, flow_rules, runtime);
//! store.start(processor.clone());
//!
//! processor.submit(Intent::new(IntentKey::new("intent-1"), "org.example", payload));
//! ```
//!
//! ## Feature Flags
//!
//! - `tokio-runtime` (default): Tokio-backed runtime for processing chains
//!
//! ## Crate Structure
//!
//! - [`intent_store_core`]: Records, clocks and the acceptance state machine (no_std compatible)
//! - [`intent_store_net`]: Replicated map trait, gossip map and wire envelope
//! - [`intent_store_runtime`]: Time and blocking-execution seam

#![forbid(unsafe_code)]

// Re-export sub-crates
pub use intent_store_core as core;
pub use intent_store_net as net;
pub use intent_store_runtime as runtime;

pub use intent_store_core::{
    acceptance::{is_update_acceptable, Acceptance, Rejection},
    event::{IntentEvent, IntentEventKind},
    ids::{IntentKey, NodeId},
    record::{Intent, IntentRecord, IntentState},
};

pub mod config;
pub mod dataplane;
pub mod mock;
pub mod peers;
pub mod phase;
pub mod processor;
pub mod store;

pub use config::{ConfigError, GossipConfig, ProcessingConfig, StoreConfig, StoreConfigBuilder};
pub use processor::IntentProcessor;
pub use store::{IntentRecordStore, StoreDelegate};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::config::{ConfigError, StoreConfig, StoreConfigBuilder};
    pub use crate::dataplane::{FlowRuleService, IntentCompiler};
    pub use crate::processor::IntentProcessor;
    pub use crate::store::{IntentRecordStore, StoreDelegate};
    pub use intent_store_core::prelude::*;
    pub use intent_store_net::traits::{ClusterCommunicator, ReplicatedRecordMap};
    pub use intent_store_runtime::StoreRuntime;

    #[cfg(feature = "tokio-runtime")]
    pub use intent_store_runtime::tokio_runtime::TokioRuntime;

    pub use std::sync::Arc;
}
