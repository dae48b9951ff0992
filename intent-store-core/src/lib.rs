//! # Intent Store Core
//!
//! Value types and pure decision logic for the gossip-replicated intent store.
//!
//! This crate is `no_std` compatible (it needs `alloc`) and provides:
//! - Cluster identities (`NodeId`, `IntentKey`) and the cluster/partition service seams
//! - Intent records and their lifecycle states
//! - Logical clocks: wall-clock and multi-valued timestamps, and the per-map clock strategies
//! - `Timestamped` values, the merge primitive used by replicated maps
//! - The update acceptance state machine
//! - Lifecycle events derived from stored records
//!
//! ## Feature Flags
//!
//! - `std` (default): Standard library support for `serde` and `sha2`; time always comes from the caller

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod acceptance;
pub mod clock;
pub mod cluster;
pub mod event;
pub mod ids;
pub mod record;
pub mod timestamped;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::acceptance::{is_update_acceptable, Acceptance, Rejection};
    pub use crate::clock::{
        HybridClock, LogicalClock, LogicalRecordClock, MultiValuedTimestamp, RecordVersionClock,
        Versioned, WallClockTimestamp,
    };
    pub use crate::cluster::{ClusterService, ControllerNode, PartitionService};
    pub use crate::event::{IntentEvent, IntentEventKind};
    pub use crate::ids::{IntentKey, NodeId};
    pub use crate::record::{Intent, IntentRecord, IntentState};
    pub use crate::timestamped::Timestamped;
}
