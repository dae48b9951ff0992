//! Cluster membership and partition ownership seams
//!
//! Membership, failure detection and leader election live outside the store;
//! these traits are the narrow views it consumes.

use alloc::string::String;
use alloc::vec::Vec;

use serde::{Deserialize, Serialize};

use crate::ids::{IntentKey, NodeId};

/// A controller node of the cluster
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ControllerNode {
    /// Node identity
    pub id: NodeId,
    /// Address the node is reachable at
    pub address: String,
}

impl ControllerNode {
    /// Create a controller node
    pub fn new(id: NodeId, address: impl Into<String>) -> Self {
        Self {
            id,
            address: address.into(),
        }
    }
}

/// Read-only view of cluster membership
pub trait ClusterService: Send + Sync {
    /// The node this process runs as
    fn local_node(&self) -> ControllerNode;

    /// All known members, including the local node
    fn nodes(&self) -> Vec<ControllerNode>;
}

/// Read-only view of partition leadership
pub trait PartitionService: Send + Sync {
    /// Leader of the partition `key` belongs to, if one is assigned
    fn leader(&self, key: &IntentKey) -> Option<NodeId>;

    /// Whether the local node leads the partition `key` belongs to
    fn is_mine(&self, key: &IntentKey) -> bool;
}
