//! Mock cluster for testing
//!
//! In-process stand-ins for the collaborators the store consumes: a message
//! network with explicit delivery, a static membership view and a shared
//! partition table.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;

use intent_store_core::cluster::{ClusterService, ControllerNode, PartitionService};
use intent_store_core::ids::{IntentKey, NodeId};

use crate::traits::{ClusterCommunicator, MessageHandler};
use crate::{Error, Result};

/// A message in transit
#[derive(Debug, Clone)]
struct InFlight {
    from: NodeId,
    to: NodeId,
    subject: String,
    payload: Vec<u8>,
}

/// A network of in-process nodes.
///
/// Messages queue up until [`MockNetwork::deliver_all`] or
/// [`MockNetwork::deliver_next`] is called, so tests control interleaving.
#[derive(Default)]
pub struct MockNetwork {
    messages: Mutex<VecDeque<InFlight>>,
    handlers: Mutex<HashMap<(NodeId, String), MessageHandler>>,
}

impl MockNetwork {
    /// Create an empty network
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Communicator endpoint for `node`
    pub fn endpoint(self: &Arc<Self>, node: NodeId) -> Arc<MockCommunicator> {
        Arc::new(MockCommunicator {
            network: Arc::clone(self),
            local: node,
        })
    }

    /// Number of messages waiting for delivery
    pub fn pending(&self) -> usize {
        self.messages.lock().len()
    }

    /// Deliver the oldest queued message; returns false when the queue is empty.
    ///
    /// Messages for a subject nobody subscribed to on the target are dropped.
    pub fn deliver_next(&self) -> bool {
        let message = match self.messages.lock().pop_front() {
            Some(message) => message,
            None => return false,
        };
        let handler = self
            .handlers
            .lock()
            .get(&(message.to.clone(), message.subject.clone()))
            .cloned();
        if let Some(handler) = handler {
            handler(&message.from, &message.payload);
        }
        true
    }

    /// Deliver until the queue is empty, including messages sent during delivery.
    ///
    /// Returns the number of messages delivered.
    pub fn deliver_all(&self) -> usize {
        let mut delivered = 0;
        while self.deliver_next() {
            delivered += 1;
        }
        delivered
    }

    /// Drop every queued message; simulates loss
    pub fn drop_all(&self) -> usize {
        let mut messages = self.messages.lock();
        let dropped = messages.len();
        messages.clear();
        dropped
    }

    /// Number of queued messages addressed to `node`
    pub fn queued_for(&self, node: &NodeId) -> usize {
        self.messages.lock().iter().filter(|m| m.to == *node).count()
    }
}

/// One node's view of a [`MockNetwork`]
pub struct MockCommunicator {
    network: Arc<MockNetwork>,
    local: NodeId,
}

impl ClusterCommunicator for MockCommunicator {
    fn unicast(&self, subject: &str, to: &NodeId, payload: Vec<u8>) -> Result<()> {
        if *to == self.local {
            return Err(Error::PeerNotFound);
        }
        self.network.messages.lock().push_back(InFlight {
            from: self.local.clone(),
            to: to.clone(),
            subject: subject.to_string(),
            payload,
        });
        Ok(())
    }

    fn subscribe(&self, subject: &str, handler: MessageHandler) {
        self.network
            .handlers
            .lock()
            .insert((self.local.clone(), subject.to_string()), handler);
    }

    fn unsubscribe(&self, subject: &str) {
        self.network
            .handlers
            .lock()
            .remove(&(self.local.clone(), subject.to_string()));
    }
}

/// Fixed membership view
#[derive(Debug, Clone)]
pub struct StaticCluster {
    local: ControllerNode,
    members: Vec<ControllerNode>,
}

impl StaticCluster {
    /// Membership of `members` as seen from `local`
    pub fn new(local: NodeId, members: &[NodeId]) -> Self {
        let to_node = |id: &NodeId| ControllerNode::new(id.clone(), format!("mock://{}", id));
        Self {
            local: to_node(&local),
            members: members.iter().map(to_node).collect(),
        }
    }
}

impl ClusterService for StaticCluster {
    fn local_node(&self) -> ControllerNode {
        self.local.clone()
    }

    fn nodes(&self) -> Vec<ControllerNode> {
        self.members.clone()
    }
}

/// Partition leadership shared by every node of a mock cluster.
///
/// Keys hash onto the sorted member list unless a test pins a leader.
#[derive(Debug)]
pub struct PartitionTable {
    members: Vec<NodeId>,
    pinned: Mutex<HashMap<IntentKey, NodeId>>,
}

impl PartitionTable {
    /// Create a table over `members`
    pub fn new(members: &[NodeId]) -> Arc<Self> {
        let mut members = members.to_vec();
        members.sort();
        Arc::new(Self {
            members,
            pinned: Mutex::new(HashMap::new()),
        })
    }

    /// Force `leader` to lead the partition of `key`
    pub fn pin(&self, key: IntentKey, leader: NodeId) {
        self.pinned.lock().insert(key, leader);
    }

    /// Leader of `key`'s partition
    pub fn leader(&self, key: &IntentKey) -> Option<NodeId> {
        if let Some(leader) = self.pinned.lock().get(key) {
            return Some(leader.clone());
        }
        if self.members.is_empty() {
            return None;
        }
        let index = key.partition_hash() % self.members.len() as u64;
        self.members.get(index as usize).cloned()
    }

    /// Partition view for `local`
    pub fn view(self: &Arc<Self>, local: NodeId) -> TablePartitions {
        TablePartitions {
            table: Arc::clone(self),
            local,
        }
    }
}

/// One node's view of a [`PartitionTable`]
#[derive(Debug, Clone)]
pub struct TablePartitions {
    table: Arc<PartitionTable>,
    local: NodeId,
}

impl PartitionService for TablePartitions {
    fn leader(&self, key: &IntentKey) -> Option<NodeId> {
        self.table.leader(key)
    }

    fn is_mine(&self, key: &IntentKey) -> bool {
        self.table.leader(key).as_ref() == Some(&self.local)
    }
}
