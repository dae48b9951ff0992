//! Gossip peer selection
//!
//! An update is pushed to the node most likely to act on it next: the
//! partition leader when we are not the leader, the origin of the request
//! when we are, and a random member when we are both.

use std::sync::Arc;

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::warn;

use intent_store_core::cluster::{ClusterService, PartitionService};
use intent_store_core::ids::{IntentKey, NodeId};
use intent_store_core::record::IntentRecord;
use intent_store_net::traits::PeerSelector;

/// How the local node relates to a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplicaRole {
    /// Local node leads the partition and submitted the record
    LeaderAndOrigin,
    /// Local node leads the partition only
    Leader,
    /// Local node submitted the record only
    Origin,
    /// Local node is neither
    Neither,
}

impl ReplicaRole {
    /// Classify `local` against the partition `leader` and record `origin`
    pub fn classify(local: &NodeId, leader: Option<&NodeId>, origin: Option<&NodeId>) -> Self {
        let is_leader = leader == Some(local);
        let is_origin = origin == Some(local);
        match (is_leader, is_origin) {
            (true, true) => ReplicaRole::LeaderAndOrigin,
            (true, false) => ReplicaRole::Leader,
            (false, true) => ReplicaRole::Origin,
            (false, false) => ReplicaRole::Neither,
        }
    }
}

/// Choose the gossip targets for one update.
///
/// Always returns at least one node. A missing leader counts as "not us";
/// whenever the preferred target is unknown, a random member is used instead.
pub fn select_peers<R: Rng + ?Sized>(
    local: &NodeId,
    leader: Option<NodeId>,
    origin: Option<&NodeId>,
    members: &[NodeId],
    rng: &mut R,
) -> Vec<NodeId> {
    let role = ReplicaRole::classify(local, leader.as_ref(), origin);
    let target = match role {
        ReplicaRole::LeaderAndOrigin => None,
        ReplicaRole::Leader => origin.cloned(),
        ReplicaRole::Origin => leader,
        ReplicaRole::Neither => {
            warn!(
                local = %local,
                leader = ?leader,
                origin = ?origin,
                "neither leader nor origin of an update; sending to leader"
            );
            leader
        }
    };

    vec![target.unwrap_or_else(|| random_member(local, members, rng))]
}

/// A uniformly random member other than `local`, or `local` when alone
fn random_member<R: Rng + ?Sized>(local: &NodeId, members: &[NodeId], rng: &mut R) -> NodeId {
    let others: Vec<&NodeId> = members.iter().filter(|m| *m != local).collect();
    others
        .choose(rng)
        .map(|m| (*m).clone())
        .unwrap_or_else(|| local.clone())
}

/// Peer selector for both intent maps, reading membership and leadership on
/// every call
pub fn peer_selector(
    cluster: Arc<dyn ClusterService>,
    partitions: Arc<dyn PartitionService>,
) -> PeerSelector<IntentKey, IntentRecord> {
    Arc::new(move |key: &IntentKey, record: &IntentRecord| {
        let local = cluster.local_node().id;
        let members: Vec<NodeId> = cluster.nodes().into_iter().map(|n| n.id).collect();
        select_peers(
            &local,
            partitions.leader(key),
            record.origin(),
            &members,
            &mut rand::thread_rng(),
        )
    })
}
