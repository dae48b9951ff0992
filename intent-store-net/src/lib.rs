//! # Intent Store Network
//!
//! Replication plumbing for the intent store.
//!
//! This crate provides:
//! - The `ReplicatedRecordMap` trait the store consumes, with its change events
//! - The `ClusterCommunicator` seam maps use to reach peers
//! - The gossip wire envelope (postcard framing)
//! - `GossipMap`: an eventually consistent in-memory map merging by timestamp
//! - `MockNetwork` and static cluster/partition views for tests and demos

pub mod gossip;
pub mod protocol;
pub mod traits;

mod mock;
pub use mock::{MockCommunicator, MockNetwork, PartitionTable, StaticCluster, TablePartitions};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::gossip::GossipMap;
    pub use crate::protocol::*;
    pub use crate::traits::*;
}

/// Result type for replication operations
pub type Result<T> = core::result::Result<T, Error>;

/// Replication error types
#[derive(Debug)]
pub enum Error {
    /// Envelope or entry could not be encoded or decoded
    Serialization(postcard::Error),
    /// Envelope was produced by an incompatible protocol version
    UnsupportedVersion((u8, u8)),
    /// Envelope was addressed to a different map
    WrongMap(String),
    /// No route to the peer
    PeerNotFound,
}

impl std::error::Error for Error {}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::Serialization(e) => write!(f, "serialization error: {}", e),
            Error::UnsupportedVersion((major, minor)) => {
                write!(f, "unsupported protocol version {}.{}", major, minor)
            }
            Error::WrongMap(name) => write!(f, "envelope addressed to map {}", name),
            Error::PeerNotFound => write!(f, "peer not found"),
        }
    }
}

impl From<postcard::Error> for Error {
    fn from(e: postcard::Error) -> Self {
        Error::Serialization(e)
    }
}
