//! Gossip wire format
//!
//! One envelope carries a batch of entries for a single map. Entries carry
//! their timestamp so the receiver can merge without asking anyone.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use intent_store_core::ids::NodeId;

use crate::{Error, Result};

/// Envelope for all map gossip
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GossipEnvelope {
    /// Protocol version (major, minor)
    pub version: (u8, u8),
    /// Name of the map the entries belong to
    pub map_name: String,
    /// Sending node
    pub sender: NodeId,
    /// Postcard-encoded `Vec<GossipEntry<K, V, T>>`
    pub entries: Vec<u8>,
}

impl GossipEnvelope {
    /// Current protocol version
    pub const CURRENT_VERSION: (u8, u8) = (0, 1);

    /// Encode `entries` into a new envelope
    pub fn pack<K, V, T>(
        map_name: &str,
        sender: NodeId,
        entries: &[GossipEntry<K, V, T>],
    ) -> Result<Self>
    where
        K: Serialize,
        V: Serialize,
        T: Serialize,
    {
        Ok(Self {
            version: Self::CURRENT_VERSION,
            map_name: map_name.to_string(),
            sender,
            entries: postcard::to_allocvec(entries)?,
        })
    }

    /// Decode the entries, checking version and map name first
    pub fn unpack<K, V, T>(&self, map_name: &str) -> Result<Vec<GossipEntry<K, V, T>>>
    where
        K: DeserializeOwned,
        V: DeserializeOwned,
        T: DeserializeOwned,
    {
        if self.version.0 != Self::CURRENT_VERSION.0 {
            return Err(Error::UnsupportedVersion(self.version));
        }
        if self.map_name != map_name {
            return Err(Error::WrongMap(self.map_name.clone()));
        }
        Ok(postcard::from_bytes(&self.entries)?)
    }

    /// Serialize the envelope to bytes
    pub fn serialize(&self) -> Result<Vec<u8>> {
        Ok(postcard::to_allocvec(self)?)
    }

    /// Deserialize from bytes
    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        Ok(postcard::from_bytes(bytes)?)
    }
}

/// One replicated entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GossipEntry<K, V, T> {
    /// Entry key
    pub key: K,
    /// Stored value, or the last value before removal
    pub value: V,
    /// Whether the entry is a removal tombstone
    pub removed: bool,
    /// Timestamp assigned by the writer's clock strategy
    pub timestamp: T,
}
