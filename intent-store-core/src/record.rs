//! Intent records and lifecycle states

use alloc::string::String;
use alloc::vec::Vec;

use serde::{Deserialize, Serialize};

use crate::clock::{Versioned, WallClockTimestamp};
use crate::ids::{IntentKey, NodeId};

/// Lifecycle state of an intent
///
/// Logical order: `InstallReq → Compiling → Installing → Installed →
/// (WithdrawReq → Withdrawing → Withdrawn)`. `Recompiling` branches off
/// `Installed` on topology change; `Failed` is reachable from `Compiling`,
/// `Installing` and `Withdrawing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IntentState {
    /// Installation requested by a client
    InstallReq,
    /// Being compiled into installable intents
    Compiling,
    /// Installables are being pushed to the dataplane
    Installing,
    /// Installed in the dataplane
    Installed,
    /// Being recompiled after a topology change
    Recompiling,
    /// Withdrawal requested by a client
    WithdrawReq,
    /// Flow rules are being removed from the dataplane
    Withdrawing,
    /// Removed from the dataplane
    Withdrawn,
    /// Compilation or dataplane operation failed
    Failed,
}

impl IntentState {
    /// Every state, in logical order
    pub const ALL: [IntentState; 9] = [
        IntentState::InstallReq,
        IntentState::Compiling,
        IntentState::Installing,
        IntentState::Installed,
        IntentState::Recompiling,
        IntentState::WithdrawReq,
        IntentState::Withdrawing,
        IntentState::Withdrawn,
        IntentState::Failed,
    ];

    /// States that may be committed to the current map.
    ///
    /// Request and compilation states only exist inside the processing chain.
    pub fn is_committable(self) -> bool {
        matches!(
            self,
            IntentState::Installing
                | IntentState::Installed
                | IntentState::Withdrawing
                | IntentState::Withdrawn
                | IntentState::Failed
        )
    }

    /// States from which a current-map entry may be purged
    pub fn is_purgeable(self) -> bool {
        matches!(self, IntentState::Withdrawn | IntentState::Failed)
    }
}

/// An intent definition.
///
/// The payload is opaque to the store; only the compiler and the dataplane
/// interpret it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Intent {
    /// Key of the intent
    pub key: IntentKey,
    /// Application that submitted the intent
    pub app_id: String,
    /// Encoded intent body
    pub payload: Vec<u8>,
}

impl Intent {
    /// Create an intent
    pub fn new(key: IntentKey, app_id: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            key,
            app_id: app_id.into(),
            payload,
        }
    }
}

/// The per-intent value stored in both the current and the pending map.
///
/// Records are plain values: every read hands out a clone, and a revision is
/// always replaced as a whole.
///
/// Two records are equal when they describe the same revision of the same
/// intent, i.e. they share key and version. State, origin and installables are
/// not part of equality, so a pending request and the record its processing
/// produced compare equal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentRecord {
    intent: Intent,
    state: IntentState,
    version: Option<WallClockTimestamp>,
    origin: Option<NodeId>,
    installables: Option<Vec<Intent>>,
}

impl IntentRecord {
    /// Create a record with no origin and no installables
    pub fn new(intent: Intent, state: IntentState, version: Option<WallClockTimestamp>) -> Self {
        Self {
            intent,
            state,
            version,
            origin: None,
            installables: None,
        }
    }

    /// Key of the intent this record describes
    pub fn key(&self) -> &IntentKey {
        &self.intent.key
    }

    /// The intent definition
    pub fn intent(&self) -> &Intent {
        &self.intent
    }

    /// Lifecycle state
    pub fn state(&self) -> IntentState {
        self.state
    }

    /// Version of this revision, if stamped
    pub fn version(&self) -> Option<&WallClockTimestamp> {
        self.version.as_ref()
    }

    /// Node that submitted this revision
    pub fn origin(&self) -> Option<&NodeId> {
        self.origin.as_ref()
    }

    /// Compiled installable intents, once compilation succeeded
    pub fn installables(&self) -> Option<&[Intent]> {
        self.installables.as_deref()
    }

    /// Stamp the version
    pub fn set_version(&mut self, version: WallClockTimestamp) {
        self.version = Some(version);
    }

    /// Set the origin node
    pub fn set_origin(&mut self, origin: NodeId) {
        self.origin = Some(origin);
    }

    /// Set the installables
    pub fn set_installables(&mut self, installables: Vec<Intent>) {
        self.installables = Some(installables);
    }

    /// Same revision in a new state
    pub fn with_state(mut self, state: IntentState) -> Self {
        self.state = state;
        self
    }
}

impl PartialEq for IntentRecord {
    fn eq(&self, other: &Self) -> bool {
        self.intent.key == other.intent.key && self.version == other.version
    }
}

impl Eq for IntentRecord {}

impl Versioned for IntentRecord {
    fn version(&self) -> Option<&WallClockTimestamp> {
        self.version.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    fn record(state: IntentState, millis: u64) -> IntentRecord {
        let intent = Intent::new(IntentKey::new("k1"), "org.test", vec![1, 2, 3]);
        IntentRecord::new(
            intent,
            state,
            Some(WallClockTimestamp::new(millis, 0, NodeId::new("n1"))),
        )
    }

    #[test]
    fn equality_is_revision_identity() {
        let pending = record(IntentState::InstallReq, 10);
        let mut installed = pending.clone().with_state(IntentState::Installed);
        installed.set_origin(NodeId::new("n2"));

        assert_eq!(pending, installed);
        assert_ne!(pending, record(IntentState::InstallReq, 11));
    }

    #[test]
    fn only_post_compilation_states_are_committable() {
        let committable: Vec<IntentState> = IntentState::ALL
            .iter()
            .copied()
            .filter(|s| s.is_committable())
            .collect();
        assert_eq!(
            committable,
            vec![
                IntentState::Installing,
                IntentState::Installed,
                IntentState::Withdrawing,
                IntentState::Withdrawn,
                IntentState::Failed,
            ]
        );
    }

    #[test]
    fn record_serializes_as_a_unit() {
        let mut original = record(IntentState::Installed, 42);
        original.set_origin(NodeId::new("n3"));
        original.set_installables(vec![Intent::new(IntentKey::new("k1/0"), "org.test", vec![])]);

        let json = serde_json::to_string(&original).unwrap();
        let decoded: IntentRecord = serde_json::from_str(&json).unwrap();

        assert_eq!(decoded, original);
        assert_eq!(decoded.state(), IntentState::Installed);
        assert_eq!(decoded.origin(), Some(&NodeId::new("n3")));
        assert_eq!(decoded.installables().map(<[Intent]>::len), Some(1));
    }
}
