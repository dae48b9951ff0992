//! Intent lifecycle events

use crate::ids::IntentKey;
use crate::record::{IntentRecord, IntentState};

/// Kind of lifecycle event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntentEventKind {
    /// A client asked for installation
    InstallReq,
    /// Installation started
    Installing,
    /// Installed in the dataplane
    Installed,
    /// A client asked for withdrawal
    WithdrawReq,
    /// Withdrawal started
    Withdrawing,
    /// Removed from the dataplane
    Withdrawn,
    /// Processing failed
    Failed,
}

impl IntentEventKind {
    /// Event kind announcing `state`, if that state is announced at all.
    ///
    /// Compilation states are internal to the processing chain.
    pub fn for_state(state: IntentState) -> Option<Self> {
        match state {
            IntentState::InstallReq => Some(IntentEventKind::InstallReq),
            IntentState::Installing => Some(IntentEventKind::Installing),
            IntentState::Installed => Some(IntentEventKind::Installed),
            IntentState::WithdrawReq => Some(IntentEventKind::WithdrawReq),
            IntentState::Withdrawing => Some(IntentEventKind::Withdrawing),
            IntentState::Withdrawn => Some(IntentEventKind::Withdrawn),
            IntentState::Failed => Some(IntentEventKind::Failed),
            IntentState::Compiling | IntentState::Recompiling => None,
        }
    }
}

/// A lifecycle event derived from a stored record
#[derive(Debug, Clone, PartialEq)]
pub struct IntentEvent {
    /// What happened
    pub kind: IntentEventKind,
    /// Intent the event is about
    pub key: IntentKey,
    /// State of the record that produced the event
    pub state: IntentState,
    /// The record itself
    pub record: IntentRecord,
}

impl IntentEvent {
    /// Build the event announcing `record`, if its state is announced
    pub fn from_record(record: &IntentRecord) -> Option<Self> {
        let kind = IntentEventKind::for_state(record.state())?;
        Some(Self {
            kind,
            key: record.key().clone(),
            state: record.state(),
            record: record.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Intent;
    use alloc::vec::Vec;

    #[test]
    fn every_committable_state_is_announced() {
        for state in IntentState::ALL {
            if state.is_committable() {
                assert!(IntentEventKind::for_state(state).is_some(), "{:?}", state);
            }
        }
    }

    #[test]
    fn compilation_states_are_silent() {
        let record = IntentRecord::new(
            Intent::new(IntentKey::new("k"), "org.test", Vec::new()),
            IntentState::Compiling,
            None,
        );
        assert!(IntentEvent::from_record(&record).is_none());
        assert!(IntentEventKind::for_state(IntentState::Recompiling).is_none());
    }

    #[test]
    fn event_carries_key_and_state() {
        let record = IntentRecord::new(
            Intent::new(IntentKey::new("k"), "org.test", Vec::new()),
            IntentState::Withdrawn,
            None,
        );
        let event = IntentEvent::from_record(&record).unwrap();
        assert_eq!(event.kind, IntentEventKind::Withdrawn);
        assert_eq!(event.key, IntentKey::new("k"));
        assert_eq!(event.state, IntentState::Withdrawn);
    }
}
