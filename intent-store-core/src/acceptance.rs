//! Update acceptance state machine
//!
//! Decides whether an incoming record may replace the stored one, using only
//! their versions and states:
//!
//! 1. nothing stored: accept
//! 2. stored version older: accept, whatever the states
//! 3. stored version newer: reject as stale
//! 4. same version: consult the transition table
//!
//! | new state     | rejected when stored state is        |
//! |---------------|--------------------------------------|
//! | `Installing`  | `Installing`                         |
//! | `Installed`   | `Installed`, `Withdrawing`, `Withdrawn` |
//! | `Withdrawing` | `Withdrawing`                        |
//! | `Withdrawn`   | `Withdrawn`, `Installing`, `Installed` |
//! | `Failed`      | `Failed`                             |
//! | request and compilation states | always              |
//!
//! The verdict is returned as a value; callers decide how to log it.

use core::cmp::Ordering;
use core::fmt;

use crate::record::{IntentRecord, IntentState};

/// Outcome of an acceptance check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acceptance {
    /// Nothing was stored for the key
    Absent,
    /// The incoming version is newer than the stored one
    NewerVersion,
    /// Same version, allowed state transition
    Transition,
    /// The update must be dropped
    Rejected(Rejection),
}

impl Acceptance {
    /// Whether the update may be applied
    pub fn is_accepted(self) -> bool {
        !matches!(self, Acceptance::Rejected(_))
    }
}

/// Why an update was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// The stored version is newer
    Stale,
    /// Same version and same state
    Duplicate {
        /// The repeated state
        state: IntentState,
    },
    /// Same version, transition not allowed by the table
    InvalidTransition {
        /// Stored state
        from: IntentState,
        /// Incoming state
        to: IntentState,
    },
    /// The incoming state may never be committed
    InvalidState {
        /// Incoming state
        state: IntentState,
    },
}

impl Rejection {
    /// Whether the rejection points at a protocol or clock problem upstream,
    /// as opposed to routine duplicate or late gossip.
    pub fn is_anomaly(self) -> bool {
        matches!(
            self,
            Rejection::InvalidTransition { .. } | Rejection::InvalidState { .. }
        )
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::Stale => write!(f, "stale version"),
            Rejection::Duplicate { state } => write!(f, "duplicate {:?} update", state),
            Rejection::InvalidTransition { from, to } => {
                write!(f, "invalid state transition from {:?} to {:?}", from, to)
            }
            Rejection::InvalidState { state } => write!(f, "invalid state {:?}", state),
        }
    }
}

/// Determines whether `new` may replace `current`.
///
/// The update must either carry a higher version than the stored record, or
/// the transition between two revisions of the same version must be sane.
pub fn is_update_acceptable(current: Option<&IntentRecord>, new: &IntentRecord) -> Acceptance {
    let current = match current {
        None => return Acceptance::Absent,
        Some(current) => current,
    };

    match current.version().cmp(&new.version()) {
        Ordering::Less => Acceptance::NewerVersion,
        Ordering::Greater => Acceptance::Rejected(Rejection::Stale),
        Ordering::Equal => check_transition(current.state(), new.state()),
    }
}

fn check_transition(from: IntentState, to: IntentState) -> Acceptance {
    use IntentState::*;

    let rejection = match to {
        Installing | Installed | Withdrawing | Withdrawn | Failed if from == to => {
            Some(Rejection::Duplicate { state: to })
        }
        Installed if matches!(from, Withdrawing | Withdrawn) => {
            Some(Rejection::InvalidTransition { from, to })
        }
        Withdrawn if matches!(from, Installing | Installed) => {
            Some(Rejection::InvalidTransition { from, to })
        }
        Installing | Installed | Withdrawing | Withdrawn | Failed => None,
        InstallReq | WithdrawReq | Compiling | Recompiling => {
            Some(Rejection::InvalidState { state: to })
        }
    };

    match rejection {
        Some(rejection) => Acceptance::Rejected(rejection),
        None => Acceptance::Transition,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::WallClockTimestamp;
    use crate::ids::{IntentKey, NodeId};
    use crate::record::Intent;
    use alloc::vec::Vec;
    use IntentState::*;

    fn record(state: IntentState, millis: u64) -> IntentRecord {
        IntentRecord::new(
            Intent::new(IntentKey::new("key"), "org.test", Vec::new()),
            state,
            Some(WallClockTimestamp::new(millis, 0, NodeId::new("n1"))),
        )
    }

    /// Expected outcome for an equal-version update from `from` to `to`.
    fn table(from: IntentState, to: IntentState) -> bool {
        match to {
            Installing => from != Installing,
            Installed => !matches!(from, Installed | Withdrawing | Withdrawn),
            Withdrawing => from != Withdrawing,
            Withdrawn => !matches!(from, Withdrawn | Installing | Installed),
            Failed => from != Failed,
            InstallReq | WithdrawReq | Compiling | Recompiling => false,
        }
    }

    #[test]
    fn accepts_when_nothing_is_stored() {
        let new = record(Installed, 10);
        assert_eq!(is_update_acceptable(None, &new), Acceptance::Absent);
    }

    #[test]
    fn newer_version_always_wins() {
        for from in IntentState::ALL {
            for to in IntentState::ALL {
                let verdict = is_update_acceptable(Some(&record(from, 10)), &record(to, 11));
                assert_eq!(verdict, Acceptance::NewerVersion, "{:?} -> {:?}", from, to);
            }
        }
    }

    #[test]
    fn older_version_is_stale() {
        for from in IntentState::ALL {
            for to in IntentState::ALL {
                let verdict = is_update_acceptable(Some(&record(from, 11)), &record(to, 10));
                assert_eq!(verdict, Acceptance::Rejected(Rejection::Stale));
            }
        }
    }

    #[test]
    fn equal_version_follows_transition_table() {
        for from in IntentState::ALL {
            for to in IntentState::ALL {
                let verdict = is_update_acceptable(Some(&record(from, 10)), &record(to, 10));
                assert_eq!(
                    verdict.is_accepted(),
                    table(from, to),
                    "{:?} -> {:?} gave {:?}",
                    from,
                    to,
                    verdict
                );
            }
        }
    }

    #[test]
    fn withdrawn_over_installing_is_invalid() {
        let verdict = is_update_acceptable(Some(&record(Installing, 10)), &record(Withdrawn, 10));
        assert_eq!(
            verdict,
            Acceptance::Rejected(Rejection::InvalidTransition {
                from: Installing,
                to: Withdrawn,
            })
        );
        assert!(Rejection::InvalidTransition { from: Installing, to: Withdrawn }.is_anomaly());
    }

    #[test]
    fn installing_over_withdrawn_is_allowed() {
        let verdict = is_update_acceptable(Some(&record(Withdrawn, 10)), &record(Installing, 10));
        assert_eq!(verdict, Acceptance::Transition);
    }

    #[test]
    fn identical_write_is_a_duplicate() {
        let data = record(Installed, 10);
        let verdict = is_update_acceptable(Some(&data), &data.clone());
        assert_eq!(
            verdict,
            Acceptance::Rejected(Rejection::Duplicate { state: Installed })
        );
        assert!(!Rejection::Duplicate { state: Installed }.is_anomaly());
    }

    #[test]
    fn request_states_are_never_committed() {
        for to in [InstallReq, WithdrawReq, Compiling, Recompiling] {
            let verdict = is_update_acceptable(Some(&record(Failed, 10)), &record(to, 10));
            assert_eq!(verdict, Acceptance::Rejected(Rejection::InvalidState { state: to }));
        }
    }

    #[test]
    fn unversioned_stored_record_loses_to_versioned_update() {
        let unversioned = IntentRecord::new(
            Intent::new(IntentKey::new("key"), "org.test", Vec::new()),
            Installed,
            None,
        );
        let verdict = is_update_acceptable(Some(&unversioned), &record(Installed, 1));
        assert_eq!(verdict, Acceptance::NewerVersion);
    }
}
