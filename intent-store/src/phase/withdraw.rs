//! Withdrawal phases

use tracing::{debug, warn};

use intent_store_core::record::{Intent, IntentRecord, IntentState};

use super::{Context, Finalize, ProcessPhase};
use crate::dataplane::FlowRuleOperations;

/// Entry point of a withdrawal: carries over the installables to remove
pub struct WithdrawRequest {
    ctx: Context,
    pending: IntentRecord,
}

impl WithdrawRequest {
    pub fn new(ctx: Context, pending: IntentRecord) -> Self {
        Self { ctx, pending }
    }
}

impl ProcessPhase for WithdrawRequest {
    fn execute(self: Box<Self>) -> Option<Box<dyn ProcessPhase>> {
        let WithdrawRequest { ctx, mut pending } = *self;

        if pending.installables().is_none() {
            match ctx.current(pending.key()).and_then(|c| c.installables().map(<[Intent]>::to_vec)) {
                Some(installables) => pending.set_installables(installables),
                None => debug!(key = %pending.key(), "withdrawing intent with nothing installed"),
            }
        }
        Some(Box::new(Withdrawing::new(ctx, pending)))
    }
}

/// Removes the intent's flow rules from the dataplane
pub struct Withdrawing {
    ctx: Context,
    pending: IntentRecord,
    operations: FlowRuleOperations,
}

impl Withdrawing {
    /// Phase removing every rule of `pending`'s installables
    pub fn new(ctx: Context, pending: IntentRecord) -> Self {
        let operations = FlowRuleOperations::new().remove_all(pending.installables().unwrap_or_default());
        Self {
            ctx,
            pending,
            operations,
        }
    }
}

impl ProcessPhase for Withdrawing {
    fn execute(self: Box<Self>) -> Option<Box<dyn ProcessPhase>> {
        let Withdrawing {
            ctx,
            pending,
            operations,
        } = *self;

        if !ctx.commit(pending.clone().with_state(IntentState::Withdrawing)) {
            return None;
        }

        match ctx.apply_flow_rules(operations) {
            Ok(()) => Some(Box::new(Finalize::withdrawn(ctx, pending))),
            Err(e) => {
                warn!(key = %pending.key(), error = %e, "failed to withdraw intent");
                Some(Box::new(Finalize::failed(ctx, pending)))
            }
        }
    }
}
