//! Installation phases

use tracing::{debug, warn};

use intent_store_core::record::{Intent, IntentRecord, IntentState};

use super::{Context, Finalize, ProcessPhase};
use crate::dataplane::FlowRuleOperations;

/// Entry point of an installation: looks up what is already installed
pub struct InstallRequest {
    ctx: Context,
    pending: IntentRecord,
}

impl InstallRequest {
    pub fn new(ctx: Context, pending: IntentRecord) -> Self {
        Self { ctx, pending }
    }
}

impl ProcessPhase for InstallRequest {
    fn execute(self: Box<Self>) -> Option<Box<dyn ProcessPhase>> {
        let previous = self
            .ctx
            .current(self.pending.key())
            .and_then(|current| current.installables().map(<[Intent]>::to_vec));
        Some(Box::new(Compiling {
            ctx: self.ctx,
            pending: self.pending,
            previous,
        }))
    }
}

/// Compiles the intent into installables
pub struct Compiling {
    ctx: Context,
    pending: IntentRecord,
    previous: Option<Vec<Intent>>,
}

impl ProcessPhase for Compiling {
    fn execute(self: Box<Self>) -> Option<Box<dyn ProcessPhase>> {
        let Compiling {
            ctx,
            mut pending,
            previous,
        } = *self;

        match ctx.compile(pending.intent(), previous.as_deref()) {
            Ok(installables) => {
                debug!(key = %pending.key(), count = installables.len(), "compiled intent");
                pending.set_installables(installables);
                Some(Box::new(Installing {
                    ctx,
                    record: pending,
                    previous,
                }))
            }
            Err(e) => {
                warn!(key = %pending.key(), error = %e, "intent compilation failed");
                Some(Box::new(Finalize::failed(ctx, pending)))
            }
        }
    }
}

/// Replaces the previous installables with the new ones in the dataplane
pub struct Installing {
    ctx: Context,
    record: IntentRecord,
    previous: Option<Vec<Intent>>,
}

impl ProcessPhase for Installing {
    fn execute(self: Box<Self>) -> Option<Box<dyn ProcessPhase>> {
        let Installing { ctx, record, previous } = *self;

        if !ctx.commit(record.clone().with_state(IntentState::Installing)) {
            return None;
        }

        let operations = FlowRuleOperations::new()
            .remove_all(previous.as_deref().unwrap_or_default())
            .add_all(record.installables().unwrap_or_default());

        match ctx.apply_flow_rules(operations) {
            Ok(()) => Some(Box::new(Finalize::installed(ctx, record))),
            Err(e) => {
                warn!(key = %record.key(), error = %e, "failed to install intent");
                Some(Box::new(Finalize::failed(ctx, record)))
            }
        }
    }
}
