//! Terminal phases

use tracing::debug;

use intent_store_core::record::{IntentRecord, IntentState};

use super::{Context, ProcessPhase};

/// Stamps the outcome of a chain on its record and writes it to the store
pub struct Finalize {
    ctx: Context,
    record: IntentRecord,
    state: IntentState,
}

impl Finalize {
    pub fn installed(ctx: Context, record: IntentRecord) -> Self {
        Self::new(ctx, record, IntentState::Installed)
    }

    pub fn withdrawn(ctx: Context, record: IntentRecord) -> Self {
        Self::new(ctx, record, IntentState::Withdrawn)
    }

    pub fn failed(ctx: Context, record: IntentRecord) -> Self {
        Self::new(ctx, record, IntentState::Failed)
    }

    fn new(ctx: Context, record: IntentRecord, state: IntentState) -> Self {
        Self { ctx, record, state }
    }

    /// State the record is finalized in
    pub fn state(&self) -> IntentState {
        self.state
    }
}

impl ProcessPhase for Finalize {
    fn execute(self: Box<Self>) -> Option<Box<dyn ProcessPhase>> {
        let Finalize { ctx, record, state } = *self;
        debug!(key = %record.key(), state = ?state, "finalizing intent");
        ctx.commit(record.with_state(state));
        None
    }
}
