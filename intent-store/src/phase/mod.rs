//! Intent processing chain
//!
//! A pending request is processed by a chain of phases. Each phase performs
//! one step (a compilation, a dataplane batch or a store write) and hands
//! back the phase that follows it, or `None` once the chain is over.
//!
//! ```text
//! InstallRequest -> Compiling -> Installing -> Finalize(Installed)
//!                        \             \
//!                         +-------------+---> Finalize(Failed)
//!
//! WithdrawRequest -> Withdrawing -> Finalize(Withdrawn)
//!                         \
//!                          +---> Finalize(Failed)
//! ```

mod finalize;
mod install;
mod withdraw;

use std::sync::Arc;

use intent_store_core::ids::IntentKey;
use intent_store_core::record::{Intent, IntentRecord, IntentState};

use crate::dataplane::{CompileError, FlowRuleError, FlowRuleOperations};

pub use finalize::Finalize;
pub use install::{Compiling, InstallRequest, Installing};
pub use withdraw::{WithdrawRequest, Withdrawing};

/// One step of the processing chain
pub trait ProcessPhase: Send {
    /// Run the step and return the next one
    fn execute(self: Box<Self>) -> Option<Box<dyn ProcessPhase>>;
}

/// Collaborators available to every phase
pub trait PhaseContext: Send + Sync {
    /// Compile `intent`, given the installables currently in place
    fn compile(&self, intent: &Intent, previous: Option<&[Intent]>) -> Result<Vec<Intent>, CompileError>;

    /// Apply a flow rule batch; may block
    fn apply_flow_rules(&self, operations: FlowRuleOperations) -> Result<(), FlowRuleError>;

    /// Current record for `key`
    fn current(&self, key: &IntentKey) -> Option<IntentRecord>;

    /// Write `record` to the store.
    ///
    /// Returns false when the chain must stop because this node may no longer
    /// write for the key.
    fn commit(&self, record: IntentRecord) -> bool;
}

/// Shared handle to the phase context
pub type Context = Arc<dyn PhaseContext>;

/// First phase for a pending `record`, if its state starts a chain
pub fn initial_phase(ctx: Context, record: IntentRecord) -> Option<Box<dyn ProcessPhase>> {
    match record.state() {
        IntentState::InstallReq => Some(Box::new(InstallRequest::new(ctx, record))),
        IntentState::WithdrawReq => Some(Box::new(WithdrawRequest::new(ctx, record))),
        _ => None,
    }
}

/// Run phases until one ends the chain; returns the number of phases run
pub fn run_chain(initial: Box<dyn ProcessPhase>) -> usize {
    let mut steps = 0;
    let mut phase = Some(initial);
    while let Some(current) = phase {
        phase = current.execute();
        steps += 1;
    }
    steps
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use parking_lot::Mutex;

    use crate::dataplane::{FlowRuleService, IntentCompiler};
    use crate::mock::{MemoryFlowRules, SplitCompiler};

    /// Context recording every commit in memory
    pub struct RecordingContext {
        pub compiler: SplitCompiler,
        pub flow_rules: MemoryFlowRules,
        pub current: Mutex<Option<IntentRecord>>,
        pub commits: Mutex<Vec<IntentState>>,
        pub writable: bool,
    }

    impl RecordingContext {
        pub fn new() -> Arc<Self> {
            Arc::new(Self {
                compiler: SplitCompiler::new(2),
                flow_rules: MemoryFlowRules::new(),
                current: Mutex::new(None),
                commits: Mutex::new(Vec::new()),
                writable: true,
            })
        }

        /// Context refusing every commit
        pub fn read_only() -> Arc<Self> {
            Arc::new(Self {
                compiler: SplitCompiler::new(2),
                flow_rules: MemoryFlowRules::new(),
                current: Mutex::new(None),
                commits: Mutex::new(Vec::new()),
                writable: false,
            })
        }
    }

    impl PhaseContext for RecordingContext {
        fn compile(&self, intent: &Intent, previous: Option<&[Intent]>) -> Result<Vec<Intent>, CompileError> {
            self.compiler.compile(intent, previous)
        }

        fn apply_flow_rules(&self, operations: FlowRuleOperations) -> Result<(), FlowRuleError> {
            self.flow_rules.apply(operations)
        }

        fn current(&self, _key: &IntentKey) -> Option<IntentRecord> {
            self.current.lock().clone()
        }

        fn commit(&self, record: IntentRecord) -> bool {
            if !self.writable {
                return false;
            }
            self.commits.lock().push(record.state());
            *self.current.lock() = Some(record);
            true
        }
    }
}
