//! In-memory dataplane and compiler for tests and the demo

use std::collections::{BTreeMap, HashSet};

use parking_lot::Mutex;

use intent_store_core::ids::IntentKey;
use intent_store_core::record::Intent;

use crate::dataplane::{
    CompileError, FlowRule, FlowRuleError, FlowRuleId, FlowRuleOperation, FlowRuleOperations,
    FlowRuleService, IntentCompiler,
};

#[derive(Debug, Default)]
struct RuleTable {
    rules: BTreeMap<FlowRuleId, FlowRule>,
    batches: usize,
    fail_next: usize,
}

/// Flow rule table held in memory.
///
/// A batch is applied to a copy of the table which replaces the original only
/// if every operation succeeded, so a failed batch leaves no partial state.
#[derive(Debug, Default)]
pub struct MemoryFlowRules {
    table: Mutex<RuleTable>,
}

impl MemoryFlowRules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` batches fail
    pub fn fail_next(&self, count: usize) {
        self.table.lock().fail_next = count;
    }

    /// Installed rules, ordered by id
    pub fn rules(&self) -> Vec<FlowRule> {
        self.table.lock().rules.values().cloned().collect()
    }

    /// Whether a rule with `id` is installed
    pub fn contains(&self, id: &FlowRuleId) -> bool {
        self.table.lock().rules.contains_key(id)
    }

    /// Number of batches applied successfully
    pub fn batches(&self) -> usize {
        self.table.lock().batches
    }
}

impl FlowRuleService for MemoryFlowRules {
    fn apply(&self, operations: FlowRuleOperations) -> Result<(), FlowRuleError> {
        let mut table = self.table.lock();
        if table.fail_next > 0 {
            table.fail_next -= 1;
            return Err(FlowRuleError::Unavailable("injected failure".to_string()));
        }

        let mut next = table.rules.clone();
        for operation in operations.operations() {
            match operation {
                FlowRuleOperation::Add(rule) => {
                    next.insert(rule.id.clone(), rule.clone());
                }
                FlowRuleOperation::Remove(rule) => {
                    next.remove(&rule.id);
                }
            }
        }
        table.rules = next;
        table.batches += 1;
        Ok(())
    }
}

/// Compiler splitting an intent into a fixed number of installables keyed
/// `<key>/<index>`
#[derive(Debug)]
pub struct SplitCompiler {
    segments: usize,
    failing: Mutex<HashSet<IntentKey>>,
}

impl SplitCompiler {
    pub fn new(segments: usize) -> Self {
        Self {
            segments,
            failing: Mutex::new(HashSet::new()),
        }
    }

    /// Make every compilation of `key` fail
    pub fn fail_on(&self, key: IntentKey) {
        self.failing.lock().insert(key);
    }
}

impl IntentCompiler for SplitCompiler {
    fn compile(&self, intent: &Intent, _previous: Option<&[Intent]>) -> Result<Vec<Intent>, CompileError> {
        if self.failing.lock().contains(&intent.key) {
            return Err(CompileError::Failed {
                key: intent.key.clone(),
                reason: "no path".to_string(),
            });
        }
        if self.segments == 0 {
            return Err(CompileError::Unsupported(intent.key.clone()));
        }
        Ok((0..self.segments)
            .map(|i| {
                Intent::new(
                    IntentKey::new(format!("{}/{}", intent.key, i)),
                    intent.app_id.clone(),
                    intent.payload.clone(),
                )
            })
            .collect())
    }
}
