//! Dataplane and compiler seams consumed by the processing chain

use serde::{Deserialize, Serialize};

use intent_store_core::ids::IntentKey;
use intent_store_core::record::Intent;

/// Identity of a flow rule derived from the installable it implements
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FlowRuleId(pub String);

/// A rule pushed to the dataplane
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FlowRule {
    /// Rule identity
    pub id: FlowRuleId,
    /// Installable the rule implements
    pub owner: IntentKey,
    /// Encoded match/action body
    pub body: Vec<u8>,
}

impl FlowRule {
    /// The rule implementing `installable`
    pub fn from_installable(installable: &Intent) -> Self {
        Self {
            id: FlowRuleId(installable.key.as_str().to_string()),
            owner: installable.key.clone(),
            body: installable.payload.clone(),
        }
    }
}

/// One staged rule change
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowRuleOperation {
    Add(FlowRule),
    Remove(FlowRule),
}

impl FlowRuleOperation {
    /// The rule the operation targets
    pub fn rule(&self) -> &FlowRule {
        match self {
            FlowRuleOperation::Add(rule) | FlowRuleOperation::Remove(rule) => rule,
        }
    }
}

/// An ordered batch of rule changes, applied as a unit
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlowRuleOperations {
    operations: Vec<FlowRuleOperation>,
}

impl FlowRuleOperations {
    /// Empty batch
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage removal of every rule implementing `installables`
    pub fn remove_all(mut self, installables: &[Intent]) -> Self {
        self.operations.extend(
            installables
                .iter()
                .map(|i| FlowRuleOperation::Remove(FlowRule::from_installable(i))),
        );
        self
    }

    /// Stage addition of a rule for every one of `installables`
    pub fn add_all(mut self, installables: &[Intent]) -> Self {
        self.operations.extend(
            installables
                .iter()
                .map(|i| FlowRuleOperation::Add(FlowRule::from_installable(i))),
        );
        self
    }

    /// Staged operations in order
    pub fn operations(&self) -> &[FlowRuleOperation] {
        &self.operations
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }
}

/// Dataplane failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FlowRuleError {
    #[error("device rejected rule {0:?}")]
    Rejected(FlowRuleId),

    #[error("dataplane unavailable: {0}")]
    Unavailable(String),
}

/// Compilation failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompileError {
    #[error("no compiler for intent {0}")]
    Unsupported(IntentKey),

    #[error("compilation of {key} failed: {reason}")]
    Failed { key: IntentKey, reason: String },
}

/// Installs and removes flow rules.
///
/// `apply` is synchronous and may block; callers run it off the event
/// dispatch thread.
pub trait FlowRuleService: Send + Sync {
    fn apply(&self, operations: FlowRuleOperations) -> Result<(), FlowRuleError>;
}

/// Turns an intent into the installable intents that implement it
pub trait IntentCompiler: Send + Sync {
    /// Compile `intent`; `previous` holds the installables currently in place, if any
    fn compile(&self, intent: &Intent, previous: Option<&[Intent]>) -> Result<Vec<Intent>, CompileError>;
}
