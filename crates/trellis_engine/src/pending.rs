//! Pending rule executions.
//!
//! Triggers enqueue work here instead of running it mid-operation. The
//! queue is drained just before commit; see
//! [`RuleService::execute_pending_rules`](crate::RuleService::execute_pending_rules).

use trellis_foundation::NodeId;

use crate::rule::Rule;

/// One queued rule execution.
#[derive(Clone, Debug)]
pub struct PendingRuleExecution {
    /// The node whose rule set contained the rule.
    pub actionable: NodeId,
    /// The node the action will run against.
    pub actioned_upon: NodeId,
    /// The rule to run.
    pub rule: Rule,
    /// Run after everything else queued in the same drain.
    pub defer_to_end: bool,
}

impl PendingRuleExecution {
    /// Creates a pending execution.
    #[must_use]
    pub fn new(actionable: NodeId, actioned_upon: NodeId, rule: Rule, defer_to_end: bool) -> Self {
        Self {
            actionable,
            actioned_upon,
            rule,
            defer_to_end,
        }
    }

    fn same_work(&self, other: &Self) -> bool {
        self.actionable == other.actionable
            && self.actioned_upon == other.actioned_upon
            && self.rule.id() == other.rule.id()
    }
}

/// What happened to one execution during a drain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// The action ran.
    Executed,
    /// The action was handed to the async dispatcher.
    Dispatched,
    /// Nothing ran.
    Skipped(SkipReason),
    /// The action failed and its changes were undone.
    Failed,
}

/// Why an execution was skipped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// The actioned-upon node no longer exists.
    NodeMissing,
    /// A gate blocked the rule.
    Blocked,
    /// The rule is disabled.
    RuleDisabled,
    /// The rule already ran against this node or its copy source.
    AlreadyExecuted,
    /// The action's conditions did not hold.
    ConditionFalse,
}

/// Summary of one drain.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Queue snapshots taken.
    pub passes: u32,
    /// Actions run synchronously.
    pub executed: usize,
    /// Actions handed to the async dispatcher.
    pub dispatched: usize,
    /// Executions skipped.
    pub skipped: usize,
    /// Executions that failed under the isolating policy.
    pub failed: usize,
}

impl DrainReport {
    pub(crate) fn record(&mut self, outcome: ExecutionOutcome) {
        match outcome {
            ExecutionOutcome::Executed => self.executed += 1,
            ExecutionOutcome::Dispatched => self.dispatched += 1,
            ExecutionOutcome::Skipped(_) => self.skipped += 1,
            ExecutionOutcome::Failed => self.failed += 1,
        }
    }
}

/// Ordered, duplicate-free queue of pending executions.
#[derive(Clone, Debug, Default)]
pub struct PendingQueue {
    entries: Vec<PendingRuleExecution>,
}

impl PendingQueue {
    /// Appends an entry unless the same work is already queued.
    ///
    /// Returns true if the entry was added.
    pub fn push(&mut self, entry: PendingRuleExecution) -> bool {
        if self.entries.iter().any(|e| e.same_work(&entry)) {
            return false;
        }
        self.entries.push(entry);
        true
    }

    /// Removes and returns every entry in enqueue order.
    pub fn take(&mut self) -> Vec<PendingRuleExecution> {
        std::mem::take(&mut self.entries)
    }

    /// Returns the queued entries.
    pub fn iter(&self) -> impl Iterator<Item = &PendingRuleExecution> {
        self.entries.iter()
    }

    /// Returns the number of queued entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
