//! At-most-once execution bookkeeping.
//!
//! Each transaction records `(actionable, actioned-upon, rule)` for every
//! execution. A rule may run against a node at most once per transaction,
//! and not against a copy of a node it already ran against (this is what
//! stops a copy rule from copying its own output forever).

use std::collections::HashSet;

use tracing::trace;
use trellis_foundation::NodeId;
use trellis_storage::{Permission, aspects, props};

use crate::context::RuleTransaction;

/// One recorded execution.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ExecutedRule {
    /// The node whose rule set contained the rule.
    pub actionable: NodeId,
    /// The node the action ran against.
    pub actioned_upon: NodeId,
    /// The rule node.
    pub rule: NodeId,
}

/// Executions performed in one transaction.
#[derive(Clone, Debug, Default)]
pub struct ExecutedRules {
    records: Vec<ExecutedRule>,
    by_target: HashSet<(NodeId, NodeId)>,
}

impl ExecutedRules {
    /// Records an execution.
    pub fn record(&mut self, actionable: NodeId, actioned_upon: NodeId, rule: NodeId) {
        self.by_target.insert((actioned_upon, rule));
        self.records.push(ExecutedRule {
            actionable,
            actioned_upon,
            rule,
        });
    }

    /// Returns true if `rule` already ran against `actioned_upon`.
    #[must_use]
    pub fn contains(&self, actioned_upon: NodeId, rule: NodeId) -> bool {
        self.by_target.contains(&(actioned_upon, rule))
    }

    /// Returns every recorded execution, oldest first.
    #[must_use]
    pub fn records(&self) -> &[ExecutedRule] {
        &self.records
    }

    /// Returns the number of recorded executions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if nothing has run.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Returns true if `rule` may run against `actioned_upon`.
///
/// Walks the `cm:copiedfrom` provenance chain; the rule is refused if it
/// already ran against the node or any readable ancestor copy. Unreadable or
/// missing sources end the walk.
#[must_use]
pub fn can_execute(txn: &RuleTransaction<'_>, actioned_upon: NodeId, rule: NodeId) -> bool {
    let executed = &txn.ext().executed;
    if executed.contains(actioned_upon, rule) {
        return false;
    }

    let store = txn.store();
    let mut seen = HashSet::from([actioned_upon]);
    let mut current = actioned_upon;
    while store.has_aspect(current, &aspects::COPIED_FROM) {
        let Some(source) = store.property(current, &props::ORIGINAL).and_then(|v| v.as_node()) else {
            break;
        };
        if !store.exists(source) || !txn.has_permission(source, Permission::Read) {
            break;
        }
        if executed.contains(source, rule) {
            trace!(%actioned_upon, %source, %rule, "rule already ran against copy source");
            return false;
        }
        if !seen.insert(source) {
            break;
        }
        current = source;
    }
    true
}
