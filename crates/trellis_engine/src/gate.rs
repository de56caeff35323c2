//! Rule gates: switches that suppress rule execution.
//!
//! There are two layers:
//! - [`GateController`]: the process-wide switch, shared by every transaction
//! - [`LocalGates`]: per-transaction suppression of all rules, single nodes,
//!   single rules, or whole rule types
//!
//! The scoped helpers ([`without_rules`] and friends) restore the previous
//! state on both the success and the error path.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;
use trellis_foundation::{NodeId, QName, Result};

use crate::context::RuleTransaction;
use crate::rule::Rule;

// =============================================================================
// Global Switch
// =============================================================================

/// The process-wide rule switch.
#[derive(Debug)]
pub struct GateController {
    enabled: AtomicBool,
}

impl GateController {
    /// Creates a controller in the given state.
    #[must_use]
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
        }
    }

    /// Returns true if rules are globally enabled.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Turns rules on for every transaction.
    pub fn enable(&self) {
        self.enabled.store(true, Ordering::Release);
        debug!("rules globally enabled");
    }

    /// Turns rules off for every transaction.
    pub fn disable(&self) {
        self.enabled.store(false, Ordering::Release);
        debug!("rules globally disabled");
    }

    /// Returns true if `rule` may run against every node in `nodes`.
    ///
    /// A rule is blocked when rules are off globally or suspended in this
    /// transaction, when any of the nodes is disabled, when the rule itself
    /// is disabled, or when every one of its rule types is disabled.
    #[must_use]
    pub fn is_rule_allowed(&self, local: &LocalGates, nodes: &[NodeId], rule: &Rule) -> bool {
        if !self.is_enabled() || local.rules_suspended() {
            return false;
        }
        if nodes.iter().any(|&n| !local.is_node_enabled(n)) {
            return false;
        }
        if rule.id().is_some_and(|id| !local.is_rule_enabled(id)) {
            return false;
        }
        rule.rule_types.is_empty()
            || rule
                .rule_types
                .iter()
                .any(|t| local.is_rule_type_enabled(t))
    }
}

impl Default for GateController {
    fn default() -> Self {
        Self::new(true)
    }
}

// =============================================================================
// Transaction-Local Gates
// =============================================================================

/// Suppression state owned by one transaction.
#[derive(Clone, Debug, Default)]
pub struct LocalGates {
    suspended: usize,
    nodes: HashSet<NodeId>,
    rules: HashSet<NodeId>,
    rule_types: HashSet<QName>,
}

impl LocalGates {
    /// Suspends all rules. Nests: each call needs a matching
    /// [`resume_rules`](Self::resume_rules).
    pub fn suspend_rules(&mut self) {
        self.suspended += 1;
    }

    /// Undoes one [`suspend_rules`](Self::suspend_rules).
    pub fn resume_rules(&mut self) {
        self.suspended = self.suspended.saturating_sub(1);
    }

    /// Returns true if rules are suspended in this transaction.
    #[must_use]
    pub fn rules_suspended(&self) -> bool {
        self.suspended > 0
    }

    /// Disables rules for a node. Returns false if it was already disabled.
    pub fn disable_node(&mut self, node: NodeId) -> bool {
        self.nodes.insert(node)
    }

    /// Re-enables rules for a node.
    pub fn enable_node(&mut self, node: NodeId) -> bool {
        self.nodes.remove(&node)
    }

    /// Returns true if rules may run for `node`.
    #[must_use]
    pub fn is_node_enabled(&self, node: NodeId) -> bool {
        !self.nodes.contains(&node)
    }

    /// Disables one rule. Returns false if it was already disabled.
    pub fn disable_rule(&mut self, rule: NodeId) -> bool {
        self.rules.insert(rule)
    }

    /// Re-enables one rule.
    pub fn enable_rule(&mut self, rule: NodeId) -> bool {
        self.rules.remove(&rule)
    }

    /// Returns true if the rule is not individually disabled.
    #[must_use]
    pub fn is_rule_enabled(&self, rule: NodeId) -> bool {
        !self.rules.contains(&rule)
    }

    /// Disables a rule type. Returns false if it was already disabled.
    pub fn disable_rule_type(&mut self, rule_type: QName) -> bool {
        self.rule_types.insert(rule_type)
    }

    /// Re-enables a rule type.
    pub fn enable_rule_type(&mut self, rule_type: &QName) -> bool {
        self.rule_types.remove(rule_type)
    }

    /// Returns true if the rule type is not disabled.
    #[must_use]
    pub fn is_rule_type_enabled(&self, rule_type: &QName) -> bool {
        !self.rule_types.contains(rule_type)
    }
}

// =============================================================================
// Scoped Suppression
// =============================================================================

/// Runs `f` with every rule suspended in this transaction.
///
/// # Errors
/// Returns whatever `f` returns.
pub fn without_rules<T>(
    txn: &mut RuleTransaction<'_>,
    f: impl FnOnce(&mut RuleTransaction<'_>) -> Result<T>,
) -> Result<T> {
    txn.ext_mut().gates.suspend_rules();
    let result = f(txn);
    txn.ext_mut().gates.resume_rules();
    result
}

/// Runs `f` with rules disabled for `node`.
///
/// # Errors
/// Returns whatever `f` returns.
pub fn without_rules_for<T>(
    txn: &mut RuleTransaction<'_>,
    node: NodeId,
    f: impl FnOnce(&mut RuleTransaction<'_>) -> Result<T>,
) -> Result<T> {
    let newly = txn.ext_mut().gates.disable_node(node);
    let result = f(txn);
    if newly {
        txn.ext_mut().gates.enable_node(node);
    }
    result
}

/// Runs `f` with one rule disabled.
///
/// # Errors
/// Returns whatever `f` returns.
pub fn without_rule<T>(
    txn: &mut RuleTransaction<'_>,
    rule: NodeId,
    f: impl FnOnce(&mut RuleTransaction<'_>) -> Result<T>,
) -> Result<T> {
    let newly = txn.ext_mut().gates.disable_rule(rule);
    let result = f(txn);
    if newly {
        txn.ext_mut().gates.enable_rule(rule);
    }
    result
}

/// Runs `f` with a rule type disabled.
///
/// # Errors
/// Returns whatever `f` returns.
pub fn without_rule_type<T>(
    txn: &mut RuleTransaction<'_>,
    rule_type: &QName,
    f: impl FnOnce(&mut RuleTransaction<'_>) -> Result<T>,
) -> Result<T> {
    let newly = txn.ext_mut().gates.disable_rule_type(rule_type.clone());
    let result = f(txn);
    if newly {
        txn.ext_mut().gates.enable_rule_type(rule_type);
    }
    result
}
