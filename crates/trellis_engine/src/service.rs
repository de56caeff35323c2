//! The rule service.
//!
//! [`RuleService`] is the facade over the rule store, inheritance, linking,
//! gates, and execution. Installed on a [`RuleRepository`], it observes
//! every store event: it notes writes to rule metadata, asks each trigger
//! for firings, and binds a pre-commit hook that drains queued executions
//! to a fixpoint.

use std::sync::Arc;

use tracing::{debug, trace, warn};
use trellis_foundation::{
    Error, ErrorCategory, ErrorContext, NodeId, QName, Result, SemanticLimit,
};
use trellis_storage::{
    AssocType, NodeType, Permission, PreCommitHook, StoreEvent, StoreObserver, aspects,
};

use crate::action::{ActionExecutor, ActionRegistry, AsyncDispatcher, AsyncRequest, QueuedDispatcher};
use crate::config::{EngineConfig, FailurePolicy};
use crate::context::{RuleContext, RuleRepository, RuleTransaction};
use crate::dedup;
use crate::gate::{self, GateController};
use crate::inherit::InheritanceResolver;
use crate::link;
use crate::pending::{DrainReport, ExecutionOutcome, PendingRuleExecution, SkipReason};
use crate::rule::{Rule, RuleType, RuleTypeRegistry};
use crate::rule_store::RuleStore;
use crate::trigger::{Firing, RuleTypeTrigger, builtin_triggers};

/// Key under which the drain hook is bound to a transaction.
pub const DRAIN_HOOK_KEY: &str = "trellis.rules.pending";

// =============================================================================
// Builder
// =============================================================================

/// Builds a [`RuleService`].
pub struct RuleServiceBuilder {
    config: EngineConfig,
    triggers: Vec<Arc<dyn RuleTypeTrigger>>,
    rule_types: Vec<RuleType>,
    executor: Option<Arc<dyn ActionExecutor>>,
    dispatcher: Option<Arc<dyn AsyncDispatcher>>,
}

impl RuleServiceBuilder {
    /// Sets the configuration.
    #[must_use]
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the action executor. Defaults to
    /// [`ActionRegistry::with_builtins`].
    #[must_use]
    pub fn with_executor(mut self, executor: Arc<dyn ActionExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Sets the async dispatcher. Defaults to a [`QueuedDispatcher`].
    #[must_use]
    pub fn with_dispatcher(mut self, dispatcher: Arc<dyn AsyncDispatcher>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    /// Adds a trigger; its rule type is registered on build.
    #[must_use]
    pub fn with_trigger(mut self, trigger: Arc<dyn RuleTypeTrigger>) -> Self {
        self.triggers.push(trigger);
        self
    }

    /// Registers a rule type with no trigger. Rules of this type only run
    /// through [`RuleService::trigger`].
    #[must_use]
    pub fn with_rule_type(mut self, rule_type: RuleType) -> Self {
        self.rule_types.push(rule_type);
        self
    }

    /// Builds the service.
    ///
    /// # Errors
    /// Returns a validation error if two rule types share a name.
    pub fn build(self) -> Result<RuleService> {
        let mut registry = RuleTypeRegistry::new();
        for trigger in &self.triggers {
            registry.register(trigger.rule_type())?;
        }
        for rule_type in self.rule_types {
            registry.register(rule_type)?;
        }

        Ok(RuleService {
            inner: Arc::new(Inner {
                gates: GateController::new(self.config.rules_enabled),
                rules: RuleStore::new(self.config.cache_enabled),
                config: self.config,
                rule_types: registry,
                triggers: self.triggers,
                executor: self
                    .executor
                    .unwrap_or_else(|| Arc::new(ActionRegistry::with_builtins())),
                dispatcher: self
                    .dispatcher
                    .unwrap_or_else(|| Arc::new(QueuedDispatcher::new())),
            }),
        })
    }
}

// =============================================================================
// Service
// =============================================================================

struct Inner {
    config: EngineConfig,
    gates: GateController,
    rules: RuleStore,
    rule_types: RuleTypeRegistry,
    triggers: Vec<Arc<dyn RuleTypeTrigger>>,
    executor: Arc<dyn ActionExecutor>,
    dispatcher: Arc<dyn AsyncDispatcher>,
}

/// Rule management and execution. Cheap to clone.
#[derive(Clone)]
pub struct RuleService {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for RuleService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleService")
            .field("config", &self.inner.config)
            .field("enabled", &self.inner.gates.is_enabled())
            .field("rule_types", &self.inner.rule_types.all())
            .finish_non_exhaustive()
    }
}

impl RuleService {
    /// Starts a builder with the built-in triggers.
    #[must_use]
    pub fn builder() -> RuleServiceBuilder {
        RuleServiceBuilder {
            config: EngineConfig::default(),
            triggers: builtin_triggers(),
            rule_types: Vec::new(),
            executor: None,
            dispatcher: None,
        }
    }

    /// Registers this service as an observer of `repo`.
    pub fn install(&self, repo: &RuleRepository) {
        repo.register_observer(Arc::new(self.clone()));
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Returns the rule store (for cache inspection).
    #[must_use]
    pub fn rule_store(&self) -> &RuleStore {
        &self.inner.rules
    }

    /// Returns every registered rule type.
    #[must_use]
    pub fn rule_types(&self) -> &[RuleType] {
        self.inner.rule_types.all()
    }

    /// Looks up a rule type.
    #[must_use]
    pub fn rule_type(&self, name: &QName) -> Option<&RuleType> {
        self.inner.rule_types.get(name)
    }

    fn resolver(&self, txn: &RuleTransaction<'_>) -> InheritanceResolver<'_> {
        InheritanceResolver::new(&self.inner.rules).with_cache_version(RuleStore::cache_version(txn))
    }

    // --- Gates ---

    /// Turns rules on for every transaction.
    pub fn enable_rules(&self) {
        self.inner.gates.enable();
    }

    /// Turns rules off for every transaction.
    pub fn disable_rules(&self) {
        self.inner.gates.disable();
    }

    /// Returns true if rules are globally enabled.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.inner.gates.is_enabled()
    }

    /// Returns true if rules may currently run for `node`.
    #[must_use]
    pub fn rules_enabled(&self, txn: &RuleTransaction<'_>, node: NodeId) -> bool {
        let local = &txn.ext().gates;
        self.is_enabled() && !local.rules_suspended() && local.is_node_enabled(node)
    }

    /// Returns true if `rule` may run against every node in `nodes`.
    #[must_use]
    pub fn is_rule_allowed(&self, txn: &RuleTransaction<'_>, nodes: &[NodeId], rule: &Rule) -> bool {
        self.inner
            .gates
            .is_rule_allowed(&txn.ext().gates, nodes, rule)
    }

    // --- Reads ---

    /// Returns the effective rules of `node`: inherited, then own.
    ///
    /// # Errors
    /// Returns an error if stored rule data is corrupt.
    pub fn rules(&self, txn: &RuleTransaction<'_>, node: NodeId) -> Result<Vec<Rule>> {
        self.rules_with(txn, node, true, None)
    }

    /// Returns the rules of `node`, optionally with inherited rules and
    /// filtered to one rule type.
    ///
    /// Missing or unreadable nodes resolve to nothing.
    ///
    /// # Errors
    /// Returns an error if stored rule data is corrupt.
    pub fn rules_with(
        &self,
        txn: &RuleTransaction<'_>,
        node: NodeId,
        include_inherited: bool,
        rule_type: Option<&QName>,
    ) -> Result<Vec<Rule>> {
        if !txn.store().exists(node) || !txn.has_permission(node, Permission::Read) {
            return Ok(Vec::new());
        }
        self.resolver(txn)
            .effective_rules(txn.store(), node, include_inherited, rule_type)
    }

    /// Reads one rule by its node id.
    ///
    /// # Errors
    /// Returns an error if the node is not a rule or its owner is unreadable.
    pub fn rule(&self, txn: &RuleTransaction<'_>, rule: NodeId) -> Result<Rule> {
        let owner = RuleStore::owning_node(txn.store(), rule)?;
        if !txn.has_permission(owner, Permission::Read) {
            return Err(Error::access_denied(owner, Permission::Read.name()));
        }
        RuleStore::read_rule(txn.store(), rule)
    }

    /// Returns the node that owns a saved rule.
    ///
    /// # Errors
    /// Returns an error if the rule is unsaved or not a rule.
    pub fn owning_node(&self, txn: &RuleTransaction<'_>, rule: &Rule) -> Result<NodeId> {
        let id = rule
            .id()
            .ok_or_else(|| Error::validation("rule has not been saved"))?;
        RuleStore::owning_node(txn.store(), id)
    }

    /// Returns true if `node` has any effective rules.
    ///
    /// # Errors
    /// Returns an error if stored rule data is corrupt.
    pub fn has_rules(&self, txn: &RuleTransaction<'_>, node: NodeId) -> Result<bool> {
        Ok(!self.rules(txn, node)?.is_empty())
    }

    /// Returns the number of rules `node` holds itself (linked rules count).
    ///
    /// # Errors
    /// Returns an error if stored rule data is corrupt.
    pub fn count_rules(&self, txn: &RuleTransaction<'_>, node: NodeId) -> Result<usize> {
        Ok(self.inner.rules.raw_rules(txn, node)?.len())
    }

    /// Returns true if `node` holds rules itself, owned or linked.
    ///
    /// # Errors
    /// Returns an error if stored rule data is corrupt.
    pub fn has_non_inherited_rules(&self, txn: &RuleTransaction<'_>, node: NodeId) -> Result<bool> {
        Ok(self.count_rules(txn, node)? > 0)
    }

    /// Returns true if `node` borrows another node's rules.
    ///
    /// # Errors
    /// Returns an error if the rule structure is corrupt.
    pub fn is_linked(&self, txn: &RuleTransaction<'_>, node: NodeId) -> Result<bool> {
        link::is_linked(txn.store(), node)
    }

    /// Returns the node whose rules `node` borrows.
    ///
    /// # Errors
    /// Returns an error if the rule structure is corrupt.
    pub fn linked_to(&self, txn: &RuleTransaction<'_>, node: NodeId) -> Result<Option<NodeId>> {
        link::linked_to(txn.store(), node)
    }

    /// Returns the nodes borrowing `node`'s rules.
    ///
    /// # Errors
    /// Returns an error if the rule structure is corrupt.
    pub fn linked_from(&self, txn: &RuleTransaction<'_>, node: NodeId) -> Result<Vec<NodeId>> {
        link::linked_from(txn.store(), node)
    }

    // --- Writes ---

    fn check_mutable(&self, txn: &RuleTransaction<'_>, node: NodeId) -> Result<()> {
        let node_type = txn.store().node_type(node)?;
        if node_type.forbids_rules() {
            return Err(Error::validation(format!(
                "{node_type:?} nodes cannot hold rules"
            )));
        }
        if !txn.has_permission(node, Permission::ChangePermissions) {
            return Err(Error::access_denied(
                node,
                Permission::ChangePermissions.name(),
            ));
        }
        if link::is_linked(txn.store(), node)? {
            return Err(Error::rules_linked(node));
        }
        Ok(())
    }

    fn validate(&self, rule: &Rule) -> Result<()> {
        if rule.action.is_none() {
            return Err(Error::validation("a rule must have an action"));
        }
        if rule.rule_types.is_empty() {
            return Err(Error::validation("a rule must have at least one rule type"));
        }
        if let Some(unknown) = rule
            .rule_types
            .iter()
            .find(|t| !self.inner.rule_types.contains(t))
        {
            return Err(Error::validation(format!("unknown rule type: {unknown}")));
        }
        Ok(())
    }

    /// Saves a rule on `node`, appending new rules to the end.
    ///
    /// # Errors
    /// Returns an error if the principal lacks `ChangePermissions`, the node
    /// is linked, or the rule is invalid.
    pub fn save_rule(&self, txn: &mut RuleTransaction<'_>, node: NodeId, rule: &mut Rule) -> Result<()> {
        self.save_rule_at(txn, node, rule, None)
    }

    /// Saves a rule on `node` and moves it to `index` if given.
    ///
    /// # Errors
    /// See [`save_rule`](Self::save_rule).
    pub fn save_rule_at(
        &self,
        txn: &mut RuleTransaction<'_>,
        node: NodeId,
        rule: &mut Rule,
        index: Option<usize>,
    ) -> Result<()> {
        self.check_mutable(txn, node)?;
        self.validate(rule)?;
        gate::without_rules(txn, |txn| {
            self.inner.rules.save_rule(txn, node, rule, index)
        })
    }

    /// Moves a saved rule to `index` among its siblings.
    ///
    /// # Errors
    /// Returns an error if the rule is unsaved or not owned by `node`.
    pub fn set_rule_position(
        &self,
        txn: &mut RuleTransaction<'_>,
        node: NodeId,
        rule: &Rule,
        index: usize,
    ) -> Result<()> {
        self.check_mutable(txn, node)?;
        let id = rule
            .id()
            .ok_or_else(|| Error::validation("rule has not been saved"))?;
        gate::without_rules(txn, |txn| {
            self.inner.rules.set_rule_position(txn, node, id, index)
        })
    }

    /// Removes one rule from `node`.
    ///
    /// # Errors
    /// Returns an error if the rule is unsaved or not owned by `node`.
    pub fn remove_rule(&self, txn: &mut RuleTransaction<'_>, node: NodeId, rule: &Rule) -> Result<()> {
        self.check_mutable(txn, node)?;
        let id = rule
            .id()
            .ok_or_else(|| Error::validation("rule has not been saved"))?;
        gate::without_rules(txn, |txn| self.inner.rules.remove_rule(txn, node, id))
    }

    /// Removes every rule `node` owns. Nodes linked to it are unlinked.
    ///
    /// # Errors
    /// Returns an error if the principal lacks `ChangePermissions` or the
    /// node is linked.
    pub fn remove_all_rules(&self, txn: &mut RuleTransaction<'_>, node: NodeId) -> Result<()> {
        self.check_mutable(txn, node)?;
        gate::without_rules(txn, |txn| self.inner.rules.remove_all_rules(txn, node))
    }

    /// Makes `from` borrow the rules of `to`.
    ///
    /// # Errors
    /// Returns an error if `from` already has or borrows rules, or `to` has
    /// none.
    pub fn link_rules(&self, txn: &mut RuleTransaction<'_>, from: NodeId, to: NodeId) -> Result<()> {
        self.check_mutable(txn, from)?;
        gate::without_rules(txn, |txn| link::link(txn, from, to))
    }

    /// Removes the rules `node` borrows.
    ///
    /// # Errors
    /// Returns an error if `node` is not linked.
    pub fn unlink_rules(&self, txn: &mut RuleTransaction<'_>, node: NodeId) -> Result<()> {
        if !txn.has_permission(node, Permission::ChangePermissions) {
            return Err(Error::access_denied(
                node,
                Permission::ChangePermissions.name(),
            ));
        }
        gate::without_rules(txn, |txn| link::unlink(txn, node))
    }

    // --- Execution ---

    /// Fires the rules of `rule_type` on `actionable` against
    /// `actioned_upon`.
    ///
    /// # Errors
    /// Returns an error if the rule type is unknown, or, for immediate
    /// firings, if a rule fails.
    pub fn trigger(
        &self,
        txn: &mut RuleTransaction<'_>,
        rule_type: &QName,
        actionable: NodeId,
        actioned_upon: NodeId,
        immediate: bool,
    ) -> Result<()> {
        if !self.inner.rule_types.contains(rule_type) {
            return Err(Error::validation(format!("unknown rule type: {rule_type}")));
        }
        let defer_to_end = self
            .inner
            .triggers
            .iter()
            .find(|t| t.rule_type().name == *rule_type)
            .is_some_and(|t| t.defer_to_end());
        self.fire(
            txn,
            rule_type,
            defer_to_end,
            Firing {
                actionable,
                actioned_upon,
                immediate,
            },
        )
    }

    fn fire(
        &self,
        txn: &mut RuleTransaction<'_>,
        rule_type: &QName,
        defer_to_end: bool,
        firing: Firing,
    ) -> Result<()> {
        if !self.is_enabled() {
            return Ok(());
        }
        let store = txn.store();
        if !store.exists(firing.actioned_upon)
            || store.has_aspect(firing.actioned_upon, &aspects::TEMPORARY)
        {
            return Ok(());
        }
        if !txn.ext().gates.is_rule_type_enabled(rule_type) {
            trace!(%rule_type, "rule type disabled");
            return Ok(());
        }

        let rules = self
            .resolver(txn)
            .effective_rules(store, firing.actionable, true, Some(rule_type))?;
        for rule in rules {
            if rule.disabled {
                continue;
            }
            if firing.immediate {
                if self.is_rule_allowed(txn, &[firing.actionable, firing.actioned_upon], &rule) {
                    self.run(txn, firing.actionable, firing.actioned_upon, &rule)?;
                }
            } else {
                self.enqueue(
                    txn,
                    PendingRuleExecution::new(firing.actionable, firing.actioned_upon, rule, defer_to_end),
                );
            }
        }
        Ok(())
    }

    /// Queues a rule for the pre-commit drain.
    ///
    /// Returns false if a gate blocks the rule or the same work is already
    /// queued.
    pub fn add_rule_pending_execution(
        &self,
        txn: &mut RuleTransaction<'_>,
        actionable: NodeId,
        actioned_upon: NodeId,
        rule: &Rule,
        defer_to_end: bool,
    ) -> bool {
        self.enqueue(
            txn,
            PendingRuleExecution::new(actionable, actioned_upon, rule.clone(), defer_to_end),
        )
    }

    fn enqueue(&self, txn: &mut RuleTransaction<'_>, entry: PendingRuleExecution) -> bool {
        if !self.is_rule_allowed(txn, &[entry.actionable, entry.actioned_upon], &entry.rule) {
            trace!(rule = %entry.rule.title, node = %entry.actioned_upon, "rule blocked by gate");
            return false;
        }
        trace!(rule = %entry.rule.title, node = %entry.actioned_upon, "rule queued");
        let added = txn.ext_mut().pending.push(entry);
        if added && !txn.ext().is_draining() && !txn.is_bound(DRAIN_HOOK_KEY) {
            txn.bind_pre_commit(DRAIN_HOOK_KEY, Arc::new(self.clone()));
        }
        added
    }

    /// Runs a saved rule against `actioned_upon` now, honoring gates and
    /// at-most-once execution.
    ///
    /// # Errors
    /// Returns an error if the rule is unsaved, the node is missing, or the
    /// action fails.
    pub fn execute_rule(
        &self,
        txn: &mut RuleTransaction<'_>,
        rule: &Rule,
        actioned_upon: NodeId,
    ) -> Result<ExecutionOutcome> {
        let actionable = self.owning_node(txn, rule)?;
        txn.store().node(actioned_upon)?;
        if !self.is_rule_allowed(txn, &[actionable, actioned_upon], rule) {
            return Ok(ExecutionOutcome::Skipped(SkipReason::Blocked));
        }
        self.run(txn, actionable, actioned_upon, rule)
    }

    /// Drains the pending queue to a fixpoint.
    ///
    /// Each pass takes a snapshot of the queue and clears it; entries queued
    /// while a pass runs are picked up by the next. Deferred entries run
    /// once the queue is empty, and if they queue more work the drain
    /// starts over. Reentrant calls return immediately.
    ///
    /// # Errors
    /// Returns `LimitExceeded` when a kill switch trips, or the first
    /// propagated rule failure.
    pub fn execute_pending_rules(&self, txn: &mut RuleTransaction<'_>) -> Result<DrainReport> {
        let mut report = DrainReport::default();
        if txn.ext().is_draining() {
            return Ok(report);
        }
        txn.ext_mut().draining = true;
        let result = self.drain(txn, &mut report);
        txn.ext_mut().draining = false;
        result?;
        if report.passes > 0 {
            debug!(
                passes = report.passes,
                executed = report.executed,
                dispatched = report.dispatched,
                skipped = report.skipped,
                failed = report.failed,
                "drained pending rules"
            );
        }
        Ok(report)
    }

    fn drain(&self, txn: &mut RuleTransaction<'_>, report: &mut DrainReport) -> Result<()> {
        let limit = self.inner.config.max_drain_passes;
        loop {
            let mut deferred = Vec::new();
            loop {
                let batch = txn.ext_mut().pending.take();
                if batch.is_empty() {
                    break;
                }
                report.passes += 1;
                if report.passes > limit {
                    return Err(Error::limit_exceeded(SemanticLimit::MaxDrainPasses { limit }));
                }
                trace!(pass = report.passes, entries = batch.len(), "drain pass");
                for entry in batch {
                    if entry.defer_to_end {
                        deferred.push(entry);
                    } else {
                        report.record(self.execute_entry(txn, &entry)?);
                    }
                }
            }

            if deferred.is_empty() {
                return Ok(());
            }
            for entry in &deferred {
                report.record(self.execute_entry(txn, entry)?);
            }
            if txn.ext().pending.is_empty() {
                return Ok(());
            }
        }
    }

    fn execute_entry(
        &self,
        txn: &mut RuleTransaction<'_>,
        entry: &PendingRuleExecution,
    ) -> Result<ExecutionOutcome> {
        if !txn.store().exists(entry.actioned_upon) {
            trace!(node = %entry.actioned_upon, "actioned-upon node is gone");
            return Ok(ExecutionOutcome::Skipped(SkipReason::NodeMissing));
        }
        if !self.is_rule_allowed(txn, &[entry.actionable, entry.actioned_upon], &entry.rule) {
            return Ok(ExecutionOutcome::Skipped(SkipReason::Blocked));
        }
        self.run(txn, entry.actionable, entry.actioned_upon, &entry.rule)
    }

    /// Runs a rule under the configured failure policy.
    fn run(
        &self,
        txn: &mut RuleTransaction<'_>,
        actionable: NodeId,
        actioned_upon: NodeId,
        rule: &Rule,
    ) -> Result<ExecutionOutcome> {
        match self.inner.config.failure_policy {
            FailurePolicy::Propagate => self.run_once(txn, actionable, actioned_upon, rule),
            FailurePolicy::Isolate => {
                let savepoint = txn.savepoint();
                let pending = txn.ext().pending.clone();
                let executed = txn.ext().executed.clone();
                match self.run_once(txn, actionable, actioned_upon, rule) {
                    Err(err) if err.category() == ErrorCategory::Execution => {
                        txn.restore(savepoint);
                        let ext = txn.ext_mut();
                        ext.pending = pending;
                        ext.executed = executed;
                        warn!(
                            rule = %rule.title,
                            node = %actioned_upon,
                            error = %err,
                            "rule failed, changes undone"
                        );
                        Ok(ExecutionOutcome::Failed)
                    }
                    other => other,
                }
            }
        }
    }

    fn run_once(
        &self,
        txn: &mut RuleTransaction<'_>,
        actionable: NodeId,
        actioned_upon: NodeId,
        rule: &Rule,
    ) -> Result<ExecutionOutcome> {
        let rule_id = rule
            .id()
            .ok_or_else(|| Error::validation("rule has not been saved"))?;
        if rule.disabled {
            return Ok(ExecutionOutcome::Skipped(SkipReason::RuleDisabled));
        }
        if !dedup::can_execute(txn, actioned_upon, rule_id) {
            trace!(rule = %rule.title, node = %actioned_upon, "rule already executed");
            return Ok(ExecutionOutcome::Skipped(SkipReason::AlreadyExecuted));
        }

        let action = rule
            .action
            .as_ref()
            .ok_or_else(|| Error::validation(format!("rule {rule_id} has no action")))?;
        let in_context = |err: Error| {
            if err.context.is_some() {
                err
            } else {
                err.with_context(
                    ErrorContext::new()
                        .with_rule(rule.title.clone())
                        .with_node(actioned_upon),
                )
            }
        };

        if !self
            .inner
            .executor
            .evaluate(txn, action, actioned_upon)
            .map_err(in_context)?
        {
            return Ok(ExecutionOutcome::Skipped(SkipReason::ConditionFalse));
        }

        let limit = self.inner.config.max_executions;
        if txn.ext().executed.len() >= limit as usize {
            return Err(Error::limit_exceeded(SemanticLimit::MaxExecutions {
                limit,
                context: Some(format!("rule {} on {actioned_upon}", rule.title)),
            }));
        }
        txn.ext_mut()
            .executed
            .record(actionable, actioned_upon, rule_id);

        if rule.execute_asynchronously {
            debug!(rule = %rule.title, node = %actioned_upon, "dispatching rule");
            self.inner.dispatcher.dispatch(AsyncRequest {
                rule: rule_id,
                action: action.clone(),
                target: actioned_upon,
            });
            return Ok(ExecutionOutcome::Dispatched);
        }

        debug!(rule = %rule.title, node = %actioned_upon, "executing rule");
        self.inner
            .executor
            .execute(txn, action, actioned_upon)
            .map_err(in_context)?;
        Ok(ExecutionOutcome::Executed)
    }

    fn touches_rules(event: &StoreEvent) -> bool {
        match event {
            StoreEvent::NodeCreated { node_type, .. }
            | StoreEvent::NodeUpdated { node_type, .. }
            | StoreEvent::BeforeNodeDeleted { node_type, .. } => node_type.is_rule_metadata(),
            StoreEvent::AspectAdded { aspect, .. } => *aspect == aspects::RULES,
            StoreEvent::ChildAssocCreated { assoc, .. } | StoreEvent::ChildAssocDeleted { assoc, .. } => {
                matches!(
                    assoc.assoc_type,
                    AssocType::RuleFolder | AssocType::Rule | AssocType::Action
                )
            }
            StoreEvent::ChildrenReordered { parent_type, .. } => *parent_type == NodeType::RuleFolder,
        }
    }
}

impl StoreObserver<RuleContext> for RuleService {
    fn on_event(&self, txn: &mut RuleTransaction<'_>, event: &StoreEvent) -> Result<()> {
        if Self::touches_rules(event) {
            txn.ext_mut().rules_changed = true;
        }

        for trigger in &self.inner.triggers {
            let firings = trigger.firings(txn, event);
            if firings.is_empty() {
                continue;
            }
            let rule_type = trigger.rule_type().name;
            trace!(event = event.kind(), %rule_type, firings = firings.len(), "trigger fired");
            for firing in firings {
                self.fire(txn, &rule_type, trigger.defer_to_end(), firing)?;
            }
        }
        Ok(())
    }
}

impl PreCommitHook<RuleContext> for RuleService {
    fn before_commit(&self, txn: &mut RuleTransaction<'_>) -> Result<()> {
        self.execute_pending_rules(txn).map(|_| ())
    }
}
