//! Actions, conditions, and the executor seam.
//!
//! A rule carries one [`CompositeAction`]: a list of conditions gating a
//! list of [`Action`]s. The engine never interprets actions itself; it hands
//! them to an [`ActionExecutor`]. [`ActionRegistry`] is the stock executor,
//! dispatching by action name to registered handlers.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::trace;
use trellis_foundation::{Error, ErrorKind, NodeId, Result, Value};

use crate::builtin;
use crate::context::RuleTransaction;

/// Named action or condition parameters.
pub type Parameters = BTreeMap<String, Value>;

// =============================================================================
// Definitions
// =============================================================================

/// A named predicate over the actioned-upon node.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActionCondition {
    /// Registered condition name.
    pub name: String,
    /// Condition parameters.
    #[serde(default)]
    pub parameters: Parameters,
    /// Negate the result.
    #[serde(default)]
    pub invert: bool,
}

impl ActionCondition {
    /// Creates a condition with no parameters.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: Parameters::new(),
            invert: false,
        }
    }

    /// Adds a parameter.
    #[must_use]
    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    /// Negates the condition.
    #[must_use]
    pub fn inverted(mut self) -> Self {
        self.invert = !self.invert;
        self
    }
}

/// A single named action.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// Registered action name.
    pub name: String,
    /// Action parameters.
    #[serde(default)]
    pub parameters: Parameters,
    /// Conditions that must hold for this action alone.
    #[serde(default)]
    pub conditions: Vec<ActionCondition>,
}

impl Action {
    /// Creates an action with no parameters.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: Parameters::new(),
            conditions: Vec::new(),
        }
    }

    /// Adds a parameter.
    #[must_use]
    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    /// Adds a condition.
    #[must_use]
    pub fn with_condition(mut self, condition: ActionCondition) -> Self {
        self.conditions.push(condition);
        self
    }
}

/// The action attached to a rule.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CompositeAction {
    /// Conditions gating the whole composite.
    #[serde(default)]
    pub conditions: Vec<ActionCondition>,
    /// Actions run in order.
    #[serde(default)]
    pub actions: Vec<Action>,
}

impl CompositeAction {
    /// Creates an empty composite.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a condition.
    #[must_use]
    pub fn with_condition(mut self, condition: ActionCondition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Adds an action.
    #[must_use]
    pub fn with_action(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }

    /// Encodes the composite for storage on an action node.
    ///
    /// # Errors
    /// Returns a codec error if encoding fails.
    pub fn encode(&self) -> Result<Vec<u8>> {
        rmp_serde::to_vec_named(self).map_err(|e| Error::new(ErrorKind::Codec(e.to_string())))
    }

    /// Decodes a composite stored by [`encode`](Self::encode).
    ///
    /// # Errors
    /// Returns a codec error if the bytes are not a valid composite.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        rmp_serde::from_slice(bytes).map_err(|e| Error::new(ErrorKind::Codec(e.to_string())))
    }
}

// =============================================================================
// Executor Seams
// =============================================================================

/// Evaluates and runs rule actions.
pub trait ActionExecutor: Send + Sync {
    /// Returns whether the composite's own conditions hold for `target`.
    ///
    /// # Errors
    /// Returns an error if a condition is unknown or fails.
    fn evaluate(
        &self,
        txn: &RuleTransaction<'_>,
        action: &CompositeAction,
        target: NodeId,
    ) -> Result<bool>;

    /// Runs the composite's actions against `target`.
    ///
    /// # Errors
    /// Returns an error if an action is unknown or fails.
    fn execute(
        &self,
        txn: &mut RuleTransaction<'_>,
        action: &CompositeAction,
        target: NodeId,
    ) -> Result<()>;
}

/// A request to run a rule's action outside the current transaction.
#[derive(Clone, Debug, PartialEq)]
pub struct AsyncRequest {
    /// The rule node.
    pub rule: NodeId,
    /// The rule's action.
    pub action: CompositeAction,
    /// The actioned-upon node.
    pub target: NodeId,
}

/// Receives asynchronous rule executions.
pub trait AsyncDispatcher: Send + Sync {
    /// Queues a request. Must not block on the current transaction.
    fn dispatch(&self, request: AsyncRequest);
}

/// An [`AsyncDispatcher`] that keeps requests in memory until taken.
#[derive(Debug, Default)]
pub struct QueuedDispatcher {
    queue: Mutex<Vec<AsyncRequest>>,
}

impl QueuedDispatcher {
    /// Creates an empty dispatcher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes and returns every queued request.
    pub fn take(&self) -> Vec<AsyncRequest> {
        std::mem::take(&mut *self.queue.lock())
    }

    /// Returns the number of queued requests.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    /// Returns true if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }
}

impl AsyncDispatcher for QueuedDispatcher {
    fn dispatch(&self, request: AsyncRequest) {
        self.queue.lock().push(request);
    }
}

// =============================================================================
// Registry
// =============================================================================

/// Implementation of one named action.
pub trait ActionHandler: Send + Sync {
    /// Applies the action to `target`.
    ///
    /// # Errors
    /// Returns an error if the parameters are invalid or the store rejects
    /// the change.
    fn execute(
        &self,
        txn: &mut RuleTransaction<'_>,
        parameters: &Parameters,
        target: NodeId,
    ) -> Result<()>;
}

/// Implementation of one named condition.
pub trait ConditionEvaluator: Send + Sync {
    /// Tests `target`.
    ///
    /// # Errors
    /// Returns an error if the parameters are invalid.
    fn evaluate(
        &self,
        txn: &RuleTransaction<'_>,
        parameters: &Parameters,
        target: NodeId,
    ) -> Result<bool>;
}

/// An [`ActionExecutor`] dispatching by name to registered handlers.
#[derive(Clone, Default)]
pub struct ActionRegistry {
    actions: HashMap<String, Arc<dyn ActionHandler>>,
    conditions: HashMap<String, Arc<dyn ConditionEvaluator>>,
}

impl ActionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with the built-in actions and conditions.
    #[must_use]
    pub fn with_builtins() -> Self {
        Self::new()
            .with_action(builtin::ADD_FEATURES, builtin::AddFeatures)
            .with_action(builtin::REMOVE_FEATURES, builtin::RemoveFeatures)
            .with_action(builtin::SET_PROPERTY, builtin::SetProperty)
            .with_action(builtin::COPY, builtin::CopyTo)
            .with_condition(builtin::NO_CONDITION, builtin::NoCondition)
            .with_condition(builtin::HAS_ASPECT, builtin::HasAspect)
    }

    /// Registers an action handler, replacing any previous one.
    #[must_use]
    pub fn with_action(
        mut self,
        name: impl Into<String>,
        handler: impl ActionHandler + 'static,
    ) -> Self {
        self.actions.insert(name.into(), Arc::new(handler));
        self
    }

    /// Registers a condition evaluator, replacing any previous one.
    #[must_use]
    pub fn with_condition(
        mut self,
        name: impl Into<String>,
        evaluator: impl ConditionEvaluator + 'static,
    ) -> Self {
        self.conditions.insert(name.into(), Arc::new(evaluator));
        self
    }

    /// Returns true if an action is registered under `name`.
    #[must_use]
    pub fn has_action(&self, name: &str) -> bool {
        self.actions.contains_key(name)
    }

    /// Returns true if a condition is registered under `name`.
    #[must_use]
    pub fn has_condition(&self, name: &str) -> bool {
        self.conditions.contains_key(name)
    }

    fn all_hold(
        &self,
        txn: &RuleTransaction<'_>,
        conditions: &[ActionCondition],
        target: NodeId,
    ) -> Result<bool> {
        for condition in conditions {
            let evaluator = self.conditions.get(&condition.name).ok_or_else(|| {
                Error::validation(format!("unknown condition: {}", condition.name))
            })?;
            let holds = evaluator.evaluate(txn, &condition.parameters, target)? != condition.invert;
            if !holds {
                trace!(condition = %condition.name, %target, "condition failed");
                return Ok(false);
            }
        }
        Ok(true)
    }
}

impl std::fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut actions: Vec<_> = self.actions.keys().collect();
        actions.sort();
        let mut conditions: Vec<_> = self.conditions.keys().collect();
        conditions.sort();
        f.debug_struct("ActionRegistry")
            .field("actions", &actions)
            .field("conditions", &conditions)
            .finish()
    }
}

impl ActionExecutor for ActionRegistry {
    fn evaluate(
        &self,
        txn: &RuleTransaction<'_>,
        action: &CompositeAction,
        target: NodeId,
    ) -> Result<bool> {
        self.all_hold(txn, &action.conditions, target)
    }

    fn execute(
        &self,
        txn: &mut RuleTransaction<'_>,
        action: &CompositeAction,
        target: NodeId,
    ) -> Result<()> {
        for step in &action.actions {
            let handler = self
                .actions
                .get(&step.name)
                .cloned()
                .ok_or_else(|| Error::action_failed(&step.name, "no such action"))?;
            if !self.all_hold(txn, &step.conditions, target)? {
                continue;
            }
            trace!(action = %step.name, %target, "executing action");
            handler.execute(txn, &step.parameters, target)?;
        }
        Ok(())
    }
}
