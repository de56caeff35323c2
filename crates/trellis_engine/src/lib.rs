//! Rule storage, inheritance, gating, and execution for Trellis.
//!
//! This crate provides:
//! - [`RuleService`] - The facade: rule CRUD, linking, triggering, draining
//! - [`RuleStore`] - Rules persisted as nodes, with a raw-rule cache
//! - [`InheritanceResolver`] - Effective rules over a DAG with cycles
//! - [`GateController`] / [`LocalGates`] - Global and per-transaction switches
//! - [`PendingQueue`] - Deferred executions drained before commit
//! - [`ExecutedRules`] - At-most-once execution with copy provenance
//! - [`RuleTypeTrigger`] - Store events to rule firings
//! - [`ActionRegistry`] - The stock action executor

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod action;
pub mod builtin;
pub mod config;
pub mod context;
pub mod dedup;
pub mod gate;
pub mod inherit;
pub mod link;
pub mod pending;
pub mod rule;
pub mod rule_store;
pub mod service;
pub mod trigger;

pub use action::{
    Action, ActionCondition, ActionExecutor, ActionHandler, ActionRegistry, AsyncDispatcher,
    AsyncRequest, CompositeAction, ConditionEvaluator, Parameters, QueuedDispatcher,
};
pub use config::{EngineConfig, FailurePolicy};
pub use context::{RuleContext, RuleRepository, RuleTransaction};
pub use dedup::{ExecutedRule, ExecutedRules, can_execute};
pub use gate::{
    GateController, LocalGates, without_rule, without_rule_type, without_rules, without_rules_for,
};
pub use inherit::InheritanceResolver;
pub use pending::{DrainReport, ExecutionOutcome, PendingQueue, PendingRuleExecution, SkipReason};
pub use rule::{Rule, RuleType, RuleTypeRegistry, rule_types};
pub use rule_store::RuleStore;
pub use service::{DRAIN_HOOK_KEY, RuleService, RuleServiceBuilder};
pub use trigger::{Firing, InboundTrigger, OutboundTrigger, RuleTypeTrigger, UpdateTrigger};
