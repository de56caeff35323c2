//! Test action handlers and fixtures

#![allow(dead_code)]

use std::sync::Arc;

use parking_lot::Mutex;
use trellis_engine::{
    Action, ActionHandler, ActionRegistry, CompositeAction, EngineConfig, Parameters, Rule,
    RuleRepository, RuleService, RuleTransaction,
};
use trellis_foundation::{Error, NodeId, QName, Result, Value};
use trellis_storage::{AssocType, NodeType, Store, props};

pub const RECORD: &str = "record";
pub const EXPLODE: &str = "explode";
pub const SCORCH: &str = "scorch";
pub const SPAWN: &str = "spawn";
pub const LABEL: &str = "label";

/// Records `(label, target)` for every execution.
#[derive(Clone, Default)]
pub struct Recorder {
    pub calls: Arc<Mutex<Vec<(String, NodeId)>>>,
}

impl Recorder {
    pub fn calls(&self) -> Vec<(String, NodeId)> {
        self.calls.lock().clone()
    }

    pub fn labels(&self) -> Vec<String> {
        self.calls.lock().iter().map(|(label, _)| label.clone()).collect()
    }

    pub fn count(&self) -> usize {
        self.calls.lock().len()
    }
}

impl ActionHandler for Recorder {
    fn execute(&self, _: &mut RuleTransaction<'_>, parameters: &Parameters, target: NodeId) -> Result<()> {
        let label = match parameters.get(LABEL) {
            Some(Value::Text(label)) => label.clone(),
            _ => String::new(),
        };
        self.calls.lock().push((label, target));
        Ok(())
    }
}

/// Always fails.
pub struct Explode;

impl ActionHandler for Explode {
    fn execute(&self, _: &mut RuleTransaction<'_>, _: &Parameters, _: NodeId) -> Result<()> {
        Err(Error::action_failed(EXPLODE, "boom"))
    }
}

/// Changes the target, then fails.
pub struct Scorch;

impl ActionHandler for Scorch {
    fn execute(&self, txn: &mut RuleTransaction<'_>, _: &Parameters, target: NodeId) -> Result<()> {
        txn.set_property(target, props::TITLE, Value::from("scorched"))?;
        Err(Error::action_failed(SCORCH, "burnt"))
    }
}

/// Creates a sibling of the target, which arrives in the same folder.
pub struct Spawn;

impl ActionHandler for Spawn {
    fn execute(&self, txn: &mut RuleTransaction<'_>, _: &Parameters, target: NodeId) -> Result<()> {
        let parent = txn
            .store()
            .primary_parent(target)
            .ok_or_else(|| Error::action_failed(SPAWN, "target has no parent"))?
            .parent;
        txn.create_node(parent, AssocType::Contains, "spawn", NodeType::Content)?;
        Ok(())
    }
}

pub struct Fixture {
    pub repo: RuleRepository,
    pub service: RuleService,
    pub recorder: Recorder,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let recorder = Recorder::default();
        let registry = ActionRegistry::with_builtins()
            .with_action(RECORD, recorder.clone())
            .with_action(EXPLODE, Explode)
            .with_action(SCORCH, Scorch)
            .with_action(SPAWN, Spawn);
        let repo = RuleRepository::new(Store::new());
        let service = RuleService::builder()
            .with_config(config)
            .with_executor(Arc::new(registry))
            .build()
            .unwrap();
        service.install(&repo);
        Self {
            repo,
            service,
            recorder,
        }
    }

    pub fn root(&self) -> NodeId {
        self.repo.root()
    }

    pub fn save(&self, txn: &mut RuleTransaction<'_>, node: NodeId, mut rule: Rule) -> Rule {
        self.service.save_rule(txn, node, &mut rule).unwrap();
        rule
    }
}

pub fn folder(txn: &mut RuleTransaction<'_>, parent: NodeId, name: &str) -> NodeId {
    txn.create_node(parent, AssocType::Contains, name, NodeType::Folder)
        .unwrap()
}

pub fn content(txn: &mut RuleTransaction<'_>, parent: NodeId, name: &str) -> NodeId {
    txn.create_node(parent, AssocType::Contains, name, NodeType::Content)
        .unwrap()
}

/// A rule of `rule_type` running a single action.
pub fn rule(title: &str, rule_type: QName, action: Action) -> Rule {
    Rule::new(title)
        .with_rule_type(rule_type)
        .with_action(CompositeAction::new().with_action(action))
}

pub fn record(label: &str) -> Action {
    Action::new(RECORD).with_parameter(LABEL, label)
}
