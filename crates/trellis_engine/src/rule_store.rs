//! Persistence of rules as nodes.
//!
//! Layout under a node that owns rules:
//!
//! ```text
//! node (aspect rule:rules)
//!  └─[RuleFolder]─ rule folder
//!       ├─[Rule]─ rule node (title, types, flags)
//!       │    └─[Action]─ action node (act:definition)
//!       └─[Rule]─ ...
//! ```
//!
//! Raw rule lists are cached per node. The cache is shared across
//! transactions and holds committed state only: entries are tagged with
//! the commit version they were read at, a newer version empties the
//! cache, and a transaction that has written rule metadata bypasses it.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, trace};
use trellis_foundation::{Error, NodeId, QName, Result, Value};
use trellis_storage::{AssocType, NodeType, Permission, Store, aspects, props};

use crate::action::CompositeAction;
use crate::context::RuleTransaction;
use crate::link;
use crate::rule::Rule;

const RULE_FOLDER_NAME: &str = "rules";
const ACTION_NODE_NAME: &str = "action";

#[derive(Debug, Default)]
struct RuleCache {
    version: u64,
    entries: HashMap<NodeId, Arc<Vec<Rule>>>,
}

/// Reads and writes rules, with a raw-rule cache.
#[derive(Debug)]
pub struct RuleStore {
    cache: RwLock<RuleCache>,
    cache_enabled: bool,
}

impl RuleStore {
    /// Creates a rule store.
    #[must_use]
    pub fn new(cache_enabled: bool) -> Self {
        Self {
            cache: RwLock::new(RuleCache::default()),
            cache_enabled,
        }
    }

    /// Drops every cached rule list.
    pub fn clear_cache(&self) {
        let mut cache = self.cache.write();
        if !cache.entries.is_empty() {
            trace!(entries = cache.entries.len(), "clearing rule cache");
            cache.entries.clear();
        }
    }

    /// Returns the number of cached rule lists.
    #[must_use]
    pub fn cached_len(&self) -> usize {
        self.cache.read().entries.len()
    }

    /// Returns the commit version `txn` may use the cache at.
    ///
    /// `None` once the transaction has written rule metadata: its working
    /// copy no longer matches any committed version.
    #[must_use]
    pub fn cache_version(txn: &RuleTransaction<'_>) -> Option<u64> {
        if txn.ext().has_rule_changes() {
            None
        } else {
            Some(txn.base_version())
        }
    }

    // --- Reads ---

    /// Returns the node's own rules in folder order, as seen by the
    /// transaction's principal.
    ///
    /// Missing nodes, node types that cannot hold rules, nodes without
    /// the rules aspect, and unreadable nodes all yield an empty list.
    ///
    /// # Errors
    /// Returns an error if stored rule data is corrupt.
    pub fn raw_rules(&self, txn: &RuleTransaction<'_>, node: NodeId) -> Result<Arc<Vec<Rule>>> {
        if !txn.has_permission(node, Permission::Read) {
            trace!(%node, principal = txn.principal(), "rules hidden from principal");
            return Ok(Arc::default());
        }
        self.load(txn.store(), node, Self::cache_version(txn))
    }

    /// Like [`raw_rules`](Self::raw_rules) without the permission check.
    ///
    /// `version` is the commit version `store` was taken from, or `None`
    /// for a working copy with uncommitted rule changes, which is never
    /// cached.
    ///
    /// # Errors
    /// Returns an error if stored rule data is corrupt.
    pub fn load(&self, store: &Store, node: NodeId, version: Option<u64>) -> Result<Arc<Vec<Rule>>> {
        let Ok(record) = store.node(node) else {
            return Ok(Arc::default());
        };
        if record.node_type.forbids_rules() || !record.has_aspect(&aspects::RULES) {
            return Ok(Arc::default());
        }

        let version = version.filter(|_| self.cache_enabled);
        if let Some(version) = version {
            let cache = self.cache.read();
            if let Some(rules) = cache.entries.get(&node).filter(|_| cache.version == version) {
                return Ok(Arc::clone(rules));
            }
        }

        let rules = Arc::new(Self::read_all(store, node)?);
        if let Some(version) = version {
            let mut cache = self.cache.write();
            if cache.version < version {
                trace!(from = cache.version, to = version, "rule cache advanced");
                cache.entries.clear();
                cache.version = version;
            }
            if cache.version == version {
                cache.entries.insert(node, Arc::clone(&rules));
            }
        }
        Ok(rules)
    }

    fn read_all(store: &Store, node: NodeId) -> Result<Vec<Rule>> {
        let Some(folder) = link::rule_folder(store, node)? else {
            return Ok(Vec::new());
        };
        store
            .child_assocs_of_type(folder.child, AssocType::Rule)
            .into_iter()
            .map(|assoc| Self::read_rule(store, assoc.child))
            .collect()
    }

    /// Reads one rule node.
    ///
    /// # Errors
    /// Returns an error if the node is missing, is not a rule, or has no
    /// readable action.
    pub fn read_rule(store: &Store, rule_node: NodeId) -> Result<Rule> {
        let record = store.node(rule_node)?;
        if record.node_type != NodeType::Rule {
            return Err(Error::validation(format!("{rule_node} is not a rule")));
        }

        let text = |name: &QName| {
            record
                .property(name)
                .and_then(Value::as_text)
                .unwrap_or_default()
                .to_owned()
        };
        let flag = |name: &QName| record.property(name).and_then(Value::as_bool).unwrap_or(false);

        let action_node = store
            .child_assocs_of_type(rule_node, AssocType::Action)
            .first()
            .map(|assoc| assoc.child)
            .ok_or_else(|| Error::validation(format!("rule {rule_node} has no action")))?;
        let bytes = store
            .property(action_node, &props::ACTION_DEFINITION)
            .and_then(Value::as_bytes)
            .ok_or_else(|| Error::validation(format!("action {action_node} has no definition")))?;

        let mut rule = Rule::new(text(&props::TITLE))
            .with_description(text(&props::DESCRIPTION))
            .applied_to_children(flag(&props::APPLY_TO_CHILDREN))
            .asynchronous(flag(&props::EXECUTE_ASYNC))
            .disabled(flag(&props::RULE_DISABLED))
            .with_action(CompositeAction::decode(bytes)?)
            .with_id(rule_node);
        if let Some(types) = record.property(&props::RULE_TYPE).and_then(Value::as_names) {
            for rule_type in types {
                rule = rule.with_rule_type(rule_type);
            }
        }
        Ok(rule)
    }

    /// Returns the node whose rule folder holds `rule_node`.
    ///
    /// # Errors
    /// Returns an error if `rule_node` is not a rule in a rule folder.
    pub fn owning_node(store: &Store, rule_node: NodeId) -> Result<NodeId> {
        if store.node_type(rule_node)? != NodeType::Rule {
            return Err(Error::validation(format!("{rule_node} is not a rule")));
        }
        store
            .primary_parent(rule_node)
            .and_then(|folder| store.primary_parent(folder.child))
            .map(|owner| owner.parent)
            .ok_or_else(|| Error::internal(format!("rule {rule_node} has no owner")))
    }

    // --- Writes ---

    /// Creates or updates a rule on `node`, optionally moving it to `index`.
    ///
    /// The caller checks permissions and linking. On success the rule's id
    /// is set.
    ///
    /// # Errors
    /// Returns an error if the rule belongs to another node or the store
    /// rejects a change.
    pub fn save_rule(
        &self,
        txn: &mut RuleTransaction<'_>,
        node: NodeId,
        rule: &mut Rule,
        index: Option<usize>,
    ) -> Result<()> {
        let action = rule
            .action
            .as_ref()
            .ok_or_else(|| Error::validation("a rule must have an action"))?
            .encode()?;

        let folder = match link::rule_folder(txn.store(), node)? {
            Some(assoc) => assoc.child,
            None => {
                let folder =
                    txn.create_node(node, AssocType::RuleFolder, RULE_FOLDER_NAME, NodeType::RuleFolder)?;
                txn.add_aspect(node, aspects::RULES)?;
                folder
            }
        };

        let rule_node = match rule.id() {
            Some(id) => {
                let in_folder = txn
                    .store()
                    .primary_parent(id)
                    .is_some_and(|assoc| assoc.parent == folder);
                if !in_folder {
                    return Err(Error::validation(format!("rule {id} does not belong to {node}")));
                }
                id
            }
            None => {
                let number = txn
                    .store()
                    .property(folder, &props::NEXT_RULE_NUMBER)
                    .and_then(Value::as_int)
                    .unwrap_or(0);
                txn.set_property(folder, props::NEXT_RULE_NUMBER, Value::Int(number + 1))?;
                txn.create_node(folder, AssocType::Rule, format!("rule-{number}"), NodeType::Rule)?
            }
        };

        txn.set_properties(
            rule_node,
            [
                (props::TITLE, Value::Text(rule.title.clone())),
                (props::DESCRIPTION, Value::Text(rule.description.clone())),
                (props::RULE_TYPE, Value::Names(rule.rule_types.clone())),
                (props::APPLY_TO_CHILDREN, Value::Bool(rule.applies_to_children)),
                (props::EXECUTE_ASYNC, Value::Bool(rule.execute_asynchronously)),
                (props::RULE_DISABLED, Value::Bool(rule.disabled)),
            ],
        )?;

        let existing = txn
            .store()
            .child_assocs_of_type(rule_node, AssocType::Action)
            .first()
            .map(|assoc| assoc.child);
        let action_node = match existing {
            Some(id) => id,
            None => txn.create_node(rule_node, AssocType::Action, ACTION_NODE_NAME, NodeType::Action)?,
        };
        txn.set_property(action_node, props::ACTION_DEFINITION, Value::Bytes(action))?;

        if let Some(index) = index {
            txn.set_child_position(folder, rule_node, index)?;
        }

        rule.set_id(rule_node);
        debug!(%node, rule = %rule_node, title = %rule.title, "saved rule");
        Ok(())
    }

    /// Moves a saved rule to `index` within its folder.
    ///
    /// # Errors
    /// Returns an error if the rule does not belong to `node`.
    pub fn set_rule_position(
        &self,
        txn: &mut RuleTransaction<'_>,
        node: NodeId,
        rule: NodeId,
        index: usize,
    ) -> Result<()> {
        let folder = self.folder_of(txn.store(), node, rule)?;
        txn.set_child_position(folder, rule, index)
    }

    /// Deletes one rule. The folder and aspect go with the last rule.
    ///
    /// # Errors
    /// Returns an error if the rule does not belong to `node`.
    pub fn remove_rule(&self, txn: &mut RuleTransaction<'_>, node: NodeId, rule: NodeId) -> Result<()> {
        let folder = self.folder_of(txn.store(), node, rule)?;
        txn.delete_node(rule)?;
        if txn.store().child_assocs_of_type(folder, AssocType::Rule).is_empty() {
            self.remove_folder(txn, node, folder)?;
        }
        debug!(%node, %rule, "removed rule");
        Ok(())
    }

    /// Deletes every rule owned by `node`.
    ///
    /// # Errors
    /// Returns an error if the store rejects a change.
    pub fn remove_all_rules(&self, txn: &mut RuleTransaction<'_>, node: NodeId) -> Result<()> {
        if let Some(assoc) = link::rule_folder(txn.store(), node)? {
            self.remove_folder(txn, node, assoc.child)?;
            debug!(%node, "removed all rules");
        }
        Ok(())
    }

    fn remove_folder(&self, txn: &mut RuleTransaction<'_>, node: NodeId, folder: NodeId) -> Result<()> {
        for borrower in link::linked_from(txn.store(), node)? {
            link::unlink(txn, borrower)?;
        }
        txn.delete_node(folder)?;
        txn.remove_aspect(node, &aspects::RULES)?;
        txn.ext_mut().rules_changed = true;
        Ok(())
    }

    fn folder_of(&self, store: &Store, node: NodeId, rule: NodeId) -> Result<NodeId> {
        let folder = link::rule_folder(store, node)?
            .map(|assoc| assoc.child)
            .ok_or_else(|| Error::validation(format!("{node} has no rules")))?;
        match store.primary_parent(rule) {
            Some(assoc) if assoc.parent == folder => Ok(folder),
            _ => Err(Error::validation(format!("rule {rule} does not belong to {node}"))),
        }
    }
}

impl Default for RuleStore {
    fn default() -> Self {
        Self::new(true)
    }
}
