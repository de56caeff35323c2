//! Effective rule resolution.
//!
//! A node's effective rules are the rules it inherits from its ancestors
//! followed by its own rules. Inheritance follows every `Contains` parent,
//! primary or secondary, so the hierarchy may be a DAG and may contain
//! cycles; each walk keeps a visited set and stops at revisits.
//!
//! For each parent, the parent's own inherited rules come first, then the
//! parent's rules marked applies-to-children. A node carrying
//! `rule:ignoreInheritedRules` contributes nothing inherited, though its
//! own inheritable rules still reach its children.

use std::collections::HashSet;

use trellis_foundation::{NodeId, QName, Result};
use trellis_storage::{AssocType, Store, aspects};

use crate::rule::Rule;
use crate::rule_store::RuleStore;

/// Resolves effective rules against a [`RuleStore`].
#[derive(Clone, Copy, Debug)]
pub struct InheritanceResolver<'a> {
    rules: &'a RuleStore,
    cache_version: Option<u64>,
}

impl<'a> InheritanceResolver<'a> {
    /// Creates a resolver over `rules` that reads around the cache.
    #[must_use]
    pub fn new(rules: &'a RuleStore) -> Self {
        Self {
            rules,
            cache_version: None,
        }
    }

    /// Reads through the cache at `version`, the commit version the
    /// resolved store was taken from. See [`RuleStore::cache_version`].
    #[must_use]
    pub fn with_cache_version(mut self, version: Option<u64>) -> Self {
        self.cache_version = version;
        self
    }

    /// Returns the effective rules of `node`.
    ///
    /// Inherited rules come first, then own rules; each rule appears once.
    /// With a `rule_type`, only rules of that type are returned. Node types
    /// that cannot hold rules always resolve to nothing.
    ///
    /// # Errors
    /// Returns an error if stored rule data is corrupt.
    pub fn effective_rules(
        &self,
        store: &Store,
        node: NodeId,
        include_inherited: bool,
        rule_type: Option<&QName>,
    ) -> Result<Vec<Rule>> {
        let Ok(node_type) = store.node_type(node) else {
            return Ok(Vec::new());
        };
        if node_type.forbids_rules() {
            return Ok(Vec::new());
        }

        let mut result = if include_inherited {
            self.inherited_rules(store, node)?
        } else {
            Vec::new()
        };
        for rule in self.rules.load(store, node, self.cache_version)?.iter() {
            push_unique(&mut result, rule);
        }

        if let Some(rule_type) = rule_type {
            result.retain(|rule| rule.has_rule_type(rule_type));
        }
        Ok(result)
    }

    /// Returns only the rules `node` inherits from its ancestors.
    ///
    /// # Errors
    /// Returns an error if stored rule data is corrupt.
    pub fn inherited_rules(&self, store: &Store, node: NodeId) -> Result<Vec<Rule>> {
        let mut acc = Vec::new();
        let mut visited = HashSet::new();
        self.collect(store, node, &mut visited, &mut acc)?;
        Ok(acc)
    }

    fn collect(
        &self,
        store: &Store,
        node: NodeId,
        visited: &mut HashSet<NodeId>,
        acc: &mut Vec<Rule>,
    ) -> Result<()> {
        if store.has_aspect(node, &aspects::IGNORE_INHERITED_RULES) {
            return Ok(());
        }
        if !visited.insert(node) {
            return Ok(());
        }

        for assoc in store.parent_assocs(node) {
            if assoc.assoc_type != AssocType::Contains {
                continue;
            }
            self.collect(store, assoc.parent, visited, acc)?;
            for rule in self.rules.load(store, assoc.parent, self.cache_version)?.iter() {
                if rule.applies_to_children {
                    push_unique(acc, rule);
                }
            }
        }
        Ok(())
    }
}

fn push_unique(acc: &mut Vec<Rule>, rule: &Rule) {
    if !acc.iter().any(|r| r == rule) {
        acc.push(rule.clone());
    }
}
