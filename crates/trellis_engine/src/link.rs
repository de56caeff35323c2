//! Rule folder lookup and rule-set linking.
//!
//! A node's rules live in a rule folder, reached through a `RuleFolder`
//! edge. The owning node holds the folder by its primary edge; a node that
//! borrows another node's rules holds the same folder by a secondary edge
//! and is said to be *linked*.

use tracing::debug;
use trellis_foundation::{Error, ErrorKind, NodeId, Result};
use trellis_storage::{AssocType, ChildAssoc, Store, aspects};

use crate::context::RuleTransaction;

/// Returns the node's rule folder edge, if any.
///
/// # Errors
/// Returns `MultipleRuleFolders` if the node has more than one.
pub fn rule_folder(store: &Store, node: NodeId) -> Result<Option<ChildAssoc>> {
    let mut folders = store.child_assocs_of_type(node, AssocType::RuleFolder);
    match folders.len() {
        0 => Ok(None),
        1 => Ok(folders.pop()),
        _ => Err(Error::new(ErrorKind::MultipleRuleFolders(node))),
    }
}

/// Returns true if the node's rules are borrowed from another node.
///
/// # Errors
/// Returns `MultipleRuleFolders` if the structure is corrupt.
pub fn is_linked(store: &Store, node: NodeId) -> Result<bool> {
    if !store.has_aspect(node, &aspects::RULES) {
        return Ok(false);
    }
    Ok(rule_folder(store, node)?.is_some_and(|assoc| !assoc.primary))
}

/// Returns the node whose rules `node` borrows.
///
/// # Errors
/// Returns `MultipleRuleFolders` if the structure is corrupt.
pub fn linked_to(store: &Store, node: NodeId) -> Result<Option<NodeId>> {
    if !is_linked(store, node)? {
        return Ok(None);
    }
    let Some(assoc) = rule_folder(store, node)? else {
        return Ok(None);
    };
    Ok(store.primary_parent(assoc.child).map(|owner| owner.parent))
}

/// Returns every node borrowing `node`'s rules.
///
/// # Errors
/// Returns `MultipleRuleFolders` if the structure is corrupt.
pub fn linked_from(store: &Store, node: NodeId) -> Result<Vec<NodeId>> {
    let Some(assoc) = rule_folder(store, node)? else {
        return Ok(Vec::new());
    };
    if !assoc.primary {
        return Ok(Vec::new());
    }
    Ok(store
        .parent_assocs(assoc.child)
        .into_iter()
        .filter(|a| !a.primary && a.assoc_type == AssocType::RuleFolder)
        .map(|a| a.parent)
        .collect())
}

/// Makes `from` borrow the rules owned by `to`.
///
/// # Errors
/// Returns `RulesLinked` if `from` is already linked, or a validation error
/// if `from` has its own rules or `to` has none.
pub fn link(txn: &mut RuleTransaction<'_>, from: NodeId, to: NodeId) -> Result<()> {
    let store = txn.store();
    store.node(from)?;
    store.node(to)?;
    if from == to {
        return Err(Error::validation("cannot link a node to itself"));
    }
    if is_linked(store, from)? {
        return Err(Error::rules_linked(from));
    }
    if rule_folder(store, from)?.is_some() {
        return Err(Error::validation(format!("{from} already has rules")));
    }
    let folder = match rule_folder(store, to)? {
        Some(assoc) if assoc.primary => assoc.child,
        Some(_) => return Err(Error::rules_linked(to)),
        None => return Err(Error::validation(format!("{to} has no rules to link to"))),
    };

    txn.add_child(from, folder, AssocType::RuleFolder)?;
    txn.add_aspect(from, aspects::RULES)?;
    debug!(%from, %to, "linked rules");
    Ok(())
}

/// Removes the borrowed rule set from `node`.
///
/// # Errors
/// Returns a validation error if `node` is not linked.
pub fn unlink(txn: &mut RuleTransaction<'_>, node: NodeId) -> Result<()> {
    let assoc = match rule_folder(txn.store(), node)? {
        Some(assoc) if !assoc.primary => assoc,
        _ => return Err(Error::validation(format!("{node} is not linked"))),
    };
    txn.remove_child_assoc(&assoc)?;
    txn.remove_aspect(node, &aspects::RULES)?;
    debug!(%node, "unlinked rules");
    Ok(())
}
