//! Rule type triggers.
//!
//! A trigger maps store events to rule firings for one rule type. The
//! service calls every registered trigger for every event; a trigger
//! answers with zero or more [`Firing`]s.

use trellis_foundation::NodeId;
use trellis_storage::{AssocType, NodeType, StoreEvent};

use crate::context::RuleTransaction;
use crate::rule::{RuleType, rule_types};

/// One request to run a rule type's rules.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Firing {
    /// The node whose effective rules are consulted.
    pub actionable: NodeId,
    /// The node the actions run against.
    pub actioned_upon: NodeId,
    /// Run now instead of at commit.
    pub immediate: bool,
}

impl Firing {
    /// A firing queued for the pre-commit drain.
    #[must_use]
    pub fn queued(actionable: NodeId, actioned_upon: NodeId) -> Self {
        Self {
            actionable,
            actioned_upon,
            immediate: false,
        }
    }

    /// A firing executed synchronously.
    #[must_use]
    pub fn immediate(actionable: NodeId, actioned_upon: NodeId) -> Self {
        Self {
            actionable,
            actioned_upon,
            immediate: true,
        }
    }
}

/// Maps store events to firings for one rule type.
pub trait RuleTypeTrigger: Send + Sync {
    /// The rule type this trigger fires.
    fn rule_type(&self) -> RuleType;

    /// Queued firings run after all other queued work in the same drain.
    fn defer_to_end(&self) -> bool {
        false
    }

    /// Returns the firings caused by `event`.
    fn firings(&self, txn: &RuleTransaction<'_>, event: &StoreEvent) -> Vec<Firing>;
}

fn is_content(node_type: NodeType) -> bool {
    matches!(node_type, NodeType::Folder | NodeType::Content)
}

/// Fires `inbound` rules of a folder when a node is added to it.
#[derive(Clone, Copy, Debug, Default)]
pub struct InboundTrigger;

impl RuleTypeTrigger for InboundTrigger {
    fn rule_type(&self) -> RuleType {
        RuleType::new(rule_types::INBOUND, "Items are created or enter this folder")
    }

    fn firings(&self, _: &RuleTransaction<'_>, event: &StoreEvent) -> Vec<Firing> {
        match event {
            StoreEvent::ChildAssocCreated { assoc, child_type }
                if assoc.assoc_type == AssocType::Contains && is_content(*child_type) =>
            {
                vec![Firing::queued(assoc.parent, assoc.child)]
            }
            _ => Vec::new(),
        }
    }
}

/// Fires `update` rules of a node's parents when an existing node changes.
///
/// Nodes created in the current transaction are ignored.
#[derive(Clone, Copy, Debug, Default)]
pub struct UpdateTrigger;

impl RuleTypeTrigger for UpdateTrigger {
    fn rule_type(&self) -> RuleType {
        RuleType::new(rule_types::UPDATE, "Items are updated")
    }

    fn defer_to_end(&self) -> bool {
        true
    }

    fn firings(&self, txn: &RuleTransaction<'_>, event: &StoreEvent) -> Vec<Firing> {
        let StoreEvent::NodeUpdated {
            node, node_type, ..
        } = event
        else {
            return Vec::new();
        };
        if !is_content(*node_type) || txn.is_new(*node) {
            return Vec::new();
        }
        txn.store()
            .parent_assocs(*node)
            .into_iter()
            .filter(|assoc| assoc.assoc_type == AssocType::Contains)
            .map(|assoc| Firing::queued(assoc.parent, *node))
            .collect()
    }
}

/// Fires `outbound` rules of a folder when a node leaves it.
///
/// Runs immediately, while the departing node is still in place.
#[derive(Clone, Copy, Debug, Default)]
pub struct OutboundTrigger;

impl RuleTypeTrigger for OutboundTrigger {
    fn rule_type(&self) -> RuleType {
        RuleType::new(rule_types::OUTBOUND, "Items are deleted or leave this folder")
    }

    fn firings(&self, txn: &RuleTransaction<'_>, event: &StoreEvent) -> Vec<Firing> {
        match event {
            StoreEvent::BeforeNodeDeleted { node, node_type } if is_content(*node_type) => txn
                .store()
                .parent_assocs(*node)
                .into_iter()
                .filter(|assoc| assoc.assoc_type == AssocType::Contains)
                .map(|assoc| Firing::immediate(assoc.parent, *node))
                .collect(),
            StoreEvent::ChildAssocDeleted { assoc, child_type }
                if assoc.assoc_type == AssocType::Contains && is_content(*child_type) =>
            {
                vec![Firing::immediate(assoc.parent, assoc.child)]
            }
            _ => Vec::new(),
        }
    }
}

/// The built-in triggers: inbound, update, outbound.
#[must_use]
pub fn builtin_triggers() -> Vec<std::sync::Arc<dyn RuleTypeTrigger>> {
    vec![
        std::sync::Arc::new(InboundTrigger),
        std::sync::Arc::new(UpdateTrigger),
        std::sync::Arc::new(OutboundTrigger),
    ]
}
