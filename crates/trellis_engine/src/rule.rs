//! Rules and rule types.
//!
//! A [`Rule`] is the in-memory form of a rule node: metadata plus one
//! [`CompositeAction`]. Rule identity is the rule node's id, assigned on
//! first save. Two unsaved rules are never equal.

use std::collections::HashMap;

use trellis_foundation::{Error, NodeId, QName, Result};

use crate::action::CompositeAction;

/// Names of the built-in rule types.
pub mod rule_types {
    use trellis_foundation::QName;

    /// Fires when a node is added to a folder.
    pub const INBOUND: QName = QName::from_static("inbound");
    /// Fires when an existing node's properties change.
    pub const UPDATE: QName = QName::from_static("update");
    /// Fires when a node leaves a folder.
    pub const OUTBOUND: QName = QName::from_static("outbound");
}

// =============================================================================
// Rule
// =============================================================================

/// A rule attached to a node.
#[derive(Clone, Debug)]
pub struct Rule {
    id: Option<NodeId>,
    /// Short title.
    pub title: String,
    /// Longer description.
    pub description: String,
    /// Rule types this rule fires for. Treated as a set.
    pub rule_types: Vec<QName>,
    /// Whether descendants of the owning node inherit this rule.
    pub applies_to_children: bool,
    /// Run the action outside the triggering transaction.
    pub execute_asynchronously: bool,
    /// Disabled rules are stored and resolved but never run.
    pub disabled: bool,
    /// The action. Required for saving.
    pub action: Option<CompositeAction>,
}

impl Rule {
    /// Creates an unsaved rule with the given title.
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: None,
            title: title.into(),
            description: String::new(),
            rule_types: Vec::new(),
            applies_to_children: false,
            execute_asynchronously: false,
            disabled: false,
            action: None,
        }
    }

    /// Returns the rule node's id, if the rule has been saved.
    #[must_use]
    pub fn id(&self) -> Option<NodeId> {
        self.id
    }

    pub(crate) fn set_id(&mut self, id: NodeId) {
        self.id = Some(id);
    }

    pub(crate) fn with_id(mut self, id: NodeId) -> Self {
        self.id = Some(id);
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Adds a rule type. Duplicates are ignored.
    #[must_use]
    pub fn with_rule_type(mut self, rule_type: QName) -> Self {
        if !self.rule_types.contains(&rule_type) {
            self.rule_types.push(rule_type);
        }
        self
    }

    /// Sets whether descendants inherit the rule.
    #[must_use]
    pub fn applied_to_children(mut self, applies: bool) -> Self {
        self.applies_to_children = applies;
        self
    }

    /// Sets asynchronous execution.
    #[must_use]
    pub fn asynchronous(mut self, execute_asynchronously: bool) -> Self {
        self.execute_asynchronously = execute_asynchronously;
        self
    }

    /// Sets the disabled flag.
    #[must_use]
    pub fn disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    /// Sets the action.
    #[must_use]
    pub fn with_action(mut self, action: CompositeAction) -> Self {
        self.action = Some(action);
        self
    }

    /// Returns true if the rule fires for `rule_type`.
    #[must_use]
    pub fn has_rule_type(&self, rule_type: &QName) -> bool {
        self.rule_types.contains(rule_type)
    }
}

impl PartialEq for Rule {
    fn eq(&self, other: &Self) -> bool {
        match (self.id, other.id) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}

// =============================================================================
// Rule Types
// =============================================================================

/// A registered rule type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RuleType {
    /// Unique name.
    pub name: QName,
    /// Human-readable label.
    pub display_label: String,
}

impl RuleType {
    /// Creates a rule type.
    #[must_use]
    pub fn new(name: QName, display_label: impl Into<String>) -> Self {
        Self {
            name,
            display_label: display_label.into(),
        }
    }
}

/// Registered rule types, in registration order.
#[derive(Clone, Debug, Default)]
pub struct RuleTypeRegistry {
    types: Vec<RuleType>,
    index: HashMap<QName, usize>,
}

impl RuleTypeRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a rule type.
    ///
    /// # Errors
    /// Returns a validation error if the name is already registered.
    pub fn register(&mut self, rule_type: RuleType) -> Result<()> {
        if self.index.contains_key(&rule_type.name) {
            return Err(Error::validation(format!(
                "rule type already registered: {}",
                rule_type.name
            )));
        }
        self.index.insert(rule_type.name.clone(), self.types.len());
        self.types.push(rule_type);
        Ok(())
    }

    /// Looks up a rule type by name.
    #[must_use]
    pub fn get(&self, name: &QName) -> Option<&RuleType> {
        self.index.get(name).map(|&i| &self.types[i])
    }

    /// Returns true if `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &QName) -> bool {
        self.index.contains_key(name)
    }

    /// Returns all registered types.
    #[must_use]
    pub fn all(&self) -> &[RuleType] {
        &self.types
    }

    /// Returns the number of registered types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Returns true if no types are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
