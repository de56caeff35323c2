//! Node model: types, associations, records, and well-known names.

use im::{HashMap, HashSet};
use trellis_foundation::{NodeId, QName, Value};

// =============================================================================
// Node Type
// =============================================================================

/// Structural type of a node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeType {
    /// A container of content and other folders.
    Folder,
    /// A document.
    Content,
    /// Hidden container holding a node's persisted rules.
    RuleFolder,
    /// A persisted rule.
    Rule,
    /// A persisted action beneath a rule.
    Action,
    /// Internal system container.
    System,
}

impl NodeType {
    /// Returns true if nodes of this type may never carry rules.
    #[must_use]
    pub fn forbids_rules(self) -> bool {
        matches!(
            self,
            Self::RuleFolder | Self::Rule | Self::Action | Self::System
        )
    }

    /// Returns true for the internal types that hold rule metadata.
    #[must_use]
    pub fn is_rule_metadata(self) -> bool {
        matches!(self, Self::RuleFolder | Self::Rule | Self::Action)
    }
}

// =============================================================================
// Associations
// =============================================================================

/// Kind of parent/child edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AssocType {
    /// Ordinary containment.
    Contains,
    /// Node to its rule folder.
    RuleFolder,
    /// Rule folder to a rule.
    Rule,
    /// Rule to its action.
    Action,
}

/// A parent/child edge.
///
/// Every non-root node has exactly one primary parent edge; any number of
/// secondary edges may point at it as well.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChildAssoc {
    /// Parent end.
    pub parent: NodeId,
    /// Child end.
    pub child: NodeId,
    /// Edge kind.
    pub assoc_type: AssocType,
    /// Whether this is the child's primary parent edge.
    pub primary: bool,
}

impl ChildAssoc {
    /// Creates a primary edge.
    #[must_use]
    pub fn primary(parent: NodeId, child: NodeId, assoc_type: AssocType) -> Self {
        Self {
            parent,
            child,
            assoc_type,
            primary: true,
        }
    }

    /// Creates a secondary edge.
    #[must_use]
    pub fn secondary(parent: NodeId, child: NodeId, assoc_type: AssocType) -> Self {
        Self {
            parent,
            child,
            assoc_type,
            primary: false,
        }
    }
}

// =============================================================================
// Node Record
// =============================================================================

/// Stored state of a single node.
#[derive(Clone, Debug)]
pub struct NodeRecord {
    /// Node identity.
    pub id: NodeId,
    /// Structural type.
    pub node_type: NodeType,
    /// Name within its primary parent.
    pub name: String,
    /// Applied aspects (capability markers).
    pub aspects: HashSet<QName>,
    /// Property values.
    pub properties: HashMap<QName, Value>,
}

impl NodeRecord {
    /// Creates a record with no aspects or properties.
    #[must_use]
    pub fn new(id: NodeId, node_type: NodeType, name: impl Into<String>) -> Self {
        Self {
            id,
            node_type,
            name: name.into(),
            aspects: HashSet::new(),
            properties: HashMap::new(),
        }
    }

    /// Returns true if the aspect is applied.
    #[must_use]
    pub fn has_aspect(&self, aspect: &QName) -> bool {
        self.aspects.contains(aspect)
    }

    /// Gets a property value.
    #[must_use]
    pub fn property(&self, name: &QName) -> Option<&Value> {
        self.properties.get(name)
    }
}

// =============================================================================
// Well-Known Names
// =============================================================================

/// Well-known aspect names.
pub mod aspects {
    use trellis_foundation::QName;

    /// The node carries rules (owned or linked).
    pub const RULES: QName = QName::from_static("rule:rules");
    /// The node does not inherit rules from its parents.
    pub const IGNORE_INHERITED_RULES: QName = QName::from_static("rule:ignoreInheritedRules");
    /// Temporary node; changes to it never trigger rules.
    pub const TEMPORARY: QName = QName::from_static("sys:temporary");
    /// The node is a copy of another node.
    pub const COPIED_FROM: QName = QName::from_static("cm:copiedfrom");
}

/// Well-known property names.
pub mod props {
    use trellis_foundation::QName;

    /// Human-readable title.
    pub const TITLE: QName = QName::from_static("cm:title");
    /// Human-readable description.
    pub const DESCRIPTION: QName = QName::from_static("cm:description");
    /// Source node of a copy.
    pub const ORIGINAL: QName = QName::from_static("cm:original");
    /// Rule type names of a rule.
    pub const RULE_TYPE: QName = QName::from_static("rule:ruleType");
    /// Whether a rule is inherited by descendants.
    pub const APPLY_TO_CHILDREN: QName = QName::from_static("rule:applyToChildren");
    /// Whether a rule's action runs asynchronously.
    pub const EXECUTE_ASYNC: QName = QName::from_static("rule:executeAsynchronously");
    /// Whether a rule is disabled.
    pub const RULE_DISABLED: QName = QName::from_static("rule:disabled");
    /// Encoded action definition.
    pub const ACTION_DEFINITION: QName = QName::from_static("act:definition");
    /// Number to give the next rule created in a rule folder.
    pub const NEXT_RULE_NUMBER: QName = QName::from_static("rule:nextRuleNumber");
}
