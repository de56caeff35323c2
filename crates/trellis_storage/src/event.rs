//! Structural change events dispatched by a transaction.

use trellis_foundation::{NodeId, QName};

use crate::model::{ChildAssoc, NodeType};

/// A structural change, dispatched synchronously to every
/// [`StoreObserver`](crate::StoreObserver) right after the store applies it
/// (or, for deletion, right before).
#[derive(Clone, Debug, PartialEq)]
pub enum StoreEvent {
    /// A node was created. Followed by `ChildAssocCreated` for its primary edge.
    NodeCreated {
        /// The new node.
        node: NodeId,
        /// Its type.
        node_type: NodeType,
    },
    /// A node's properties changed.
    NodeUpdated {
        /// The updated node.
        node: NodeId,
        /// Its type.
        node_type: NodeType,
        /// The changed properties.
        properties: Vec<QName>,
    },
    /// An aspect was applied.
    AspectAdded {
        /// The node.
        node: NodeId,
        /// Its type.
        node_type: NodeType,
        /// The aspect.
        aspect: QName,
    },
    /// A parent/child edge was created (primary or secondary).
    ChildAssocCreated {
        /// The edge.
        assoc: ChildAssoc,
        /// Type of the child.
        child_type: NodeType,
    },
    /// A parent/child edge was removed without deleting the child.
    ChildAssocDeleted {
        /// The edge.
        assoc: ChildAssoc,
        /// Type of the child.
        child_type: NodeType,
    },
    /// A parent's child edges were reordered.
    ChildrenReordered {
        /// The parent.
        parent: NodeId,
        /// Type of the parent.
        parent_type: NodeType,
    },
    /// A node is about to be deleted; it still exists while observers run.
    BeforeNodeDeleted {
        /// The node.
        node: NodeId,
        /// Its type.
        node_type: NodeType,
    },
}

impl StoreEvent {
    /// Returns a short name for logging.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NodeCreated { .. } => "node-created",
            Self::NodeUpdated { .. } => "node-updated",
            Self::AspectAdded { .. } => "aspect-added",
            Self::ChildAssocCreated { .. } => "child-assoc-created",
            Self::ChildAssocDeleted { .. } => "child-assoc-deleted",
            Self::ChildrenReordered { .. } => "children-reordered",
            Self::BeforeNodeDeleted { .. } => "before-node-deleted",
        }
    }
}
