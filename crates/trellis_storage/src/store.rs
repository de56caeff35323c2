//! Node store with bidirectional parent/child indices.
//!
//! The `Store` is plain data: it never dispatches events or checks
//! permissions. [`Transaction`](crate::Transaction) wraps it with both.
//! All maps are persistent, so cloning a store (e.g. to open a working copy)
//! is O(1) and shares structure with the original.

use im::{HashMap, Vector};
use trellis_foundation::{Error, NodeId, QName, Result, Value};

use crate::allocator::NodeAllocator;
use crate::model::{AssocType, ChildAssoc, NodeRecord, NodeType};

/// Stores nodes and the parent/child edges between them.
///
/// Maintains bidirectional indices for efficient traversal:
/// - Forward: parent -> ordered child edges
/// - Reverse: child -> parent edges
#[derive(Clone, Debug)]
pub struct Store {
    allocator: NodeAllocator,
    nodes: HashMap<NodeId, NodeRecord>,
    /// Forward index, in sibling order.
    children: HashMap<NodeId, Vector<ChildAssoc>>,
    /// Reverse index.
    parents: HashMap<NodeId, Vector<ChildAssoc>>,
    root: NodeId,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    /// Creates a store containing only a root folder.
    #[must_use]
    pub fn new() -> Self {
        let mut allocator = NodeAllocator::new();
        let root = allocator.allocate();
        let mut nodes = HashMap::new();
        nodes.insert(root, NodeRecord::new(root, NodeType::Folder, "root"));

        Self {
            allocator,
            nodes,
            children: HashMap::new(),
            parents: HashMap::new(),
            root,
        }
    }

    /// Returns the root node.
    #[must_use]
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Returns the number of live nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.allocator.len()
    }

    /// Returns true if only the root exists.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.allocator.len() <= 1
    }

    // --- Reads ---

    /// Checks if a node exists.
    #[must_use]
    pub fn exists(&self, id: NodeId) -> bool {
        self.allocator.exists(id)
    }

    /// Gets a node record.
    ///
    /// # Errors
    ///
    /// Returns an error if the node does not exist or the id is stale.
    pub fn node(&self, id: NodeId) -> Result<&NodeRecord> {
        self.allocator.validate(id)?;
        self.nodes.get(&id).ok_or_else(|| Error::node_not_found(id))
    }

    /// Gets a node's type.
    ///
    /// # Errors
    ///
    /// Returns an error if the node does not exist.
    pub fn node_type(&self, id: NodeId) -> Result<NodeType> {
        self.node(id).map(|n| n.node_type)
    }

    /// Returns true if the node exists and has the aspect.
    #[must_use]
    pub fn has_aspect(&self, id: NodeId, aspect: &QName) -> bool {
        self.node(id).is_ok_and(|n| n.has_aspect(aspect))
    }

    /// Gets a property value, if the node exists and has it.
    #[must_use]
    pub fn property(&self, id: NodeId, name: &QName) -> Option<&Value> {
        self.node(id).ok().and_then(|n| n.property(name))
    }

    /// Returns every edge whose child is `id`.
    #[must_use]
    pub fn parent_assocs(&self, id: NodeId) -> Vec<ChildAssoc> {
        self.parents
            .get(&id)
            .map(|assocs| assocs.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Returns every edge whose parent is `id`, in sibling order.
    #[must_use]
    pub fn child_assocs(&self, id: NodeId) -> Vec<ChildAssoc> {
        self.children
            .get(&id)
            .map(|assocs| assocs.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Returns the child edges of one kind, in sibling order.
    #[must_use]
    pub fn child_assocs_of_type(&self, id: NodeId, assoc_type: AssocType) -> Vec<ChildAssoc> {
        self.children
            .get(&id)
            .map(|assocs| {
                assocs
                    .iter()
                    .filter(|a| a.assoc_type == assoc_type)
                    .copied()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Returns the primary parent edge (none for the root).
    #[must_use]
    pub fn primary_parent(&self, id: NodeId) -> Option<ChildAssoc> {
        self.parents
            .get(&id)
            .and_then(|assocs| assocs.iter().find(|a| a.primary).copied())
    }

    /// Finds a contained child by name.
    #[must_use]
    pub fn child_named(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        self.children.get(&parent).and_then(|assocs| {
            assocs
                .iter()
                .filter(|a| a.assoc_type == AssocType::Contains)
                .map(|a| a.child)
                .find(|&child| self.nodes.get(&child).is_some_and(|n| n.name == name))
        })
    }

    /// Returns the node and every descendant reachable through primary
    /// edges, parents before children.
    #[must_use]
    pub fn primary_subtree(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if !self.exists(current) {
                continue;
            }
            out.push(current);
            if let Some(assocs) = self.children.get(&current) {
                // Reverse so siblings come out in order
                for assoc in assocs.iter().rev().filter(|a| a.primary) {
                    stack.push(assoc.child);
                }
            }
        }
        out
    }

    // --- Mutations ---

    /// Creates a node beneath `parent` with a primary edge.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent does not exist.
    pub fn create_node(
        &mut self,
        parent: NodeId,
        assoc_type: AssocType,
        name: impl Into<String>,
        node_type: NodeType,
    ) -> Result<ChildAssoc> {
        self.allocator.validate(parent)?;

        let id = self.allocator.allocate();
        self.nodes.insert(id, NodeRecord::new(id, node_type, name));

        let assoc = ChildAssoc::primary(parent, id, assoc_type);
        self.insert_edge(assoc);
        Ok(assoc)
    }

    /// Adds a secondary edge from `parent` to an existing `child`.
    ///
    /// Adding an existing edge is idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error if either node does not exist.
    pub fn add_child(
        &mut self,
        parent: NodeId,
        child: NodeId,
        assoc_type: AssocType,
    ) -> Result<ChildAssoc> {
        self.allocator.validate(parent)?;
        self.allocator.validate(child)?;

        if let Some(existing) = self
            .parent_assocs(child)
            .into_iter()
            .find(|a| a.parent == parent && a.assoc_type == assoc_type)
        {
            return Ok(existing);
        }

        let assoc = ChildAssoc::secondary(parent, child, assoc_type);
        self.insert_edge(assoc);
        Ok(assoc)
    }

    /// Removes a secondary edge. Returns false if the edge did not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the edge is primary; primary edges go away only
    /// when the child is moved or deleted.
    pub fn remove_child_assoc(&mut self, assoc: &ChildAssoc) -> Result<bool> {
        if assoc.primary {
            return Err(Error::validation(format!(
                "cannot remove primary association {:?} -> {:?}",
                assoc.parent, assoc.child
            )));
        }
        Ok(self.remove_edge(assoc))
    }

    /// Sets a property, returning the previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the node does not exist.
    pub fn set_property(&mut self, id: NodeId, name: QName, value: Value) -> Result<Option<Value>> {
        self.allocator.validate(id)?;
        let record = self
            .nodes
            .get_mut(&id)
            .ok_or_else(|| Error::node_not_found(id))?;
        Ok(record.properties.insert(name, value))
    }

    /// Removes a property, returning the previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the node does not exist.
    pub fn remove_property(&mut self, id: NodeId, name: &QName) -> Result<Option<Value>> {
        self.allocator.validate(id)?;
        let record = self
            .nodes
            .get_mut(&id)
            .ok_or_else(|| Error::node_not_found(id))?;
        Ok(record.properties.remove(name))
    }

    /// Applies an aspect. Returns false if it was already applied.
    ///
    /// # Errors
    ///
    /// Returns an error if the node does not exist.
    pub fn add_aspect(&mut self, id: NodeId, aspect: QName) -> Result<bool> {
        self.allocator.validate(id)?;
        let record = self
            .nodes
            .get_mut(&id)
            .ok_or_else(|| Error::node_not_found(id))?;
        Ok(record.aspects.insert(aspect).is_none())
    }

    /// Removes an aspect. Returns false if it was not applied.
    ///
    /// # Errors
    ///
    /// Returns an error if the node does not exist.
    pub fn remove_aspect(&mut self, id: NodeId, aspect: &QName) -> Result<bool> {
        self.allocator.validate(id)?;
        let record = self
            .nodes
            .get_mut(&id)
            .ok_or_else(|| Error::node_not_found(id))?;
        Ok(record.aspects.remove(aspect).is_some())
    }

    /// Moves a node under a new primary parent.
    ///
    /// Returns the removed and the created primary edges.
    ///
    /// # Errors
    ///
    /// Returns an error if either node does not exist or `node` is the root.
    pub fn move_node(&mut self, node: NodeId, new_parent: NodeId) -> Result<(ChildAssoc, ChildAssoc)> {
        self.allocator.validate(node)?;
        self.allocator.validate(new_parent)?;

        let old = self
            .primary_parent(node)
            .ok_or_else(|| Error::validation("cannot move the root node"))?;
        self.remove_edge(&old);

        let new = ChildAssoc::primary(new_parent, node, old.assoc_type);
        self.insert_edge(new);
        Ok((old, new))
    }

    /// Moves `child` to position `index` among `parent`'s child edges.
    ///
    /// Indices past the end place the child last.
    ///
    /// # Errors
    ///
    /// Returns an error if `child` is not a child of `parent`.
    pub fn set_child_position(&mut self, parent: NodeId, child: NodeId, index: usize) -> Result<()> {
        let assocs = self
            .children
            .get_mut(&parent)
            .ok_or_else(|| Error::node_not_found(parent))?;
        let current = assocs
            .iter()
            .position(|a| a.child == child)
            .ok_or_else(|| {
                Error::validation(format!("{child:?} is not a child of {parent:?}"))
            })?;

        let assoc = assocs.remove(current);
        let index = index.min(assocs.len());
        assocs.insert(index, assoc);
        Ok(())
    }

    /// Deletes a node and everything beneath it through primary edges.
    ///
    /// Secondary edges into or out of deleted nodes are dropped. Returns the
    /// deleted nodes, parents before children.
    ///
    /// # Errors
    ///
    /// Returns an error if the node does not exist or is the root.
    pub fn delete_node(&mut self, id: NodeId) -> Result<Vec<NodeId>> {
        self.allocator.validate(id)?;
        if id == self.root {
            return Err(Error::validation("cannot delete the root node"));
        }

        let doomed = self.primary_subtree(id);
        for &node in &doomed {
            for assoc in self.parent_assocs(node) {
                self.remove_edge(&assoc);
            }
            for assoc in self.child_assocs(node) {
                self.remove_edge(&assoc);
            }
        }
        for &node in &doomed {
            self.nodes.remove(&node);
            self.children.remove(&node);
            self.parents.remove(&node);
            self.allocator.release(node)?;
        }
        Ok(doomed)
    }

    // --- Internal ---

    fn insert_edge(&mut self, assoc: ChildAssoc) {
        self.children
            .entry(assoc.parent)
            .or_default()
            .push_back(assoc);
        self.parents.entry(assoc.child).or_default().push_back(assoc);
    }

    fn remove_edge(&mut self, assoc: &ChildAssoc) -> bool {
        let mut removed = false;
        if let Some(assocs) = self.children.get_mut(&assoc.parent) {
            let before = assocs.len();
            assocs.retain(|a| a != assoc);
            removed = assocs.len() != before;
        }
        if let Some(assocs) = self.parents.get_mut(&assoc.child) {
            assocs.retain(|a| a != assoc);
        }
        removed
    }
}
