//! Transactions over the node store.
//!
//! A [`Transaction`] is a working copy of the committed [`Store`] plus:
//! - an extension value `X` owned by the layer above (the rule engine keeps
//!   its pending queue, executed set, and gates there)
//! - synchronous dispatch of [`StoreEvent`]s to registered observers
//! - keyed pre-commit hooks that run once immediately before publishing
//!
//! Dropping a transaction without committing rolls it back.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, trace};
use trellis_foundation::{Error, NodeId, QName, Result, Value};

use crate::access::{AccessControl, AllowAll, Permission, SYSTEM_PRINCIPAL};
use crate::event::StoreEvent;
use crate::model::{AssocType, ChildAssoc, NodeType};
use crate::store::Store;

// =============================================================================
// Observer and Hook Traits
// =============================================================================

/// Receives every structural change made through a transaction.
pub trait StoreObserver<X>: Send + Sync {
    /// Called synchronously after the change (before it, for deletions).
    ///
    /// # Errors
    /// An error aborts the mutating call that raised the event.
    fn on_event(&self, txn: &mut Transaction<'_, X>, event: &StoreEvent) -> Result<()>;

    /// Called when a transaction is discarded.
    fn on_rollback(&self) {}
}

/// Work bound to a transaction that runs immediately before it commits.
pub trait PreCommitHook<X>: Send + Sync {
    /// Runs the hook. May mutate the transaction and bind further hooks.
    ///
    /// # Errors
    /// An error rolls the transaction back.
    fn before_commit(&self, txn: &mut Transaction<'_, X>) -> Result<()>;
}

// =============================================================================
// Repository
// =============================================================================

/// The published store and the number of commits that produced it.
#[derive(Debug)]
struct Committed {
    store: Store,
    version: u64,
}

/// Holds the committed store and the observers every transaction dispatches to.
pub struct Repository<X> {
    committed: RwLock<Committed>,
    observers: RwLock<Vec<Arc<dyn StoreObserver<X>>>>,
    access: Arc<dyn AccessControl>,
}

impl<X: Default> Repository<X> {
    /// Creates a repository over `store` that allows everything.
    #[must_use]
    pub fn new(store: Store) -> Self {
        Self {
            committed: RwLock::new(Committed { store, version: 0 }),
            observers: RwLock::new(Vec::new()),
            access: Arc::new(AllowAll),
        }
    }

    /// Replaces the access control policy.
    #[must_use]
    pub fn with_access_control(mut self, access: Arc<dyn AccessControl>) -> Self {
        self.access = access;
        self
    }

    /// Registers an observer for transactions begun after this call.
    pub fn register_observer(&self, observer: Arc<dyn StoreObserver<X>>) {
        self.observers.write().push(observer);
    }

    /// Returns a copy of the committed store.
    #[must_use]
    pub fn snapshot(&self) -> Store {
        self.committed.read().store.clone()
    }

    /// Returns the commit version, bumped by every successful commit.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.committed.read().version
    }

    /// Returns the root node.
    #[must_use]
    pub fn root(&self) -> NodeId {
        self.committed.read().store.root()
    }

    /// Begins a transaction on behalf of `principal`.
    pub fn begin(&self, principal: impl Into<String>) -> Transaction<'_, X> {
        let principal = principal.into();
        let (store, base_version) = {
            let committed = self.committed.read();
            (committed.store.clone(), committed.version)
        };
        trace!(%principal, base_version, "transaction begun");
        Transaction {
            repo: self,
            store,
            base_version,
            ext: X::default(),
            principal,
            observers: self.observers.read().iter().cloned().collect(),
            hooks: Vec::new(),
            bound: HashSet::new(),
            created: HashSet::new(),
            status: TxnStatus::Active,
        }
    }

    /// Begins a transaction as the system principal.
    pub fn begin_system(&self) -> Transaction<'_, X> {
        self.begin(SYSTEM_PRINCIPAL)
    }

    /// Runs `f` in a transaction, committing on `Ok` and rolling back on `Err`.
    ///
    /// # Errors
    /// Returns the error from `f` or from commit.
    pub fn transact<T, F>(&self, principal: &str, f: F) -> Result<T>
    where
        F: FnOnce(&mut Transaction<'_, X>) -> Result<T>,
    {
        let mut txn = self.begin(principal);
        match f(&mut txn) {
            Ok(value) => {
                txn.commit()?;
                Ok(value)
            }
            Err(err) => {
                txn.rollback();
                Err(err)
            }
        }
    }
}

// =============================================================================
// Transaction
// =============================================================================

/// Lifecycle of a transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TxnStatus {
    /// Open for reads and writes.
    Active,
    /// Running pre-commit hooks.
    Committing,
    /// Published.
    Committed,
    /// Discarded.
    RolledBack,
}

/// A captured working copy, see [`Transaction::savepoint`].
#[derive(Clone, Debug)]
pub struct Savepoint {
    store: Store,
    created: HashSet<NodeId>,
}

/// A working copy of the store with event dispatch and pre-commit hooks.
pub struct Transaction<'r, X> {
    repo: &'r Repository<X>,
    store: Store,
    /// Commit version the working copy was taken from.
    base_version: u64,
    ext: X,
    principal: String,
    observers: Arc<[Arc<dyn StoreObserver<X>>]>,
    /// Hooks waiting to run, in binding order.
    hooks: Vec<(&'static str, Arc<dyn PreCommitHook<X>>)>,
    /// Keys of hooks waiting to run.
    bound: HashSet<&'static str>,
    /// Nodes created in this transaction.
    created: HashSet<NodeId>,
    status: TxnStatus,
}

impl<X> Transaction<'_, X> {
    /// Returns the working copy.
    #[must_use]
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Returns the commit version this transaction started from.
    #[must_use]
    pub fn base_version(&self) -> u64 {
        self.base_version
    }

    /// Returns the extension state.
    #[must_use]
    pub fn ext(&self) -> &X {
        &self.ext
    }

    /// Returns the extension state mutably.
    pub fn ext_mut(&mut self) -> &mut X {
        &mut self.ext
    }

    /// Returns the acting principal.
    #[must_use]
    pub fn principal(&self) -> &str {
        &self.principal
    }

    /// Returns the lifecycle status.
    #[must_use]
    pub fn status(&self) -> TxnStatus {
        self.status
    }

    /// Checks a permission for the acting principal.
    #[must_use]
    pub fn has_permission(&self, node: NodeId, permission: Permission) -> bool {
        self.principal == SYSTEM_PRINCIPAL
            || self
                .repo
                .access
                .has_permission(&self.principal, node, permission)
    }

    /// Returns true if the node was created in this transaction.
    #[must_use]
    pub fn is_new(&self, node: NodeId) -> bool {
        self.created.contains(&node)
    }

    /// Binds a pre-commit hook under `key`.
    ///
    /// Binding a key that is already waiting to run is a no-op; once a hook
    /// has run, binding its key again schedules it again.
    pub fn bind_pre_commit(&mut self, key: &'static str, hook: Arc<dyn PreCommitHook<X>>) {
        if self.bound.insert(key) {
            trace!(key, "pre-commit hook bound");
            self.hooks.push((key, hook));
        }
    }

    /// Returns true if a hook is waiting to run under `key`.
    #[must_use]
    pub fn is_bound(&self, key: &str) -> bool {
        self.bound.contains(key)
    }

    /// Captures the working copy so a failed step can be undone.
    #[must_use]
    pub fn savepoint(&self) -> Savepoint {
        Savepoint {
            store: self.store.clone(),
            created: self.created.clone(),
        }
    }

    /// Restores the working copy captured by `savepoint`.
    ///
    /// The extension state and bound hooks are left as they are.
    pub fn restore(&mut self, savepoint: Savepoint) {
        self.store = savepoint.store;
        self.created = savepoint.created;
    }

    // --- Mutations ---

    /// Creates a node and dispatches `NodeCreated` then `ChildAssocCreated`.
    ///
    /// # Errors
    /// Returns an error if the parent does not exist or an observer fails.
    pub fn create_node(
        &mut self,
        parent: NodeId,
        assoc_type: AssocType,
        name: impl Into<String>,
        node_type: NodeType,
    ) -> Result<NodeId> {
        let assoc = self.store.create_node(parent, assoc_type, name, node_type)?;
        self.created.insert(assoc.child);
        self.dispatch(StoreEvent::NodeCreated {
            node: assoc.child,
            node_type,
        })?;
        self.dispatch(StoreEvent::ChildAssocCreated {
            assoc,
            child_type: node_type,
        })?;
        Ok(assoc.child)
    }

    /// Adds a secondary edge and dispatches `ChildAssocCreated` if it is new.
    ///
    /// # Errors
    /// Returns an error if either node does not exist or an observer fails.
    pub fn add_child(
        &mut self,
        parent: NodeId,
        child: NodeId,
        assoc_type: AssocType,
    ) -> Result<ChildAssoc> {
        let existed = self
            .store
            .parent_assocs(child)
            .iter()
            .any(|a| a.parent == parent && a.assoc_type == assoc_type);
        let assoc = self.store.add_child(parent, child, assoc_type)?;
        if !existed {
            let child_type = self.store.node_type(child)?;
            self.dispatch(StoreEvent::ChildAssocCreated { assoc, child_type })?;
        }
        Ok(assoc)
    }

    /// Removes a secondary edge and dispatches `ChildAssocDeleted`.
    ///
    /// # Errors
    /// Returns an error if the edge is primary or an observer fails.
    pub fn remove_child_assoc(&mut self, assoc: &ChildAssoc) -> Result<bool> {
        let child_type = self.store.node_type(assoc.child)?;
        let removed = self.store.remove_child_assoc(assoc)?;
        if removed {
            self.dispatch(StoreEvent::ChildAssocDeleted {
                assoc: *assoc,
                child_type,
            })?;
        }
        Ok(removed)
    }

    /// Sets one property and dispatches `NodeUpdated`.
    ///
    /// # Errors
    /// Returns an error if the node does not exist or an observer fails.
    pub fn set_property(&mut self, node: NodeId, name: QName, value: Value) -> Result<()> {
        self.set_properties(node, [(name, value)])
    }

    /// Sets several properties and dispatches a single `NodeUpdated`.
    ///
    /// # Errors
    /// Returns an error if the node does not exist or an observer fails.
    pub fn set_properties(
        &mut self,
        node: NodeId,
        properties: impl IntoIterator<Item = (QName, Value)>,
    ) -> Result<()> {
        let node_type = self.store.node_type(node)?;
        let mut changed = Vec::new();
        for (name, value) in properties {
            self.store.set_property(node, name.clone(), value)?;
            changed.push(name);
        }
        self.dispatch(StoreEvent::NodeUpdated {
            node,
            node_type,
            properties: changed,
        })
    }

    /// Removes a property and dispatches `NodeUpdated` if it was present.
    ///
    /// # Errors
    /// Returns an error if the node does not exist or an observer fails.
    pub fn remove_property(&mut self, node: NodeId, name: &QName) -> Result<bool> {
        let node_type = self.store.node_type(node)?;
        let removed = self.store.remove_property(node, name)?.is_some();
        if removed {
            self.dispatch(StoreEvent::NodeUpdated {
                node,
                node_type,
                properties: vec![name.clone()],
            })?;
        }
        Ok(removed)
    }

    /// Applies an aspect and dispatches `AspectAdded` if it was not applied.
    ///
    /// # Errors
    /// Returns an error if the node does not exist or an observer fails.
    pub fn add_aspect(&mut self, node: NodeId, aspect: QName) -> Result<bool> {
        let node_type = self.store.node_type(node)?;
        let added = self.store.add_aspect(node, aspect.clone())?;
        if added {
            self.dispatch(StoreEvent::AspectAdded {
                node,
                node_type,
                aspect,
            })?;
        }
        Ok(added)
    }

    /// Removes an aspect. No event is dispatched.
    ///
    /// # Errors
    /// Returns an error if the node does not exist.
    pub fn remove_aspect(&mut self, node: NodeId, aspect: &QName) -> Result<bool> {
        self.store.remove_aspect(node, aspect)
    }

    /// Moves a node, dispatching `ChildAssocDeleted` then `ChildAssocCreated`.
    ///
    /// # Errors
    /// Returns an error if either node does not exist or an observer fails.
    pub fn move_node(&mut self, node: NodeId, new_parent: NodeId) -> Result<ChildAssoc> {
        let child_type = self.store.node_type(node)?;
        let (old, new) = self.store.move_node(node, new_parent)?;
        self.dispatch(StoreEvent::ChildAssocDeleted {
            assoc: old,
            child_type,
        })?;
        self.dispatch(StoreEvent::ChildAssocCreated {
            assoc: new,
            child_type,
        })?;
        Ok(new)
    }

    /// Reorders a child and dispatches `ChildrenReordered`.
    ///
    /// # Errors
    /// Returns an error if `child` is not a child of `parent`.
    pub fn set_child_position(&mut self, parent: NodeId, child: NodeId, index: usize) -> Result<()> {
        let parent_type = self.store.node_type(parent)?;
        self.store.set_child_position(parent, child, index)?;
        self.dispatch(StoreEvent::ChildrenReordered {
            parent,
            parent_type,
        })
    }

    /// Deletes a node and its primary descendants.
    ///
    /// `BeforeNodeDeleted` is dispatched for each doomed node, parents first,
    /// while all of them still exist.
    ///
    /// # Errors
    /// Returns an error if the node does not exist, is the root, or an
    /// observer fails.
    pub fn delete_node(&mut self, node: NodeId) -> Result<Vec<NodeId>> {
        self.store.node(node)?;
        if node == self.store.root() {
            return Err(Error::validation("cannot delete the root node"));
        }

        for doomed in self.store.primary_subtree(node) {
            if let Ok(node_type) = self.store.node_type(doomed) {
                self.dispatch(StoreEvent::BeforeNodeDeleted {
                    node: doomed,
                    node_type,
                })?;
            }
        }

        if !self.store.exists(node) {
            // An observer already removed it
            return Ok(Vec::new());
        }
        let deleted = self.store.delete_node(node)?;
        for id in &deleted {
            self.created.remove(id);
        }
        Ok(deleted)
    }

    // --- Lifecycle ---

    /// Runs pre-commit hooks, then publishes the working copy.
    ///
    /// # Errors
    /// Returns the first hook error; the transaction is rolled back.
    pub fn commit(mut self) -> Result<()> {
        self.status = TxnStatus::Committing;

        while !self.hooks.is_empty() {
            let (key, hook) = self.hooks.remove(0);
            self.bound.remove(key);
            trace!(key, "running pre-commit hook");
            if let Err(err) = hook.before_commit(&mut self) {
                debug!(key, error = %err, "pre-commit hook failed, rolling back");
                self.discard();
                return Err(err);
            }
        }

        let version = {
            let mut committed = self.repo.committed.write();
            committed.store = self.store.clone();
            committed.version += 1;
            committed.version
        };
        self.status = TxnStatus::Committed;
        debug!(
            principal = %self.principal,
            created = self.created.len(),
            version,
            "transaction committed"
        );
        Ok(())
    }

    /// Discards the working copy.
    pub fn rollback(mut self) {
        self.discard();
    }

    fn discard(&mut self) {
        if matches!(self.status, TxnStatus::Committed | TxnStatus::RolledBack) {
            return;
        }
        self.status = TxnStatus::RolledBack;
        debug!(principal = %self.principal, "transaction rolled back");
        for observer in self.observers.iter() {
            observer.on_rollback();
        }
    }

    fn dispatch(&mut self, event: StoreEvent) -> Result<()> {
        trace!(kind = event.kind(), "dispatching store event");
        let observers = Arc::clone(&self.observers);
        for observer in observers.iter() {
            observer.on_event(self, &event)?;
        }
        Ok(())
    }
}

impl<X> Drop for Transaction<'_, X> {
    fn drop(&mut self) {
        self.discard();
    }
}
