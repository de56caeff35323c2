//! Hierarchical node store, transactions, and store events for Trellis.
//!
//! This crate provides:
//! - [`NodeAllocator`] - Generational node allocation
//! - [`Store`] - Nodes, aspects, properties, and parent/child associations
//! - [`Repository`] / [`Transaction`] - Working copies, observers, pre-commit hooks
//! - [`AccessControl`] - Permission decisions per principal and node

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod access;
pub mod allocator;
pub mod event;
pub mod model;
pub mod store;
pub mod txn;

pub use access::{AccessControl, AllowAll, Permission, PermissionTable, SYSTEM_PRINCIPAL};
pub use allocator::NodeAllocator;
pub use event::StoreEvent;
pub use model::{AssocType, ChildAssoc, NodeRecord, NodeType, aspects, props};
pub use store::Store;
pub use txn::{PreCommitHook, Repository, Savepoint, StoreObserver, Transaction, TxnStatus};
