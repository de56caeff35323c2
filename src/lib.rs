//! Trellis - Rule inheritance and transactional triggers for hierarchical
//! content repositories
//!
//! This crate re-exports all layers of the Trellis system for convenient access.
//! For detailed documentation, see the individual layer crates.
//!
//! # Architecture
//!
//! ```text
//! Layer 2: trellis_engine     - Rule store, inheritance, gates, triggers, drain
//! Layer 1: trellis_storage    - Node store, transactions, store events, access control
//! Layer 0: trellis_foundation - Core types (NodeId, QName, Value, Error)
//! ```

pub use trellis_engine as engine;
pub use trellis_foundation as foundation;
pub use trellis_storage as storage;
