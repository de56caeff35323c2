//! Integration tests for Layer 1: Storage
//!
//! Tests for the node store, transactions, events, and access control.

mod access;
mod store;
