//! Integration tests for Layer 0: Foundation
//!
//! Tests for identifiers, qualified names, values, and errors.

mod errors;
