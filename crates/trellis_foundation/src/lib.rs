//! Core identifiers, names, values, and errors for Trellis.
//!
//! This crate provides:
//! - [`NodeId`] - Generational node identifiers
//! - [`QName`] - Qualified names for aspects, properties, and rule types
//! - [`Value`] - Property values stored on nodes
//! - [`Error`] - Rich error types with context

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod node;
pub mod qname;
pub mod value;

pub use error::{Error, ErrorCategory, ErrorContext, ErrorKind, SemanticLimit};
pub use node::NodeId;
pub use qname::QName;
pub use value::Value;

/// Result type used throughout Trellis.
pub type Result<T> = std::result::Result<T, Error>;
