//! Property values stored on nodes.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::node::NodeId;
use crate::qname::QName;

/// A property value.
///
/// Values are plain data; the store clones them on read.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Value {
    /// Boolean value.
    Bool(bool),
    /// 64-bit signed integer.
    Int(i64),
    /// Text value.
    Text(String),
    /// A single qualified name.
    Name(QName),
    /// An ordered list of qualified names.
    Names(Vec<QName>),
    /// Reference to another node.
    Node(NodeId),
    /// Opaque encoded bytes.
    Bytes(Vec<u8>),
}

impl Value {
    /// Returns the boolean if this is a `Bool`.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the integer if this is an `Int`.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the text if this is a `Text`.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the name if this is a `Name`, or a text value read as a name.
    #[must_use]
    pub fn as_name(&self) -> Option<QName> {
        match self {
            Self::Name(n) => Some(n.clone()),
            Self::Text(s) => Some(QName::new(s.clone())),
            _ => None,
        }
    }

    /// Returns the names if this is a `Names` (or a single `Name`).
    #[must_use]
    pub fn as_names(&self) -> Option<Vec<QName>> {
        match self {
            Self::Names(names) => Some(names.clone()),
            Self::Name(n) => Some(vec![n.clone()]),
            _ => None,
        }
    }

    /// Returns the node reference if this is a `Node`.
    #[must_use]
    pub fn as_node(&self) -> Option<NodeId> {
        match self {
            Self::Node(id) => Some(*id),
            _ => None,
        }
    }

    /// Returns the bytes if this is `Bytes`.
    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(b) => Some(b),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Text(s) => write!(f, "{s:?}"),
            Self::Name(n) => write!(f, "{n}"),
            Self::Names(names) => {
                write!(f, "[")?;
                for (i, n) in names.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{n}")?;
                }
                write!(f, "]")
            }
            Self::Node(id) => write!(f, "{id}"),
            Self::Bytes(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<QName> for Value {
    fn from(n: QName) -> Self {
        Self::Name(n)
    }
}

impl From<NodeId> for Value {
    fn from(id: NodeId) -> Self {
        Self::Node(id)
    }
}
