//! Qualified names.
//!
//! Aspects, properties, and rule types are all named with a `prefix:local`
//! qualified name. Well-known names are `const` and borrow static strings;
//! names created at runtime own their text.

use std::borrow::Cow;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A qualified name such as `rule:rules` or `cm:title`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct QName(Cow<'static, str>);

impl QName {
    /// Creates a name from a static string, usable in `const` position.
    #[must_use]
    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    /// Creates a name from owned text.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    /// Returns the full name text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the prefix before the first `:`, if any.
    #[must_use]
    pub fn prefix(&self) -> Option<&str> {
        self.0.split_once(':').map(|(prefix, _)| prefix)
    }

    /// Returns the local part after the first `:`, or the whole name.
    #[must_use]
    pub fn local_name(&self) -> &str {
        self.0.split_once(':').map_or(&self.0, |(_, local)| local)
    }
}

impl fmt::Debug for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "QName({})", self.0)
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for QName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for QName {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

impl AsRef<str> for QName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
