//! Permission decisions.

use std::collections::HashMap;

use trellis_foundation::NodeId;

/// Principal that bypasses every permission check.
pub const SYSTEM_PRINCIPAL: &str = "system";

/// Permissions consulted by the rule engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Permission {
    /// Read a node and its rules.
    Read,
    /// Change a node's permissions, which also gates editing its rules.
    ChangePermissions,
}

impl Permission {
    /// Returns the permission name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Read => "Read",
            Self::ChangePermissions => "ChangePermissions",
        }
    }
}

/// Yields an allow/deny decision for a (principal, node, permission) triple.
pub trait AccessControl: Send + Sync {
    /// Returns true if `principal` holds `permission` on `node`.
    fn has_permission(&self, principal: &str, node: NodeId, permission: Permission) -> bool;
}

/// Grants everything to everyone.
#[derive(Clone, Copy, Debug, Default)]
pub struct AllowAll;

impl AccessControl for AllowAll {
    fn has_permission(&self, _principal: &str, _node: NodeId, _permission: Permission) -> bool {
        true
    }
}

/// Explicit per-(principal, node) decisions over a default.
#[derive(Clone, Debug)]
pub struct PermissionTable {
    default: bool,
    entries: HashMap<(String, NodeId, Permission), bool>,
}

impl Default for PermissionTable {
    fn default() -> Self {
        Self::new(true)
    }
}

impl PermissionTable {
    /// Creates a table whose unlisted decisions are `default`.
    #[must_use]
    pub fn new(default: bool) -> Self {
        Self {
            default,
            entries: HashMap::new(),
        }
    }

    /// Grants a permission.
    #[must_use]
    pub fn grant(mut self, principal: impl Into<String>, node: NodeId, permission: Permission) -> Self {
        self.entries.insert((principal.into(), node, permission), true);
        self
    }

    /// Denies a permission.
    #[must_use]
    pub fn deny(mut self, principal: impl Into<String>, node: NodeId, permission: Permission) -> Self {
        self.entries.insert((principal.into(), node, permission), false);
        self
    }
}

impl AccessControl for PermissionTable {
    fn has_permission(&self, principal: &str, node: NodeId, permission: Permission) -> bool {
        if principal == SYSTEM_PRINCIPAL {
            return true;
        }
        self.entries
            .get(&(principal.to_string(), node, permission))
            .copied()
            .unwrap_or(self.default)
    }
}
