//! Access control tests

use trellis_foundation::NodeId;
use trellis_storage::{AccessControl, AllowAll, Permission, PermissionTable, SYSTEM_PRINCIPAL};

#[test]
fn allow_all_allows() {
    assert!(AllowAll.has_permission("anyone", NodeId::new(1, 1), Permission::ChangePermissions));
}

#[test]
fn closed_table_needs_grants() {
    let node = NodeId::new(1, 1);
    let table = PermissionTable::new(false).grant("bob", node, Permission::Read);
    assert!(table.has_permission("bob", node, Permission::Read));
    assert!(!table.has_permission("bob", node, Permission::ChangePermissions));
    assert!(!table.has_permission("eve", node, Permission::Read));
    assert!(table.has_permission(SYSTEM_PRINCIPAL, node, Permission::ChangePermissions));
}
