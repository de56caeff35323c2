//! Node store tests

use trellis_foundation::{ErrorKind, QName, Value};
use trellis_storage::{AssocType, NodeType, Store, aspects, props};

fn folder(store: &mut Store, parent: trellis_foundation::NodeId, name: &str) -> trellis_foundation::NodeId {
    store
        .create_node(parent, AssocType::Contains, name, NodeType::Folder)
        .unwrap()
        .child
}

// =============================================================================
// Structure
// =============================================================================

#[test]
fn new_store_has_a_root_folder() {
    let store = Store::new();
    assert_eq!(store.len(), 1);
    assert_eq!(store.node_type(store.root()).unwrap(), NodeType::Folder);
    assert!(store.primary_parent(store.root()).is_none());
}

#[test]
fn nodes_can_have_several_parents() {
    let mut store = Store::new();
    let root = store.root();
    let a = folder(&mut store, root, "a");
    let b = folder(&mut store, root, "b");
    let shared = folder(&mut store, a, "shared");
    store.add_child(b, shared, AssocType::Contains).unwrap();

    let parents: Vec<_> = store.parent_assocs(shared).iter().map(|p| p.parent).collect();
    assert_eq!(parents, vec![a, b]);
    assert_eq!(store.primary_parent(shared).unwrap().parent, a);
    assert_eq!(store.child_named(b, "shared"), Some(shared));
}

#[test]
fn cycles_through_secondary_edges_are_representable() {
    let mut store = Store::new();
    let root = store.root();
    let a = folder(&mut store, root, "a");
    let b = folder(&mut store, a, "b");
    store.add_child(b, a, AssocType::Contains).unwrap();

    assert!(store.parent_assocs(a).iter().any(|p| p.parent == b));
    assert!(store.child_assocs(b).iter().any(|c| c.child == a));
}

#[test]
fn deleted_ids_go_stale() {
    let mut store = Store::new();
    let root = store.root();
    let a = folder(&mut store, root, "a");
    store.delete_node(a).unwrap();
    let b = folder(&mut store, root, "b");

    assert!(!store.exists(a));
    assert!(store.exists(b));
    assert!(matches!(
        store.node(a).unwrap_err().kind,
        ErrorKind::NodeNotFound(_) | ErrorKind::StaleNode(_)
    ));
}

#[test]
fn typed_child_lookup() {
    let mut store = Store::new();
    let root = store.root();
    let a = folder(&mut store, root, "a");
    store
        .create_node(a, AssocType::RuleFolder, "rules", NodeType::RuleFolder)
        .unwrap();
    folder(&mut store, a, "child");

    assert_eq!(store.child_assocs(a).len(), 2);
    assert_eq!(store.child_assocs_of_type(a, AssocType::RuleFolder).len(), 1);
}

// =============================================================================
// Aspects and Properties
// =============================================================================

#[test]
fn aspects_are_idempotent() {
    let mut store = Store::new();
    let root = store.root();
    assert!(store.add_aspect(root, aspects::TEMPORARY).unwrap());
    assert!(!store.add_aspect(root, aspects::TEMPORARY).unwrap());
    assert!(store.has_aspect(root, &aspects::TEMPORARY));
    assert!(store.remove_aspect(root, &aspects::TEMPORARY).unwrap());
    assert!(!store.has_aspect(root, &aspects::TEMPORARY));
}

#[test]
fn properties_replace_previous_values() {
    let mut store = Store::new();
    let root = store.root();
    let previous = store
        .set_property(root, props::TITLE, Value::from("one"))
        .unwrap();
    assert!(previous.is_none());
    let previous = store
        .set_property(root, props::TITLE, Value::from("two"))
        .unwrap();
    assert_eq!(previous, Some(Value::from("one")));
    assert_eq!(store.property(root, &props::TITLE), Some(&Value::from("two")));
    assert!(store.property(root, &QName::from_static("cm:missing")).is_none());
}

#[test]
fn root_cannot_be_deleted() {
    let mut store = Store::new();
    let root = store.root();
    assert!(store.delete_node(root).is_err());
}
