//! Rule linking tests

use trellis_foundation::{ErrorCategory, ErrorKind};
use trellis_storage::aspects;

use crate::common::{TAGGED, content, folder, save, setup, tag_rule, titles};

#[test]
fn linked_node_sees_the_owner_rules() {
    let (repo, service) = setup();
    let mut txn = repo.begin_system();
    let owner = folder(&mut txn, repo.root(), "owner");
    let borrower = folder(&mut txn, repo.root(), "borrower");
    save(&service, &mut txn, owner, tag_rule("shared"));

    service.link_rules(&mut txn, borrower, owner).unwrap();

    assert!(service.is_linked(&txn, borrower).unwrap());
    assert!(!service.is_linked(&txn, owner).unwrap());
    assert_eq!(service.linked_to(&txn, borrower).unwrap(), Some(owner));
    assert_eq!(service.linked_from(&txn, owner).unwrap(), vec![borrower]);
    assert_eq!(titles(&service.rules(&txn, borrower).unwrap()), ["shared"]);
    assert!(service.has_non_inherited_rules(&txn, borrower).unwrap());
}

#[test]
fn linked_rules_fire_on_the_borrower() {
    let (repo, service) = setup();
    let mut txn = repo.begin_system();
    let owner = folder(&mut txn, repo.root(), "owner");
    let borrower = folder(&mut txn, repo.root(), "borrower");
    save(&service, &mut txn, owner, tag_rule("shared"));
    service.link_rules(&mut txn, borrower, owner).unwrap();
    txn.commit().unwrap();

    let mut txn = repo.begin_system();
    let doc = content(&mut txn, borrower, "doc");
    txn.commit().unwrap();

    assert!(repo.snapshot().has_aspect(doc, &TAGGED));
}

#[test]
fn owner_changes_show_through_the_link() {
    let (repo, service) = setup();
    let mut txn = repo.begin_system();
    let owner = folder(&mut txn, repo.root(), "owner");
    let borrower = folder(&mut txn, repo.root(), "borrower");
    save(&service, &mut txn, owner, tag_rule("first"));
    service.link_rules(&mut txn, borrower, owner).unwrap();
    assert_eq!(titles(&service.rules(&txn, borrower).unwrap()), ["first"]);

    save(&service, &mut txn, owner, tag_rule("second"));
    assert_eq!(
        titles(&service.rules(&txn, borrower).unwrap()),
        ["first", "second"]
    );
}

#[test]
fn linked_nodes_cannot_edit_rules() {
    let (repo, service) = setup();
    let mut txn = repo.begin_system();
    let owner = folder(&mut txn, repo.root(), "owner");
    let borrower = folder(&mut txn, repo.root(), "borrower");
    let shared = save(&service, &mut txn, owner, tag_rule("shared"));
    service.link_rules(&mut txn, borrower, owner).unwrap();

    let mut rule = tag_rule("mine");
    let err = service.save_rule(&mut txn, borrower, &mut rule).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::RulesLinked(node) if node == borrower));
    assert_eq!(err.category(), ErrorCategory::DomainState);

    let err = service.remove_rule(&mut txn, borrower, &shared).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::RulesLinked(_)));
    let err = service.remove_all_rules(&mut txn, borrower).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::RulesLinked(_)));
}

#[test]
fn unlink_drops_the_borrowed_rules() {
    let (repo, service) = setup();
    let mut txn = repo.begin_system();
    let owner = folder(&mut txn, repo.root(), "owner");
    let borrower = folder(&mut txn, repo.root(), "borrower");
    save(&service, &mut txn, owner, tag_rule("shared"));
    service.link_rules(&mut txn, borrower, owner).unwrap();

    service.unlink_rules(&mut txn, borrower).unwrap();

    assert!(!service.is_linked(&txn, borrower).unwrap());
    assert!(!txn.store().has_aspect(borrower, &aspects::RULES));
    assert!(service.rules(&txn, borrower).unwrap().is_empty());
    assert_eq!(titles(&service.rules(&txn, owner).unwrap()), ["shared"]);
    assert!(service.linked_from(&txn, owner).unwrap().is_empty());

    let err = service.unlink_rules(&mut txn, borrower).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Validation);
}

#[test]
fn removing_owner_rules_unlinks_borrowers() {
    let (repo, service) = setup();
    let mut txn = repo.begin_system();
    let owner = folder(&mut txn, repo.root(), "owner");
    let first = folder(&mut txn, repo.root(), "first");
    let second = folder(&mut txn, repo.root(), "second");
    save(&service, &mut txn, owner, tag_rule("shared"));
    service.link_rules(&mut txn, first, owner).unwrap();
    service.link_rules(&mut txn, second, owner).unwrap();
    assert_eq!(service.linked_from(&txn, owner).unwrap(), vec![first, second]);

    service.remove_all_rules(&mut txn, owner).unwrap();

    for node in [owner, first, second] {
        assert!(service.rules(&txn, node).unwrap().is_empty());
        assert!(!txn.store().has_aspect(node, &aspects::RULES));
    }
}

#[test]
fn invalid_links_are_rejected() {
    let (repo, service) = setup();
    let mut txn = repo.begin_system();
    let owner = folder(&mut txn, repo.root(), "owner");
    let other = folder(&mut txn, repo.root(), "other");
    let empty = folder(&mut txn, repo.root(), "empty");
    let borrower = folder(&mut txn, repo.root(), "borrower");
    save(&service, &mut txn, owner, tag_rule("shared"));
    save(&service, &mut txn, other, tag_rule("own"));

    // to itself
    let err = service.link_rules(&mut txn, owner, owner).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Validation);
    // target has no rules
    let err = service.link_rules(&mut txn, borrower, empty).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Validation);
    // source has its own rules
    let err = service.link_rules(&mut txn, other, owner).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Validation);

    service.link_rules(&mut txn, borrower, owner).unwrap();
    // already linked
    let err = service.link_rules(&mut txn, borrower, other).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::RulesLinked(_)));
    // target is itself linked
    let err = service.link_rules(&mut txn, empty, borrower).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::RulesLinked(_)));
}
