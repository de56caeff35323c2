//! Gate tests

use trellis_engine::{
    rule_types, without_rule, without_rule_type, without_rules, without_rules_for,
};
use trellis_foundation::{Error, QName};
use trellis_storage::{AssocType, NodeType};

use crate::common::{TAGGED, aspect_rule, content, folder, save, setup, tag_rule};

const MARKED: QName = QName::from_static("cm:marked");

#[test]
fn without_rules_suppresses_only_inside_the_scope() {
    let (repo, service) = setup();
    let mut txn = repo.begin_system();
    let f = folder(&mut txn, repo.root(), "f");
    save(&service, &mut txn, f, tag_rule("tag"));
    txn.commit().unwrap();

    let mut txn = repo.begin_system();
    let quiet = without_rules(&mut txn, |txn| {
        txn.create_node(f, AssocType::Contains, "quiet", NodeType::Content)
    })
    .unwrap();
    assert!(!txn.ext().gates.rules_suspended());
    let loud = content(&mut txn, f, "loud");
    txn.commit().unwrap();

    let store = repo.snapshot();
    assert!(!store.has_aspect(quiet, &TAGGED));
    assert!(store.has_aspect(loud, &TAGGED));
}

#[test]
fn nested_scopes_restore_the_outer_state() {
    let (repo, _service) = setup();
    let mut txn = repo.begin_system();

    without_rules(&mut txn, |txn| {
        without_rules(txn, |txn| {
            assert!(txn.ext().gates.rules_suspended());
            Ok(())
        })?;
        assert!(txn.ext().gates.rules_suspended());
        Ok(())
    })
    .unwrap();
    assert!(!txn.ext().gates.rules_suspended());
}

#[test]
fn scopes_restore_state_when_the_body_fails() {
    let (repo, _service) = setup();
    let mut txn = repo.begin_system();
    let f = folder(&mut txn, repo.root(), "f");

    let result: Result<(), Error> =
        without_rules_for(&mut txn, f, |_| Err(Error::validation("boom")));
    assert!(result.is_err());
    assert!(txn.ext().gates.is_node_enabled(f));
}

#[test]
fn without_rules_for_blocks_only_the_named_node() {
    let (repo, service) = setup();
    let mut txn = repo.begin_system();
    let blocked = folder(&mut txn, repo.root(), "blocked");
    let open = folder(&mut txn, repo.root(), "open");
    save(&service, &mut txn, blocked, tag_rule("a"));
    save(&service, &mut txn, open, tag_rule("b"));
    txn.commit().unwrap();

    let mut txn = repo.begin_system();
    let (quiet, loud) = without_rules_for(&mut txn, blocked, |txn| {
        assert!(!service.rules_enabled(txn, blocked));
        assert!(service.rules_enabled(txn, open));
        let quiet = txn.create_node(blocked, AssocType::Contains, "doc", NodeType::Content)?;
        let loud = txn.create_node(open, AssocType::Contains, "doc", NodeType::Content)?;
        Ok((quiet, loud))
    })
    .unwrap();
    txn.commit().unwrap();

    let store = repo.snapshot();
    assert!(!store.has_aspect(quiet, &TAGGED));
    assert!(store.has_aspect(loud, &TAGGED));
}

#[test]
fn without_rule_blocks_one_rule() {
    let (repo, service) = setup();
    let mut txn = repo.begin_system();
    let f = folder(&mut txn, repo.root(), "f");
    let tagging = save(&service, &mut txn, f, tag_rule("tag"));
    save(&service, &mut txn, f, aspect_rule("mark", MARKED));
    txn.commit().unwrap();

    let mut txn = repo.begin_system();
    let doc = without_rule(&mut txn, tagging.id().unwrap(), |txn| {
        txn.create_node(f, AssocType::Contains, "doc", NodeType::Content)
    })
    .unwrap();
    txn.commit().unwrap();

    let store = repo.snapshot();
    assert!(!store.has_aspect(doc, &TAGGED));
    assert!(store.has_aspect(doc, &MARKED));
}

#[test]
fn without_rule_type_blocks_that_type() {
    let (repo, service) = setup();
    let mut txn = repo.begin_system();
    let f = folder(&mut txn, repo.root(), "f");
    save(&service, &mut txn, f, tag_rule("tag"));
    txn.commit().unwrap();

    let mut txn = repo.begin_system();
    let doc = without_rule_type(&mut txn, &rule_types::INBOUND, |txn| {
        assert!(!txn.ext().gates.is_rule_type_enabled(&rule_types::INBOUND));
        txn.create_node(f, AssocType::Contains, "doc", NodeType::Content)
    })
    .unwrap();
    assert!(txn.ext().gates.is_rule_type_enabled(&rule_types::INBOUND));
    txn.commit().unwrap();

    assert!(!repo.snapshot().has_aspect(doc, &TAGGED));
}

#[test]
fn gates_are_checked_again_when_draining() {
    let (repo, service) = setup();
    let mut txn = repo.begin_system();
    let f = folder(&mut txn, repo.root(), "f");
    save(&service, &mut txn, f, tag_rule("tag"));
    txn.commit().unwrap();

    let mut txn = repo.begin_system();
    let doc = content(&mut txn, f, "doc");
    assert_eq!(txn.ext().pending.len(), 1);
    txn.ext_mut().gates.disable_node(f);
    txn.commit().unwrap();

    assert!(!repo.snapshot().has_aspect(doc, &TAGGED));
}

#[test]
fn global_switch_is_shared_by_clones() {
    let (repo, service) = setup();
    let other = service.clone();
    other.disable_rules();
    assert!(!service.is_enabled());

    let mut txn = repo.begin_system();
    let f = folder(&mut txn, repo.root(), "f");
    save(&service, &mut txn, f, tag_rule("tag"));
    let doc = content(&mut txn, f, "doc");
    assert!(!service.rules_enabled(&txn, f));
    txn.commit().unwrap();
    assert!(!repo.snapshot().has_aspect(doc, &TAGGED));

    service.enable_rules();
    assert!(other.is_enabled());
}
