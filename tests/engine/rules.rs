//! Rule persistence tests

use std::sync::Arc;

use trellis_engine::{Rule, RuleRepository, RuleService, rule_types};
use trellis_foundation::ErrorCategory;
use trellis_storage::{Permission, PermissionTable, Store, aspects};

use crate::common::{folder, save, setup, tag_rule, titles};

// =============================================================================
// Ordering
// =============================================================================

#[test]
fn rules_keep_save_order() {
    let (repo, service) = setup();
    let mut txn = repo.begin_system();
    let f = folder(&mut txn, repo.root(), "f");
    for title in ["one", "two", "three"] {
        save(&service, &mut txn, f, tag_rule(title));
    }
    assert_eq!(titles(&service.rules(&txn, f).unwrap()), ["one", "two", "three"]);
}

#[test]
fn save_at_index_inserts() {
    let (repo, service) = setup();
    let mut txn = repo.begin_system();
    let f = folder(&mut txn, repo.root(), "f");
    save(&service, &mut txn, f, tag_rule("one"));
    save(&service, &mut txn, f, tag_rule("two"));

    let mut first = tag_rule("zero");
    service.save_rule_at(&mut txn, f, &mut first, Some(0)).unwrap();
    assert_eq!(titles(&service.rules(&txn, f).unwrap()), ["zero", "one", "two"]);
}

#[test]
fn set_rule_position_moves_a_rule() {
    let (repo, service) = setup();
    let mut txn = repo.begin_system();
    let f = folder(&mut txn, repo.root(), "f");
    let one = save(&service, &mut txn, f, tag_rule("one"));
    save(&service, &mut txn, f, tag_rule("two"));
    save(&service, &mut txn, f, tag_rule("three"));

    service.set_rule_position(&mut txn, f, &one, 2).unwrap();
    assert_eq!(titles(&service.rules(&txn, f).unwrap()), ["two", "three", "one"]);
}

// =============================================================================
// Identity and Updates
// =============================================================================

#[test]
fn saving_again_updates_in_place() {
    let (repo, service) = setup();
    let mut txn = repo.begin_system();
    let f = folder(&mut txn, repo.root(), "f");
    let mut rule = save(&service, &mut txn, f, tag_rule("draft"));
    let id = rule.id();

    rule.title = "final".into();
    rule.disabled = true;
    service.save_rule(&mut txn, f, &mut rule).unwrap();

    let rules = service.rules(&txn, f).unwrap();
    assert_eq!(rules.len(), 1);
    assert_eq!(rules[0].id(), id);
    assert_eq!(rules[0].title, "final");
    assert!(rules[0].disabled);
}

#[test]
fn a_rule_cannot_move_between_nodes_by_saving() {
    let (repo, service) = setup();
    let mut txn = repo.begin_system();
    let a = folder(&mut txn, repo.root(), "a");
    let b = folder(&mut txn, repo.root(), "b");
    let mut rule = save(&service, &mut txn, a, tag_rule("r"));

    let err = service.save_rule(&mut txn, b, &mut rule).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Validation);
}

#[test]
fn committed_rules_survive_into_new_transactions() {
    let (repo, service) = setup();
    let mut txn = repo.begin_system();
    let f = folder(&mut txn, repo.root(), "f");
    let rule = save(&service, &mut txn, f, tag_rule("kept").applied_to_children(true));
    txn.commit().unwrap();

    let txn = repo.begin_system();
    let loaded = service.rule(&txn, rule.id().unwrap()).unwrap();
    assert_eq!(loaded.title, "kept");
    assert!(loaded.applies_to_children);
    assert_eq!(loaded.rule_types, vec![rule_types::INBOUND]);
    assert_eq!(loaded.action, rule.action);
}

// =============================================================================
// Removal
// =============================================================================

#[test]
fn removing_the_last_rule_drops_the_aspect() {
    let (repo, service) = setup();
    let mut txn = repo.begin_system();
    let f = folder(&mut txn, repo.root(), "f");
    let one = save(&service, &mut txn, f, tag_rule("one"));
    let two = save(&service, &mut txn, f, tag_rule("two"));

    service.remove_rule(&mut txn, f, &one).unwrap();
    assert_eq!(titles(&service.rules(&txn, f).unwrap()), ["two"]);
    assert!(txn.store().has_aspect(f, &aspects::RULES));

    service.remove_rule(&mut txn, f, &two).unwrap();
    assert!(service.rules(&txn, f).unwrap().is_empty());
    assert!(!txn.store().has_aspect(f, &aspects::RULES));
    assert!(!txn.store().exists(two.id().unwrap()));
}

#[test]
fn remove_all_rules() {
    let (repo, service) = setup();
    let mut txn = repo.begin_system();
    let f = folder(&mut txn, repo.root(), "f");
    save(&service, &mut txn, f, tag_rule("one"));
    save(&service, &mut txn, f, tag_rule("two"));

    service.remove_all_rules(&mut txn, f).unwrap();
    assert_eq!(service.count_rules(&txn, f).unwrap(), 0);
    assert!(!txn.store().has_aspect(f, &aspects::RULES));
}

#[test]
fn rule_node_names_are_not_reused_after_removal() {
    let (repo, service) = setup();
    let mut txn = repo.begin_system();
    let f = folder(&mut txn, repo.root(), "f");
    let first = save(&service, &mut txn, f, tag_rule("first"));
    let second = save(&service, &mut txn, f, tag_rule("second"));
    service.remove_rule(&mut txn, f, &second).unwrap();
    let third = save(&service, &mut txn, f, tag_rule("third"));

    let name = |rule: &Rule| txn.store().node(rule.id().unwrap()).unwrap().name.clone();
    assert_eq!([name(&first), name(&third)], ["rule-0", "rule-2"]);
}

// =============================================================================
// Queries
// =============================================================================

#[test]
fn inherited_rules_count_as_rules_but_not_own_rules() {
    let (repo, service) = setup();
    let mut txn = repo.begin_system();
    let parent = folder(&mut txn, repo.root(), "parent");
    let child = folder(&mut txn, parent, "child");
    save(&service, &mut txn, parent, tag_rule("inherited").applied_to_children(true));

    assert!(service.has_rules(&txn, child).unwrap());
    assert!(!service.has_non_inherited_rules(&txn, child).unwrap());
    assert_eq!(service.count_rules(&txn, child).unwrap(), 0);
    assert!(service.has_non_inherited_rules(&txn, parent).unwrap());
}

#[test]
fn built_in_rule_types_are_registered() {
    let (_, service) = setup();
    let names: Vec<_> = service.rule_types().iter().map(|t| t.name.clone()).collect();
    assert_eq!(
        names,
        vec![rule_types::INBOUND, rule_types::UPDATE, rule_types::OUTBOUND]
    );
    assert!(service.rule_type(&rule_types::OUTBOUND).is_some());
}

#[test]
fn unreadable_nodes_show_no_rules() {
    let store = Store::new();
    let root = store.root();
    let repo = RuleRepository::new(store);
    let service = RuleService::builder().build().unwrap();
    service.install(&repo);

    let mut txn = repo.begin_system();
    let f = folder(&mut txn, root, "f");
    let rule = save(&service, &mut txn, f, tag_rule("secret"));
    txn.commit().unwrap();

    let repo = RuleRepository::new(repo.snapshot())
        .with_access_control(Arc::new(PermissionTable::new(true).deny("eve", f, Permission::Read)));
    let txn = repo.begin("eve");
    assert!(service.rules(&txn, f).unwrap().is_empty());
    let err = service.rule(&txn, rule.id().unwrap()).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Authorization);
}
