//! Effective rule resolution tests

use proptest::prelude::*;

use trellis_engine::{EngineConfig, Rule, RuleService, RuleTransaction, rule_types};
use trellis_foundation::NodeId;
use trellis_storage::{AssocType, aspects};

use crate::common::{folder, save, setup, setup_with, tag_rule, titles};

fn inheritable(title: &str) -> Rule {
    tag_rule(title).applied_to_children(true)
}

struct Chain {
    a: NodeId,
    b: NodeId,
    c: NodeId,
}

/// A holds rule1 (inheritable) and rule2; B under A holds rule3
/// (inheritable) and rule4; C under B holds rule5 and rule6.
fn chain(service: &RuleService, txn: &mut RuleTransaction<'_>, root: NodeId) -> Chain {
    let a = folder(txn, root, "a");
    let b = folder(txn, a, "b");
    let c = folder(txn, b, "c");
    save(service, txn, a, inheritable("rule1"));
    save(service, txn, a, tag_rule("rule2"));
    save(service, txn, b, inheritable("rule3"));
    save(service, txn, b, tag_rule("rule4"));
    save(service, txn, c, tag_rule("rule5"));
    save(service, txn, c, tag_rule("rule6"));
    Chain { a, b, c }
}

// =============================================================================
// Basic Inheritance
// =============================================================================

#[test]
fn inherited_rules_come_before_own_rules() {
    let (repo, service) = setup();
    let mut txn = repo.begin_system();
    let Chain { a, b, c } = chain(&service, &mut txn, repo.root());

    assert_eq!(titles(&service.rules(&txn, a).unwrap()), ["rule1", "rule2"]);
    assert_eq!(titles(&service.rules(&txn, b).unwrap()), ["rule1", "rule3", "rule4"]);
    assert_eq!(
        titles(&service.rules(&txn, c).unwrap()),
        ["rule1", "rule3", "rule5", "rule6"]
    );
}

#[test]
fn own_rules_only() {
    let (repo, service) = setup();
    let mut txn = repo.begin_system();
    let Chain { c, .. } = chain(&service, &mut txn, repo.root());

    let own = service.rules_with(&txn, c, false, None).unwrap();
    assert_eq!(titles(&own), ["rule5", "rule6"]);
}

#[test]
fn ignore_aspect_cuts_inheritance_above_the_node() {
    let (repo, service) = setup();
    let mut txn = repo.begin_system();
    let Chain { b, c, .. } = chain(&service, &mut txn, repo.root());
    txn.add_aspect(b, aspects::IGNORE_INHERITED_RULES).unwrap();

    assert_eq!(titles(&service.rules(&txn, b).unwrap()), ["rule3", "rule4"]);
    assert_eq!(titles(&service.rules(&txn, c).unwrap()), ["rule3", "rule5", "rule6"]);
}

#[test]
fn cached_and_uncached_resolution_agree() {
    let (cached_repo, cached) = setup();
    let (plain_repo, plain) = setup_with(EngineConfig::default().with_cache(false));

    let mut txn = cached_repo.begin_system();
    let Chain { c, .. } = chain(&cached, &mut txn, cached_repo.root());
    let uncommitted = cached.rules(&txn, c).unwrap();
    assert_eq!(cached.rule_store().cached_len(), 0);
    txn.commit().unwrap();

    let txn = cached_repo.begin_system();
    let first = cached.rules(&txn, c).unwrap();
    assert_eq!(cached.rule_store().cached_len(), 3);
    assert_eq!(titles(&first), titles(&uncommitted));

    let mut other = plain_repo.begin_system();
    let Chain { c: c2, .. } = chain(&plain, &mut other, plain_repo.root());
    other.commit().unwrap();
    let other = plain_repo.begin_system();
    let second = plain.rules(&other, c2).unwrap();
    assert_eq!(plain.rule_store().cached_len(), 0);

    assert_eq!(titles(&first), titles(&second));
}

// =============================================================================
// Graph Shapes
// =============================================================================

#[test]
fn fan_in_yields_each_rule_once() {
    let (repo, service) = setup();
    let mut txn = repo.begin_system();
    let g = folder(&mut txn, repo.root(), "g");
    let p1 = folder(&mut txn, g, "p1");
    let p2 = folder(&mut txn, g, "p2");
    let c = folder(&mut txn, p1, "c");
    txn.add_child(p2, c, AssocType::Contains).unwrap();

    save(&service, &mut txn, g, inheritable("grand"));
    save(&service, &mut txn, p1, inheritable("left"));
    save(&service, &mut txn, p2, inheritable("right"));
    save(&service, &mut txn, c, tag_rule("own"));

    assert_eq!(
        titles(&service.rules(&txn, c).unwrap()),
        ["grand", "left", "right", "own"]
    );
}

#[test]
fn cycles_terminate() {
    let (repo, service) = setup();
    let mut txn = repo.begin_system();
    let a = folder(&mut txn, repo.root(), "a");
    let b = folder(&mut txn, a, "b");
    txn.add_child(b, a, AssocType::Contains).unwrap();

    save(&service, &mut txn, a, inheritable("from-a"));
    save(&service, &mut txn, b, inheritable("from-b"));

    let for_a = service.rules(&txn, a).unwrap();
    let for_b = service.rules(&txn, b).unwrap();
    assert_eq!(titles(&for_a), ["from-a", "from-b"]);
    assert_eq!(titles(&for_b), ["from-b", "from-a"]);
}

#[test]
fn secondary_rule_folder_edges_are_not_inheritance() {
    let (repo, service) = setup();
    let mut txn = repo.begin_system();
    let a = folder(&mut txn, repo.root(), "a");
    let b = folder(&mut txn, repo.root(), "b");
    let child = folder(&mut txn, b, "child");
    save(&service, &mut txn, a, inheritable("shared"));
    service.link_rules(&mut txn, b, a).unwrap();

    assert_eq!(titles(&service.rules(&txn, b).unwrap()), ["shared"]);
    assert_eq!(titles(&service.rules(&txn, child).unwrap()), ["shared"]);
    assert!(service.rules(&txn, repo.root()).unwrap().is_empty());
}

#[test]
fn type_filter_applies_last() {
    let (repo, service) = setup();
    let mut txn = repo.begin_system();
    let parent = folder(&mut txn, repo.root(), "parent");
    let child = folder(&mut txn, parent, "child");

    let mut outbound = inheritable("leaving");
    outbound.rule_types = vec![rule_types::OUTBOUND];
    save(&service, &mut txn, parent, outbound);
    save(&service, &mut txn, parent, inheritable("arriving"));
    save(
        &service,
        &mut txn,
        child,
        tag_rule("both").with_rule_type(rule_types::OUTBOUND),
    );

    let out = service
        .rules_with(&txn, child, true, Some(&rule_types::OUTBOUND))
        .unwrap();
    assert_eq!(titles(&out), ["leaving", "both"]);

    let inbound = service
        .rules_with(&txn, child, true, Some(&rule_types::INBOUND))
        .unwrap();
    assert_eq!(titles(&inbound), ["arriving", "both"]);
}

#[test]
fn resolution_is_repeatable() {
    let (repo, service) = setup();
    let mut txn = repo.begin_system();
    let Chain { c, .. } = chain(&service, &mut txn, repo.root());

    let first = service.rules(&txn, c).unwrap();
    let second = service.rules(&txn, c).unwrap();
    assert_eq!(first, second);
    assert_eq!(titles(&first), titles(&second));
}

// =============================================================================
// Property-Based Tests
// =============================================================================

/// Returns true if `ancestor` reaches `node` through `Contains` edges.
fn is_ancestor(edges: &[(usize, usize)], ancestor: usize, node: usize) -> bool {
    let mut stack = vec![node];
    let mut seen = vec![node];
    while let Some(current) = stack.pop() {
        for &(parent, child) in edges {
            if child != current {
                continue;
            }
            if parent == ancestor {
                return true;
            }
            if !seen.contains(&parent) {
                seen.push(parent);
                stack.push(parent);
            }
        }
    }
    false
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Every node sees exactly its own rule plus the rules of every node
    /// that can reach it, whatever cycles the graph has.
    #[test]
    fn effective_rules_match_ancestor_reachability(
        size in 2usize..7,
        extra in prop::collection::vec((0usize..7, 0usize..7), 0..12),
    ) {
        let (repo, service) = setup();
        let mut txn = repo.begin_system();

        let nodes: Vec<NodeId> = (0..size)
            .map(|i| folder(&mut txn, repo.root(), &format!("n{i}")))
            .collect();
        let edges: Vec<(usize, usize)> = extra
            .into_iter()
            .filter(|&(p, c)| p < size && c < size && p != c)
            .collect();
        for &(p, c) in &edges {
            txn.add_child(nodes[p], nodes[c], AssocType::Contains).unwrap();
        }
        for (i, &node) in nodes.iter().enumerate() {
            save(&service, &mut txn, node, inheritable(&format!("r{i}")));
        }

        for (k, &node) in nodes.iter().enumerate() {
            let mut got: Vec<String> = service
                .rules(&txn, node)
                .unwrap()
                .into_iter()
                .map(|r| r.title)
                .collect();
            let count = got.len();
            got.sort();
            got.dedup();
            prop_assert_eq!(count, got.len(), "duplicate rules for n{}", k);

            let mut expected: Vec<String> = (0..size)
                .filter(|&i| i == k || is_ancestor(&edges, i, k))
                .map(|i| format!("r{i}"))
                .collect();
            expected.sort();
            prop_assert_eq!(got, expected);

            let own = service.rules_with(&txn, node, false, None).unwrap();
            let own_title = format!("r{k}");
            prop_assert_eq!(titles(&own), vec![own_title.as_str()]);
        }
    }
}
