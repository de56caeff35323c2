//! Error taxonomy and context tests

use trellis_foundation::{Error, ErrorCategory, ErrorContext, ErrorKind, NodeId, SemanticLimit};

#[test]
fn every_kind_has_a_category() {
    let node = NodeId::new(3, 1);
    let cases = [
        (Error::node_not_found(node), ErrorCategory::Validation),
        (Error::stale_node(node), ErrorCategory::Validation),
        (Error::validation("bad"), ErrorCategory::Validation),
        (Error::new(ErrorKind::MultipleRuleFolders(node)), ErrorCategory::Validation),
        (Error::new(ErrorKind::Codec("eof".into())), ErrorCategory::Validation),
        (Error::access_denied(node, "Read"), ErrorCategory::Authorization),
        (Error::rules_linked(node), ErrorCategory::DomainState),
        (Error::action_failed("copy", "boom"), ErrorCategory::Execution),
        (
            Error::limit_exceeded(SemanticLimit::MaxDrainPasses { limit: 3 }),
            ErrorCategory::Limit,
        ),
        (Error::internal("oops"), ErrorCategory::Internal),
    ];
    for (err, category) in cases {
        assert_eq!(err.category(), category, "{err}");
    }
}

#[test]
fn display_uses_kind() {
    let err = Error::action_failed("copy", "destination missing");
    assert_eq!(err.to_string(), "action copy failed: destination missing");
}

#[test]
fn context_is_carried() {
    let node = NodeId::new(7, 3);
    let err = Error::action_failed("copy", "boom").with_context(
        ErrorContext::new()
            .with_rule("archive")
            .with_node(node)
            .with_frame("drain pass 2"),
    );
    let context = err.context.as_ref().unwrap();
    assert_eq!(context.rule.as_deref(), Some("archive"));
    assert_eq!(context.node, Some(node));
    assert_eq!(context.stack, vec!["drain pass 2".to_string()]);
}

#[test]
fn limit_messages_name_the_limit() {
    let err = Error::limit_exceeded(SemanticLimit::MaxExecutions {
        limit: 10,
        context: Some("rule tag".into()),
    });
    let message = err.to_string();
    assert!(message.contains("10"), "{message}");
}
