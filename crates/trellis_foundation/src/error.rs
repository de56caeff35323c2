//! Error types for the Trellis system.
//!
//! Uses `thiserror` for ergonomic error definition with rich context.

use std::fmt;

use thiserror::Error;

use crate::node::NodeId;

/// The main error type for Trellis operations.
#[derive(Debug, Error)]
#[error("{kind}")]
pub struct Error {
    /// The kind of error that occurred.
    pub kind: ErrorKind,
    /// Optional context about where the error occurred.
    pub context: Option<ErrorContext>,
}

impl Error {
    /// Creates a new error with the given kind.
    #[must_use]
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            context: None,
        }
    }

    /// Adds context to this error.
    #[must_use]
    pub fn with_context(mut self, context: ErrorContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Creates a node not found error.
    #[must_use]
    pub fn node_not_found(id: NodeId) -> Self {
        Self::new(ErrorKind::NodeNotFound(id))
    }

    /// Creates a stale node reference error.
    #[must_use]
    pub fn stale_node(id: NodeId) -> Self {
        Self::new(ErrorKind::StaleNode(id))
    }

    /// Creates a validation error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation(message.into()))
    }

    /// Creates an access denied error.
    #[must_use]
    pub fn access_denied(node: NodeId, permission: impl Into<String>) -> Self {
        Self::new(ErrorKind::AccessDenied {
            node,
            permission: permission.into(),
        })
    }

    /// Creates a "rules are linked" error.
    #[must_use]
    pub fn rules_linked(node: NodeId) -> Self {
        Self::new(ErrorKind::RulesLinked(node))
    }

    /// Creates an action failure error.
    #[must_use]
    pub fn action_failed(action: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ActionFailed {
            action: action.into(),
            message: message.into(),
        })
    }

    /// Creates a semantic limit exceeded error.
    #[must_use]
    pub fn limit_exceeded(limit: SemanticLimit) -> Self {
        Self::new(ErrorKind::LimitExceeded(limit))
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal(message.into()))
    }

    /// Returns the broad category of this error.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        self.kind.category()
    }
}

/// Categorized error kinds for pattern matching.
#[derive(Debug, Error)]
pub enum ErrorKind {
    /// Node was not found in storage.
    #[error("node not found: {0:?}")]
    NodeNotFound(NodeId),

    /// Node reference is stale (generation mismatch).
    #[error("stale node reference: {0:?}")]
    StaleNode(NodeId),

    /// Input failed validation (e.g. a rule without an action).
    #[error("validation failed: {0}")]
    Validation(String),

    /// The current principal lacks a permission on a node.
    #[error("access denied: {permission} on {node:?}")]
    AccessDenied {
        /// The node that was checked.
        node: NodeId,
        /// The permission that was required.
        permission: String,
    },

    /// The node borrows another node's rules and cannot be edited directly.
    #[error("rules are linked: {0:?}")]
    RulesLinked(NodeId),

    /// The node has more than one rule folder association.
    #[error("node {0:?} has more than one rule folder")]
    MultipleRuleFolders(NodeId),

    /// An action raised an error while executing.
    #[error("action {action} failed: {message}")]
    ActionFailed {
        /// The action name.
        action: String,
        /// What went wrong.
        message: String,
    },

    /// Encoding or decoding persisted data failed.
    #[error("codec error: {0}")]
    Codec(String),

    /// Semantic limit exceeded (kill switch triggered).
    #[error("limit exceeded: {0}")]
    LimitExceeded(SemanticLimit),

    /// Internal error (should not happen).
    #[error("internal error: {0}")]
    Internal(String),
}

impl ErrorKind {
    /// Returns the broad category of this error kind.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NodeNotFound(_)
            | Self::StaleNode(_)
            | Self::Validation(_)
            | Self::MultipleRuleFolders(_)
            | Self::Codec(_) => ErrorCategory::Validation,
            Self::AccessDenied { .. } => ErrorCategory::Authorization,
            Self::RulesLinked(_) => ErrorCategory::DomainState,
            Self::ActionFailed { .. } => ErrorCategory::Execution,
            Self::LimitExceeded(_) => ErrorCategory::Limit,
            Self::Internal(_) => ErrorCategory::Internal,
        }
    }
}

/// Broad error categories surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Bad input or corrupt structure. Never retried.
    Validation,
    /// Insufficient permission. Never retried.
    Authorization,
    /// Operation not allowed in the node's current state.
    DomainState,
    /// An action failed; the enclosing transaction rolls back.
    Execution,
    /// A kill switch tripped.
    Limit,
    /// A bug.
    Internal,
}

/// Semantic limits (kill switches) that can be exceeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SemanticLimit {
    /// Maximum drain passes per commit exceeded.
    MaxDrainPasses {
        /// The configured limit.
        limit: u32,
    },
    /// Maximum rule executions per transaction exceeded.
    MaxExecutions {
        /// The configured limit.
        limit: u32,
        /// Additional context about which rule tripped the limit.
        context: Option<String>,
    },
}

impl fmt::Display for SemanticLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MaxDrainPasses { limit } => {
                write!(f, "max drain passes ({limit}) exceeded")
            }
            Self::MaxExecutions { limit, context } => {
                write!(f, "max rule executions ({limit}) exceeded")?;
                if let Some(ctx) = context {
                    write!(f, ": {ctx}")?;
                }
                Ok(())
            }
        }
    }
}

/// Context about where an error occurred.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    /// Title of the rule being executed.
    pub rule: Option<String>,
    /// Node the rule was acting on.
    pub node: Option<NodeId>,
    /// Stack of operations that led here.
    pub stack: Vec<String>,
}

impl ErrorContext {
    /// Creates a new empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the rule title.
    #[must_use]
    pub fn with_rule(mut self, rule: impl Into<String>) -> Self {
        self.rule = Some(rule.into());
        self
    }

    /// Sets the actioned-upon node.
    #[must_use]
    pub fn with_node(mut self, node: NodeId) -> Self {
        self.node = Some(node);
        self
    }

    /// Adds a stack frame.
    #[must_use]
    pub fn with_frame(mut self, frame: impl Into<String>) -> Self {
        self.stack.push(frame.into());
        self
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(rule) = &self.rule {
            write!(f, "in rule {rule:?}")?;
        }
        if let Some(node) = self.node {
            write!(f, " on {node}")?;
        }
        if !self.stack.is_empty() {
            writeln!(f)?;
            for frame in &self.stack {
                writeln!(f, "  in {frame}")?;
            }
        }
        Ok(())
    }
}
