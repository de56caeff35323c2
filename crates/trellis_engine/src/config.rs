//! Engine configuration.
//!
//! Controls the global rule switch, the rule cache, the drain kill switches,
//! and what happens when a single rule's action fails.

use serde::{Deserialize, Serialize};

/// What the drain does when one pending execution fails.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Abort the drain and fail the commit.
    #[default]
    Propagate,
    /// Undo the failing rule's changes, log, and keep draining.
    ///
    /// Only execution failures are isolated; limit and validation
    /// errors still propagate.
    Isolate,
}

/// Configuration for a [`RuleService`](crate::RuleService).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Initial state of the global rule switch.
    pub rules_enabled: bool,
    /// Cache raw rule lists per node.
    pub cache_enabled: bool,
    /// Maximum queue snapshots taken by one drain.
    pub max_drain_passes: u32,
    /// Maximum rule executions recorded in one transaction.
    pub max_executions: u32,
    /// Behavior when a rule's action fails during the drain.
    pub failure_policy: FailurePolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            rules_enabled: true,
            cache_enabled: true,
            max_drain_passes: 1_000,
            max_executions: 10_000,
            failure_policy: FailurePolicy::Propagate,
        }
    }
}

impl EngineConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A configuration that logs and skips failing rules instead of
    /// aborting the commit.
    #[must_use]
    pub fn lenient() -> Self {
        Self {
            failure_policy: FailurePolicy::Isolate,
            ..Self::default()
        }
    }

    /// Sets the initial global rule switch.
    #[must_use]
    pub fn with_rules_enabled(mut self, enabled: bool) -> Self {
        self.rules_enabled = enabled;
        self
    }

    /// Enables or disables the rule cache.
    #[must_use]
    pub fn with_cache(mut self, enabled: bool) -> Self {
        self.cache_enabled = enabled;
        self
    }

    /// Sets the drain pass limit.
    #[must_use]
    pub fn with_max_drain_passes(mut self, limit: u32) -> Self {
        self.max_drain_passes = limit;
        self
    }

    /// Sets the per-transaction execution limit.
    #[must_use]
    pub fn with_max_executions(mut self, limit: u32) -> Self {
        self.max_executions = limit;
        self
    }

    /// Sets the failure policy.
    #[must_use]
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }
}
