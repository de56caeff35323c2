//! Per-transaction rule state.
//!
//! Everything the engine tracks for one transaction lives in
//! [`RuleContext`], carried as the transaction's extension. Dropping the
//! transaction drops the state, whichever way it ends.

use trellis_storage::{Repository, Transaction};

use crate::dedup::ExecutedRules;
use crate::gate::LocalGates;
use crate::pending::PendingQueue;

/// A repository whose transactions carry a [`RuleContext`].
pub type RuleRepository = Repository<RuleContext>;

/// A transaction carrying a [`RuleContext`].
pub type RuleTransaction<'r> = Transaction<'r, RuleContext>;

/// Rule state owned by one transaction.
#[derive(Debug, Default)]
pub struct RuleContext {
    /// Transaction-local suppression switches.
    pub gates: LocalGates,
    /// Executions waiting for the pre-commit drain.
    pub pending: PendingQueue,
    /// Executions already performed.
    pub executed: ExecutedRules,
    pub(crate) draining: bool,
    pub(crate) rules_changed: bool,
}

impl RuleContext {
    /// Returns true while the pending queue is being drained.
    #[must_use]
    pub fn is_draining(&self) -> bool {
        self.draining
    }

    /// Returns true once the transaction has written rule metadata.
    ///
    /// Such a transaction reads rules from its working copy only and never
    /// through the shared cache.
    #[must_use]
    pub fn has_rule_changes(&self) -> bool {
        self.rules_changed
    }
}
