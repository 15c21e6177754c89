//! Notifications delivered to the host.

use std::path::Path;

use crate::common::Error;
use crate::ledger::FinalizedArtifact;

/// Something the host may want to log or count.
///
/// Failures that are not returned to a caller (timer-driven work, retention
/// deletions, cycles triggered inside `write`) are always delivered here.
#[derive(Debug)]
pub enum CycleEvent<'a> {
    /// A new artifact was produced and added to the ledger.
    Cycled(&'a FinalizedArtifact),
    /// Finalization failed; the active file is kept and still appendable.
    CycleFailed { active: &'a Path, error: &'a Error },
    /// Flushing, reopening or cleaning up the active file failed outside a
    /// caller's request.
    ActiveFileFailed { active: &'a Path, error: &'a Error },
    /// Retention deleted an artifact.
    Deleted(&'a FinalizedArtifact),
    /// Retention could not delete an artifact; it was dropped from the ledger.
    DeleteFailed {
        artifact: &'a FinalizedArtifact,
        error: &'a Error,
    },
}

impl CycleEvent<'_> {
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            CycleEvent::CycleFailed { .. }
                | CycleEvent::ActiveFileFailed { .. }
                | CycleEvent::DeleteFailed { .. }
        )
    }
}

/// Host callback invoked with every [`CycleEvent`], under the writer lock.
pub type EventListener = Box<dyn FnMut(&CycleEvent<'_>) + Send>;
