//! Retention policy evaluation.

use std::collections::BTreeSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::common::{Error, Result};
use crate::ledger::RetentionLedger;
use crate::policy::window::{millis, to_millis};

/// Policy deciding which finalized artifacts are deleted.
///
/// Evaluated after every new artifact, and on timer ticks when an age limit
/// is configured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RetentionPolicy {
    /// Keep everything.
    None,

    /// Keep at most `files` artifacts.
    MaxCount {
        /// Artifacts to keep.
        files: usize,
    },

    /// Keep the newest artifacts whose combined size fits in `bytes`.
    /// The newest artifact is always kept.
    MaxAggregateSize {
        /// Byte budget across all retained artifacts.
        bytes: u64,
    },

    /// Delete artifacts older than `millis` milliseconds.
    MaxAge {
        /// Maximum age in milliseconds.
        millis: u64,
    },

    /// Apply every nested policy; an artifact is deleted if any selects it.
    All {
        /// Nested policies.
        policies: Vec<RetentionPolicy>,
    },
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        RetentionPolicy::None
    }
}

impl RetentionPolicy {
    pub fn file_count_based(files: usize) -> Self {
        RetentionPolicy::MaxCount { files }
    }

    pub fn aggregate_size_based(bytes: u64) -> Self {
        RetentionPolicy::MaxAggregateSize { bytes }
    }

    pub fn age_based(max_age: Duration) -> Self {
        RetentionPolicy::MaxAge {
            millis: to_millis(max_age),
        }
    }

    pub fn all(policies: impl IntoIterator<Item = RetentionPolicy>) -> Self {
        RetentionPolicy::All {
            policies: policies.into_iter().collect(),
        }
    }

    /// Select the ledger entries to delete.
    ///
    /// Returns ascending, deduplicated ledger indices.
    pub fn sweep(&self, ledger: &RetentionLedger, now_ns: u64) -> Vec<usize> {
        let mut marked = BTreeSet::new();
        self.mark(ledger, now_ns, &mut marked);
        marked.into_iter().collect()
    }

    fn mark(&self, ledger: &RetentionLedger, now_ns: u64, marked: &mut BTreeSet<usize>) {
        match self {
            RetentionPolicy::None => {}
            RetentionPolicy::MaxCount { files } => {
                let excess = ledger.len().saturating_sub(*files);
                marked.extend(0..excess);
            }
            RetentionPolicy::MaxAggregateSize { bytes } => {
                let newest = ledger.len().saturating_sub(1);
                let mut total = ledger.total_bytes();
                for (index, artifact) in ledger.iter().enumerate() {
                    if total <= *bytes || index == newest {
                        break;
                    }
                    total = total.saturating_sub(artifact.size);
                    marked.insert(index);
                }
            }
            RetentionPolicy::MaxAge { millis: max_age } => {
                let max_age = millis(*max_age);
                for (index, artifact) in ledger.iter().enumerate() {
                    if artifact.age(now_ns) > max_age {
                        marked.insert(index);
                    }
                }
            }
            RetentionPolicy::All { policies } => {
                for policy in policies {
                    policy.mark(ledger, now_ns, marked);
                }
            }
        }
    }

    /// Whether artifacts can expire without a new artifact being produced.
    pub fn has_age_limit(&self) -> bool {
        match self {
            RetentionPolicy::MaxAge { .. } => true,
            RetentionPolicy::All { policies } => policies.iter().any(RetentionPolicy::has_age_limit),
            _ => false,
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            RetentionPolicy::None => Ok(()),
            RetentionPolicy::MaxCount { files: 0 } => {
                Err(Error::Config("retained file count must be non-zero".to_string()))
            }
            RetentionPolicy::MaxAggregateSize { bytes: 0 } => {
                Err(Error::Config("retained byte budget must be non-zero".to_string()))
            }
            RetentionPolicy::MaxAge { millis: 0 } => {
                Err(Error::Config("retention age must be non-zero".to_string()))
            }
            RetentionPolicy::MaxCount { .. }
            | RetentionPolicy::MaxAggregateSize { .. }
            | RetentionPolicy::MaxAge { .. } => Ok(()),
            RetentionPolicy::All { policies } => {
                policies.iter().try_for_each(RetentionPolicy::validate)
            }
        }
    }
}
