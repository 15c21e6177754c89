//! Cycle trigger evaluation.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::common::{Error, Result};
use crate::policy::window::{millis, to_millis, Window};

/// Trigger deciding when the active file is sealed into an artifact.
///
/// Evaluated against the counters accumulated since the active file was
/// opened, after every record and on every timer tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CycleTrigger {
    /// Only explicit `cycle()` calls and `close()` seal the active file.
    Never,

    /// Seal once the active file holds at least `bytes` bytes.
    Size {
        /// Size threshold in bytes.
        bytes: u64,
    },

    /// Seal once the active file has been open for `millis` milliseconds.
    Age {
        /// Interval in milliseconds.
        millis: u64,
    },

    /// Seal once the active file holds at least `records` records.
    Count {
        /// Record threshold.
        records: u64,
    },

    /// Seal on whichever nested trigger fires first.
    Any {
        /// Nested triggers.
        triggers: Vec<CycleTrigger>,
    },
}

impl Default for CycleTrigger {
    fn default() -> Self {
        CycleTrigger::Never
    }
}

impl CycleTrigger {
    pub fn size_based(bytes: u64) -> Self {
        CycleTrigger::Size { bytes }
    }

    pub fn age_based(interval: Duration) -> Self {
        CycleTrigger::Age {
            millis: to_millis(interval),
        }
    }

    pub fn count_based(records: u64) -> Self {
        CycleTrigger::Count { records }
    }

    pub fn any(triggers: impl IntoIterator<Item = CycleTrigger>) -> Self {
        CycleTrigger::Any {
            triggers: triggers.into_iter().collect(),
        }
    }

    /// Evaluate the trigger against the counters since the file was opened.
    ///
    /// A zero-byte active file is never cycled, whatever the trigger says.
    pub fn should_cycle(&self, since_open: &Window) -> bool {
        if since_open.bytes == 0 {
            return false;
        }
        self.fires(since_open)
    }

    fn fires(&self, window: &Window) -> bool {
        match self {
            CycleTrigger::Never => false,
            CycleTrigger::Size { bytes } => window.bytes >= *bytes,
            CycleTrigger::Age { millis: interval } => window.elapsed >= millis(*interval),
            CycleTrigger::Count { records } => window.records >= *records,
            CycleTrigger::Any { triggers } => triggers.iter().any(|trigger| trigger.fires(window)),
        }
    }

    /// Whether the trigger can fire without a new record arriving.
    pub fn is_time_based(&self) -> bool {
        match self {
            CycleTrigger::Age { .. } => true,
            CycleTrigger::Any { triggers } => triggers.iter().any(CycleTrigger::is_time_based),
            _ => false,
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            CycleTrigger::Never => Ok(()),
            CycleTrigger::Size { bytes: 0 } => {
                Err(Error::Config("cycle size must be non-zero".to_string()))
            }
            CycleTrigger::Age { millis: 0 } => {
                Err(Error::Config("cycle interval must be non-zero".to_string()))
            }
            CycleTrigger::Count { records: 0 } => {
                Err(Error::Config("cycle record count must be non-zero".to_string()))
            }
            CycleTrigger::Size { .. } | CycleTrigger::Age { .. } | CycleTrigger::Count { .. } => {
                Ok(())
            }
            CycleTrigger::Any { triggers } if triggers.is_empty() => Err(Error::Config(
                "combined cycle trigger needs at least one trigger".to_string(),
            )),
            CycleTrigger::Any { triggers } => triggers.iter().try_for_each(CycleTrigger::validate),
        }
    }
}
