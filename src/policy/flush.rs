//! Flush policy evaluation.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::common::{Error, Result};
use crate::policy::window::{millis, to_millis, Window};

/// Policy deciding when buffered bytes are forced durable to the active file.
///
/// Flushing never closes the file. Evaluated after every record and on every
/// timer tick against the counters accumulated since the previous flush.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum FlushPolicy {
    /// Flush only when the write buffer fills or the file is sealed.
    Implicit,

    /// Flush after every `records` records.
    Count {
        /// Records between flushes.
        records: u64,
    },

    /// Flush pending data once `millis` milliseconds have passed since the
    /// last flush. After an idle period the next record flushes at once.
    Interval {
        /// Flush period in milliseconds.
        millis: u64,
    },

    /// Flush when any of the nested policies asks for it.
    Any {
        /// Nested policies.
        policies: Vec<FlushPolicy>,
    },
}

impl Default for FlushPolicy {
    fn default() -> Self {
        FlushPolicy::Implicit
    }
}

impl FlushPolicy {
    pub fn count_based(records: u64) -> Self {
        FlushPolicy::Count { records }
    }

    pub fn interval(period: Duration) -> Self {
        FlushPolicy::Interval {
            millis: to_millis(period),
        }
    }

    pub fn any(policies: impl IntoIterator<Item = FlushPolicy>) -> Self {
        FlushPolicy::Any {
            policies: policies.into_iter().collect(),
        }
    }

    /// Evaluate the policy against the counters since the last flush.
    ///
    /// Nothing pending never requires a flush.
    pub fn should_flush(&self, since_flush: &Window) -> bool {
        if since_flush.is_empty() {
            return false;
        }
        self.fires(since_flush)
    }

    fn fires(&self, window: &Window) -> bool {
        match self {
            FlushPolicy::Implicit => false,
            FlushPolicy::Count { records } => window.records >= *records,
            FlushPolicy::Interval { millis: period } => window.elapsed >= millis(*period),
            FlushPolicy::Any { policies } => policies.iter().any(|policy| policy.fires(window)),
        }
    }

    /// Whether the policy can fire without a new record arriving.
    pub fn is_time_based(&self) -> bool {
        match self {
            FlushPolicy::Interval { .. } => true,
            FlushPolicy::Any { policies } => policies.iter().any(FlushPolicy::is_time_based),
            _ => false,
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            FlushPolicy::Implicit => Ok(()),
            FlushPolicy::Count { records: 0 } => {
                Err(Error::Config("flush record count must be non-zero".to_string()))
            }
            FlushPolicy::Interval { millis: 0 } => {
                Err(Error::Config("flush interval must be non-zero".to_string()))
            }
            FlushPolicy::Count { .. } | FlushPolicy::Interval { .. } => Ok(()),
            FlushPolicy::Any { policies } => policies.iter().try_for_each(FlushPolicy::validate),
        }
    }
}
