use std::time::Duration;

/// Counters a policy is evaluated against.
///
/// For cycle triggers the window starts when the active file was opened; for
/// flush policies it starts at the last flush.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Window {
    /// Bytes appended during the window.
    pub bytes: u64,
    /// Records appended during the window.
    pub records: u64,
    /// Wall time since the window started.
    pub elapsed: Duration,
}

impl Window {
    pub fn new(bytes: u64, records: u64, elapsed: Duration) -> Self {
        Self {
            bytes,
            records,
            elapsed,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bytes == 0 && self.records == 0
    }
}

/// Converts a serialized millisecond interval into a `Duration`.
pub(crate) fn millis(value: u64) -> Duration {
    Duration::from_millis(value)
}

/// Converts a `Duration` into whole milliseconds, saturating.
pub(crate) fn to_millis(value: Duration) -> u64 {
    u64::try_from(value.as_millis()).unwrap_or(u64::MAX)
}
