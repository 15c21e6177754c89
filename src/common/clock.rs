use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// A source of wall-clock timestamps for the writer.
///
/// Timestamps drive the time-based flush and cycle triggers, artifact
/// creation times and age-based retention.
pub trait Clock: Send + Sync + 'static {
    /// Returns the current timestamp in nanoseconds since the UNIX epoch.
    fn now(&self) -> u64;
}

/// A clock that uses `std::time::SystemTime`.
///
/// Susceptible to NTP adjustments. A clock before the epoch reads as zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX))
            .unwrap_or(0)
    }
}

/// A clock backed by the CPU's Time-Stamp Counter via the `quanta` crate.
///
/// Anchored to `SystemTime` when created, then advanced by TSC ticks so it
/// never steps backwards.
#[cfg(feature = "tsc-clock")]
#[derive(Debug, Clone)]
pub struct QuantaClock {
    clock: quanta::Clock,
    start_wall_ns: u64,
    start_instant: quanta::Instant,
}

#[cfg(feature = "tsc-clock")]
impl Default for QuantaClock {
    fn default() -> Self {
        let clock = quanta::Clock::new();
        let start_instant = clock.now();
        Self {
            clock,
            start_wall_ns: SystemClock.now(),
            start_instant,
        }
    }
}

#[cfg(feature = "tsc-clock")]
impl QuantaClock {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(feature = "tsc-clock")]
impl Clock for QuantaClock {
    fn now(&self) -> u64 {
        let delta = self.clock.now().duration_since(self.start_instant);
        self.start_wall_ns
            .saturating_add(u64::try_from(delta.as_nanos()).unwrap_or(u64::MAX))
    }
}

/// A settable clock shared between the writer and its host.
///
/// Clones observe the same time. Used to drive time-based triggers
/// deterministically.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    nanos: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(start_ns: u64) -> Self {
        Self {
            nanos: Arc::new(AtomicU64::new(start_ns)),
        }
    }

    pub fn set(&self, now_ns: u64) {
        self.nanos.store(now_ns, Ordering::Release);
    }

    pub fn advance(&self, by: Duration) {
        let by = u64::try_from(by.as_nanos()).unwrap_or(u64::MAX);
        self.nanos.fetch_add(by, Ordering::AcqRel);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> u64 {
        self.nanos.load(Ordering::Acquire)
    }
}
