//! Writer configuration.
//!
//! Built once, validated before anything touches the filesystem, and then
//! only read.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::common::{Error, IoContext, Result};
use crate::finalize::FinalizationStrategy;
use crate::naming::NamingScheme;
use crate::policy::{millis, to_millis, CycleTrigger, FlushPolicy, RetentionPolicy};

const DEFAULT_TICK_MS: u64 = 250;
const DEFAULT_BUFFER_CAPACITY: usize = 64 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriterConfig {
    /// Directory plus base file name the active and final names derive from.
    pub base_path: PathBuf,

    /// When buffered writes are forced durable.
    /// Default: implicit
    #[serde(default)]
    pub flush: FlushPolicy,

    /// When the active file is sealed.
    /// Default: never (explicit cycles and close only)
    #[serde(default)]
    pub cycle: CycleTrigger,

    /// Which artifacts are deleted after each cycle.
    /// Default: keep everything
    #[serde(default)]
    pub retention: RetentionPolicy,

    /// How the active file becomes an artifact.
    /// Default: rename
    #[serde(default)]
    pub finalization: FinalizationStrategy,

    /// Period of the background timer re-evaluating time-based policies.
    /// Default: 250 ms
    #[serde(default = "default_tick_ms")]
    pub tick_interval_ms: u64,

    /// Capacity of the write buffer in front of the active file.
    /// Default: 64 KB
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,

    /// Let an explicit `cycle()` seal a zero-byte active file.
    /// Default: false
    #[serde(default)]
    pub allow_empty_forced_cycle: bool,

    /// Adopt artifacts and a leftover active file found on open.
    /// Default: true
    #[serde(default = "default_true")]
    pub recover_on_open: bool,
}

fn default_tick_ms() -> u64 {
    DEFAULT_TICK_MS
}

fn default_buffer_capacity() -> usize {
    DEFAULT_BUFFER_CAPACITY
}

fn default_true() -> bool {
    true
}

impl WriterConfig {
    /// Implicit flush, no automatic cycling, no retention, rename on seal.
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            flush: FlushPolicy::default(),
            cycle: CycleTrigger::default(),
            retention: RetentionPolicy::default(),
            finalization: FinalizationStrategy::default(),
            tick_interval_ms: DEFAULT_TICK_MS,
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            allow_empty_forced_cycle: false,
            recover_on_open: true,
        }
    }

    /// Same as [`new`](Self::new) but sealing into zip archives.
    pub fn compressed(base_path: impl Into<PathBuf>) -> Self {
        Self {
            finalization: FinalizationStrategy::compressed(),
            ..Self::new(base_path)
        }
    }

    pub fn with_flush(mut self, flush: FlushPolicy) -> Self {
        self.flush = flush;
        self
    }

    pub fn with_cycle(mut self, cycle: CycleTrigger) -> Self {
        self.cycle = cycle;
        self
    }

    pub fn with_retention(mut self, retention: RetentionPolicy) -> Self {
        self.retention = retention;
        self
    }

    pub fn with_finalization(mut self, finalization: FinalizationStrategy) -> Self {
        self.finalization = finalization;
        self
    }

    pub fn with_tick_interval(mut self, tick: Duration) -> Self {
        self.tick_interval_ms = to_millis(tick);
        self
    }

    pub fn tick_interval(&self) -> Duration {
        millis(self.tick_interval_ms)
    }

    /// Whether any policy needs the background timer.
    pub fn needs_timer(&self) -> bool {
        self.flush.is_time_based() || self.cycle.is_time_based() || self.retention.has_age_limit()
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: WriterConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).at("read", path)?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<()> {
        NamingScheme::new(&self.base_path)?;
        self.flush.validate()?;
        self.cycle.validate()?;
        self.retention.validate()?;
        self.finalization.validate()?;
        if self.tick_interval_ms == 0 {
            return Err(Error::Config("tick interval must be non-zero".to_string()));
        }
        if self.buffer_capacity == 0 {
            return Err(Error::Config("buffer capacity must be non-zero".to_string()));
        }
        Ok(())
    }
}
