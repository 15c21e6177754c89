//! Rolling file writer.
//!
//! Records are appended to a hidden active file (`.<base>`). When a cycle
//! trigger fires (size, age, record count, a record predicate or an explicit
//! request) the active file is sealed into a timestamped final artifact,
//! optionally zip-compressed, and a retention policy prunes older artifacts.
//!
//! ```no_run
//! use rollfile::{CycleTrigger, RetentionPolicy, RollingWriter, WriterConfig};
//!
//! # fn main() -> rollfile::Result<()> {
//! let config = WriterConfig::compressed("/var/log/app/events.log")
//!     .with_cycle(CycleTrigger::size_based(200_000))
//!     .with_retention(RetentionPolicy::aggregate_size_based(1_000_000));
//! let writer = RollingWriter::<str>::lines(config)?;
//! writer.write("started")?;
//! writer.close()?;
//! # Ok(())
//! # }
//! ```

mod active;
pub mod common;
pub mod config;
pub mod encode;
pub mod engine;
pub mod events;
pub mod finalize;
pub mod ledger;
pub mod naming;
pub mod policy;
pub mod stats;
pub mod writer;

pub use crate::config::WriterConfig;
#[cfg(feature = "tsc-clock")]
pub use crate::common::QuantaClock;
pub use crate::common::{Clock, Error, ManualClock, Result, SystemClock};
pub use crate::encode::{FnEncoder, LineEncoder, RawEncoder, RecordEncoder};
pub use crate::engine::{EngineState, RotationEngine};
pub use crate::events::{CycleEvent, EventListener};
pub use crate::finalize::{
    CompressingFinalizer, FinalizationStrategy, Finalizer, RenameFinalizer, ARCHIVE_SUFFIX,
};
pub use crate::ledger::{FinalizedArtifact, RetentionLedger};
pub use crate::naming::{FinalKey, NamingScheme};
pub use crate::policy::{CycleTrigger, FlushPolicy, RetentionPolicy, Window};
pub use crate::stats::WriterStats;
pub use crate::writer::{RollingWriter, WriterBuilder};
