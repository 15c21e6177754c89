//! Flush, cycle and retention policies.
//!
//! Policies are immutable values built once when the writer is configured.
//! Flush policies and cycle triggers are predicates over a [`Window`] of
//! counters; retention policies select ledger entries for deletion.

mod cycle;
mod flush;
mod retention;
mod window;

pub use cycle::CycleTrigger;
pub use flush::FlushPolicy;
pub use retention::RetentionPolicy;
pub use window::Window;
pub(crate) use window::{millis, to_millis};
