//! Error taxonomy and time sources shared by every layer of the writer.

pub mod clock;
pub mod error;

#[cfg(feature = "tsc-clock")]
pub use clock::QuantaClock;
pub use clock::{Clock, ManualClock, SystemClock};
pub(crate) use error::IoContext;
pub use error::{Error, Result};
