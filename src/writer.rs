//! Shareable writer handle.
//!
//! Wraps a [`RotationEngine`] in a mutex so producers on any thread can
//! write, and runs the timer thread that re-evaluates time-based policies.

use std::borrow::Borrow;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard, TryLockError, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, error, trace};

use crate::config::WriterConfig;
use crate::common::{Clock, Error, Result};
use crate::encode::{LineEncoder, RawEncoder, RecordEncoder};
use crate::engine::{EngineState, RotationEngine};
use crate::events::CycleEvent;
use crate::ledger::FinalizedArtifact;
use crate::stats::WriterStats;

const TIMER_THREAD: &str = "rollfile-timer";

/// Rolling file writer for records of type `T`.
///
/// All operations serialize on one lock. The timer never waits for it: a
/// tick that finds the writer busy is skipped and the next one catches up.
pub struct RollingWriter<T: ?Sized + 'static> {
    engine: Arc<Mutex<RotationEngine<T>>>,
    ticker: Mutex<Option<Ticker>>,
    active_path: PathBuf,
}

impl<T: ?Sized + 'static> RollingWriter<T> {
    pub fn builder(
        config: WriterConfig,
        encoder: impl RecordEncoder<T> + 'static,
    ) -> Result<WriterBuilder<T>> {
        Ok(WriterBuilder {
            engine: RotationEngine::new(config, encoder)?,
        })
    }

    /// Open with default options.
    pub fn open(config: WriterConfig, encoder: impl RecordEncoder<T> + 'static) -> Result<Self> {
        Self::builder(config, encoder)?.open()
    }

    pub fn write(&self, record: &T) -> Result<()> {
        self.lock()?.write(record)
    }

    /// Write records in order. The lock is taken per record so the timer can
    /// interleave with long batches.
    pub fn write_all<I>(&self, records: I) -> Result<u64>
    where
        I: IntoIterator,
        I::Item: Borrow<T>,
    {
        let mut written = 0;
        for record in records {
            self.write(record.borrow())?;
            written += 1;
        }
        Ok(written)
    }

    pub fn flush(&self) -> Result<()> {
        self.lock()?.flush()
    }

    /// Force a cycle. See [`RotationEngine::cycle`].
    pub fn cycle(&self) -> Result<Option<FinalizedArtifact>> {
        self.lock()?.cycle()
    }

    /// Seal the remaining data and stop the timer. Idempotent.
    ///
    /// On error the writer stays open with its active file and the timer
    /// keeps running.
    pub fn close(&self) -> Result<()> {
        self.lock()?.close()?;
        self.stop_ticker();
        Ok(())
    }

    pub fn state(&self) -> Result<EngineState> {
        Ok(self.lock()?.state())
    }

    pub fn stats(&self) -> Result<WriterStats> {
        Ok(self.lock()?.stats().clone())
    }

    /// Retained artifacts, oldest first.
    pub fn artifacts(&self) -> Result<Vec<FinalizedArtifact>> {
        Ok(self.lock()?.artifacts())
    }

    pub fn active_path(&self) -> &Path {
        &self.active_path
    }

    fn lock(&self) -> Result<MutexGuard<'_, RotationEngine<T>>> {
        self.engine
            .lock()
            .map_err(|_| Error::State("writer lock poisoned"))
    }

    fn stop_ticker(&self) {
        let ticker = match self.ticker.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(ticker) = ticker {
            ticker.stop();
        }
    }
}

impl RollingWriter<str> {
    /// Text lines, newline-terminated.
    pub fn lines(config: WriterConfig) -> Result<Self> {
        Self::open(config, LineEncoder)
    }
}

impl RollingWriter<[u8]> {
    /// Byte records written verbatim.
    pub fn raw(config: WriterConfig) -> Result<Self> {
        Self::open(config, RawEncoder)
    }
}

impl<T: ?Sized + 'static> Drop for RollingWriter<T> {
    fn drop(&mut self) {
        self.stop_ticker();
        match self.engine.lock() {
            Ok(mut engine) => {
                if let Err(err) = engine.close() {
                    error!("close on drop failed: {err}");
                }
            }
            Err(_) => error!("writer lock poisoned; {} left open", self.active_path.display()),
        }
    }
}

pub struct WriterBuilder<T: ?Sized + 'static> {
    engine: RotationEngine<T>,
}

impl<T: ?Sized + 'static> WriterBuilder<T> {
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.engine = self.engine.with_clock(clock);
        self
    }

    pub fn flush_on(mut self, predicate: impl Fn(&T) -> bool + Send + 'static) -> Self {
        self.engine = self.engine.flush_on(predicate);
        self
    }

    pub fn cycle_on(mut self, predicate: impl Fn(&T) -> bool + Send + 'static) -> Self {
        self.engine = self.engine.cycle_on(predicate);
        self
    }

    pub fn on_event(mut self, listener: impl FnMut(&CycleEvent<'_>) + Send + 'static) -> Self {
        self.engine = self.engine.on_event(listener);
        self
    }

    /// Open the first active file and start the timer if a policy needs it.
    pub fn open(self) -> Result<RollingWriter<T>> {
        let mut engine = self.engine;
        engine.open()?;
        let active_path = engine.active_path();
        let timer = engine
            .config()
            .needs_timer()
            .then(|| engine.config().tick_interval());

        let engine = Arc::new(Mutex::new(engine));
        let ticker = match timer {
            Some(interval) => Some(Ticker::spawn(Arc::downgrade(&engine), interval, &active_path)?),
            None => None,
        };
        Ok(RollingWriter {
            engine,
            ticker: Mutex::new(ticker),
            active_path,
        })
    }
}

/// Background thread calling [`RotationEngine::tick`] every interval.
struct Ticker {
    stop_tx: mpsc::Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl Ticker {
    fn spawn<T: ?Sized + 'static>(
        engine: Weak<Mutex<RotationEngine<T>>>,
        interval: Duration,
        active_path: &Path,
    ) -> Result<Self> {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let handle = thread::Builder::new()
            .name(TIMER_THREAD.to_string())
            .spawn(move || loop {
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {}
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
                let Some(shared) = engine.upgrade() else {
                    break;
                };
                match shared.try_lock() {
                    Ok(mut engine) => engine.tick(),
                    Err(TryLockError::WouldBlock) => trace!("writer busy; tick skipped"),
                    Err(TryLockError::Poisoned(_)) => {
                        error!("writer lock poisoned; timer exiting");
                        break;
                    }
                };
            })
            .map_err(|err| Error::io("spawn timer", active_path, err))?;
        debug!("timer started for {} every {interval:?}", active_path.display());
        Ok(Self {
            stop_tx,
            handle: Some(handle),
        })
    }

    fn stop(mut self) {
        let _ = self.stop_tx.send(());
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("{TIMER_THREAD} thread panicked");
            }
        }
    }
}
