//! Rotation state machine.
//!
//! The engine owns the active file and drives it through
//! `open -> write* -> cycle -> write* -> ... -> close`. It is single-threaded;
//! [`RollingWriter`](crate::writer::RollingWriter) adds the lock and the
//! background timer.

use std::borrow::Borrow;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::UNIX_EPOCH;

use log::{debug, error, info, warn};

use crate::active::ActiveFile;
use crate::config::WriterConfig;
use crate::common::{Clock, Error, IoContext, Result, SystemClock};
use crate::encode::RecordEncoder;
use crate::events::{CycleEvent, EventListener};
use crate::finalize::Finalizer;
use crate::ledger::{FinalizedArtifact, RetentionLedger};
use crate::naming::{format_stamp, FinalKey, NamingScheme};
use crate::stats::WriterStats;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Closed,
    Open,
    /// Finalization of the active file is in progress.
    Cycling,
}

pub struct RotationEngine<T: ?Sized> {
    config: WriterConfig,
    naming: NamingScheme,
    clock: Arc<dyn Clock>,
    encoder: Box<dyn RecordEncoder<T> + Send>,
    flush_on: Option<Box<dyn Fn(&T) -> bool + Send>>,
    cycle_on: Option<Box<dyn Fn(&T) -> bool + Send>>,
    listener: Option<EventListener>,
    state: EngineState,
    active: Option<ActiveFile>,
    ledger: RetentionLedger,
    last_key: Option<FinalKey>,
    stats: WriterStats,
    scratch: Vec<u8>,
}

impl<T: ?Sized> RotationEngine<T> {
    /// Validate `config` and build a closed engine. Nothing touches the
    /// filesystem until [`open`](Self::open).
    pub fn new(config: WriterConfig, encoder: impl RecordEncoder<T> + 'static) -> Result<Self> {
        config.validate()?;
        let naming = NamingScheme::new(&config.base_path)?;
        Ok(Self {
            config,
            naming,
            clock: Arc::new(SystemClock),
            encoder: Box::new(encoder),
            flush_on: None,
            cycle_on: None,
            listener: None,
            state: EngineState::Closed,
            active: None,
            ledger: RetentionLedger::new(),
            last_key: None,
            stats: WriterStats::new(),
            scratch: Vec::new(),
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Force a flush after every record matching `predicate`.
    pub fn flush_on(mut self, predicate: impl Fn(&T) -> bool + Send + 'static) -> Self {
        self.flush_on = Some(Box::new(predicate));
        self
    }

    /// Force a cycle after every record matching `predicate`.
    pub fn cycle_on(mut self, predicate: impl Fn(&T) -> bool + Send + 'static) -> Self {
        self.cycle_on = Some(Box::new(predicate));
        self
    }

    pub fn on_event(mut self, listener: impl FnMut(&CycleEvent<'_>) + Send + 'static) -> Self {
        self.listener = Some(Box::new(listener));
        self
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn config(&self) -> &WriterConfig {
        &self.config
    }

    pub fn naming(&self) -> &NamingScheme {
        &self.naming
    }

    pub fn active_path(&self) -> PathBuf {
        self.naming.active_path()
    }

    /// Bytes in the active file, zero when there is none.
    pub fn active_bytes(&self) -> u64 {
        self.active.as_ref().map_or(0, ActiveFile::bytes)
    }

    pub fn ledger(&self) -> &RetentionLedger {
        &self.ledger
    }

    /// Retained artifacts, oldest first.
    pub fn artifacts(&self) -> Vec<FinalizedArtifact> {
        self.ledger.to_vec()
    }

    pub fn stats(&self) -> &WriterStats {
        &self.stats
    }

    pub fn open(&mut self) -> Result<()> {
        if self.state != EngineState::Closed {
            return Err(Error::State("writer is already open"));
        }
        let dir = self.naming.dir().to_path_buf();
        fs::create_dir_all(&dir).at("create_dir", &dir)?;

        let now = self.clock.now();
        if self.config.recover_on_open {
            self.adopt_artifacts(now)?;
            let active_path = self.naming.active_path();
            let leftover = fs::metadata(&active_path).map_or(0, |meta| meta.len());
            if leftover > 0 {
                info!(
                    "sealing {leftover} leftover bytes in {}",
                    active_path.display()
                );
                self.active = Some(ActiveFile::resume(
                    &active_path,
                    self.config.buffer_capacity,
                    now,
                )?);
                self.state = EngineState::Open;
                if self.seal(false, now).is_err() {
                    // Already reported; keep appending after the leftover bytes.
                    return Ok(());
                }
            }
        }

        self.active = Some(self.create_active(now)?);
        self.state = EngineState::Open;
        info!(
            "opened {} ({} retained artifacts)",
            self.naming.active_path().display(),
            self.ledger.len()
        );
        Ok(())
    }

    /// Encode and append one record, then evaluate the flush and cycle
    /// policies.
    ///
    /// Once the record is appended the call succeeds. A flush, cycle or reopen
    /// that fails afterwards is reported through the listener and retried on
    /// the next write or trigger, so resending the record would duplicate it.
    pub fn write(&mut self, record: &T) -> Result<()> {
        self.ensure_open()?;
        let now = self.clock.now();
        if self.active.is_none() {
            self.active = Some(self.create_active(now)?);
        }

        self.scratch.clear();
        self.encoder.encode(record, &mut self.scratch);
        let active = self
            .active
            .as_mut()
            .ok_or(Error::State("no active file"))?;
        active.append(&self.scratch)?;
        self.stats.record_write(self.scratch.len() as u64);

        let force_flush = self.flush_on.as_ref().map_or(false, |pred| pred(record));
        let force_cycle = self.cycle_on.as_ref().map_or(false, |pred| pred(record));
        self.evaluate(now, force_flush, force_cycle);
        Ok(())
    }

    /// Write every record in order, stopping at the first error.
    pub fn write_all<I>(&mut self, records: I) -> Result<u64>
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

    pub fn flush(&mut self) -> Result<()> {
        self.ensure_open()?;
        let now = self.clock.now();
        if let Some(active) = self.active.as_mut() {
            active.flush(now)?;
            self.stats.record_flush();
        }
        Ok(())
    }

    /// Seal the active file now, regardless of the cycle trigger.
    ///
    /// Returns `None` when the active file is empty and empty forced cycles
    /// are not allowed. On error the active file is kept as it was. Once the
    /// artifact exists the call succeeds; failing to open the next active file
    /// is reported through the listener and retried by the next write.
    pub fn cycle(&mut self) -> Result<Option<FinalizedArtifact>> {
        self.ensure_open()?;
        let now = self.clock.now();
        let sealed = self.seal(self.config.allow_empty_forced_cycle, now)?;
        if sealed.is_some() {
            self.reopen(now);
        }
        Ok(sealed)
    }

    /// Re-evaluate time-based policies. Called by the background timer.
    pub fn tick(&mut self) {
        if self.state != EngineState::Open {
            return;
        }
        let now = self.clock.now();
        self.evaluate(now, false, false);
        if self.config.retention.has_age_limit() {
            self.sweep(now);
        }
    }

    /// Seal a non-empty active file and stop accepting writes.
    ///
    /// Calling it again is a no-op. If the final cycle fails the engine stays
    /// open with the same active file so the caller can retry.
    pub fn close(&mut self) -> Result<()> {
        if self.state == EngineState::Closed {
            return Ok(());
        }
        let now = self.clock.now();
        self.seal(false, now)?;

        // Whatever is left never received a byte.
        if let Some(active) = self.active.take() {
            let path = active.path().to_path_buf();
            drop(active);
            if let Err(err) = fs::remove_file(&path) {
                if err.kind() != io::ErrorKind::NotFound {
                    warn!("failed to remove empty {}: {err}", path.display());
                }
            }
        }
        self.state = EngineState::Closed;
        info!("closed {}: {}", self.naming.base_name(), self.stats.summary());
        Ok(())
    }

    fn ensure_open(&self) -> Result<()> {
        match self.state {
            EngineState::Open => Ok(()),
            EngineState::Closed => Err(Error::State("writer is closed")),
            EngineState::Cycling => Err(Error::State("writer is cycling")),
        }
    }

    fn create_active(&self, now: u64) -> Result<ActiveFile> {
        let path = self.naming.active_path();
        debug!("creating active file {}", path.display());
        ActiveFile::create(&path, self.config.buffer_capacity, now)
    }

    /// Apply the flush and cycle policies. Failures are reported, never
    /// returned: the records they concern were already accepted.
    fn evaluate(&mut self, now: u64, force_flush: bool, force_cycle: bool) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        if force_flush || self.config.flush.should_flush(&active.since_flush(now)) {
            match active.flush(now) {
                Ok(()) => {
                    self.stats.record_flush();
                    debug!("flushed {}", active.path().display());
                }
                Err(err) => {
                    let path = active.path().to_path_buf();
                    self.active_file_failed(&path, &err);
                }
            }
        }
        let Some(active) = self.active.as_ref() else {
            return;
        };
        let must_cycle = self.config.cycle.should_cycle(&active.since_open(now))
            || (force_cycle && active.bytes() > 0);
        // A failed seal was already reported and leaves the file appendable;
        // the next trigger retries it.
        if must_cycle && matches!(self.seal(false, now), Ok(Some(_))) {
            self.reopen(now);
        }
    }

    /// Open the next active file after a seal. On failure the engine stays
    /// open without one and the next write retries.
    fn reopen(&mut self, now: u64) {
        match self.create_active(now) {
            Ok(active) => self.active = Some(active),
            Err(err) => {
                let path = self.naming.active_path();
                self.active_file_failed(&path, &err);
            }
        }
    }

    fn active_file_failed(&mut self, path: &Path, err: &Error) {
        warn!("active file {} failed: {err}", path.display());
        self.emit(&CycleEvent::ActiveFileFailed {
            active: path,
            error: err,
        });
    }

    /// Finalize the active file and apply retention. On success the active
    /// file is consumed and the caller opens the next one.
    fn seal(&mut self, allow_empty: bool, now: u64) -> Result<Option<FinalizedArtifact>> {
        let Some(active) = self.active.as_ref() else {
            return Ok(None);
        };
        if active.bytes() == 0 && !allow_empty {
            return Ok(None);
        }
        let active_path = active.path().to_path_buf();

        self.state = EngineState::Cycling;
        let result = self.finalize_active(now);
        self.state = EngineState::Open;

        let artifact = match result {
            Ok(artifact) => artifact,
            Err(err) => {
                self.stats.record_failed_cycle();
                error!("cycle of {} failed: {err}", active_path.display());
                self.emit(&CycleEvent::CycleFailed {
                    active: &active_path,
                    error: &err,
                });
                return Err(err);
            }
        };

        drop(self.active.take());
        if active_path.exists() {
            if let Err(err) = fs::remove_file(&active_path).at("remove", &active_path) {
                self.active_file_failed(&active_path, &err);
            }
        }

        self.stats.record_cycle(artifact.size);
        info!(
            "sealed {} ({} bytes)",
            artifact.path.display(),
            artifact.size
        );
        self.ledger.push(artifact.clone());
        self.emit(&CycleEvent::Cycled(&artifact));
        self.sweep(now);
        Ok(Some(artifact))
    }

    fn finalize_active(&mut self, now: u64) -> Result<FinalizedArtifact> {
        let active = self
            .active
            .as_mut()
            .ok_or(Error::State("no active file"))?;
        active.flush(now)?;
        let active_path = active.path().to_path_buf();
        let final_path = self.next_final_path(now);
        let size = self.config.finalization.finalize(&active_path, &final_path)?;
        Ok(FinalizedArtifact::new(final_path, size, now))
    }

    /// Next unused final name. Names never go backwards, even if the clock
    /// does.
    fn next_final_path(&mut self, now: u64) -> PathBuf {
        let stamp = format_stamp(now);
        let mut key = match &self.last_key {
            Some(last) if last.stamp >= stamp => FinalKey {
                stamp: last.stamp.clone(),
                seq: last.seq + 1,
            },
            _ => FinalKey { stamp, seq: 0 },
        };
        loop {
            let plain = self.naming.final_path(&key);
            let path = self.config.finalization.final_path(&plain);
            if !path.exists() && !self.ledger.contains_path(&path) {
                self.last_key = Some(key);
                return path;
            }
            key.seq += 1;
        }
    }

    /// Put artifacts left by an earlier run into the ledger.
    fn adopt_artifacts(&mut self, now: u64) -> Result<()> {
        let found = self
            .naming
            .scan_finals(self.config.finalization.suffix())?;
        let mut adopted = 0usize;
        for (key, path) in found {
            if self.last_key.as_ref().map_or(true, |last| key > *last) {
                self.last_key = Some(key);
            }
            if self.ledger.contains_path(&path) {
                continue;
            }
            let meta = fs::metadata(&path).at("stat", &path)?;
            let created_at = meta
                .modified()
                .ok()
                .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
                .map_or(now, |since| since.as_nanos() as u64);
            self.ledger
                .push(FinalizedArtifact::new(path, meta.len(), created_at));
            adopted += 1;
        }
        if adopted > 0 {
            info!(
                "adopted {adopted} existing artifacts of {}",
                self.naming.base_name()
            );
            self.sweep(now);
        }
        Ok(())
    }

    /// Delete whatever retention selects. Entries leave the ledger even when
    /// the delete fails so a broken file cannot wedge the sweep.
    fn sweep(&mut self, now: u64) {
        let doomed = self.config.retention.sweep(&self.ledger, now);
        if doomed.is_empty() {
            return;
        }
        for artifact in self.ledger.remove_indices(&doomed) {
            match fs::remove_file(&artifact.path).at("delete", &artifact.path) {
                Ok(()) => {
                    self.stats.record_delete();
                    debug!("retention deleted {}", artifact.path.display());
                    self.emit(&CycleEvent::Deleted(&artifact));
                }
                Err(err) => {
                    self.stats.record_delete_error();
                    warn!("retention delete failed: {err}");
                    self.emit(&CycleEvent::DeleteFailed {
                        artifact: &artifact,
                        error: &err,
                    });
                }
            }
        }
    }

    fn emit(&mut self, event: &CycleEvent<'_>) {
        if let Some(listener) = self.listener.as_mut() {
            listener(event);
        }
    }
}

impl<T: ?Sized> Drop for RotationEngine<T> {
    fn drop(&mut self) {
        if self.state == EngineState::Closed {
            return;
        }
        if let Err(err) = self.close() {
            error!("close on drop failed for {}: {err}", self.naming.base_name());
        }
    }
}
