//! Counters for a writer's lifetime.

/// Statistics accumulated by a writer since it was opened.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriterStats {
    /// Records appended.
    pub records_written: u64,

    /// Encoded bytes appended.
    pub bytes_written: u64,

    /// Explicit flushes performed (policy, predicate or host request).
    pub flushes: u64,

    /// Artifacts produced.
    pub cycles: u64,

    /// On-disk bytes of the artifacts produced.
    pub bytes_finalized: u64,

    /// Finalization attempts that failed.
    pub failed_cycles: u64,

    /// Artifacts deleted by retention.
    pub artifacts_deleted: u64,

    /// Retention deletions that failed.
    pub delete_errors: u64,
}

impl WriterStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_write(&mut self, bytes: u64) {
        self.records_written += 1;
        self.bytes_written += bytes;
    }

    pub fn record_flush(&mut self) {
        self.flushes += 1;
    }

    pub fn record_cycle(&mut self, artifact_size: u64) {
        self.cycles += 1;
        self.bytes_finalized += artifact_size;
    }

    pub fn record_failed_cycle(&mut self) {
        self.failed_cycles += 1;
    }

    pub fn record_delete(&mut self) {
        self.artifacts_deleted += 1;
    }

    pub fn record_delete_error(&mut self) {
        self.delete_errors += 1;
    }

    pub fn has_errors(&self) -> bool {
        self.failed_cycles > 0 || self.delete_errors > 0
    }

    /// Finalized bytes relative to written bytes (below 1.0 when compressing).
    pub fn finalized_ratio(&self) -> f64 {
        if self.bytes_written == 0 {
            0.0
        } else {
            self.bytes_finalized as f64 / self.bytes_written as f64
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "Records: {}, Written: {} bytes, Cycles: {}, Finalized: {} bytes, Deleted: {}, Errors: {}",
            self.records_written,
            self.bytes_written,
            self.cycles,
            self.bytes_finalized,
            self.artifacts_deleted,
            self.failed_cycles + self.delete_errors
        )
    }
}
