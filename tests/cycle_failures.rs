use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use rollfile::{
    CycleEvent, CycleTrigger, EngineState, Error, FinalizationStrategy, Finalizer, LineEncoder,
    RenameFinalizer, RollingWriter, WriterConfig,
};
use tempfile::tempdir;

/// Renames like the default strategy, but fails while `failing` is set.
#[derive(Debug)]
struct FlakyFinalizer {
    failing: Arc<AtomicBool>,
}

impl Finalizer for FlakyFinalizer {
    fn final_path(&self, plain: &Path) -> PathBuf {
        plain.to_path_buf()
    }

    fn finalize(&self, active: &Path, final_path: &Path) -> rollfile::Result<u64> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::io(
                "finalize",
                final_path,
                io::Error::new(io::ErrorKind::Other, "disk full"),
            ));
        }
        RenameFinalizer.finalize(active, final_path)
    }
}

struct Harness {
    writer: RollingWriter<str>,
    failing: Arc<AtomicBool>,
    failures: Arc<Mutex<u32>>,
    _dir: tempfile::TempDir,
}

fn harness(cycle: CycleTrigger) -> Harness {
    let _ = env_logger::builder().is_test(true).try_init();
    let dir = tempdir().expect("tempdir");
    let failing = Arc::new(AtomicBool::new(true));
    let config = WriterConfig::new(dir.path().join("app.log"))
        .with_cycle(cycle)
        .with_finalization(FinalizationStrategy::custom(FlakyFinalizer {
            failing: Arc::clone(&failing),
        }));
    let failures = Arc::new(Mutex::new(0));
    let counter = Arc::clone(&failures);
    let writer = RollingWriter::<str>::builder(config, LineEncoder)
        .expect("builder")
        .on_event(move |event| {
            if let CycleEvent::CycleFailed { .. } = event {
                *counter.lock().unwrap() += 1;
            }
        })
        .open()
        .expect("open");
    Harness {
        writer,
        failing,
        failures,
        _dir: dir,
    }
}

#[test]
fn triggered_cycle_failure_keeps_active_file() {
    let h = harness(CycleTrigger::count_based(3));

    for line in ["one", "two", "three"] {
        h.writer.write(line).expect("write accepted despite failed cycle");
    }
    assert_eq!(*h.failures.lock().unwrap(), 1);
    assert!(h.writer.artifacts().expect("artifacts").is_empty());
    assert_eq!(
        std::fs::read_to_string(h.writer.active_path()).expect("active"),
        "one\ntwo\nthree\n"
    );

    // Still over the trigger: the next write retries.
    h.writer.write("four").expect("write");
    assert_eq!(*h.failures.lock().unwrap(), 2);
    assert_eq!(h.writer.state().expect("state"), EngineState::Open);

    h.failing.store(false, Ordering::SeqCst);
    h.writer.write("five").expect("write");
    let artifacts = h.writer.artifacts().expect("artifacts");
    assert_eq!(artifacts.len(), 1);
    assert_eq!(
        std::fs::read_to_string(&artifacts[0].path).expect("artifact"),
        "one\ntwo\nthree\nfour\nfive\n"
    );

    let stats = h.writer.stats().expect("stats");
    assert_eq!(stats.failed_cycles, 2);
    assert_eq!(stats.cycles, 1);
    h.writer.close().expect("close");
}

#[test]
fn explicit_cycle_and_close_report_failure() {
    let h = harness(CycleTrigger::Never);
    h.writer.write("kept").expect("write");

    let err = h.writer.cycle().expect_err("cycle should fail");
    assert!(err.is_io());
    let err = h.writer.close().expect_err("close should fail");
    assert!(err.is_io());
    assert_eq!(h.writer.state().expect("state"), EngineState::Open);

    // Writer is still usable after the failed close.
    h.writer.write("more").expect("write after failed close");
    h.failing.store(false, Ordering::SeqCst);
    h.writer.close().expect("close");
    assert_eq!(h.writer.state().expect("state"), EngineState::Closed);

    let artifacts = h.writer.artifacts().expect("artifacts");
    assert_eq!(artifacts.len(), 1);
    assert_eq!(
        std::fs::read_to_string(&artifacts[0].path).expect("artifact"),
        "kept\nmore\n"
    );
    assert_eq!(*h.failures.lock().unwrap(), 2);
}

/// Renames, then leaves a directory where the next active file would go.
#[derive(Debug)]
struct SquattingFinalizer;

impl Finalizer for SquattingFinalizer {
    fn final_path(&self, plain: &Path) -> PathBuf {
        plain.to_path_buf()
    }

    fn finalize(&self, active: &Path, final_path: &Path) -> rollfile::Result<u64> {
        let size = RenameFinalizer.finalize(active, final_path)?;
        std::fs::create_dir(active).map_err(|err| Error::io("squat", active, err))?;
        Ok(size)
    }
}

fn squatted_writer(
    cycle: CycleTrigger,
) -> (RollingWriter<str>, Arc<Mutex<u32>>, tempfile::TempDir) {
    let dir = tempdir().expect("tempdir");
    let config = WriterConfig::new(dir.path().join("app.log"))
        .with_cycle(cycle)
        .with_finalization(FinalizationStrategy::custom(SquattingFinalizer));
    let failures = Arc::new(Mutex::new(0));
    let counter = Arc::clone(&failures);
    let writer = RollingWriter::<str>::builder(config, LineEncoder)
        .expect("builder")
        .on_event(move |event| {
            if let CycleEvent::ActiveFileFailed { .. } = event {
                *counter.lock().unwrap() += 1;
            }
        })
        .open()
        .expect("open");
    (writer, failures, dir)
}

#[test]
fn reopen_failure_after_triggered_cycle_does_not_fail_write() {
    let (writer, failures, _dir) = squatted_writer(CycleTrigger::count_based(1));

    // The record is sealed even though the next active file cannot be created.
    writer.write("rec").expect("accepted record");
    assert!(*failures.lock().unwrap() >= 1);
    let artifacts = writer.artifacts().expect("artifacts");
    assert_eq!(artifacts.len(), 1);
    assert_eq!(std::fs::read_to_string(&artifacts[0].path).expect("artifact"), "rec\n");
    assert_eq!(writer.state().expect("state"), EngineState::Open);

    // With the path still blocked the next write fails before accepting.
    assert!(writer.write("blocked").expect_err("no active file").is_io());
    assert_eq!(writer.artifacts().expect("artifacts").len(), 1);

    std::fs::remove_dir(writer.active_path()).expect("unblock");
    writer.write("next").expect("write after unblock");
    let artifacts = writer.artifacts().expect("artifacts");
    assert_eq!(artifacts.len(), 2);
    assert_eq!(std::fs::read_to_string(&artifacts[1].path).expect("artifact"), "next\n");
    std::fs::remove_dir(writer.active_path()).expect("unblock");
    writer.close().expect("close");
}

#[test]
fn explicit_cycle_returns_artifact_when_reopen_fails() {
    let (writer, failures, _dir) = squatted_writer(CycleTrigger::Never);
    writer.write("kept").expect("write");

    let artifact = writer
        .cycle()
        .expect("cycle succeeds once sealed")
        .expect("artifact");
    assert_eq!(std::fs::read_to_string(&artifact.path).expect("artifact"), "kept\n");
    assert!(*failures.lock().unwrap() >= 1);
    assert_eq!(writer.artifacts().expect("artifacts"), vec![artifact]);

    // Nothing to seal: close succeeds without an active file.
    writer.close().expect("close");
    assert_eq!(writer.state().expect("state"), EngineState::Closed);
}
