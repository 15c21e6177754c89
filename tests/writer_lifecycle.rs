use std::sync::{Arc, Mutex};

use rollfile::{
    CycleEvent, CycleTrigger, EngineState, Error, FlushPolicy, LineEncoder, RollingWriter,
    WriterConfig,
};
use tempfile::tempdir;

fn read(path: &std::path::Path) -> String {
    std::fs::read_to_string(path).expect("read")
}

#[test]
fn count_trigger_seals_every_n_records() {
    let dir = tempdir().expect("tempdir");
    let config = WriterConfig::new(dir.path().join("orders.log"))
        .with_cycle(CycleTrigger::count_based(4));
    let cycled = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&cycled);
    let writer = RollingWriter::<str>::builder(config, LineEncoder)
        .expect("builder")
        .on_event(move |event| {
            if let CycleEvent::Cycled(artifact) = event {
                seen.lock().unwrap().push(artifact.path.clone());
            }
        })
        .open()
        .expect("open");

    let lines: Vec<String> = (0..10).map(|i| format!("order {i}")).collect();
    assert_eq!(writer.write_all(lines).expect("write"), 10);
    assert_eq!(cycled.lock().unwrap().len(), 2);

    writer.close().expect("close");
    let artifacts = writer.artifacts().expect("artifacts");
    assert_eq!(artifacts.len(), 3);
    let paths: Vec<_> = artifacts.iter().map(|a| a.path.clone()).collect();
    assert_eq!(*cycled.lock().unwrap(), paths);
    assert_eq!(read(&artifacts[0].path), "order 0\norder 1\norder 2\norder 3\n");
    assert_eq!(read(&artifacts[2].path), "order 8\norder 9\n");

    let names: Vec<String> = artifacts
        .iter()
        .map(|a| a.path.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    let mut sorted = names.clone();
    sorted.sort();
    assert_eq!(names, sorted, "final names sort in creation order");
}

#[test]
fn close_is_idempotent_and_blocks_writes() {
    let dir = tempdir().expect("tempdir");
    let writer =
        RollingWriter::<str>::lines(WriterConfig::new(dir.path().join("app.log"))).expect("open");
    writer.write("only").expect("write");

    writer.close().expect("first close");
    writer.close().expect("second close");
    assert_eq!(writer.state().expect("state"), EngineState::Closed);
    assert_eq!(writer.artifacts().expect("artifacts").len(), 1);
    assert!(matches!(writer.write("late"), Err(Error::State(_))));
    assert!(matches!(writer.cycle(), Err(Error::State(_))));
    assert!(matches!(writer.flush(), Err(Error::State(_))));
}

#[test]
fn empty_writer_leaves_nothing_behind() {
    let dir = tempdir().expect("tempdir");
    let config = WriterConfig::new(dir.path().join("app.log"))
        .with_cycle(CycleTrigger::size_based(1));
    let writer = RollingWriter::<str>::lines(config).expect("open");
    assert!(writer.active_path().exists());
    assert!(writer.cycle().expect("cycle").is_none());
    writer.close().expect("close");

    assert!(writer.artifacts().expect("artifacts").is_empty());
    assert_eq!(std::fs::read_dir(dir.path()).expect("read dir").count(), 0);
}

#[test]
fn forced_empty_cycle_when_allowed() {
    let dir = tempdir().expect("tempdir");
    let mut config = WriterConfig::new(dir.path().join("app.log"));
    config.allow_empty_forced_cycle = true;
    let writer = RollingWriter::<str>::lines(config).expect("open");

    let artifact = writer.cycle().expect("cycle").expect("empty artifact");
    assert_eq!(artifact.size, 0);
    assert!(artifact.path.exists());
    writer.close().expect("close");
    assert_eq!(writer.artifacts().expect("artifacts").len(), 1);
}

#[test]
fn flush_policy_makes_records_durable() {
    let dir = tempdir().expect("tempdir");
    let config = WriterConfig::new(dir.path().join("app.log"))
        .with_flush(FlushPolicy::count_based(3));
    let writer = RollingWriter::<str>::lines(config).expect("open");

    writer.write("a").expect("write");
    writer.write("b").expect("write");
    assert_eq!(read(writer.active_path()), "");
    writer.write("c").expect("write");
    assert_eq!(read(writer.active_path()), "a\nb\nc\n");

    writer.write("d").expect("write");
    writer.flush().expect("flush");
    assert_eq!(read(writer.active_path()), "a\nb\nc\nd\n");
    assert_eq!(writer.stats().expect("stats").flushes, 2);
    writer.close().expect("close");
}

#[test]
fn invalid_config_is_rejected_before_touching_disk() {
    let dir = tempdir().expect("tempdir");
    let config = WriterConfig::new(dir.path().join("nested").join("app.log"))
        .with_cycle(CycleTrigger::size_based(0));
    let err = RollingWriter::<str>::lines(config).err().expect("invalid config");
    assert!(matches!(err, Error::Config(_)));
    assert!(!dir.path().join("nested").exists());
}
