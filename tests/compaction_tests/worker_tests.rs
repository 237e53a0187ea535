use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use segmentkv::compaction::CompactionWorker;
use segmentkv::{Config, Engine};
use tempfile::TempDir;

fn wait_until(timeout: Duration, mut done: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if done() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    done()
}

#[test]
fn test_worker_merges_small_flushes() {
    let temp = TempDir::new().unwrap();
    let engine = Arc::new(Engine::open(Config::builder().data_dir(temp.path()).build()).unwrap());

    engine.put("a", "first").unwrap();
    engine.persist().unwrap();
    engine.put("b", "second").unwrap();
    engine.persist().unwrap();
    assert_eq!(engine.segment_count(), 2);

    let worker = CompactionWorker::spawn(&engine, Duration::from_millis(20)).unwrap();

    assert!(wait_until(Duration::from_secs(5), || engine.segment_count() == 1));
    worker.stop();

    assert_eq!(engine.get("a").unwrap(), Some(b"first".to_vec()));
    assert_eq!(engine.get("b").unwrap(), Some(b"second".to_vec()));
}

#[test]
fn test_worker_stops_when_dropped() {
    let temp = TempDir::new().unwrap();
    let engine = Arc::new(Engine::open(Config::builder().data_dir(temp.path()).build()).unwrap());

    let worker = CompactionWorker::spawn(&engine, Duration::from_millis(10)).unwrap();
    thread::sleep(Duration::from_millis(50));
    drop(worker);

    // the worker held no strong reference
    assert_eq!(Arc::strong_count(&engine), 1);
    assert!(Arc::try_unwrap(engine).is_ok());
}
