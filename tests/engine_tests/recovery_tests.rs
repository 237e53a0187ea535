use std::fs;
use std::path::Path;

use segmentkv::config::{Config, WalSyncStrategy};
use segmentkv::engine::Engine;
use tempfile::TempDir;

fn open(root: &Path) -> Engine {
    Engine::open(Config::builder().data_dir(root).build()).unwrap()
}

fn wal_count(root: &Path) -> usize {
    fs::read_dir(root.join("tmp"))
        .unwrap()
        .filter(|e| {
            e.as_ref()
                .unwrap()
                .file_name()
                .to_string_lossy()
                .starts_with("write_ahead_log")
        })
        .count()
}

#[test]
fn test_unflushed_writes_survive_crash() {
    let temp = TempDir::new().unwrap();

    let engine = open(temp.path());
    engine.put("mario", "caster").unwrap();
    engine.put("Hello", "world").unwrap();
    // simulated crash: no persist, no close
    drop(engine);

    let engine = open(temp.path());

    assert_eq!(engine.get("mario").unwrap(), Some(b"caster".to_vec()));
    assert_eq!(engine.get("Hello").unwrap(), Some(b"world".to_vec()));
    let result = engine.recovery_result();
    assert_eq!(result.files_replayed, 1);
    assert_eq!(result.records_recovered, 2);
    assert_eq!(result.records_corrupted, 0);
    // only the new active WAL is left
    assert_eq!(wal_count(temp.path()), 1);
}

#[test]
fn test_replayed_records_are_relogged() {
    let temp = TempDir::new().unwrap();

    let engine = open(temp.path());
    engine.put("k", "v1").unwrap();
    drop(engine);

    let engine = open(temp.path());
    let wal = engine.wal_path().unwrap();
    assert_eq!(fs::read_to_string(&wal).unwrap(), "k v1\n");

    // a second crash straight after recovery loses nothing
    drop(engine);
    let engine = open(temp.path());
    assert_eq!(engine.get("k").unwrap(), Some(b"v1".to_vec()));
}

#[test]
fn test_replayed_records_reach_new_wal_under_batched_sync() {
    let temp = TempDir::new().unwrap();
    let config = Config::builder()
        .data_dir(temp.path())
        .wal_sync_strategy(WalSyncStrategy::EveryNEntries { count: 1000 })
        .build();

    let engine = Engine::open(config.clone()).unwrap();
    engine.put("mario", "caster").unwrap();
    engine.put("luigi", "plumber").unwrap();
    drop(engine);

    let engine = Engine::open(config).unwrap();

    assert_eq!(engine.recovery_result().files_replayed, 1);
    let wal = engine.wal_path().unwrap();
    assert_eq!(
        fs::read_to_string(&wal).unwrap(),
        "mario caster\nluigi plumber\n"
    );
    assert_eq!(wal_count(temp.path()), 1);
}

#[test]
fn test_recovery_with_no_orphans_is_idempotent() {
    let temp = TempDir::new().unwrap();

    let engine = open(temp.path());
    engine.put("k", "value").unwrap();
    engine.close().unwrap();

    for _ in 0..3 {
        let engine = open(temp.path());
        assert_eq!(engine.recovery_result().files_replayed, 0);
        assert_eq!(engine.recovery_result().records_recovered, 0);
        assert_eq!(engine.get("k").unwrap(), Some(b"value".to_vec()));
        assert_eq!(engine.segment_count(), 1);
        engine.close().unwrap();
    }
}

#[test]
fn test_recovery_skips_corrupt_lines() {
    let temp = TempDir::new().unwrap();
    let tmp = temp.path().join("tmp");
    fs::create_dir_all(&tmp).unwrap();
    fs::write(
        tmp.join("write_ahead_logcrashed"),
        b"good value\nno-separator\na b\nkey \nother 42\ntorn recor",
    )
    .unwrap();

    let engine = open(temp.path());

    let result = engine.recovery_result();
    assert_eq!(result.files_replayed, 1);
    assert_eq!(result.records_recovered, 2);
    // no-separator, "a b", "key " (empty value) and the torn tail
    assert_eq!(result.records_corrupted, 4);
    assert_eq!(engine.get("good").unwrap(), Some(b"value".to_vec()));
    assert_eq!(engine.get("other").unwrap(), Some(b"42".to_vec()));
    assert_eq!(engine.get("torn").unwrap(), None);
    assert!(!tmp.join("write_ahead_logcrashed").exists());
}

#[test]
fn test_recovered_writes_shadow_flushed_segments() {
    let temp = TempDir::new().unwrap();

    let engine = open(temp.path());
    engine.put("k", "flushed").unwrap();
    engine.persist().unwrap();
    engine.put("k", "unflushed").unwrap();
    drop(engine);

    let engine = open(temp.path());
    assert_eq!(engine.get("k").unwrap(), Some(b"unflushed".to_vec()));

    engine.persist().unwrap();
    assert_eq!(engine.get("k").unwrap(), Some(b"unflushed".to_vec()));
}

#[test]
fn test_recovered_data_can_be_flushed() {
    let temp = TempDir::new().unwrap();

    let engine = open(temp.path());
    for i in 0..10 {
        engine.put(&format!("key{:02}", i), &format!("value{}", i)).unwrap();
    }
    drop(engine);

    let engine = open(temp.path());
    assert_eq!(engine.memtable_entry_count(), 10);
    engine.persist().unwrap();
    drop(engine);

    let engine = open(temp.path());
    assert_eq!(engine.recovery_result().files_replayed, 0);
    assert_eq!(engine.get("key07").unwrap(), Some(b"value7".to_vec()));
}
