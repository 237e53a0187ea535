use std::fs;
use std::path::Path;

use segmentkv::config::WalSyncStrategy;
use segmentkv::error::KvError;
use segmentkv::memtable::MemTable;
use segmentkv::segment::SegmentWriter;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

struct Dirs {
    _root: TempDir,
    tmp: std::path::PathBuf,
    storage: std::path::PathBuf,
}

fn dirs() -> Dirs {
    let root = TempDir::new().unwrap();
    let tmp = root.path().join("tmp");
    let storage = root.path().join("storage");
    fs::create_dir_all(&tmp).unwrap();
    fs::create_dir_all(&storage).unwrap();
    Dirs { _root: root, tmp, storage }
}

fn memtable(dir: &Path) -> MemTable {
    MemTable::new(dir, WalSyncStrategy::EveryWrite).unwrap()
}

fn value_of(table: &MemTable, key: &str) -> Option<Vec<u8>> {
    table
        .get(key)
        .and_then(|e| e.value.as_ref())
        .map(|v| v.to_vec())
}

// =============================================================================
// Insert / Get Tests
// =============================================================================

#[test]
fn test_new_memtable_is_empty_with_wal() {
    let d = dirs();
    let table = memtable(&d.tmp);

    assert!(table.is_empty());
    assert_eq!(table.size(), 0);
    assert!(!table.is_persisted());
    assert!(table.wal_path().unwrap().exists());
}

#[test]
fn test_insert_then_get() {
    let d = dirs();
    let mut table = memtable(&d.tmp);

    table.insert("mario caster").unwrap();

    assert_eq!(value_of(&table, "mario"), Some(b"caster".to_vec()));
    assert_eq!(table.get("luigi"), None);
    assert_eq!(table.len(), 1);
    assert_eq!(table.size(), 6);
}

#[test]
fn test_insert_appends_to_wal_first() {
    let d = dirs();
    let mut table = memtable(&d.tmp);

    table.insert("mario caster").unwrap();
    table.insert("Hello world").unwrap();

    let wal = fs::read_to_string(table.wal_path().unwrap()).unwrap();
    assert_eq!(wal, "mario caster\nHello world\n");
}

#[test]
fn test_malformed_insert_touches_nothing() {
    let d = dirs();
    let mut table = memtable(&d.tmp);

    let result = table.insert("nospace");

    assert!(matches!(result, Err(KvError::MalformedRecord(_))));
    assert!(table.is_empty());
    assert_eq!(fs::metadata(table.wal_path().unwrap()).unwrap().len(), 0);
}

#[test]
fn test_last_write_wins() {
    let d = dirs();
    let mut table = memtable(&d.tmp);

    table.insert("key first").unwrap();
    table.insert("other x1").unwrap();
    table.insert("key second").unwrap();

    assert_eq!(table.len(), 2);
    assert_eq!(value_of(&table, "key"), Some(b"second".to_vec()));
    assert_eq!(table.size(), "second".len() as u64 + 2);

    // both writes are logged
    let wal = fs::read_to_string(table.wal_path().unwrap()).unwrap();
    assert_eq!(wal.lines().count(), 3);
}

// =============================================================================
// Persist Tests
// =============================================================================

#[test]
fn test_persist_sorts_and_places_entries() {
    let d = dirs();
    let mut table = memtable(&d.tmp);
    let writer = SegmentWriter::new(&d.storage, 2048);

    table.insert("mario caster").unwrap();
    table.insert("Hello world").unwrap();
    table.insert("ula korn").unwrap();

    let metas = table.persist(&writer, 1).unwrap();

    let keys: Vec<&str> = table.entries().iter().map(|e| e.key.as_str()).collect();
    assert_eq!(keys, vec!["Hello", "mario", "ula"]);

    assert_eq!(metas.len(), 1);
    let data = fs::read(&metas[0].segment_path).unwrap();
    assert_eq!(data, b"worldcasterkorn");

    let segment = metas[0].id.segment_file_name();
    let placed: Vec<(u64, u64)> = table.entries().iter().map(|e| (e.offset, e.length)).collect();
    assert_eq!(placed, vec![(0, 5), (5, 6), (11, 4)]);
    for entry in table.entries() {
        assert!(entry.is_flushed());
        assert_eq!(entry.segment.as_deref(), Some(segment.as_str()));
    }
}

#[test]
fn test_get_still_works_after_sorting() {
    let d = dirs();
    let mut table = memtable(&d.tmp);
    let writer = SegmentWriter::new(&d.storage, 2048);

    for record in ["zeta z1", "alpha a1", "mid m1"] {
        table.insert(record).unwrap();
    }
    table.persist(&writer, 1).unwrap();

    let alpha = table.get("alpha").unwrap();
    assert_eq!(alpha.key, "alpha");
    assert_eq!(alpha.offset, 0);
    assert_eq!(table.get("zeta").unwrap().offset, 4);
}

#[test]
fn test_persist_deletes_wal_and_seals_generation() {
    let d = dirs();
    let mut table = memtable(&d.tmp);
    let writer = SegmentWriter::new(&d.storage, 2048);

    table.insert("k value").unwrap();
    let wal_path = table.wal_path().unwrap().to_path_buf();

    table.persist(&writer, 1).unwrap();

    assert!(!wal_path.exists());
    assert!(table.is_persisted());
    assert_eq!(table.size(), 0);
    assert!(matches!(table.insert("k again"), Err(KvError::GenerationSealed)));
    assert!(matches!(table.persist(&writer, 2), Err(KvError::GenerationSealed)));
}

#[test]
fn test_persist_failure_keeps_wal() {
    let d = dirs();
    let mut table = memtable(&d.tmp);
    // storage directory that does not exist
    let writer = SegmentWriter::new(&d.storage.join("missing"), 2048);

    table.insert("k value").unwrap();
    let result = table.persist(&writer, 1);

    assert!(matches!(result, Err(KvError::Storage(_))));
    assert!(!table.is_persisted());
    assert!(table.wal_path().unwrap().exists());
    assert_eq!(value_of(&table, "k"), Some(b"value".to_vec()));
}

#[test]
fn test_seal_wal_reads_back_records() {
    let d = dirs();
    let mut table = memtable(&d.tmp);

    table.insert("a1 one").unwrap();
    table.insert("b2 two").unwrap();

    assert_eq!(table.seal_wal().unwrap(), vec!["a1 one", "b2 two"]);
}

#[test]
fn test_discard_empty_generation_removes_wal() {
    let d = dirs();
    let table = memtable(&d.tmp);
    let wal_path = table.wal_path().unwrap().to_path_buf();

    table.discard().unwrap();

    assert!(!wal_path.exists());
}
