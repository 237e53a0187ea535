use std::fs;

use segmentkv::entry::Entry;
use segmentkv::segment::{read_range, SegmentReader, SegmentWriter};
use tempfile::TempDir;

fn entry(key: &str, len: usize) -> Entry {
    Entry::new(key, vec![b'x'; len])
}

#[test]
fn test_single_segment_layout() {
    let temp = TempDir::new().unwrap();
    let writer = SegmentWriter::new(temp.path(), 2048);
    let entries = vec![
        Entry::new("Hello", "world"),
        Entry::new("mario", "caster"),
        Entry::new("ula", "korn"),
    ];

    let metas = writer.write_segments(&entries, 1).unwrap();

    assert_eq!(metas.len(), 1);
    let meta = &metas[0];
    assert_eq!(meta.size, 15);
    assert_eq!(meta.entry_count(), 3);
    assert_eq!(fs::read(&meta.segment_path).unwrap(), b"worldcasterkorn");
    assert!(meta.index_path.exists());

    let mario = meta.index.find("mario").unwrap();
    assert_eq!(read_range(&meta.segment_path, mario.offset, mario.length).unwrap(), b"caster");
}

#[test]
fn test_size_bound_splits_into_two_segments() {
    let temp = TempDir::new().unwrap();
    let writer = SegmentWriter::new(temp.path(), 2048);
    let entries = vec![entry("a", 1000), entry("b", 1000), entry("c", 1000)];

    let metas = writer.write_segments(&entries, 1).unwrap();

    assert_eq!(metas.len(), 2);
    assert_eq!(metas[0].size, 2000);
    assert_eq!(metas[1].size, 1000);
    assert_eq!(metas[0].id.part, 0);
    assert_eq!(metas[1].id.part, 1);
    assert_eq!(metas[1].index.find("c").unwrap().offset, 0);
}

#[test]
fn test_exact_fit_stays_in_one_segment() {
    let temp = TempDir::new().unwrap();
    let writer = SegmentWriter::new(temp.path(), 2048);
    let entries = vec![entry("a", 1024), entry("b", 1024)];

    let metas = writer.write_segments(&entries, 1).unwrap();

    assert_eq!(metas.len(), 1);
    assert_eq!(metas[0].size, 2048);
}

#[test]
fn test_oversized_entry_gets_its_own_segment() {
    let temp = TempDir::new().unwrap();
    let writer = SegmentWriter::new(temp.path(), 2048);
    let entries = vec![entry("a", 10), entry("big", 3000), entry("z", 10)];

    let metas = writer.write_segments(&entries, 1).unwrap();

    let sizes: Vec<u64> = metas.iter().map(|m| m.size).collect();
    assert_eq!(sizes, vec![10, 3000, 10]);
    for meta in &metas {
        assert_eq!(fs::metadata(&meta.segment_path).unwrap().len(), meta.size);
    }
}

#[test]
fn test_no_segment_exceeds_bound_except_lone_entries() {
    let temp = TempDir::new().unwrap();
    let writer = SegmentWriter::new(temp.path(), 100);
    let entries: Vec<Entry> = (0..50).map(|i| entry(&format!("key{:03}", i), 7 + i % 13)).collect();

    let metas = writer.write_segments(&entries, 3).unwrap();

    let total: usize = metas.iter().map(|m| m.entry_count()).sum();
    assert_eq!(total, 50);
    for meta in &metas {
        assert!(meta.size <= 100 || meta.entry_count() == 1);
        assert_eq!(meta.id.generation, 3);
    }
}

#[test]
fn test_empty_input_writes_nothing() {
    let temp = TempDir::new().unwrap();
    let writer = SegmentWriter::new(temp.path(), 2048);

    let metas = writer.write_segments(&[], 1).unwrap();

    assert!(metas.is_empty());
    assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 0);
}

#[test]
fn test_reader_reads_back_written_segment() {
    let temp = TempDir::new().unwrap();
    let writer = SegmentWriter::new(temp.path(), 2048);
    let entries = vec![Entry::new("a1", "one"), Entry::new("b2", "two")];
    let metas = writer.write_segments(&entries, 5).unwrap();

    let reader = SegmentReader::open(&metas[0].segment_path).unwrap();

    assert_eq!(reader.id(), metas[0].id);
    assert_eq!(reader.get("b2").unwrap(), Some(b"two".to_vec()));
    assert_eq!(reader.get("c3").unwrap(), None);

    let all = reader.read_all().unwrap();
    assert_eq!(all, entries);
}

// =============================================================================
// Failure Cleanup Tests
// =============================================================================

#[test]
fn test_failed_pair_is_removed_and_earlier_pairs_survive() {
    let temp = TempDir::new().unwrap();
    let writer = SegmentWriter::new(temp.path(), 2048);
    // the second pair's index cannot be created
    fs::create_dir(temp.path().join("index_0000000001_0001")).unwrap();
    let entries = vec![entry("a", 1000), entry("b", 1000), entry("c", 1000)];

    let result = writer.write_segments(&entries, 1);

    assert!(result.is_err());
    assert!(temp.path().join("sstable_0000000001_0000").exists());
    assert!(temp.path().join("index_0000000001_0000").exists());
    assert!(!temp.path().join("sstable_0000000001_0001").exists());
    assert!(temp.path().join("index_0000000001_0001").is_dir());
}

#[test]
fn test_existing_index_is_not_removed_on_failure() {
    let temp = TempDir::new().unwrap();
    let writer = SegmentWriter::new(temp.path(), 2048);
    let index_path = temp.path().join("index_0000000001_0000");
    fs::write(&index_path, b"someone else's index").unwrap();

    let result = writer.write_segments(&[Entry::new("mario", "caster")], 1);

    assert!(result.is_err());
    assert_eq!(fs::read(&index_path).unwrap(), b"someone else's index");
    assert!(!temp.path().join("sstable_0000000001_0000").exists());
}

#[test]
fn test_existing_segment_is_not_removed_on_failure() {
    let temp = TempDir::new().unwrap();
    let writer = SegmentWriter::new(temp.path(), 2048);
    let segment_path = temp.path().join("sstable_0000000001_0000");
    fs::write(&segment_path, b"older").unwrap();

    let result = writer.write_segments(&[Entry::new("mario", "caster")], 1);

    assert!(result.is_err());
    assert_eq!(fs::read(&segment_path).unwrap(), b"older");
    assert!(!temp.path().join("index_0000000001_0000").exists());
}
