//! Integration tests for complete write-ahead log workflows.

use seglog::{ChunkPosition, Options, Wal, BLOCK_SIZE, CHUNK_HEADER_SIZE};
use std::sync::Arc;
use std::thread;
use tempfile::TempDir;

fn open_wal(dir: &TempDir, segment_size: u64) -> Wal {
    let options = Options {
        dir_path: dir.path().to_path_buf(),
        segment_size,
        ..Options::default()
    };
    Wal::open(options).unwrap()
}

/// Write records of mixed sizes and read them back both ways.
#[test]
fn integration_write_read_iterate() {
    let dir = TempDir::new().unwrap();
    let wal = open_wal(&dir, 1024 * 1024);

    let records: Vec<Vec<u8>> = [10, 100, 1000]
        .iter()
        .map(|&n| (0..n).map(|i| (i % 251) as u8).collect())
        .collect();

    let positions: Vec<ChunkPosition> = records.iter().map(|r| wal.write(r).unwrap()).collect();

    // Everything landed in the first segment.
    for pos in &positions {
        assert_eq!(pos.segment_id, 1);
    }

    // Positions are unique and strictly increasing.
    for pair in positions.windows(2) {
        let a = (pair[0].segment_id, pair[0].block_number, pair[0].chunk_offset);
        let b = (pair[1].segment_id, pair[1].block_number, pair[1].chunk_offset);
        assert!(a < b);
    }

    // Random access.
    for (record, pos) in records.iter().zip(&positions) {
        assert_eq!(wal.read(pos).unwrap(), &record[..]);
    }

    // Sequential iteration yields the same records, in order, then ends.
    let mut reader = wal.new_reader();
    for (record, pos) in records.iter().zip(&positions) {
        let (data, position) = reader.next().unwrap().unwrap();
        assert_eq!(data, &record[..]);
        assert_eq!(position.segment_id, pos.segment_id);
        assert_eq!(position.block_number, pos.block_number);
        assert_eq!(position.chunk_offset, pos.chunk_offset);
    }
    assert!(reader.next().unwrap().is_none());
}

/// A record of exactly one block's payload occupies exactly one block.
#[test]
fn integration_single_full_block() {
    let dir = TempDir::new().unwrap();
    let wal = open_wal(&dir, 1024 * 1024);

    let payload = vec![b'f'; (BLOCK_SIZE - CHUNK_HEADER_SIZE) as usize];
    let pos = wal.write(&payload).unwrap();
    assert_eq!(pos.block_number, 0);
    assert_eq!(pos.chunk_offset, 0);
    assert_eq!(pos.chunk_size, BLOCK_SIZE);

    let next = wal.write(b"next").unwrap();
    assert_eq!(next.block_number, 1);
    assert_eq!(next.chunk_offset, 0);

    assert_eq!(wal.read(&pos).unwrap(), payload);
}

/// A record of two blocks is split FIRST + MIDDLE + LAST and reassembled.
#[test]
fn integration_record_spanning_blocks() {
    let dir = TempDir::new().unwrap();
    let wal = open_wal(&dir, 16 * 1024 * 1024);

    let payload: Vec<u8> = (0..2 * BLOCK_SIZE as usize).map(|i| (i % 17) as u8).collect();
    let pos = wal.write(&payload).unwrap();

    // Three chunk headers: FIRST, MIDDLE, LAST.
    assert_eq!(pos.chunk_size, 2 * BLOCK_SIZE + 3 * CHUNK_HEADER_SIZE);
    assert_eq!(wal.read(&pos).unwrap(), payload);
}

/// Rotation keeps the log readable across segments.
#[test]
fn integration_rotation() {
    let dir = TempDir::new().unwrap();
    let wal = open_wal(&dir, 10_000);

    assert_eq!(wal.active_segment_id(), 1);

    let mut positions = Vec::new();
    for i in 0..4u8 {
        positions.push(wal.write(&vec![i; 3000]).unwrap());
    }
    assert_eq!(wal.active_segment_id(), 2);

    let mut reader = wal.new_reader();
    for i in 0..4u8 {
        let (data, _) = reader.next().unwrap().unwrap();
        assert_eq!(data, vec![i; 3000]);
    }
    assert!(reader.next().unwrap().is_none());
}

/// Staged records commit as one batch and read back individually.
#[test]
fn integration_batch_commit() {
    let dir = TempDir::new().unwrap();
    let wal = open_wal(&dir, 1024 * 1024);

    let records = [&b"first"[..], &b"second"[..], &b"third"[..]];
    for record in records {
        wal.pending_writes(record);
    }

    let positions = wal.write_all().unwrap();
    assert_eq!(positions.len(), 3);
    for (record, pos) in records.iter().zip(&positions) {
        assert_eq!(wal.read(pos).unwrap(), *record);
    }

    // The staging list is empty again.
    assert!(wal.write_all().unwrap().is_empty());
}

/// An oversized batch is rejected and dropped.
#[test]
fn integration_batch_too_large() {
    let dir = TempDir::new().unwrap();
    let wal = open_wal(&dir, 10_000);

    for _ in 0..4 {
        wal.pending_writes(vec![0u8; 3000]);
    }

    assert!(matches!(
        wal.write_all(),
        Err(seglog::Error::PendingSizeTooLarge { .. })
    ));
    assert!(wal.write_all().unwrap().is_empty());
    assert!(wal.is_empty());
}

/// IsEmpty flips once the first record lands.
#[test]
fn integration_is_empty() {
    let dir = TempDir::new().unwrap();
    {
        let wal = open_wal(&dir, 1024 * 1024);
        assert!(wal.is_empty());
        wal.close().unwrap();
    }

    // Reopening the untouched directory is still empty.
    let wal = open_wal(&dir, 1024 * 1024);
    assert!(wal.is_empty());

    wal.write(b"no longer empty").unwrap();
    assert!(!wal.is_empty());
}

/// Encoded positions survive a round-trip through bytes.
#[test]
fn integration_position_codec() {
    let dir = TempDir::new().unwrap();
    let wal = open_wal(&dir, 1024 * 1024);

    let pos = wal.write(b"indexed record").unwrap();
    let encoded = pos.encode();

    let decoded = ChunkPosition::decode(&encoded).unwrap();
    assert_eq!(decoded, pos);
    assert_eq!(wal.read(&decoded).unwrap(), "indexed record");
}

/// Concurrent stagers, writers, and readers coexist.
#[test]
fn integration_concurrent_staging_and_reads() {
    let dir = TempDir::new().unwrap();
    let wal = Arc::new(open_wal(&dir, 4 * 1024 * 1024));

    // Seed some records for the readers.
    let seeded: Vec<ChunkPosition> = (0..50)
        .map(|i| wal.write(format!("seed {}", i).as_bytes()).unwrap())
        .collect();

    let mut handles = Vec::new();

    for t in 0..2 {
        let wal = Arc::clone(&wal);
        handles.push(thread::spawn(move || {
            for i in 0..100 {
                wal.pending_writes(format!("staged t{} i{}", t, i).into_bytes());
            }
        }));
    }

    for _ in 0..2 {
        let wal = Arc::clone(&wal);
        let seeded = seeded.clone();
        handles.push(thread::spawn(move || {
            for pos in &seeded {
                wal.read(pos).unwrap();
            }
        }));
    }

    for h in handles {
        h.join().unwrap();
    }

    let positions = wal.write_all().unwrap();
    assert_eq!(positions.len(), 200);
    for pos in &positions {
        assert!(wal.read(pos).unwrap().starts_with(b"staged"));
    }
}

/// Linearizable writes: positions come back in write order per thread
/// and every record reads back intact.
#[test]
fn integration_concurrent_writers() {
    let dir = TempDir::new().unwrap();
    let wal = Arc::new(open_wal(&dir, 1024 * 1024));

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let wal = Arc::clone(&wal);
            thread::spawn(move || {
                let mut last = None;
                for i in 0..200 {
                    let record = format!("t{} r{}", t, i);
                    let pos = wal.write(record.as_bytes()).unwrap();
                    let key = (pos.segment_id, pos.block_number, pos.chunk_offset);
                    if let Some(prev) = last {
                        assert!(key > prev);
                    }
                    last = Some(key);
                    assert_eq!(wal.read(&pos).unwrap(), record.as_bytes());
                }
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }

    let mut reader = wal.new_reader();
    let mut count = 0;
    while reader.next().unwrap().is_some() {
        count += 1;
    }
    assert_eq!(count, 800);
}

/// Delete removes every segment file.
#[test]
fn integration_delete() {
    let dir = TempDir::new().unwrap();
    let wal = open_wal(&dir, 10_000);

    for i in 0..6u8 {
        wal.write(&vec![i; 3000]).unwrap();
    }
    wal.delete().unwrap();

    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

/// Close records segment ids for a later extension rename.
#[test]
fn integration_close_then_rename_ext() {
    let dir = TempDir::new().unwrap();
    let wal = open_wal(&dir, 10_000);

    for i in 0..4u8 {
        wal.write(&vec![i; 3000]).unwrap();
    }
    wal.close().unwrap();
    wal.rename_file_ext(".HINT").unwrap();

    assert!(dir.path().join("000000001.HINT").is_file());
    assert!(dir.path().join("000000002.HINT").is_file());
    assert!(!dir.path().join("000000001.SEG").exists());
    assert!(!dir.path().join("000000002.SEG").exists());
}
