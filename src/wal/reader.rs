//! Sequential reader over the whole log.

use bytes::Bytes;

use crate::chunk::ChunkPosition;
use crate::segment::SegmentReader;
use crate::Result;

/// Reader over every record of the log, in segment-id order.
///
/// Created by [`Wal::new_reader`](crate::Wal::new_reader) and friends.
/// The reader walks a snapshot of the segments taken at construction;
/// records appended afterwards may or may not be observed.
pub struct Reader {
    segment_readers: Vec<SegmentReader>,
    current_reader: usize,
}

impl Reader {
    pub(crate) fn new(segment_readers: Vec<SegmentReader>) -> Self {
        Self {
            segment_readers,
            current_reader: 0,
        }
    }

    /// Return the next record and its position.
    ///
    /// Returns `Ok(None)` once every segment is exhausted.
    pub fn next(&mut self) -> Result<Option<(Bytes, ChunkPosition)>> {
        loop {
            let Some(reader) = self.segment_readers.get_mut(self.current_reader) else {
                return Ok(None);
            };
            match reader.next()? {
                Some(item) => return Ok(Some(item)),
                None => self.current_reader += 1,
            }
        }
    }

    /// Advance to the next segment without reading further records from
    /// the current one.
    pub fn skip_current_segment(&mut self) {
        self.current_reader += 1;
    }

    /// Id of the segment the cursor is in, or `None` when exhausted.
    pub fn current_segment_id(&self) -> Option<u32> {
        self.segment_readers
            .get(self.current_reader)
            .map(SegmentReader::segment_id)
    }

    /// Position of the chunk the cursor points at, or `None` when
    /// exhausted.
    pub fn current_chunk_position(&self) -> Option<ChunkPosition> {
        self.segment_readers
            .get(self.current_reader)
            .map(SegmentReader::current_chunk_position)
    }
}

#[cfg(test)]
mod tests {
    use crate::{Options, Wal};
    use tempfile::tempdir;

    fn small_segment_wal(dir: &std::path::Path) -> Wal {
        let options = Options {
            dir_path: dir.to_path_buf(),
            segment_size: 10_000,
            ..Options::default()
        };
        Wal::open(options).unwrap()
    }

    #[test]
    fn test_reader_empty_log() {
        let dir = tempdir().unwrap();
        let wal = small_segment_wal(dir.path());

        let mut reader = wal.new_reader();
        assert_eq!(reader.current_segment_id(), Some(1));
        assert!(reader.next().unwrap().is_none());
        assert_eq!(reader.current_segment_id(), None);
        assert_eq!(reader.current_chunk_position(), None);
    }

    #[test]
    fn test_reader_spans_segments_in_order() {
        let dir = tempdir().unwrap();
        let wal = small_segment_wal(dir.path());

        let mut written = Vec::new();
        for i in 0..8u8 {
            let record = vec![i; 3000];
            let pos = wal.write(&record).unwrap();
            written.push((record, pos));
        }
        assert!(wal.active_segment_id() > 1);

        let mut reader = wal.new_reader();
        for (record, pos) in &written {
            let (data, position) = reader.next().unwrap().unwrap();
            assert_eq!(data, &record[..]);
            assert_eq!(position.segment_id, pos.segment_id);
            assert_eq!(position.block_number, pos.block_number);
            assert_eq!(position.chunk_offset, pos.chunk_offset);
        }
        assert!(reader.next().unwrap().is_none());
    }

    #[test]
    fn test_reader_with_max_segment_id() {
        let dir = tempdir().unwrap();
        let wal = small_segment_wal(dir.path());

        for i in 0..8u8 {
            wal.write(&vec![i; 3000]).unwrap();
        }
        let mut reader = wal.new_reader_with_max(1);
        let mut count = 0;
        while let Some((_, pos)) = reader.next().unwrap() {
            assert_eq!(pos.segment_id, 1);
            count += 1;
        }
        // Segment 1 held the first three records before rotation.
        assert_eq!(count, 3);
    }

    #[test]
    fn test_reader_skip_current_segment() {
        let dir = tempdir().unwrap();
        let wal = small_segment_wal(dir.path());

        for i in 0..8u8 {
            wal.write(&vec![i; 3000]).unwrap();
        }

        let mut reader = wal.new_reader();
        assert_eq!(reader.current_segment_id(), Some(1));
        reader.skip_current_segment();
        assert_eq!(reader.current_segment_id(), Some(2));

        let (data, pos) = reader.next().unwrap().unwrap();
        assert_eq!(pos.segment_id, 2);
        assert_eq!(data, vec![3u8; 3000]);
    }

    #[test]
    fn test_reader_with_start_within_segment() {
        let dir = tempdir().unwrap();
        let wal = small_segment_wal(dir.path());

        let mut positions = Vec::new();
        for i in 0..10 {
            positions.push(wal.write(format!("record {}", i).as_bytes()).unwrap());
        }

        let mut reader = wal.new_reader_with_start(&positions[5]).unwrap();
        for i in 5..10 {
            let (data, _) = reader.next().unwrap().unwrap();
            assert_eq!(data, format!("record {}", i).as_bytes());
        }
        assert!(reader.next().unwrap().is_none());
    }

    #[test]
    fn test_reader_with_start_skips_whole_segments() {
        let dir = tempdir().unwrap();
        let wal = small_segment_wal(dir.path());

        let mut positions = Vec::new();
        for i in 0..8u8 {
            positions.push(wal.write(&vec![i; 3000]).unwrap());
        }
        let start = positions.iter().find(|p| p.segment_id == 2).unwrap();

        let mut reader = wal.new_reader_with_start(start).unwrap();
        let (data, pos) = reader.next().unwrap().unwrap();
        assert_eq!(pos.segment_id, 2);
        assert_eq!(data, vec![3u8; 3000]);
    }

    #[test]
    fn test_reader_with_start_past_end() {
        let dir = tempdir().unwrap();
        let wal = small_segment_wal(dir.path());

        wal.write(b"only record").unwrap();

        let start = crate::ChunkPosition {
            segment_id: 99,
            block_number: 0,
            chunk_offset: 0,
            chunk_size: 0,
        };
        let mut reader = wal.new_reader_with_start(&start).unwrap();
        assert!(reader.next().unwrap().is_none());
    }
}
