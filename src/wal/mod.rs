//! Write-ahead log orchestration.
//!
//! The log owns exactly one writable active segment (the highest id) and
//! any number of older, read-only segments. Writes are serialized under
//! a write lock, rotate the active segment when it is full, and return
//! stable [`ChunkPosition`] handles for later positional reads. A
//! separate staging lock lets callers accumulate a batch with
//! [`Wal::pending_writes`] while reads are in flight, then commit it
//! atomically with [`Wal::write_all`].

mod reader;

pub use reader::Reader;

use std::collections::HashMap;
use std::fs;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::{Mutex, RwLock};

use crate::cache::BlockCache;
use crate::chunk::{ChunkPosition, BLOCK_SIZE, CHUNK_HEADER_SIZE};
use crate::options::Options;
use crate::segment::{Segment, SegmentReader};
use crate::util::filename::{create_dir_if_missing, parse_segment_file_name, segment_file_name};
use crate::{Error, Result};

/// Id of the first segment file in a fresh directory.
const INITIAL_SEGMENT_FILE_ID: u32 = 1;

/// An append-only, crash-safe write-ahead log.
pub struct Wal {
    inner: RwLock<WalInner>,
    pending: Mutex<PendingBatch>,
    block_cache: Option<Arc<BlockCache>>,
}

struct WalInner {
    /// The single writable segment, holding the highest id.
    active: Arc<Segment>,
    /// Older segments, read-only.
    older: HashMap<u32, Arc<Segment>>,
    options: Options,
    /// Segment ids recorded at close, for a later extension rename.
    rename_ids: Vec<u32>,
    /// Bytes appended since the last fsync of the active segment.
    bytes_since_sync: u32,
}

#[derive(Default)]
struct PendingBatch {
    writes: Vec<Bytes>,
    /// Estimated on-disk footprint of the staged records.
    size: u64,
}

impl Wal {
    /// Open a write-ahead log directory.
    ///
    /// Creates the directory if absent, opens every file matching
    /// `{digits}{ext}` as a segment, and makes the highest id the active
    /// segment. An empty directory starts with a fresh segment of id 1.
    pub fn open(options: Options) -> Result<Wal> {
        options.validate()?;
        create_dir_if_missing(&options.dir_path)?;

        let block_cache = if options.block_cache > 0 {
            Some(Arc::new(BlockCache::with_byte_budget(options.block_cache)))
        } else {
            None
        };

        let mut segment_ids = Vec::new();
        for entry in fs::read_dir(&options.dir_path)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name();
            if let Some(id) =
                parse_segment_file_name(&name.to_string_lossy(), &options.segment_file_ext)
            {
                segment_ids.push(id);
            }
        }
        segment_ids.sort_unstable();

        let open_segment = |id: u32| {
            Segment::open(
                &options.dir_path,
                &options.segment_file_ext,
                id,
                block_cache.clone(),
            )
            .map(Arc::new)
        };

        let mut older = HashMap::new();
        let active = match segment_ids.split_last() {
            None => open_segment(INITIAL_SEGMENT_FILE_ID)?,
            Some((&last, rest)) => {
                for &id in rest {
                    older.insert(id, open_segment(id)?);
                }
                open_segment(last)?
            }
        };

        Ok(Wal {
            inner: RwLock::new(WalInner {
                active,
                older,
                options,
                rename_ids: Vec::new(),
                bytes_since_sync: 0,
            }),
            pending: Mutex::new(PendingBatch::default()),
            block_cache,
        })
    }

    /// Append one record, returning its position.
    ///
    /// Rotates first when the active segment cannot hold the record, and
    /// fsyncs afterwards when the durability options call for it.
    pub fn write(&self, data: &[u8]) -> Result<ChunkPosition> {
        let mut inner = self.inner.write();

        let size = data.len() as u64 + CHUNK_HEADER_SIZE as u64;
        if size > inner.options.segment_size {
            return Err(Error::DataSizeTooLarge {
                size,
                max: inner.options.segment_size,
            });
        }
        if inner.active.size() + max_data_write_size(data.len() as u64)
            > inner.options.segment_size
        {
            self.rotate_active_segment(&mut inner)?;
        }

        let position = inner.active.write(data)?;
        inner.bytes_since_sync += position.chunk_size;

        let need_sync = inner.options.sync
            || (inner.options.bytes_per_sync > 0
                && inner.bytes_since_sync >= inner.options.bytes_per_sync);
        if need_sync {
            inner.active.sync()?;
            inner.bytes_since_sync = 0;
        }

        Ok(position)
    }

    /// Read the record at the given position.
    pub fn read(&self, pos: &ChunkPosition) -> Result<Bytes> {
        let inner = self.inner.read();

        let segment = if pos.segment_id == inner.active.id() {
            &inner.active
        } else {
            inner
                .older
                .get(&pos.segment_id)
                .ok_or(Error::SegmentNotFound(pos.segment_id))?
        };

        segment.read(pos.block_number, pos.chunk_offset)
    }

    /// Stage a record for a later [`Wal::write_all`].
    ///
    /// Never touches the segments; only the staging list is updated.
    pub fn pending_writes(&self, data: impl Into<Bytes>) {
        let data = data.into();
        let mut pending = self.pending.lock();
        pending.size += max_data_write_size(data.len() as u64);
        pending.writes.push(data);
    }

    /// Drop any staged records without writing them.
    pub fn clear_pending_writes(&self) {
        let mut pending = self.pending.lock();
        pending.writes.clear();
        pending.size = 0;
    }

    /// Commit all staged records in one batch, returning their positions.
    ///
    /// The staging list is drained whether or not the commit succeeds; a
    /// failed batch must be reconstructed by the caller. The batch is
    /// never fsynced here, even with `sync` enabled; durability of a
    /// batch is the caller's call via [`Wal::sync`].
    pub fn write_all(&self) -> Result<Vec<ChunkPosition>> {
        let mut inner = self.inner.write();

        let (batch, pending_size) = {
            let mut pending = self.pending.lock();
            let size = pending.size;
            pending.size = 0;
            (std::mem::take(&mut pending.writes), size)
        };
        if batch.is_empty() {
            return Ok(Vec::new());
        }

        if pending_size > inner.options.segment_size {
            return Err(Error::PendingSizeTooLarge {
                size: pending_size,
                max: inner.options.segment_size,
            });
        }

        if inner.active.size() + pending_size > inner.options.segment_size {
            self.rotate_active_segment(&mut inner)?;
        }

        inner.active.write_all(&batch)
    }

    /// Seal the active segment and open its successor, even if the
    /// active one is not full.
    pub fn open_new_active_segment(&self) -> Result<()> {
        let mut inner = self.inner.write();
        inner.active.sync()?;
        self.install_new_segment(&mut inner)
    }

    /// Id of the active segment.
    pub fn active_segment_id(&self) -> u32 {
        self.inner.read().active.id()
    }

    /// Whether the log holds no records at all.
    pub fn is_empty(&self) -> bool {
        let inner = self.inner.read();
        inner.older.is_empty() && inner.active.size() == 0
    }

    /// Sequential reader over every record in the log.
    pub fn new_reader(&self) -> Reader {
        self.new_reader_with_max(0)
    }

    /// Sequential reader over all segments with id at most
    /// `max_segment_id` (0 means no bound).
    pub fn new_reader_with_max(&self, max_segment_id: u32) -> Reader {
        let inner = self.inner.read();

        let mut segment_readers: Vec<SegmentReader> = inner
            .older
            .values()
            .filter(|segment| max_segment_id == 0 || segment.id() <= max_segment_id)
            .map(|segment| SegmentReader::new(Arc::clone(segment)))
            .collect();
        if max_segment_id == 0 || inner.active.id() <= max_segment_id {
            segment_readers.push(SegmentReader::new(Arc::clone(&inner.active)));
        }

        segment_readers.sort_by_key(SegmentReader::segment_id);
        Reader::new(segment_readers)
    }

    /// Sequential reader positioned at the first record whose position
    /// is not before `start`.
    pub fn new_reader_with_start(&self, start: &ChunkPosition) -> Result<Reader> {
        let mut reader = self.new_reader();

        loop {
            let Some(segment_id) = reader.current_segment_id() else {
                break;
            };
            if segment_id < start.segment_id {
                reader.skip_current_segment();
                continue;
            }
            let Some(current) = reader.current_chunk_position() else {
                break;
            };
            if current.block_number >= start.block_number
                && current.chunk_offset >= start.chunk_offset
            {
                break;
            }
            if reader.next()?.is_none() {
                break;
            }
        }

        Ok(reader)
    }

    /// Fsync the active segment. Older segments are immutable and
    /// presumed already durable.
    pub fn sync(&self) -> Result<()> {
        let inner = self.inner.write();
        inner.active.sync()
    }

    /// Close every segment. The log is unusable afterwards except for
    /// [`Wal::rename_file_ext`].
    pub fn close(&self) -> Result<()> {
        let mut inner = self.inner.write();

        let older = std::mem::take(&mut inner.older);
        for (id, segment) in older {
            segment.close()?;
            inner.rename_ids.push(id);
        }

        let active_id = inner.active.id();
        inner.rename_ids.push(active_id);
        inner.active.close()
    }

    /// Remove every segment file of the log.
    pub fn delete(&self) -> Result<()> {
        let mut inner = self.inner.write();

        let older = std::mem::take(&mut inner.older);
        for (_, segment) in older {
            segment.remove()?;
        }
        inner.active.remove()
    }

    /// Rename the files recorded by [`Wal::close`] to a new extension.
    pub fn rename_file_ext(&self, ext: &str) -> Result<()> {
        if !ext.starts_with('.') {
            return Err(Error::InvalidConfiguration(
                "segment_file_ext must start with '.'".into(),
            ));
        }
        let mut inner = self.inner.write();

        for i in 0..inner.rename_ids.len() {
            let id = inner.rename_ids[i];
            let old = segment_file_name(
                &inner.options.dir_path,
                &inner.options.segment_file_ext,
                id,
            );
            let new = segment_file_name(&inner.options.dir_path, ext, id);
            fs::rename(old, new)?;
        }

        inner.options.segment_file_ext = ext.to_string();
        Ok(())
    }

    /// Sync the active segment and install a fresh successor.
    fn rotate_active_segment(&self, inner: &mut WalInner) -> Result<()> {
        inner.active.sync()?;
        inner.bytes_since_sync = 0;
        self.install_new_segment(inner)
    }

    fn install_new_segment(&self, inner: &mut WalInner) -> Result<()> {
        let segment = Arc::new(Segment::open(
            &inner.options.dir_path,
            &inner.options.segment_file_ext,
            inner.active.id() + 1,
            self.block_cache.clone(),
        )?);
        let sealed = std::mem::replace(&mut inner.active, segment);
        inner.older.insert(sealed.id(), sealed);
        Ok(())
    }
}

/// Conservative upper bound on the on-disk footprint of one record,
/// counting a header per block it may touch.
///
/// Deliberately over-estimates when `size` is a multiple of the block
/// size, keeping a safety margin in rotation decisions.
fn max_data_write_size(size: u64) -> u64 {
    CHUNK_HEADER_SIZE as u64
        + size
        + (size / BLOCK_SIZE as u64 + 1) * CHUNK_HEADER_SIZE as u64
}
