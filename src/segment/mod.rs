//! Segment files.
//!
//! A segment is one append-only file within the log, a contiguous stream
//! of 32KB blocks holding framed chunks. The write-ahead log serializes
//! all appends, rotates to a new segment when the current one is full,
//! and reads any segment by `(block_number, chunk_offset)` position.

mod reader;

pub(crate) use reader::SegmentReader;

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::{BufMut, Bytes, BytesMut};
use parking_lot::Mutex;

use crate::cache::BlockCache;
use crate::chunk::{
    append_chunk, ChunkHeader, ChunkPosition, ChunkType, BLOCK_SIZE, CHUNK_HEADER_SIZE,
    MAX_CHUNK_PAYLOAD_SIZE,
};
use crate::util::crc::crc32c;
use crate::util::filename::segment_file_name;
use crate::{Error, Result};

/// One segment file of the log.
///
/// Mutable append state lives behind a mutex so sequential readers can
/// hold a reference to a segment while the log keeps appending to it.
pub(crate) struct Segment {
    id: u32,
    path: PathBuf,
    file: File,
    cache: Option<Arc<BlockCache>>,
    state: Mutex<SegmentState>,
}

struct SegmentState {
    /// Number of the block currently being filled.
    block_number: u32,
    /// Bytes already written into the current block.
    block_size: u32,
    closed: bool,
}

impl Segment {
    /// Open or create the segment file `{dir}/{id:09}{ext}`.
    ///
    /// The append position is derived from the file length, so a segment
    /// reopens exactly where the last flushed write left it.
    pub(crate) fn open(
        dir: &Path,
        ext: &str,
        id: u32,
        cache: Option<Arc<BlockCache>>,
    ) -> Result<Segment> {
        let path = segment_file_name(dir, ext, id);
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)?;

        let len = file.metadata()?.len();

        Ok(Segment {
            id,
            path,
            file,
            cache,
            state: Mutex::new(SegmentState {
                block_number: (len / BLOCK_SIZE as u64) as u32,
                block_size: (len % BLOCK_SIZE as u64) as u32,
                closed: false,
            }),
        })
    }

    pub(crate) fn id(&self) -> u32 {
        self.id
    }

    /// Logical size of the segment in bytes.
    pub(crate) fn size(&self) -> u64 {
        let state = self.state.lock();
        state.block_number as u64 * BLOCK_SIZE as u64 + state.block_size as u64
    }

    /// Append one record, returning its position.
    pub(crate) fn write(&self, data: &[u8]) -> Result<ChunkPosition> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(Error::SegmentClosed);
        }

        let origin = (state.block_number, state.block_size);
        let mut buf = BytesMut::new();
        let position = self.write_to_buffer(&mut state, data, &mut buf);

        if let Err(e) = self.write_chunk_buffer(&state, &buf) {
            state.block_number = origin.0;
            state.block_size = origin.1;
            return Err(e);
        }
        Ok(position)
    }

    /// Append a batch of records in a single file write.
    ///
    /// Returns one position per record, in order. Like [`Segment::write`],
    /// a failed file write rolls the append state back, so the whole batch
    /// lands or none of it does.
    pub(crate) fn write_all(&self, batch: &[Bytes]) -> Result<Vec<ChunkPosition>> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(Error::SegmentClosed);
        }

        let origin = (state.block_number, state.block_size);
        let mut buf = BytesMut::new();
        let positions = batch
            .iter()
            .map(|data| self.write_to_buffer(&mut state, data, &mut buf))
            .collect();

        if let Err(e) = self.write_chunk_buffer(&state, &buf) {
            state.block_number = origin.0;
            state.block_size = origin.1;
            return Err(e);
        }
        Ok(positions)
    }

    /// Frame one record into the write buffer and advance the append state.
    fn write_to_buffer(
        &self,
        state: &mut SegmentState,
        data: &[u8],
        buf: &mut BytesMut,
    ) -> ChunkPosition {
        // If the remaining block space cannot hold even a chunk header,
        // pad it with zeros and start a new block. A header is still
        // allowed to land flush against the block end.
        if state.block_size + CHUNK_HEADER_SIZE > BLOCK_SIZE {
            buf.put_bytes(0, (BLOCK_SIZE - state.block_size) as usize);
            state.block_number += 1;
            state.block_size = 0;
        }

        let mut position = ChunkPosition {
            segment_id: self.id,
            block_number: state.block_number,
            chunk_offset: state.block_size as u64,
            chunk_size: 0,
        };

        let data_size = data.len() as u32;
        if state.block_size + data_size + CHUNK_HEADER_SIZE <= BLOCK_SIZE {
            append_chunk(buf, data, ChunkType::Full);
            position.chunk_size = CHUNK_HEADER_SIZE + data_size;
        } else {
            // The record spans blocks: FIRST in the remainder of this
            // block (payload-free when only the header room is left),
            // MIDDLE chunks filling whole blocks, then LAST.
            let mut left = data_size;
            let mut block_count = 0u32;
            let mut block_size = state.block_size;
            let mut begin = true;

            while left > 0 {
                let avail = BLOCK_SIZE - block_size - CHUNK_HEADER_SIZE;
                let chunk_len = avail.min(left);
                let start = data_size - left;

                let chunk_type = if begin {
                    ChunkType::First
                } else if chunk_len == left {
                    ChunkType::Last
                } else {
                    ChunkType::Middle
                };
                append_chunk(
                    buf,
                    &data[start as usize..(start + chunk_len) as usize],
                    chunk_type,
                );

                left -= chunk_len;
                block_count += 1;
                block_size = (block_size + chunk_len + CHUNK_HEADER_SIZE) % BLOCK_SIZE;
                begin = false;
            }
            position.chunk_size = block_count * CHUNK_HEADER_SIZE + data_size;
        }

        state.block_size += position.chunk_size;
        if state.block_size >= BLOCK_SIZE {
            state.block_number += state.block_size / BLOCK_SIZE;
            state.block_size %= BLOCK_SIZE;
        }

        position
    }

    /// Flush the framed buffer to the file in one append.
    fn write_chunk_buffer(&self, state: &SegmentState, buf: &[u8]) -> Result<()> {
        debug_assert!(state.block_size <= BLOCK_SIZE);
        (&self.file).write_all(buf)?;
        Ok(())
    }

    /// Read the record starting at the given position.
    pub(crate) fn read(&self, block_number: u32, chunk_offset: u64) -> Result<Bytes> {
        match self.read_internal(block_number, chunk_offset)? {
            Some((data, _)) => Ok(data),
            None => Err(Error::UnexpectedEof),
        }
    }

    /// Read the record starting at the given position, also returning the
    /// position of the chunk that follows it.
    ///
    /// Returns `Ok(None)` at the end of the valid log: positions at or
    /// past the flushed tail, and torn writes at the tail of the final
    /// block, read as end-of-segment rather than corruption. A record
    /// whose first chunks decode but whose tail is missing surfaces as
    /// [`Error::UnexpectedEof`].
    pub(crate) fn read_internal(
        &self,
        mut block_number: u32,
        mut chunk_offset: u64,
    ) -> Result<Option<(Bytes, ChunkPosition)>> {
        let segment_size = {
            let state = self.state.lock();
            if state.closed {
                return Err(Error::SegmentClosed);
            }
            state.block_number as u64 * BLOCK_SIZE as u64 + state.block_size as u64
        };

        let mut result = BytesMut::new();
        let mut fragmented = false;

        loop {
            let block_offset = block_number as u64 * BLOCK_SIZE as u64;
            if block_offset >= segment_size {
                return self.end_of_segment(fragmented);
            }

            // The final block may be a partial one.
            let block_len = (BLOCK_SIZE as u64).min(segment_size - block_offset);
            if chunk_offset >= block_len {
                return self.end_of_segment(fragmented);
            }

            let block = self.read_block(block_number, block_offset, block_len)?;

            let header_end = chunk_offset + CHUNK_HEADER_SIZE as u64;
            if header_end > block_len {
                if block_len < BLOCK_SIZE as u64 {
                    // Torn header at the tail of the segment.
                    return self.end_of_segment(fragmented);
                }
                return Err(Error::corruption("chunk header out of bounds"));
            }

            let header = ChunkHeader::decode(&block, chunk_offset as usize);
            if header.length as u32 > MAX_CHUNK_PAYLOAD_SIZE {
                return Err(Error::corruption("chunk length exceeds block capacity"));
            }

            let payload_end = header_end + header.length as u64;
            if payload_end > block_len {
                if block_len < BLOCK_SIZE as u64 {
                    // Torn payload at the tail of the segment.
                    return self.end_of_segment(fragmented);
                }
                return Err(Error::corruption("chunk payload out of bounds"));
            }

            // The checksum covers length, type, and payload.
            let sum = crc32c(&block[chunk_offset as usize + 4..payload_end as usize]);
            if sum != header.checksum {
                return Err(Error::corruption("chunk checksum mismatch"));
            }

            let chunk_type = ChunkType::from_byte(header.chunk_type)
                .ok_or_else(|| Error::corruption("invalid chunk type"))?;

            result.extend_from_slice(&block[header_end as usize..payload_end as usize]);

            match chunk_type {
                ChunkType::Full | ChunkType::Last => {
                    let mut next = ChunkPosition {
                        segment_id: self.id,
                        block_number,
                        chunk_offset: payload_end,
                        chunk_size: 0,
                    };
                    // If the rest of the block cannot hold even a header,
                    // the next chunk starts in the next block. A header
                    // flush against the block end still belongs here.
                    if payload_end + CHUNK_HEADER_SIZE as u64 > BLOCK_SIZE as u64 {
                        next.block_number += 1;
                        next.chunk_offset = 0;
                    }
                    return Ok(Some((result.freeze(), next)));
                }
                ChunkType::First | ChunkType::Middle => {
                    fragmented = true;
                    block_number += 1;
                    chunk_offset = 0;
                }
            }
        }
    }

    fn end_of_segment(&self, fragmented: bool) -> Result<Option<(Bytes, ChunkPosition)>> {
        if fragmented {
            Err(Error::UnexpectedEof)
        } else {
            Ok(None)
        }
    }

    /// Load one block via the cache or a positional read.
    fn read_block(&self, block_number: u32, offset: u64, len: u64) -> Result<Bytes> {
        if let Some(cache) = &self.cache {
            if let Some(block) = cache.get(self.id, block_number) {
                return Ok(block);
            }
        }

        let mut buf = vec![0u8; len as usize];
        self.file.read_exact_at(&mut buf, offset)?;
        let block = Bytes::from(buf);

        // Only full blocks are immutable; never cache the partial tail.
        if let Some(cache) = &self.cache {
            if len == BLOCK_SIZE as u64 {
                cache.insert(self.id, block_number, block.clone());
            }
        }
        Ok(block)
    }

    /// Fsync the segment file. A no-op on a closed segment.
    pub(crate) fn sync(&self) -> Result<()> {
        if self.state.lock().closed {
            return Ok(());
        }
        self.file.sync_all()?;
        Ok(())
    }

    /// Close the segment. Subsequent reads and writes are rejected.
    pub(crate) fn close(&self) -> Result<()> {
        self.state.lock().closed = true;
        Ok(())
    }

    /// Close the segment and remove its file.
    pub(crate) fn remove(&self) -> Result<()> {
        self.state.lock().closed = true;
        std::fs::remove_file(&self.path)?;
        Ok(())
    }
}
