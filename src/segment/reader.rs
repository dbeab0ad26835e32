//! Cursor over one segment's records.

use std::sync::Arc;

use bytes::Bytes;

use crate::chunk::{ChunkPosition, BLOCK_SIZE};
use crate::Result;

use super::Segment;

/// Sequential reader over a single segment.
///
/// Yields each record with its position, advancing block by block and
/// skipping trailer padding.
pub(crate) struct SegmentReader {
    segment: Arc<Segment>,
    block_number: u32,
    chunk_offset: u64,
}

impl SegmentReader {
    pub(crate) fn new(segment: Arc<Segment>) -> Self {
        Self {
            segment,
            block_number: 0,
            chunk_offset: 0,
        }
    }

    pub(crate) fn segment_id(&self) -> u32 {
        self.segment.id()
    }

    /// Position of the chunk the cursor currently points at.
    pub(crate) fn current_chunk_position(&self) -> ChunkPosition {
        ChunkPosition {
            segment_id: self.segment.id(),
            block_number: self.block_number,
            chunk_offset: self.chunk_offset,
            chunk_size: 0,
        }
    }

    /// Read the record at the cursor and advance past it.
    ///
    /// Returns `Ok(None)` once the cursor is past the last valid record.
    pub(crate) fn next(&mut self) -> Result<Option<(Bytes, ChunkPosition)>> {
        let mut position = self.current_chunk_position();

        match self.segment.read_internal(self.block_number, self.chunk_offset)? {
            Some((data, next)) => {
                // The footprint derived from cursor movement includes any
                // trailer padding crossed; it is an accounting estimate.
                let start = position.block_number as u64 * BLOCK_SIZE as u64 + position.chunk_offset;
                let end = next.block_number as u64 * BLOCK_SIZE as u64 + next.chunk_offset;
                position.chunk_size = (end - start) as u32;

                self.block_number = next.block_number;
                self.chunk_offset = next.chunk_offset;

                Ok(Some((data, position)))
            }
            None => Ok(None),
        }
    }
}
