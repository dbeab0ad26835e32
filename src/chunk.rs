//! Chunk framing for segment files.
//!
//! Records are stored as chains of chunks inside fixed-size 32KB blocks.
//! Each chunk carries a 7-byte header:
//! - CRC32C checksum (4 bytes, little-endian)
//! - Payload length (2 bytes, little-endian)
//! - Chunk type (1 byte): FULL, FIRST, MIDDLE, LAST
//!
//! The checksum covers the length and type bytes followed by the payload.
//! Records that don't fit in the remaining space of a block are split
//! across blocks using FIRST, MIDDLE, and LAST chunks; a chunk header
//! never straddles a block boundary.

use bytes::{BufMut, Bytes, BytesMut};

use crate::util::coding::{decode_varint64, encode_varint64, MAX_VARINT64_LEN};
use crate::util::crc::crc32c_multi;

/// Block size for segment files (32KB).
pub const BLOCK_SIZE: u32 = 32 * 1024;

/// Chunk header size: CRC (4) + Length (2) + Type (1) = 7 bytes.
pub const CHUNK_HEADER_SIZE: u32 = 7;

/// Maximum payload size of a single chunk within a block.
pub const MAX_CHUNK_PAYLOAD_SIZE: u32 = BLOCK_SIZE - CHUNK_HEADER_SIZE;

/// Chunk types for framed records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ChunkType {
    /// Complete record in a single chunk.
    Full = 1,
    /// First chunk of a fragmented record.
    First = 2,
    /// Middle chunk(s) of a fragmented record.
    Middle = 3,
    /// Last chunk of a fragmented record.
    Last = 4,
}

impl ChunkType {
    /// Create from byte value.
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(ChunkType::Full),
            2 => Some(ChunkType::First),
            3 => Some(ChunkType::Middle),
            4 => Some(ChunkType::Last),
            _ => None,
        }
    }

    /// Convert to byte.
    pub fn to_byte(self) -> u8 {
        self as u8
    }
}

/// Position of a record in the log.
///
/// Returned by every write and accepted by positional reads. It locates
/// the record's FULL (or FIRST) chunk; `chunk_size` is the record's
/// on-disk footprint in headers and payload, used for accounting only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPosition {
    /// Id of the segment file holding the record.
    pub segment_id: u32,
    /// Block number of the record's first chunk within the segment.
    pub block_number: u32,
    /// Byte offset of the chunk header within its block.
    pub chunk_offset: u64,
    /// Total bytes of headers and payload occupied by the record.
    pub chunk_size: u32,
}

impl ChunkPosition {
    /// Serialize the position as a sequence of varints.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(4 * MAX_VARINT64_LEN);
        encode_varint64(&mut buf, self.segment_id as u64);
        encode_varint64(&mut buf, self.block_number as u64);
        encode_varint64(&mut buf, self.chunk_offset);
        encode_varint64(&mut buf, self.chunk_size as u64);
        buf.freeze()
    }

    /// Deserialize a position encoded by [`ChunkPosition::encode`].
    ///
    /// Returns `None` on truncated or malformed input.
    pub fn decode(buf: &[u8]) -> Option<ChunkPosition> {
        let mut slice = buf;
        let segment_id = decode_varint64(&mut slice)?;
        let block_number = decode_varint64(&mut slice)?;
        let chunk_offset = decode_varint64(&mut slice)?;
        let chunk_size = decode_varint64(&mut slice)?;

        Some(ChunkPosition {
            segment_id: u32::try_from(segment_id).ok()?,
            block_number: u32::try_from(block_number).ok()?,
            chunk_offset,
            chunk_size: u32::try_from(chunk_size).ok()?,
        })
    }
}

/// Decoded chunk header fields.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ChunkHeader {
    pub checksum: u32,
    pub length: u16,
    pub chunk_type: u8,
}

impl ChunkHeader {
    /// Decode the header at `offset` within a block.
    ///
    /// The caller guarantees `offset + CHUNK_HEADER_SIZE <= block.len()`.
    pub fn decode(block: &[u8], offset: usize) -> ChunkHeader {
        let header = &block[offset..offset + CHUNK_HEADER_SIZE as usize];
        ChunkHeader {
            checksum: u32::from_le_bytes([header[0], header[1], header[2], header[3]]),
            length: u16::from_le_bytes([header[4], header[5]]),
            chunk_type: header[6],
        }
    }
}

/// Append one framed chunk (header + payload) to a write buffer.
pub(crate) fn append_chunk(buf: &mut BytesMut, data: &[u8], chunk_type: ChunkType) {
    debug_assert!(data.len() <= MAX_CHUNK_PAYLOAD_SIZE as usize);

    let mut header = [0u8; CHUNK_HEADER_SIZE as usize];
    header[4..6].copy_from_slice(&(data.len() as u16).to_le_bytes());
    header[6] = chunk_type.to_byte();

    // The checksum covers length, type, and payload.
    let sum = crc32c_multi(&[&header[4..7], data]);
    header[0..4].copy_from_slice(&sum.to_le_bytes());

    buf.put_slice(&header);
    buf.put_slice(data);
}
