//! CRC32C (Castagnoli) checksum utilities.

use crc32c::crc32c_append;

/// Compute the CRC32C checksum of the given data.
pub fn crc32c(data: &[u8]) -> u32 {
    crc32c_append(0, data)
}

/// Compute the CRC32C checksum of multiple data slices.
pub fn crc32c_multi(slices: &[&[u8]]) -> u32 {
    slices.iter().fold(0, |sum, slice| crc32c_append(sum, slice))
}

/// Extend an existing CRC32C with more data.
pub fn crc32c_extend(crc: u32, data: &[u8]) -> u32 {
    crc32c_append(crc, data)
}

/// Verify that data matches the expected CRC32C.
pub fn verify_crc32c(data: &[u8], expected: u32) -> bool {
    crc32c(data) == expected
}
