//! Error types for seglog.

use std::io;
use thiserror::Error;

/// Result type alias for seglog operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for write-ahead log operations.
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// I/O error from file operations.
    #[error("I/O error: {0}")]
    Io(String),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A single record, with its header, exceeds the segment size.
    #[error("Data size too large: {size} bytes (segment size: {max})")]
    DataSizeTooLarge { size: u64, max: u64 },

    /// A staged batch exceeds the segment size.
    #[error("Pending batch too large: {size} bytes (segment size: {max})")]
    PendingSizeTooLarge { size: u64, max: u64 },

    /// A read was given a position whose segment is not present.
    #[error("Segment file {0} not found")]
    SegmentNotFound(u32),

    /// Chunk decoding failed: checksum mismatch, invalid type tag,
    /// or impossible length.
    #[error("Corrupt chunk: {0}")]
    CorruptChunk(String),

    /// A multi-chunk record was truncated before its last chunk.
    #[error("Unexpected end of segment file")]
    UnexpectedEof,

    /// The segment file has been closed.
    #[error("Segment file is closed")]
    SegmentClosed,
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl Error {
    /// Create a corrupt-chunk error with the given message.
    pub fn corruption<S: Into<String>>(msg: S) -> Self {
        Error::CorruptChunk(msg.into())
    }

    /// Check if this error indicates on-disk corruption.
    pub fn is_corruption(&self) -> bool {
        matches!(self, Error::CorruptChunk(_) | Error::UnexpectedEof)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::corruption("bad chunk");
        assert_eq!(format!("{}", err), "Corrupt chunk: bad chunk");

        let err = Error::DataSizeTooLarge {
            size: 2000,
            max: 1000,
        };
        assert_eq!(
            format!("{}", err),
            "Data size too large: 2000 bytes (segment size: 1000)"
        );
    }

    #[test]
    fn test_error_is_corruption() {
        assert!(Error::corruption("bad").is_corruption());
        assert!(Error::UnexpectedEof.is_corruption());
        assert!(!Error::SegmentNotFound(3).is_corruption());
        assert!(!Error::SegmentClosed.is_corruption());
    }

    #[test]
    fn test_error_from_io() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "denied");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
