//! Configuration options for seglog.

use std::path::PathBuf;

use crate::chunk::CHUNK_HEADER_SIZE;
use crate::{Error, Result};

/// Default maximum segment file size before rotation (1GB).
pub const DEFAULT_SEGMENT_SIZE: u64 = 1024 * 1024 * 1024;

/// Default block cache budget in bytes (0 disables caching).
pub const DEFAULT_BLOCK_CACHE_SIZE: u32 = 0;

/// Default segment file extension.
pub const DEFAULT_SEGMENT_FILE_EXT: &str = ".SEG";

/// Write-ahead log configuration options.
#[derive(Debug, Clone)]
pub struct Options {
    /// Directory that holds all segment files; created if absent.
    pub dir_path: PathBuf,

    /// Maximum size of a segment file before rotation (bytes).
    pub segment_size: u64,

    /// Total block cache budget in bytes; 0 disables caching.
    ///
    /// Must not exceed `segment_size`.
    pub block_cache: u32,

    /// Segment file extension; must start with `.`.
    pub segment_file_ext: String,

    /// If true, fsync the active segment after every write.
    pub sync: bool,

    /// If `sync` is false and this is > 0, fsync after this many bytes
    /// have been written since the last fsync.
    pub bytes_per_sync: u32,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            dir_path: std::env::temp_dir().join("seglog"),
            segment_size: DEFAULT_SEGMENT_SIZE,
            block_cache: DEFAULT_BLOCK_CACHE_SIZE,
            segment_file_ext: DEFAULT_SEGMENT_FILE_EXT.to_string(),
            sync: false,
            bytes_per_sync: 0,
        }
    }
}

impl Options {
    /// Create new options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the options.
    pub fn validate(&self) -> Result<()> {
        if !self.segment_file_ext.starts_with('.') {
            return Err(Error::InvalidConfiguration(
                "segment_file_ext must start with '.'".into(),
            ));
        }

        if self.segment_size <= CHUNK_HEADER_SIZE as u64 {
            return Err(Error::InvalidConfiguration(format!(
                "segment_size must be larger than the chunk header size ({})",
                CHUNK_HEADER_SIZE
            )));
        }

        if self.block_cache as u64 > self.segment_size {
            return Err(Error::InvalidConfiguration(
                "block_cache must not exceed segment_size".into(),
            ));
        }

        Ok(())
    }
}

/// Builder for Options.
#[derive(Debug, Clone, Default)]
pub struct OptionsBuilder {
    options: Options,
}

impl OptionsBuilder {
    /// Create a new builder with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the segment directory.
    pub fn dir_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.options.dir_path = path.into();
        self
    }

    /// Set the maximum segment size.
    pub fn segment_size(mut self, size: u64) -> Self {
        self.options.segment_size = size;
        self
    }

    /// Set the block cache budget in bytes.
    pub fn block_cache(mut self, bytes: u32) -> Self {
        self.options.block_cache = bytes;
        self
    }

    /// Set the segment file extension.
    pub fn segment_file_ext(mut self, ext: impl Into<String>) -> Self {
        self.options.segment_file_ext = ext.into();
        self
    }

    /// Set whether every write fsyncs the active segment.
    pub fn sync(mut self, sync: bool) -> Self {
        self.options.sync = sync;
        self
    }

    /// Set the byte threshold between fsyncs.
    pub fn bytes_per_sync(mut self, bytes: u32) -> Self {
        self.options.bytes_per_sync = bytes;
        self
    }

    /// Build the options.
    pub fn build(self) -> Result<Options> {
        self.options.validate()?;
        Ok(self.options)
    }
}
