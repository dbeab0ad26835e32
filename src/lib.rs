//! # seglog
//!
//! An append-only, crash-safe write-ahead log with positional reads.
//!
//! ## Features
//!
//! - **Block-based format**: records framed into 32KB blocks with
//!   CRC32C-checksummed chunks, the granularity of reads and recovery
//! - **Stable positions**: every write returns a handle that reads the
//!   record back with O(1) disk seeks
//! - **Segment rotation**: the log grows by sealing the active segment
//!   and opening a successor; older segments are read-only
//! - **Batched writes**: stage records concurrently, then commit them
//!   in a single append
//! - **Configurable durability**: fsync on every write, after a byte
//!   threshold, or on demand
//! - **Block cache**: optional bounded LRU over recently read blocks
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use seglog::{Options, Wal};
//!
//! let wal = Wal::open(Options {
//!     dir_path: "./wal".into(),
//!     ..Options::default()
//! })?;
//!
//! // Append records; keep the positions for random access.
//! let pos = wal.write(b"hello")?;
//! assert_eq!(wal.read(&pos)?, &b"hello"[..]);
//!
//! // Or replay everything in order.
//! let mut reader = wal.new_reader();
//! while let Some((data, position)) = reader.next()? {
//!     println!("{:?} at {:?}", data, position);
//! }
//! ```

// Public modules
pub mod error;
pub mod options;

// Internal modules
mod cache;
mod chunk;
mod segment;
mod util;
mod wal;

// Re-export main types for convenience
pub use error::{Error, Result};
pub use options::{Options, OptionsBuilder};

pub use chunk::{ChunkPosition, ChunkType, BLOCK_SIZE, CHUNK_HEADER_SIZE};

// Log and readers
pub use wal::{Reader, Wal};

// Cache
pub use cache::{BlockCache, CacheStats, LruCache};
