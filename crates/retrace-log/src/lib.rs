//! Chunked binary log buffer and fixed-width event codec for Retrace.
//!
//! The log is the only channel between a recording run and its replays.
//! This crate owns its byte layout and the buffer that sits in front of
//! the storage collaborator.
//!
//! # Architecture
//!
//! - [`LogWriter`] appends [`Event`]s into a fixed buffer and flushes
//!   whole chunks to any `Write` sink
//! - [`LogReader`] fetches whole chunks from any `Read` source and
//!   decodes [`Event`]s out of them
//! - [`ExitStatus`] maps every [`LogError`] to a documented process status
//! - All I/O uses a custom binary codec (no serde dependency)
//!
//! # Format
//!
//! ```text
//! [MAGIC "RTRC"] [VERSION u8] [BuildMetadata] [capacity u32]
//! [len u32][len bytes] [len u32][len bytes] ...
//! [0u32] [Trailer]
//! ```
//!
//! A chunk is one flushed buffer window. Values never straddle a chunk
//! boundary. The zero-length chunk is the end marker written at a clean
//! record teardown; only a log carrying it has a natural end.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod codec;
pub mod error;
pub mod event;
pub mod reader;
pub mod status;
pub mod types;
pub mod writer;

pub use error::{LogError, Site};
pub use event::Event;
pub use reader::LogReader;
pub use status::ExitStatus;
pub use types::{BuildMetadata, LogHeader, Trailer};
pub use writer::LogWriter;

/// Magic bytes at the start of every log.
pub const MAGIC: [u8; 4] = *b"RTRC";

/// Current binary format version.
pub const FORMAT_VERSION: u8 = 1;

/// Smallest buffer capacity; holds the widest built-in [`Event`].
pub const MIN_BUFFER_CAPACITY: usize = 16;

/// Largest buffer capacity a header may announce (64 MiB).
pub const MAX_BUFFER_CAPACITY: usize = 64 * 1024 * 1024;

/// Buffer capacity used when none is configured (64 KiB).
pub const DEFAULT_BUFFER_CAPACITY: usize = 64 * 1024;

/// Check a buffer capacity against [`MIN_BUFFER_CAPACITY`] and
/// [`MAX_BUFFER_CAPACITY`].
pub fn check_capacity(capacity: usize) -> Result<(), retrace_core::ConfigError> {
    if capacity < MIN_BUFFER_CAPACITY {
        return Err(retrace_core::ConfigError::BufferTooSmall {
            configured: capacity,
            minimum: MIN_BUFFER_CAPACITY,
        });
    }
    if capacity > MAX_BUFFER_CAPACITY {
        return Err(retrace_core::ConfigError::BufferTooLarge {
            configured: capacity,
            maximum: MAX_BUFFER_CAPACITY,
        });
    }
    Ok(())
}
