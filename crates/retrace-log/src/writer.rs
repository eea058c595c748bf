//! Record-side buffer manager.
//!
//! [`LogWriter`] owns a fixed byte region and a write cursor. Values are
//! appended with [`encode`](LogWriter::encode); when the next value would
//! cross the buffer limit the region is flushed to the sink as one chunk
//! first, so a value never straddles two chunks.

use std::io::{self, Write};

use retrace_core::ConfigError;
use tracing::debug;

use crate::codec::{encode_chunk, encode_end, encode_header};
use crate::error::LogError;
use crate::event::Event;
use crate::types::{BuildMetadata, LogHeader, Trailer};
use crate::check_capacity;

/// Writes an event stream to a byte sink.
///
/// Generic over `W: Write` so tests can use `Vec<u8>` and production
/// code can use `BufWriter<File>`.
///
/// # Examples
///
/// ```
/// use retrace_log::{BuildMetadata, LogReader, LogWriter, Trailer};
///
/// let meta = BuildMetadata::current(7);
///
/// let mut buf = Vec::new();
/// let mut writer = LogWriter::new(&mut buf, &meta, 16).unwrap();
/// for v in 1..=5u64 {
///     writer.encode(v).unwrap();
/// }
/// // Two u64 fit in a 16-byte window, so five values take three chunks.
/// writer.finish(&Trailer::default()).unwrap();
///
/// let mut reader = LogReader::open(buf.as_slice()).unwrap();
/// assert_eq!(reader.header().metadata, meta);
/// for v in 1..=5u64 {
///     assert_eq!(reader.decode::<u64>().unwrap(), v);
/// }
/// assert_eq!(reader.chunks_read(), 3);
/// ```
pub struct LogWriter<W: Write> {
    sink: W,
    buf: Box<[u8]>,
    pos: usize,
    bytes_written: u64,
    chunks_written: u64,
    poisoned: bool,
}

impl<W: Write> LogWriter<W> {
    /// Create a writer with a `capacity`-byte buffer, immediately writing
    /// the header.
    pub fn new(mut sink: W, metadata: &BuildMetadata, capacity: usize) -> Result<Self, LogError> {
        check_capacity(capacity)?;
        let header = LogHeader {
            metadata: metadata.clone(),
            buffer_capacity: capacity as u32,
        };
        encode_header(&mut sink, &header)?;
        Ok(Self {
            sink,
            buf: vec![0u8; capacity].into_boxed_slice(),
            pos: 0,
            bytes_written: 0,
            chunks_written: 0,
            poisoned: false,
        })
    }

    /// Append one value, flushing first if it would not fit.
    #[inline]
    pub fn encode<T: Event>(&mut self, value: T) -> Result<(), LogError> {
        if T::WIDTH > self.buf.len() {
            return Err(ConfigError::BufferTooSmall {
                configured: self.buf.len(),
                minimum: T::WIDTH,
            }
            .into());
        }
        if self.pos + T::WIDTH > self.buf.len() {
            self.flush()?;
        }
        self.check_poisoned()?;
        value.write_le(&mut self.buf[self.pos..self.pos + T::WIDTH]);
        self.pos += T::WIDTH;
        Ok(())
    }

    /// Persist the buffered bytes as one chunk and reset the cursor.
    ///
    /// An empty buffer writes nothing. A failure poisons the writer:
    /// there is no partial-success state, every later call fails too.
    pub fn flush(&mut self) -> Result<(), LogError> {
        self.check_poisoned()?;
        if self.pos == 0 {
            return Ok(());
        }
        let result = encode_chunk(&mut self.sink, &self.buf[..self.pos])
            .and_then(|()| self.sink.flush().map_err(LogError::from));
        if let Err(e) = result {
            self.poisoned = true;
            return Err(e);
        }
        debug!(
            bytes = self.pos,
            chunk = self.chunks_written,
            "flushed log chunk"
        );
        self.bytes_written += self.pos as u64;
        self.chunks_written += 1;
        self.pos = 0;
        Ok(())
    }

    /// Flush, write the end marker and trailer, and return the sink.
    pub fn finish(mut self, trailer: &Trailer) -> Result<W, LogError> {
        self.flush()?;
        encode_end(&mut self.sink, trailer)?;
        self.sink.flush()?;
        debug!(
            bytes = self.bytes_written,
            chunks = self.chunks_written,
            stop_points = trailer.stop_points,
            "wrote end marker"
        );
        Ok(self.sink)
    }

    fn check_poisoned(&self) -> Result<(), LogError> {
        if self.poisoned {
            return Err(LogError::Io(io::Error::other(
                "log writer unusable after an earlier flush failure",
            )));
        }
        Ok(())
    }

    /// Buffer capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Bytes waiting in the buffer.
    pub fn buffered(&self) -> usize {
        self.pos
    }

    /// Event bytes persisted so far (excluding framing).
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Chunks persisted so far.
    pub fn chunks_written(&self) -> u64 {
        self.chunks_written
    }

    /// Borrow the underlying sink.
    pub fn get_ref(&self) -> &W {
        &self.sink
    }
}
