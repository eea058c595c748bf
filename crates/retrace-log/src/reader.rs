//! Replay-side buffer manager.
//!
//! [`LogReader`] loads one chunk at a time into a fixed byte region and
//! hands out values with [`decode`](LogReader::decode). The header is
//! validated on construction.

use std::io::{ErrorKind, Read};

use retrace_core::ConfigError;
use tracing::debug;

use crate::codec::{decode_chunk_len, decode_header, decode_trailer};
use crate::error::{LogError, Site};
use crate::event::Event;
use crate::types::{LogHeader, Trailer};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ReadState {
    Streaming,
    Ended(Trailer),
}

/// Reads an event stream from a byte source.
///
/// Generic over `R: Read` so tests can use `&[u8]` and production
/// code can use `BufReader<File>`.
pub struct LogReader<R: Read> {
    source: R,
    header: LogHeader,
    buf: Box<[u8]>,
    pos: usize,
    end: usize,
    state: ReadState,
    bytes_read: u64,
    chunks_read: u64,
}

impl<R: Read> LogReader<R> {
    /// Open a log, reading and validating the header.
    pub fn open(mut source: R) -> Result<Self, LogError> {
        let header = decode_header(&mut source)?;
        let capacity = header.buffer_capacity as usize;
        Ok(Self {
            source,
            header,
            buf: vec![0u8; capacity].into_boxed_slice(),
            pos: 0,
            end: 0,
            state: ReadState::Streaming,
            bytes_read: 0,
            chunks_read: 0,
        })
    }

    /// Header of the log being replayed.
    pub fn header(&self) -> &LogHeader {
        &self.header
    }

    /// Decode the next value, fetching a chunk first if needed.
    #[track_caller]
    #[inline]
    pub fn decode<T: Event>(&mut self) -> Result<T, LogError> {
        self.decode_at(Site::caller())
    }

    /// [`decode`](Self::decode) with an explicit diagnostic call site.
    pub fn decode_at<T: Event>(&mut self, site: Site) -> Result<T, LogError> {
        if T::WIDTH > self.buf.len() {
            return Err(ConfigError::BufferTooSmall {
                configured: self.buf.len(),
                minimum: T::WIDTH,
            }
            .into());
        }
        if self.pos + T::WIDTH > self.end {
            self.fetch(site)?;
            if self.pos + T::WIDTH > self.end {
                return Err(LogError::corrupted(
                    site,
                    format!(
                        "{}-byte value split at end of {}-byte chunk",
                        T::WIDTH,
                        self.end
                    ),
                ));
            }
        }
        let bytes = &self.buf[self.pos..self.pos + T::WIDTH];
        let value = T::read_le(bytes).ok_or_else(|| {
            LogError::corrupted(site, format!("invalid {}-byte value {bytes:02x?}", T::WIDTH))
        })?;
        self.pos += T::WIDTH;
        Ok(value)
    }

    /// Load the next chunk and reset the read cursor.
    ///
    /// Returns [`LogError::CleanEnd`] when the end marker is reached with
    /// nothing left over, and [`LogError::Corrupted`] when the source runs
    /// dry without one or a value was left half-read. `site` only feeds
    /// error messages.
    pub fn fetch(&mut self, site: Site) -> Result<(), LogError> {
        if let ReadState::Ended(_) = self.state {
            return Err(LogError::CleanEnd);
        }
        if self.pos < self.end {
            return Err(LogError::corrupted(
                site,
                format!(
                    "{} unread bytes at chunk boundary; a value was split",
                    self.end - self.pos
                ),
            ));
        }
        match decode_chunk_len(&mut self.source, site)? {
            None => Err(LogError::corrupted(
                site,
                "log exhausted without an end marker",
            )),
            Some(0) => {
                let trailer = decode_trailer(&mut self.source, site)?;
                debug!(
                    chunks = self.chunks_read,
                    stop_points = trailer.stop_points,
                    "reached end marker"
                );
                self.state = ReadState::Ended(trailer);
                Err(LogError::CleanEnd)
            }
            Some(len) if len as usize > self.buf.len() => Err(LogError::corrupted(
                site,
                format!(
                    "chunk of {len} bytes exceeds buffer capacity {}",
                    self.buf.len()
                ),
            )),
            Some(len) => {
                let len = len as usize;
                if let Err(e) = self.source.read_exact(&mut self.buf[..len]) {
                    if e.kind() == ErrorKind::UnexpectedEof {
                        return Err(LogError::corrupted(
                            site,
                            format!("truncated chunk: expected {len} bytes"),
                        ));
                    }
                    return Err(LogError::Io(e));
                }
                debug!(bytes = len, chunk = self.chunks_read, "fetched log chunk");
                self.pos = 0;
                self.end = len;
                self.bytes_read += len as u64;
                self.chunks_read += 1;
                Ok(())
            }
        }
    }

    /// Check the log was consumed exactly up to its end marker and
    /// return the trailer.
    #[track_caller]
    pub fn finish(mut self) -> Result<Trailer, LogError> {
        let site = Site::caller();
        if self.pos < self.end {
            return Err(LogError::corrupted(
                site,
                format!("{} unread bytes at end of replay", self.end - self.pos),
            ));
        }
        if let ReadState::Ended(trailer) = self.state {
            return Ok(trailer);
        }
        match self.fetch(site) {
            Err(LogError::CleanEnd) => self.trailer().copied().ok_or_else(|| {
                LogError::corrupted(site, "end marker reached without a trailer")
            }),
            Ok(()) => Err(LogError::corrupted(
                site,
                format!("unread chunk of {} bytes at end of replay", self.end),
            )),
            Err(e) => Err(e),
        }
    }

    /// Trailer of the log, once the end marker has been reached.
    pub fn trailer(&self) -> Option<&Trailer> {
        match &self.state {
            ReadState::Ended(t) => Some(t),
            ReadState::Streaming => None,
        }
    }

    /// Whether the end marker has been reached.
    pub fn at_end(&self) -> bool {
        matches!(self.state, ReadState::Ended(_))
    }

    /// Bytes left in the current chunk.
    pub fn remaining(&self) -> usize {
        self.end - self.pos
    }

    /// Event bytes fetched so far (excluding framing).
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Chunks fetched so far.
    pub fn chunks_read(&self) -> u64 {
        self.chunks_read
    }
}
