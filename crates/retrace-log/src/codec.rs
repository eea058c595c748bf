//! Binary encode/decode for the framing around the event stream.
//!
//! All integers are little-endian. Strings are length-prefixed with a
//! `u32` length. The format is intentionally simple: no compression, no
//! alignment padding, no self-describing schema. Events themselves go
//! through [`Event`](crate::Event); this module only handles the header,
//! chunk lengths, and the trailer.

use std::io::{ErrorKind, Read, Write};

use retrace_core::ConfigError;

use crate::error::{LogError, Site};
use crate::types::{BuildMetadata, LogHeader, Trailer};
use crate::{check_capacity, FORMAT_VERSION, MAGIC};

// ── Primitive writers ───────────────────────────────────────────

/// Write a single byte.
pub fn write_u8(w: &mut dyn Write, v: u8) -> Result<(), LogError> {
    w.write_all(&[v])?;
    Ok(())
}

/// Write a little-endian u32.
pub fn write_u32_le(w: &mut dyn Write, v: u32) -> Result<(), LogError> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

/// Write a little-endian u64.
pub fn write_u64_le(w: &mut dyn Write, v: u64) -> Result<(), LogError> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

/// Write a length-prefixed byte array (u32 length + bytes).
pub fn write_length_prefixed_bytes(w: &mut dyn Write, b: &[u8]) -> Result<(), LogError> {
    write_u32_le(w, b.len() as u32)?;
    w.write_all(b)?;
    Ok(())
}

// ── Primitive readers ───────────────────────────────────────────

/// Read a single byte.
pub fn read_u8(r: &mut dyn Read) -> Result<u8, LogError> {
    let mut buf = [0u8; 1];
    r.read_exact(&mut buf)?;
    Ok(buf[0])
}

/// Read a little-endian u32.
pub fn read_u32_le(r: &mut dyn Read) -> Result<u32, LogError> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

/// Read a little-endian u64.
pub fn read_u64_le(r: &mut dyn Read) -> Result<u64, LogError> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

/// Read a length-prefixed byte array, refusing lengths above `max_len`.
pub fn read_length_prefixed_bytes(r: &mut dyn Read, max_len: usize) -> Result<Vec<u8>, LogError> {
    let len = read_u32_le(r)? as usize;
    if len > max_len {
        return Err(ConfigError::MalformedHeader {
            detail: format!("string of {len} bytes exceeds limit of {max_len}"),
        }
        .into());
    }
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf)?;
    Ok(buf)
}

fn is_eof(e: &LogError) -> bool {
    matches!(e, LogError::Io(io) if io.kind() == ErrorKind::UnexpectedEof)
}

// ── Header encode/decode ────────────────────────────────────────

/// Longest engine version string accepted in a header.
const MAX_VERSION_LEN: usize = 256;

/// Encode the log header (magic, version, build metadata, capacity).
pub fn encode_header(w: &mut dyn Write, header: &LogHeader) -> Result<(), LogError> {
    w.write_all(&MAGIC)?;
    write_u8(w, FORMAT_VERSION)?;

    write_length_prefixed_bytes(w, header.metadata.engine_version.as_bytes())?;
    write_u64_le(w, header.metadata.build_id)?;
    write_u32_le(w, header.buffer_capacity)?;

    Ok(())
}

/// Decode and validate the log header.
///
/// A truncated header, wrong magic, unknown version, or out-of-range
/// capacity is reported as [`LogError::Config`].
pub fn decode_header(r: &mut dyn Read) -> Result<LogHeader, LogError> {
    decode_header_fields(r).map_err(|e| {
        if is_eof(&e) {
            ConfigError::MalformedHeader {
                detail: "truncated header".into(),
            }
            .into()
        } else {
            e
        }
    })
}

fn decode_header_fields(r: &mut dyn Read) -> Result<LogHeader, LogError> {
    let mut magic = [0u8; 4];
    r.read_exact(&mut magic)?;
    if magic != MAGIC {
        return Err(ConfigError::MalformedHeader {
            detail: format!("invalid magic bytes {magic:02x?} (expected b\"RTRC\")"),
        }
        .into());
    }

    let version = read_u8(r)?;
    if version != FORMAT_VERSION {
        return Err(ConfigError::UnsupportedVersion { found: version }.into());
    }

    let raw_version = read_length_prefixed_bytes(r, MAX_VERSION_LEN)?;
    let engine_version =
        String::from_utf8(raw_version).map_err(|e| ConfigError::MalformedHeader {
            detail: format!("invalid UTF-8 engine version: {e}"),
        })?;
    let build_id = read_u64_le(r)?;
    let buffer_capacity = read_u32_le(r)?;
    check_capacity(buffer_capacity as usize)?;

    Ok(LogHeader {
        metadata: BuildMetadata {
            engine_version,
            build_id,
        },
        buffer_capacity,
    })
}

// ── Chunk framing ───────────────────────────────────────────────

/// Write one chunk: its length followed by its bytes.
///
/// An empty `bytes` would be indistinguishable from the end marker, so
/// callers must not pass one.
pub fn encode_chunk(w: &mut dyn Write, bytes: &[u8]) -> Result<(), LogError> {
    debug_assert!(!bytes.is_empty(), "empty chunk collides with end marker");
    write_u32_le(w, bytes.len() as u32)?;
    w.write_all(bytes)?;
    Ok(())
}

/// Write the end marker and the trailer.
pub fn encode_end(w: &mut dyn Write, trailer: &Trailer) -> Result<(), LogError> {
    write_u32_le(w, 0)?;
    write_u64_le(w, trailer.stop_points)?;
    write_u64_le(w, trailer.uids_assigned)?;
    Ok(())
}

/// Read a chunk length.
///
/// Returns `Ok(None)` if the source is exhausted exactly at a chunk
/// boundary, `Ok(Some(0))` for the end marker, and an error if only part
/// of the length is present.
pub fn decode_chunk_len(r: &mut dyn Read, site: Site) -> Result<Option<u32>, LogError> {
    // Read byte-by-byte progress to distinguish a clean boundary
    // (zero bytes available) from truncation (1-3 bytes before EOF).
    let mut len_buf = [0u8; 4];
    let mut filled = 0;
    while filled < 4 {
        match r.read(&mut len_buf[filled..]) {
            Ok(0) => {
                if filled == 0 {
                    return Ok(None);
                }
                return Err(LogError::corrupted(
                    site,
                    format!("truncated chunk header: got {filled} of 4 bytes"),
                ));
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(LogError::Io(e)),
        }
    }
    Ok(Some(u32::from_le_bytes(len_buf)))
}

/// Read the trailer that follows the end marker.
pub fn decode_trailer(r: &mut dyn Read, site: Site) -> Result<Trailer, LogError> {
    let read = |r: &mut dyn Read| -> Result<Trailer, LogError> {
        Ok(Trailer {
            stop_points: read_u64_le(r)?,
            uids_assigned: read_u64_le(r)?,
        })
    };
    read(r).map_err(|e| {
        if is_eof(&e) {
            LogError::corrupted(site, "truncated trailer after end marker")
        } else {
            e
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn header() -> LogHeader {
        LogHeader {
            metadata: BuildMetadata {
                engine_version: "0.1.0".into(),
                build_id: 0xDEAD_BEEF,
            },
            buffer_capacity: 4096,
        }
    }

    // ── Primitive round-trip tests ──────────────────────────────

    proptest! {
        #[test]
        fn roundtrip_u32(v in any::<u32>()) {
            let mut buf = Vec::new();
            write_u32_le(&mut buf, v).unwrap();
            let got = read_u32_le(&mut buf.as_slice()).unwrap();
            prop_assert_eq!(v, got);
        }

        #[test]
        fn roundtrip_u64(v in any::<u64>()) {
            let mut buf = Vec::new();
            write_u64_le(&mut buf, v).unwrap();
            let got = read_u64_le(&mut buf.as_slice()).unwrap();
            prop_assert_eq!(v, got);
        }

        #[test]
        fn roundtrip_bytes(b in prop::collection::vec(any::<u8>(), 0..128)) {
            let mut buf = Vec::new();
            write_length_prefixed_bytes(&mut buf, &b).unwrap();
            let got = read_length_prefixed_bytes(&mut buf.as_slice(), 128).unwrap();
            prop_assert_eq!(b, got);
        }
    }

    // ── Header ──────────────────────────────────────────────────

    #[test]
    fn roundtrip_header() {
        let mut buf = Vec::new();
        encode_header(&mut buf, &header()).unwrap();
        let got = decode_header(&mut buf.as_slice()).unwrap();
        assert_eq!(got, header());
    }

    #[test]
    fn bad_magic_rejected() {
        let data = b"XTRC\x01";
        let result = decode_header(&mut data.as_slice());
        assert!(matches!(
            result,
            Err(LogError::Config(ConfigError::MalformedHeader { .. }))
        ));
    }

    #[test]
    fn bad_version_rejected() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&MAGIC);
        buf.push(99);
        let result = decode_header(&mut buf.as_slice());
        assert!(matches!(
            result,
            Err(LogError::Config(ConfigError::UnsupportedVersion { found: 99 }))
        ));
    }

    #[test]
    fn truncated_header_is_malformed_not_io() {
        let mut buf = Vec::new();
        encode_header(&mut buf, &header()).unwrap();
        for cut in 0..buf.len() {
            let result = decode_header(&mut &buf[..cut]);
            assert!(
                matches!(result, Err(LogError::Config(ConfigError::MalformedHeader { .. }))),
                "cut at {cut}: {result:?}"
            );
        }
    }

    #[test]
    fn header_capacity_out_of_range_rejected() {
        let mut h = header();
        h.buffer_capacity = 4;
        let mut buf = Vec::new();
        encode_header(&mut buf, &h).unwrap();
        let result = decode_header(&mut buf.as_slice());
        assert!(matches!(
            result,
            Err(LogError::Config(ConfigError::BufferTooSmall { configured: 4, .. }))
        ));
    }

    // ── Chunk framing ───────────────────────────────────────────

    #[test]
    fn chunk_len_eof_at_boundary_is_none() {
        let buf: Vec<u8> = Vec::new();
        let got = decode_chunk_len(&mut buf.as_slice(), Site::caller()).unwrap();
        assert_eq!(got, None);
    }

    #[test]
    fn partial_chunk_len_is_corruption() {
        for partial_len in 1..=3 {
            let buf = vec![0xAA; partial_len];
            let result = decode_chunk_len(&mut buf.as_slice(), Site::caller());
            match result {
                Err(LogError::Corrupted { detail, .. }) => {
                    assert!(detail.contains("truncated chunk header"), "{detail}");
                }
                other => panic!("expected Corrupted for {partial_len} bytes, got {other:?}"),
            }
        }
    }

    #[test]
    fn end_marker_then_trailer() {
        let trailer = Trailer {
            stop_points: 7,
            uids_assigned: 3,
        };
        let mut buf = Vec::new();
        encode_end(&mut buf, &trailer).unwrap();
        let mut r = buf.as_slice();
        assert_eq!(decode_chunk_len(&mut r, Site::caller()).unwrap(), Some(0));
        assert_eq!(decode_trailer(&mut r, Site::caller()).unwrap(), trailer);
    }

    #[test]
    fn truncated_trailer_is_corruption() {
        let mut buf = Vec::new();
        encode_end(&mut buf, &Trailer::default()).unwrap();
        buf.truncate(buf.len() - 3);
        let mut r = buf.as_slice();
        assert_eq!(decode_chunk_len(&mut r, Site::caller()).unwrap(), Some(0));
        assert!(decode_trailer(&mut r, Site::caller())
            .unwrap_err()
            .is_corrupted());
    }
}
