//! Data types stored in the log header and trailer.

/// Build metadata stored in the log header.
///
/// The log's schema is implied by the exact instrumentation compiled into
/// the build that recorded it, so replay needs a way to notice a different
/// build before decoding garbage.
///
/// # Examples
///
/// ```
/// use retrace_log::BuildMetadata;
///
/// let meta = BuildMetadata {
///     engine_version: "0.1.0".into(),
///     build_id: 0xFEED,
/// };
///
/// assert_eq!(meta.build_id, 0xFEED);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BuildMetadata {
    /// Retrace version that wrote the log (e.g. `"0.1.0"`).
    pub engine_version: String,
    /// Fingerprint of the instrumentation pass that produced the program.
    pub build_id: u64,
}

impl BuildMetadata {
    /// Metadata for the running engine version and the given build id.
    pub fn current(build_id: u64) -> Self {
        Self {
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            build_id,
        }
    }
}

/// Everything in front of the first chunk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogHeader {
    /// Build that recorded the log.
    pub metadata: BuildMetadata,
    /// Buffer capacity at record time; no chunk is longer than this.
    pub buffer_capacity: u32,
}

/// Totals written after the end marker by a clean record teardown.
///
/// Replay compares its own counters against these to tell a natural end
/// from a premature one.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Trailer {
    /// Stop points passed during the recorded run.
    pub stop_points: u64,
    /// Uids assigned during the recorded run.
    pub uids_assigned: u64,
}
