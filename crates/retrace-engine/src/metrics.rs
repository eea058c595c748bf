//! Run statistics reported by the recorder context.
//!
//! [`RunSummary`] is returned by
//! [`teardown()`](crate::RecorderContext::teardown) and can be sampled at
//! any time with [`summary()`](crate::RecorderContext::summary).

use retrace_core::Mode;

/// Counters describing one record or replay run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunSummary {
    /// Direction of the run.
    pub mode: Mode,
    /// Stop points passed.
    pub stop_points: u64,
    /// Uids assigned to objects.
    pub uids_assigned: u64,
    /// Event bytes written (record) or fetched (replay), excluding framing.
    pub bytes: u64,
    /// Chunks flushed (record) or fetched (replay).
    pub chunks: u64,
    /// Callbacks dispatched, from the log or through `invoke_callback`.
    pub callbacks_dispatched: u64,
    /// Destructors run at safe points.
    pub destructors_run: u64,
}

impl RunSummary {
    /// An all-zero summary for `mode`.
    pub fn empty(mode: Mode) -> Self {
        Self {
            mode,
            stop_points: 0,
            uids_assigned: 0,
            bytes: 0,
            chunks: 0,
            callbacks_dispatched: 0,
            destructors_run: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_summary_is_zero() {
        let s = RunSummary::empty(Mode::Replay);
        assert_eq!(s.mode, Mode::Replay);
        assert_eq!(s.stop_points, 0);
        assert_eq!(s.bytes, 0);
        assert_eq!(s.callbacks_dispatched, 0);
    }
}
