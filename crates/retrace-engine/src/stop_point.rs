//! Stop-point counter, breakpoints, and the pause protocol.
//!
//! Every instrumented stop point bumps a counter. When the counter reaches
//! the armed break target the run pauses and the
//! [`DebugHandler`](crate::DebugHandler) decides where to stop next. Stop points are
//! never written to the log: replay reproduces them by executing the same
//! code, which is what makes `seek to stop point k` precise.

use retrace_core::BreakpointNum;
use tracing::{trace, warn};

use crate::context::RecorderContext;

/// Why the run paused.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Pause {
    /// The stop-point counter reached the break target.
    StopPoint {
        /// Counter value at the pause.
        seen: u64,
    },
    /// An explicit numbered breakpoint was hit.
    Breakpoint {
        /// Breakpoint number.
        num: BreakpointNum,
        /// Stop-point counter at the pause.
        seen: u64,
    },
}

/// Where to go after a pause.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resume {
    /// Disarm the break target and run freely.
    Continue,
    /// Pause again at the next stop point.
    Step,
    /// Pause at stop point `k`. Must be ahead of the current counter;
    /// anything else disarms the target.
    SeekTo(u64),
}

/// Execution state as seen by the debugger.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RunState {
    /// Executing the program.
    #[default]
    Running,
    /// Control is with the debug handler.
    Paused,
}

#[derive(Debug, Default)]
pub(crate) struct StopPoints {
    pub(crate) seen: u64,
    pub(crate) target: Option<u64>,
    pub(crate) last_breakpoint: Option<BreakpointNum>,
    pub(crate) state: RunState,
}

impl StopPoints {
    pub(crate) fn new(target: Option<u64>) -> Self {
        Self {
            target,
            ..Self::default()
        }
    }

    fn apply(&mut self, resume: Resume) {
        self.target = match resume {
            Resume::Continue => None,
            Resume::Step => Some(self.seen + 1),
            Resume::SeekTo(k) if k > self.seen => Some(k),
            Resume::SeekTo(k) => {
                warn!(
                    target_stop = k,
                    seen = self.seen,
                    "cannot seek backwards from a running process; break disarmed"
                );
                None
            }
        };
    }
}

impl RecorderContext {
    /// Pass one stop point.
    ///
    /// Increments the counter and pauses exactly when it equals the armed
    /// target.
    pub fn stop_point(&mut self) {
        self.stops.seen += 1;
        let seen = self.stops.seen;
        trace!(seen, "stop point");
        if self.stops.target == Some(seen) {
            self.pause(Pause::StopPoint { seen });
        }
    }

    /// Hit numbered breakpoint `num`, independent of the counter.
    pub fn breakpoint(&mut self, num: BreakpointNum) {
        self.stops.last_breakpoint = Some(num);
        let seen = self.stops.seen;
        self.pause(Pause::Breakpoint { num, seen });
    }

    fn pause(&mut self, pause: Pause) {
        let resume = self
            .with_paused_handler(|handler, ctx| handler.on_pause(ctx, pause))
            .unwrap_or(Resume::Continue);
        trace!(?pause, ?resume, "resuming");
        self.stops.apply(resume);
    }

    /// Arm (or with `None`, disarm) the stop-point break target.
    pub fn set_stop_point_break(&mut self, target: Option<u64>) {
        self.stops.target = target;
    }

    /// Current stop-point break target.
    pub fn stop_point_break(&self) -> Option<u64> {
        self.stops.target
    }

    /// Stop points passed so far.
    pub fn stop_points_seen(&self) -> u64 {
        self.stops.seen
    }

    /// Most recent breakpoint hit, if any.
    pub fn last_breakpoint(&self) -> Option<BreakpointNum> {
        self.stops.last_breakpoint
    }

    /// Whether control is currently with the debug handler.
    pub fn run_state(&self) -> RunState {
        self.stops.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_arms_next_stop() {
        let mut s = StopPoints::new(Some(3));
        s.seen = 3;
        s.apply(Resume::Step);
        assert_eq!(s.target, Some(4));
    }

    #[test]
    fn seek_forward_arms_target() {
        let mut s = StopPoints::new(None);
        s.seen = 5;
        s.apply(Resume::SeekTo(9));
        assert_eq!(s.target, Some(9));
    }

    #[test]
    fn seek_to_present_or_past_disarms() {
        let mut s = StopPoints::new(Some(5));
        s.seen = 5;
        s.apply(Resume::SeekTo(5));
        assert_eq!(s.target, None);
        s.target = Some(8);
        s.apply(Resume::SeekTo(2));
        assert_eq!(s.target, None);
    }

    #[test]
    fn continue_disarms() {
        let mut s = StopPoints::new(Some(1));
        s.apply(Resume::Continue);
        assert_eq!(s.target, None);
        assert_eq!(s.state, RunState::Running);
    }
}
