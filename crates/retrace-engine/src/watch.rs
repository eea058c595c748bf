//! Counter snapshots around watchpoint evaluation.
//!
//! Evaluating a watch expression runs program code, which can create
//! objects and pass stop points. Saving the counters before and restoring
//! them afterwards keeps that evaluation out of the deterministic stream.
//! While the snapshot is held, break targets are disarmed and the log is
//! closed to reads and writes.

use retrace_core::{Uid, WatchHook};
use tracing::trace;

use crate::context::RecorderContext;
use crate::identity::UidBreaks;

struct Snapshot {
    next_uid: Uid,
    stop_points: u64,
    stop_target: Option<u64>,
    uid_breaks: UidBreaks,
}

#[derive(Default)]
pub(crate) struct WatchState {
    pub(crate) enabled: bool,
    saved: Option<Snapshot>,
    hook: Option<Box<dyn WatchHook>>,
}

impl WatchState {
    pub(crate) fn new(enabled: bool) -> Self {
        Self {
            enabled,
            ..Self::default()
        }
    }

    /// Whether a watch expression is being evaluated right now.
    pub(crate) fn active(&self) -> bool {
        self.saved.is_some()
    }
}

impl RecorderContext {
    /// Install the debugger's watch hook.
    pub fn set_watch_hook(&mut self, hook: Box<dyn WatchHook>) {
        self.watch.hook = Some(hook);
    }

    /// Enable or disable watch state for the rest of the run.
    pub fn set_watch_enabled(&mut self, enabled: bool) {
        self.watch.enabled = enabled;
    }

    /// Whether watch state is saved and restored.
    pub fn watch_enabled(&self) -> bool {
        self.watch.enabled
    }

    /// Snapshot the uid and stop-point counters before watch evaluation.
    ///
    /// Also disarms the stop-point and uid break targets, so nothing the
    /// expression does can pause the run, and closes the log until the
    /// matching restore. Returns whether this call started a watch
    /// region; pass the result to
    /// [`watch_restore_state`](Self::watch_restore_state). A save inside
    /// an open region returns `false`.
    pub fn watch_save_state(&mut self) -> bool {
        if !self.watch.enabled || self.watch.active() {
            return false;
        }
        self.watch.saved = Some(Snapshot {
            next_uid: self.identity.next_uid(),
            stop_points: self.stops.seen,
            stop_target: self.stops.target.take(),
            uid_breaks: self.identity.disarm(),
        });
        if let Some(hook) = self.watch.hook.as_mut() {
            hook.save();
        }
        true
    }

    /// Restore the state saved by
    /// [`watch_save_state`](Self::watch_save_state): counters, break
    /// targets and log access. Uids handed out in between are dropped. A
    /// no-op unless `was_active`.
    pub fn watch_restore_state(&mut self, was_active: bool) {
        if !was_active {
            return;
        }
        if let Some(snapshot) = self.watch.saved.take() {
            trace!(
                uids_discarded = self.identity.next_uid().0.saturating_sub(snapshot.next_uid.0),
                stop_points_discarded = self.stops.seen.saturating_sub(snapshot.stop_points),
                "restoring watch state"
            );
            self.identity.rewind(snapshot.next_uid);
            self.identity.rearm(snapshot.uid_breaks);
            self.stops.seen = snapshot.stop_points;
            self.stops.target = snapshot.stop_target;
        }
        if let Some(hook) = self.watch.hook.as_mut() {
            hook.restore();
        }
    }
}
