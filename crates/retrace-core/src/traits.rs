//! Collaborator traits implemented by the host program.

use crate::id::ObjectKey;

/// Liveness probe answering whether a weak reference target still exists.
///
/// Consulted only while recording. During replay the recorded verdict is
/// used instead, whatever the replaying process's own collector thinks.
pub trait Liveness {
    /// Whether `obj` has not been reclaimed yet.
    fn is_alive(&self, obj: ObjectKey) -> bool;
}

impl<F> Liveness for F
where
    F: Fn(ObjectKey) -> bool,
{
    fn is_alive(&self, obj: ObjectKey) -> bool {
        self(obj)
    }
}

/// Debugger-side watchpoint state bracketing an instrumented region.
///
/// Only invoked when watching is enabled for the run.
pub trait WatchHook {
    /// Capture watch state before the region runs.
    fn save(&mut self);

    /// Compare or restore watch state after the region ran.
    fn restore(&mut self);
}
