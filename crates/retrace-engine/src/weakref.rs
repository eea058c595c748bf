//! Weak references whose liveness is replayed from the log.
//!
//! Whether a weak target is still alive depends on collector timing,
//! which differs between runs. Each dereference of a not-yet-cleared
//! weakref therefore logs the verdict observed while recording, and replay
//! answers from the log alone. A cleared weakref stays cleared and costs
//! no further events.

use retrace_core::{Liveness, Mode, ObjectKey, WeakrefHandle};
use retrace_log::{LogError, Site};
use tracing::trace;

use crate::context::{log_count, RecorderContext};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum WeakrefEntry {
    Alive(ObjectKey),
    Cleared,
}

#[derive(Debug, Default)]
pub(crate) struct WeakrefRegistry {
    entries: Vec<WeakrefEntry>,
}

impl RecorderContext {
    /// Create a weak reference to `target`. Logs nothing.
    ///
    /// Fails once the handle space of `u32` is exhausted.
    #[track_caller]
    pub fn weakref_create(&mut self, target: ObjectKey) -> Result<WeakrefHandle, LogError> {
        let site = Site::caller();
        let index = log_count(self.weakrefs.entries.len(), "weak references", site)?;
        let handle = WeakrefHandle(index);
        self.weakrefs.entries.push(WeakrefEntry::Alive(target));
        Ok(handle)
    }

    /// Dereference a weak reference.
    ///
    /// Record: ask `probe` and log its verdict. Replay: read the verdict
    /// from the log; `probe` is not consulted. Returns `None` once the
    /// target is (or was recorded as) gone.
    #[track_caller]
    pub fn weakref_deref<L>(
        &mut self,
        handle: WeakrefHandle,
        probe: &L,
    ) -> Result<Option<ObjectKey>, LogError>
    where
        L: Liveness + ?Sized,
    {
        let site = Site::caller();
        let target = match self.weakrefs.entries.get(handle.0 as usize) {
            Some(WeakrefEntry::Alive(obj)) => *obj,
            Some(WeakrefEntry::Cleared) => return Ok(None),
            None => {
                return Err(LogError::corrupted(
                    site,
                    format!("unknown weakref handle {handle}"),
                ))
            }
        };
        let alive = match self.mode() {
            Mode::Record => {
                let alive = probe.is_alive(target);
                self.encode_at(alive, site)?;
                alive
            }
            Mode::Replay => self.decode_at::<bool>(site)?,
        };
        if alive {
            Ok(Some(target))
        } else {
            trace!(%handle, %target, "weakref cleared");
            self.weakrefs.entries[handle.0 as usize] = WeakrefEntry::Cleared;
            Ok(None)
        }
    }

    /// Whether `handle` has been observed cleared.
    pub fn weakref_is_cleared(&self, handle: WeakrefHandle) -> bool {
        matches!(
            self.weakrefs.entries.get(handle.0 as usize),
            Some(WeakrefEntry::Cleared)
        )
    }

    /// Weak references created so far.
    pub fn weakref_count(&self) -> usize {
        self.weakrefs.entries.len()
    }
}
