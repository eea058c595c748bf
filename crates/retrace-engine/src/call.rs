//! Foreign calls and the callbacks that re-enter the program during them.
//!
//! A logged call occupies a frame in the log:
//!
//! ```text
//! [cb id][callback events...] ... [cb id][callback events...] [0xFC][result]
//! ```
//!
//! While recording, the real call runs first. Any callback it triggers
//! enters through [`callback_loc`](RecorderContext::callback_loc), which
//! writes the callback id, and then logs its own events. When the call
//! returns, the sentinel `0xFC` and the result are appended.
//!
//! While replaying, the real call is skipped. Bytes are read from the
//! frame: every id is dispatched to the registered [`Callback`], which
//! replays its own events (and may itself contain nested frames), until
//! the sentinel shows up and the result can be decoded.

use std::rc::Rc;

use indexmap::IndexMap;
use retrace_core::{CallbackId, Mode, CALL_SENTINEL};
use retrace_log::{Event, LogError, Site};
use smallvec::SmallVec;
use tracing::trace;

use crate::context::RecorderContext;

/// A registered callback body, shared so it can run while the registry
/// is borrowed by the context it mutates.
pub type Callback = Rc<dyn Fn(&mut RecorderContext) -> Result<(), LogError>>;

#[derive(Default)]
pub(crate) struct CallbackRegistry {
    handlers: IndexMap<CallbackId, Callback>,
    dispatch: SmallVec<[CallbackId; 4]>,
    pub(crate) dispatched: u64,
}

impl RecorderContext {
    /// Register the body of callback `id`, returning the one it replaces.
    ///
    /// The same body must be reachable from the host's real foreign calls
    /// while recording, and it should start with
    /// [`callback_loc(id)`](Self::callback_loc).
    pub fn register_callback<F>(&mut self, id: CallbackId, body: F) -> Option<Callback>
    where
        F: Fn(&mut RecorderContext) -> Result<(), LogError> + 'static,
    {
        self.callbacks.handlers.insert(id, Rc::new(body))
    }

    /// Run a foreign call whose result is logged.
    ///
    /// Record: run `real`, then log the sentinel and its result.
    /// Replay: skip `real`; dispatch recorded callbacks until the
    /// sentinel, then decode the result.
    #[track_caller]
    pub fn call<T, F>(&mut self, real: F) -> Result<T, LogError>
    where
        T: Event,
        F: FnOnce(&mut Self) -> Result<T, LogError>,
    {
        let site = Site::caller();
        match self.mode() {
            Mode::Record => {
                let value = real(self)?;
                self.encode_at(CALL_SENTINEL, site)?;
                self.encode_at(value, site)?;
                Ok(value)
            }
            Mode::Replay => {
                self.replay_frame(site)?;
                self.decode_at(site)
            }
        }
    }

    /// [`call`](Self::call) for foreign calls without a result.
    #[track_caller]
    pub fn call_void<F>(&mut self, real: F) -> Result<(), LogError>
    where
        F: FnOnce(&mut Self) -> Result<(), LogError>,
    {
        let site = Site::caller();
        match self.mode() {
            Mode::Record => {
                real(self)?;
                self.encode_at(CALL_SENTINEL, site)
            }
            Mode::Replay => self.replay_frame(site),
        }
    }

    fn replay_frame(&mut self, site: Site) -> Result<(), LogError> {
        loop {
            let byte: u8 = self.decode_at(site)?;
            if byte == CALL_SENTINEL {
                return Ok(());
            }
            let id = CallbackId::new(byte)
                .ok_or_else(|| LogError::corrupted(site, "sentinel read as callback id"))?;
            self.dispatch(id, site)?;
        }
    }

    /// Invoke the registered body of callback `id` as if the log had
    /// dispatched it.
    ///
    /// While recording, this is how a foreign call's real body triggers a
    /// callback; the body's [`callback_loc`](Self::callback_loc) logs the
    /// id. The debugger may also use it to run a callback on demand.
    #[track_caller]
    pub fn invoke_callback(&mut self, id: CallbackId) -> Result<(), LogError> {
        self.dispatch(id, Site::caller())
    }

    fn dispatch(&mut self, id: CallbackId, site: Site) -> Result<(), LogError> {
        let body = self
            .callbacks
            .handlers
            .get(&id)
            .cloned()
            .ok_or_else(|| LogError::corrupted(site, format!("unknown callback id {id}")))?;
        trace!(%id, depth = self.callbacks.dispatch.len(), "dispatching callback");
        self.callbacks.dispatch.push(id);
        let result = body(self);
        self.callbacks.dispatch.pop();
        self.callbacks.dispatched += 1;
        result
    }

    /// Resume-location marker at the entry of callback `id`.
    ///
    /// Record: log the id so replay knows which callback fired.
    /// Replay: check that the log is currently dispatching `id`.
    #[track_caller]
    pub fn callback_loc(&mut self, id: CallbackId) -> Result<(), LogError> {
        let site = Site::caller();
        match self.mode() {
            Mode::Record => self.encode_at(id.get(), site),
            Mode::Replay => match self.callbacks.dispatch.last() {
                Some(&top) if top == id => Ok(()),
                Some(&top) => Err(LogError::corrupted(
                    site,
                    format!("callback {id} entered while the log dispatches {top}"),
                )),
                None => Err(LogError::corrupted(
                    site,
                    format!("callback {id} entered outside any logged call"),
                )),
            },
        }
    }

    /// Callbacks currently being dispatched, innermost last.
    pub fn callback_depth(&self) -> usize {
        self.callbacks.dispatch.len()
    }
}
