//! Scripted debugger collaborators.
//!
//! - [`ScriptedDebugHandler`]: answers pauses from a queue of
//!   [`Resume`]s and remembers every pause it saw.
//! - [`RecordingWatchHook`]: counts save/restore calls.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use retrace_core::{ObjectKey, Uid, WatchHook};
use retrace_engine::{DebugHandler, Pause, RecorderContext, Resume, RunState, UidDecision};

/// One observation made by [`ScriptedDebugHandler`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Observed {
    Pause {
        pause: Pause,
        /// `get_value(b'c')` at the pause.
        stop_points: i64,
        state: RunState,
    },
    UidBreak {
        obj: ObjectKey,
        candidate: Uid,
    },
}

/// Debug handler driven by a script of resume decisions.
///
/// When the script runs out every pause resumes with
/// [`Resume::Continue`] and every uid break keeps its candidate.
pub struct ScriptedDebugHandler {
    resumes: VecDeque<Resume>,
    decisions: VecDeque<UidDecision>,
    seen: Rc<RefCell<Vec<Observed>>>,
}

impl ScriptedDebugHandler {
    pub fn new(resumes: impl IntoIterator<Item = Resume>) -> Self {
        Self {
            resumes: resumes.into_iter().collect(),
            decisions: VecDeque::new(),
            seen: Rc::default(),
        }
    }

    /// Queue answers for uid breaks.
    pub fn with_uid_decisions(mut self, decisions: impl IntoIterator<Item = UidDecision>) -> Self {
        self.decisions = decisions.into_iter().collect();
        self
    }

    /// Shared view of everything observed, readable after the handler
    /// is boxed into a context.
    pub fn observed(&self) -> Rc<RefCell<Vec<Observed>>> {
        Rc::clone(&self.seen)
    }
}

impl DebugHandler for ScriptedDebugHandler {
    fn on_pause(&mut self, ctx: &mut RecorderContext, pause: Pause) -> Resume {
        self.seen.borrow_mut().push(Observed::Pause {
            pause,
            stop_points: ctx.get_value(b'c').unwrap_or(-1),
            state: ctx.run_state(),
        });
        self.resumes.pop_front().unwrap_or(Resume::Continue)
    }

    fn on_uid_break(
        &mut self,
        _ctx: &mut RecorderContext,
        obj: ObjectKey,
        candidate: Uid,
    ) -> UidDecision {
        self.seen
            .borrow_mut()
            .push(Observed::UidBreak { obj, candidate });
        self.decisions.pop_front().unwrap_or(UidDecision::Keep)
    }
}

/// Watch hook counting how often it was called.
#[derive(Clone, Debug, Default)]
pub struct RecordingWatchHook {
    pub saves: Rc<Cell<u32>>,
    pub restores: Rc<Cell<u32>>,
}

impl WatchHook for RecordingWatchHook {
    fn save(&mut self) {
        self.saves.set(self.saves.get() + 1);
    }

    fn restore(&mut self) {
        self.restores.set(self.restores.get() + 1);
    }
}
