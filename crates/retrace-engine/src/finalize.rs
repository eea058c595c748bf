//! Destructors and finalization queues replayed in recorded order.
//!
//! The collector decides when objects die, and it decides differently on
//! every run. While recording, death notifications are only queued; the
//! queued work runs at explicit safe points and the order is logged by
//! uid. Replay ignores its own collector entirely and runs exactly the
//! recorded sequence.

use std::collections::VecDeque;
use std::rc::Rc;

use indexmap::{IndexMap, IndexSet};
use retrace_core::{Mode, ObjectKey, Uid};
use retrace_log::{LogError, Site};
use tracing::trace;

use crate::context::{log_count, RecorderContext};

/// A destructor body. Receives the object being finalized.
pub type Destructor = Rc<dyn Fn(&mut RecorderContext, ObjectKey) -> Result<(), LogError>>;

#[derive(Default)]
pub(crate) struct Finalizers {
    destructors: IndexMap<ObjectKey, Destructor>,
    queued: IndexSet<ObjectKey>,
    pending: VecDeque<ObjectKey>,
    dead: VecDeque<ObjectKey>,
    pub(crate) run: u64,
}

impl Finalizers {
    /// Whether `obj` still has a destructor or a finalization queue slot.
    pub(crate) fn enrolled(&self, obj: ObjectKey) -> bool {
        self.destructors.contains_key(&obj) || self.queued.contains(&obj)
    }
}

impl RecorderContext {
    /// Attach a destructor to `obj`.
    ///
    /// The object's uid is assigned now, so uid numbering never depends
    /// on when the collector gets around to it.
    pub fn register_destructor<F>(&mut self, obj: ObjectKey, body: F) -> Uid
    where
        F: Fn(&mut RecorderContext, ObjectKey) -> Result<(), LogError> + 'static,
    {
        let uid = self.unique_id(obj);
        self.finalizers.destructors.insert(obj, Rc::new(body));
        uid
    }

    /// Enroll `obj` in the finalization queue. Assigns its uid now.
    pub fn fq_register(&mut self, obj: ObjectKey) -> Uid {
        let uid = self.unique_id(obj);
        self.finalizers.queued.insert(obj);
        uid
    }

    /// Collector hook: `obj`, which has a destructor, is unreachable.
    ///
    /// Record: defer the destructor to the next
    /// [`run_destructors`](Self::run_destructors). Replay: ignored.
    pub fn call_destructor(&mut self, obj: ObjectKey) {
        if self.mode().is_replay() {
            trace!(%obj, "collector destructor notification ignored during replay");
            return;
        }
        if self.finalizers.destructors.contains_key(&obj) && !self.finalizers.pending.contains(&obj) {
            self.finalizers.pending.push_back(obj);
        }
    }

    /// Collector hook: `obj`, enrolled with
    /// [`fq_register`](Self::fq_register), is unreachable.
    ///
    /// Record: make it available to [`next_dead`](Self::next_dead).
    /// Replay: ignored.
    pub fn notify_dead(&mut self, obj: ObjectKey) {
        if self.mode().is_replay() {
            trace!(%obj, "collector death notification ignored during replay");
            return;
        }
        if self.finalizers.queued.contains(&obj) && !self.finalizers.dead.contains(&obj) {
            self.finalizers.dead.push_back(obj);
        }
    }

    /// Safe point: run deferred destructors.
    ///
    /// Record: log the batch size, then each object's uid right before its
    /// destructor runs. Replay: read the same sequence back and run the
    /// destructors it names. Returns the number of destructors run.
    #[track_caller]
    pub fn run_destructors(&mut self) -> Result<u32, LogError> {
        let site = Site::caller();
        let count = match self.mode() {
            Mode::Record => {
                let count = log_count(self.finalizers.pending.len(), "pending destructors", site)?;
                self.encode_at(count, site)?;
                for _ in 0..count {
                    let Some(obj) = self.finalizers.pending.pop_front() else {
                        break;
                    };
                    let uid = self.enrolled_uid(obj, site)?;
                    self.encode_at(uid, site)?;
                    self.finalize(obj, site)?;
                }
                count
            }
            Mode::Replay => {
                let count: u32 = self.decode_at(site)?;
                for _ in 0..count {
                    let uid: Uid = self.decode_at(site)?;
                    let obj = self.identity.object(uid).ok_or_else(|| {
                        LogError::corrupted(site, format!("destructor for unknown uid {uid}"))
                    })?;
                    self.finalize(obj, site)?;
                }
                count
            }
        };
        Ok(count)
    }

    /// The uid replay will use to find `obj` again. Its absence means the
    /// object was enrolled inside a watch region that has since unwound.
    fn enrolled_uid(&self, obj: ObjectKey, site: Site) -> Result<Uid, LogError> {
        self.identity.lookup(obj).ok_or_else(|| {
            LogError::misuse(site, format!("object {obj} is enrolled for finalization but has no uid"))
        })
    }

    fn finalize(&mut self, obj: ObjectKey, site: Site) -> Result<(), LogError> {
        let body = self.finalizers.destructors.swap_remove(&obj).ok_or_else(|| {
            LogError::corrupted(site, format!("no destructor registered for object {obj}"))
        })?;
        trace!(%obj, "running destructor");
        body(self, obj)?;
        self.finalizers.run += 1;
        self.identity.forget(obj);
        Ok(())
    }

    /// Next object from the finalization queue, in recorded order.
    ///
    /// Record: pop the collector's queue and log the uid, or
    /// [`Uid::NONE`] when nothing is dead. Replay: read the uid back.
    #[track_caller]
    pub fn next_dead(&mut self) -> Result<Option<ObjectKey>, LogError> {
        let site = Site::caller();
        let obj = match self.mode() {
            Mode::Record => {
                let obj = self.finalizers.dead.pop_front();
                let uid = match obj {
                    Some(obj) => self.enrolled_uid(obj, site)?,
                    None => Uid::NONE,
                };
                self.encode_at(uid, site)?;
                obj
            }
            Mode::Replay => {
                let uid: Uid = self.decode_at(site)?;
                if uid.is_none() {
                    None
                } else {
                    let obj = self.identity.object(uid).ok_or_else(|| {
                        LogError::corrupted(site, format!("finalizer queue names unknown uid {uid}"))
                    })?;
                    Some(obj)
                }
            }
        };
        if let Some(obj) = obj {
            self.finalizers.queued.swap_remove(&obj);
        }
        Ok(obj)
    }

    /// Destructors waiting for the next safe point (record only).
    pub fn pending_destructors(&self) -> usize {
        self.finalizers.pending.len()
    }
}
