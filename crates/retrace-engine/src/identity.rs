//! Monotonic object identity.
//!
//! Uids are handed out from a counter at an object's first identity query
//! and kept in a side table keyed by the host's [`ObjectKey`]. Uids are
//! never written to the log: replay executes the same queries in the same
//! order and therefore reproduces the same numbering.

use indexmap::IndexMap;
use retrace_core::{ObjectKey, Uid};
use tracing::{debug, trace, warn};

use crate::context::RecorderContext;
use crate::debug::UidDecision;

type BreakPredicate = Box<dyn Fn(ObjectKey) -> bool>;

/// Object → uid side table plus the uid break target.
pub(crate) struct IdentityTable {
    by_object: IndexMap<ObjectKey, Uid>,
    by_uid: IndexMap<Uid, ObjectKey>,
    next: Uid,
    break_at: Option<Uid>,
    predicate: Option<BreakPredicate>,
}

/// Uid break settings taken out of an [`IdentityTable`] while they must
/// not fire.
pub(crate) struct UidBreaks {
    at: Option<Uid>,
    predicate: Option<BreakPredicate>,
}

impl IdentityTable {
    pub(crate) fn new(break_at: Option<Uid>) -> Self {
        Self {
            by_object: IndexMap::new(),
            by_uid: IndexMap::new(),
            next: Uid::FIRST,
            break_at,
            predicate: None,
        }
    }

    pub(crate) fn lookup(&self, obj: ObjectKey) -> Option<Uid> {
        self.by_object.get(&obj).copied()
    }

    pub(crate) fn object(&self, uid: Uid) -> Option<ObjectKey> {
        self.by_uid.get(&uid).copied()
    }

    pub(crate) fn next_uid(&self) -> Uid {
        self.next
    }

    pub(crate) fn assigned(&self) -> u64 {
        self.next.0 - Uid::FIRST.0
    }

    fn should_break(&self, candidate: Uid, obj: ObjectKey) -> bool {
        self.break_at == Some(candidate) || self.predicate.as_ref().is_some_and(|p| p(obj))
    }

    /// Record `obj → uid`. `uid` is at or above the counter.
    fn assign(&mut self, obj: ObjectKey, uid: Uid) {
        debug_assert!(uid >= self.next, "uid {uid} below counter {}", self.next);
        self.by_object.insert(obj, uid);
        self.by_uid.insert(uid, obj);
        self.next = Uid(uid.0 + 1);
    }

    pub(crate) fn forget(&mut self, obj: ObjectKey) -> Option<Uid> {
        let uid = self.by_object.swap_remove(&obj)?;
        self.by_uid.swap_remove(&uid);
        Some(uid)
    }

    /// Take the break target and predicate out, leaving both disarmed.
    pub(crate) fn disarm(&mut self) -> UidBreaks {
        UidBreaks {
            at: self.break_at.take(),
            predicate: self.predicate.take(),
        }
    }

    pub(crate) fn rearm(&mut self, breaks: UidBreaks) {
        self.break_at = breaks.at;
        self.predicate = breaks.predicate;
    }

    /// Drop every assignment at or above `next` and rewind the counter.
    pub(crate) fn rewind(&mut self, next: Uid) {
        self.by_object.retain(|_, uid| *uid < next);
        self.by_uid.retain(|uid, _| *uid < next);
        self.next = next;
    }
}

impl RecorderContext {
    /// Uid of `obj`, assigned on first query.
    ///
    /// The candidate is the identity counter. If it equals the armed uid
    /// break target, or the break predicate matches `obj`, the debug
    /// handler is consulted and may override it with a higher unused uid.
    /// Either way the counter then moves past the assigned uid.
    pub fn unique_id(&mut self, obj: ObjectKey) -> Uid {
        if let Some(uid) = self.identity.lookup(obj) {
            return uid;
        }
        let candidate = self.identity.next_uid();
        let uid = if self.identity.should_break(candidate, obj) {
            self.uid_break(obj, candidate)
        } else {
            candidate
        };
        // The handler may have queried `obj` itself while paused.
        if let Some(existing) = self.identity.lookup(obj) {
            return existing;
        }
        self.identity.assign(obj, uid);
        trace!(%obj, %uid, "assigned uid");
        uid
    }

    fn uid_break(&mut self, obj: ObjectKey, candidate: Uid) -> Uid {
        if self.identity.break_at == Some(candidate) {
            self.identity.break_at = None;
        }
        let decision = self
            .with_paused_handler(|handler, ctx| handler.on_uid_break(ctx, obj, candidate))
            .unwrap_or(UidDecision::Keep);
        // Uids assigned while paused push the floor up.
        let floor = self.identity.next_uid();
        match decision {
            UidDecision::Keep => floor,
            // The counter moves to uid + 1, which must still exist.
            UidDecision::Override(uid) if uid.0 == u64::MAX => {
                warn!(
                    %obj,
                    requested = %uid,
                    %floor,
                    "uid override leaves no room for later objects; ignored"
                );
                floor
            }
            UidDecision::Override(uid) if uid >= floor => uid,
            UidDecision::Override(uid) => {
                warn!(%obj, requested = %uid, %floor, "uid override would break monotonicity; ignored");
                floor
            }
        }
    }

    /// Identity hash of `obj`: its uid as an integer.
    pub fn identityhash(&mut self, obj: ObjectKey) -> u64 {
        self.unique_id(obj).0
    }

    /// Uid of `obj` if it already has one. Never assigns.
    pub fn lookup_uid(&self, obj: ObjectKey) -> Option<Uid> {
        self.identity.lookup(obj)
    }

    /// The live object currently holding `uid`.
    pub fn object_for_uid(&self, uid: Uid) -> Option<ObjectKey> {
        self.identity.object(uid)
    }

    /// Arm the uid break so the run pauses when the object with `uid` is
    /// created.
    ///
    /// Returns `false` (and leaves the target untouched) if `uid` was
    /// already handed out.
    pub fn track_object(&mut self, uid: Uid) -> bool {
        if uid < self.identity.next_uid() {
            warn!(%uid, next = %self.identity.next_uid(), "object already created; not tracked");
            return false;
        }
        self.identity.break_at = Some(uid);
        true
    }

    /// Current uid break target.
    pub fn uid_break_target(&self) -> Option<Uid> {
        self.identity.break_at
    }

    /// Install (or with `None`, remove) a predicate that sends matching
    /// objects through the uid break path.
    pub fn set_uid_break_predicate(&mut self, predicate: Option<Box<dyn Fn(ObjectKey) -> bool>>) {
        self.identity.predicate = predicate;
    }

    /// Remove a reclaimed object from the side table. Its uid is never
    /// reused.
    ///
    /// Objects with a pending destructor or a finalization queue slot keep
    /// their uid until finalized, so `None` is returned for them.
    pub fn forget(&mut self, obj: ObjectKey) -> Option<Uid> {
        if self.finalizers.enrolled(obj) {
            debug!(%obj, "object still enrolled for finalization; uid kept");
            return None;
        }
        self.identity.forget(obj)
    }

    /// The uid the next new object would get.
    pub fn next_uid(&self) -> Uid {
        self.identity.next_uid()
    }

    /// Uids handed out so far.
    pub fn uids_assigned(&self) -> u64 {
        self.identity.assigned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn first_uid_is_one() {
        let mut t = IdentityTable::new(None);
        assert_eq!(t.next_uid(), Uid::FIRST);
        t.assign(ObjectKey(10), t.next_uid());
        assert_eq!(t.lookup(ObjectKey(10)), Some(Uid(1)));
        assert_eq!(t.object(Uid(1)), Some(ObjectKey(10)));
        assert_eq!(t.assigned(), 1);
    }

    #[test]
    fn forget_keeps_counter() {
        let mut t = IdentityTable::new(None);
        t.assign(ObjectKey(1), Uid(1));
        t.assign(ObjectKey(2), Uid(2));
        assert_eq!(t.forget(ObjectKey(1)), Some(Uid(1)));
        assert_eq!(t.object(Uid(1)), None);
        assert_eq!(t.next_uid(), Uid(3));
        assert_eq!(t.forget(ObjectKey(1)), None);
    }

    #[test]
    fn rewind_drops_newer_assignments() {
        let mut t = IdentityTable::new(None);
        for k in 1..=5 {
            t.assign(ObjectKey(100 + k), Uid(k));
        }
        t.rewind(Uid(3));
        assert_eq!(t.next_uid(), Uid(3));
        assert_eq!(t.lookup(ObjectKey(102)), Some(Uid(2)));
        assert_eq!(t.lookup(ObjectKey(103)), None);
        assert_eq!(t.object(Uid(5)), None);
    }

    #[test]
    fn break_matches_target_or_predicate() {
        let mut t = IdentityTable::new(Some(Uid(4)));
        assert!(t.should_break(Uid(4), ObjectKey(0)));
        assert!(!t.should_break(Uid(3), ObjectKey(0)));
        t.predicate = Some(Box::new(|obj: ObjectKey| obj.0 % 2 == 1));
        assert!(t.should_break(Uid(3), ObjectKey(7)));
    }

    proptest! {
        #[test]
        fn assignments_strictly_increase(keys in proptest::collection::vec(0u64..64, 1..200)) {
            let mut t = IdentityTable::new(None);
            let mut last = Uid::NONE;
            for k in keys {
                let obj = ObjectKey(k);
                let uid = match t.lookup(obj) {
                    Some(uid) => uid,
                    None => {
                        let uid = t.next_uid();
                        t.assign(obj, uid);
                        prop_assert!(uid > last);
                        last = uid;
                        uid
                    }
                };
                prop_assert_eq!(t.object(uid), Some(obj));
            }
        }
    }
}
