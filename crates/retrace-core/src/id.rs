//! Strongly-typed identifiers shared by the log and the engine.

use std::fmt;

/// Reserved byte in the call-return slot meaning "ordinary return, no
/// callback fired".
///
/// Any other byte at that position of the log is a [`CallbackId`].
pub const CALL_SENTINEL: u8 = 0xFC;

/// Monotonic per-object identity number.
///
/// Assigned once per object at its first identity query. Numbering starts
/// at [`Uid::FIRST`]; [`Uid::NONE`] never names an object and is used in
/// the log to mean "no object".
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Uid(pub u64);

impl Uid {
    /// Marker for "no object".
    pub const NONE: Uid = Uid(0);

    /// The first uid handed out by a fresh allocator.
    pub const FIRST: Uid = Uid(1);

    /// Whether this is the [`Uid::NONE`] marker.
    pub fn is_none(self) -> bool {
        self == Self::NONE
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Uid {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

/// Host-side handle naming a live object.
///
/// The host chooses the key (an arena slot, an address, an index). It only
/// has to be unique among live objects; it never reaches the log, so it may
/// differ between the recording and the replaying process.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey(pub u64);

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<u64> for ObjectKey {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

/// Identifier of a registered callback.
///
/// Occupies the call-return slot of the log, so it can be any byte except
/// [`CALL_SENTINEL`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallbackId(u8);

impl CallbackId {
    /// Build a callback id, rejecting the reserved sentinel byte.
    pub const fn new(raw: u8) -> Option<Self> {
        if raw == CALL_SENTINEL {
            None
        } else {
            Some(Self(raw))
        }
    }

    /// The byte written to the log for this id.
    pub const fn get(self) -> u8 {
        self.0
    }
}

impl fmt::Display for CallbackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#04x}", self.0)
    }
}

impl TryFrom<u8> for CallbackId {
    type Error = u8;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        Self::new(raw).ok_or(raw)
    }
}

/// Handle to a weak reference created through the engine.
///
/// Handles are allocated sequentially in program order, so the same weak
/// reference gets the same handle during record and replay.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WeakrefHandle(pub u32);

impl fmt::Display for WeakrefHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "w{}", self.0)
    }
}

/// Number of an explicit breakpoint hit from instrumented code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BreakpointNum(pub i64);

impl fmt::Display for BreakpointNum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for BreakpointNum {
    fn from(v: i64) -> Self {
        Self(v)
    }
}
