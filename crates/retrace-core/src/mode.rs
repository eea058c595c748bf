//! Record vs. replay mode.

use std::fmt;

/// Which direction the log flows in for this run.
///
/// Record mode is a pure producer into the log; replay mode is a pure
/// consumer from it. A run never switches mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Execute nondeterministic operations and append their outcomes.
    Record,
    /// Skip nondeterministic operations and read their outcomes back.
    Replay,
}

impl Mode {
    /// Whether this is [`Mode::Replay`].
    pub fn is_replay(self) -> bool {
        matches!(self, Self::Replay)
    }

    /// Numeric code reported to the debugger (`0` record, `1` replay).
    pub fn code(self) -> i64 {
        match self {
            Self::Record => 0,
            Self::Replay => 1,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Record => write!(f, "record"),
            Self::Replay => write!(f, "replay"),
        }
    }
}
