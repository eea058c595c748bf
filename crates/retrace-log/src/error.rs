//! Error types for the log buffer and codec.

use std::fmt;
use std::io;
use std::panic::Location;

use retrace_core::ConfigError;

/// Source location of the instrumented operation that touched the log.
///
/// Carried by [`LogError::Corrupted`] purely for diagnostics; it never
/// affects behavior.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Site(&'static Location<'static>);

impl Site {
    /// The location of the caller (propagated through `#[track_caller]`).
    #[track_caller]
    pub fn caller() -> Self {
        Self(Location::caller())
    }

    /// Source file of the call site.
    pub fn file(&self) -> &'static str {
        self.0.file()
    }

    /// Line of the call site.
    pub fn line(&self) -> u32 {
        self.0.line()
    }
}

impl fmt::Display for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.0.file(), self.0.line())
    }
}

/// Errors that can occur while recording to or replaying from a log.
///
/// Every variant except [`LogError::CleanEnd`] is fatal: once confidence
/// in byte-exact replay is lost the run must stop. Use
/// [`ExitStatus`](crate::ExitStatus) to turn one into a process status.
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    /// The storage collaborator failed during flush or fetch.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// Startup configuration or log header problem.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    /// The log does not match the sequence of values being replayed.
    #[error("corrupted log at {site}: {detail}")]
    Corrupted {
        /// Instrumented operation that detected the problem.
        site: Site,
        /// Human-readable description of what went wrong.
        detail: String,
    },
    /// The engine was driven incorrectly: the wrong direction for the
    /// mode, a closed log, log access during watch evaluation, or a
    /// counter that no longer fits the log format.
    #[error("invalid use at {site}: {detail}")]
    Misuse {
        /// Instrumented operation that was refused.
        site: Site,
        /// Human-readable description of what went wrong.
        detail: String,
    },
    /// The log ended exactly at its recorded natural end.
    #[error("clean end of log")]
    CleanEnd,
}

impl LogError {
    /// Build a [`LogError::Corrupted`].
    pub fn corrupted(site: Site, detail: impl Into<String>) -> Self {
        Self::Corrupted {
            site,
            detail: detail.into(),
        }
    }

    /// Build a [`LogError::Misuse`].
    pub fn misuse(site: Site, detail: impl Into<String>) -> Self {
        Self::Misuse {
            site,
            detail: detail.into(),
        }
    }

    /// Whether the run must stop with a failure status.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::CleanEnd)
    }

    /// Whether this is a [`LogError::Corrupted`].
    pub fn is_corrupted(&self) -> bool {
        matches!(self, Self::Corrupted { .. })
    }

    /// Whether this is a [`LogError::Misuse`].
    pub fn is_misuse(&self) -> bool {
        matches!(self, Self::Misuse { .. })
    }
}
