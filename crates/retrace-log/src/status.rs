//! Process exit statuses for fatal log errors.
//!
//! [`ExitStatus`] gives every [`LogError`] kind a distinct, documented
//! status so a supervisor can tell a desynchronized replay from a full
//! disk. Values follow `sysexits.h`.

use crate::error::LogError;

/// Status a run terminates with after a [`LogError`].
#[repr(i32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExitStatus {
    /// The log reached its recorded natural end.
    Clean = 0,
    /// The log is corrupted or desynchronized (`EX_DATAERR`).
    CorruptedLog = 65,
    /// The engine was used incorrectly by the instrumented program
    /// (`EX_SOFTWARE`).
    Misuse = 70,
    /// Log storage failed (`EX_IOERR`).
    Io = 74,
    /// Bad arguments, configuration, or header (`EX_CONFIG`).
    Config = 78,
}

impl ExitStatus {
    /// The numeric status.
    pub fn code(self) -> i32 {
        self as i32
    }
}

impl From<&LogError> for ExitStatus {
    fn from(e: &LogError) -> Self {
        match e {
            LogError::Io(_) => ExitStatus::Io,
            LogError::Config(_) => ExitStatus::Config,
            LogError::Corrupted { .. } => ExitStatus::CorruptedLog,
            LogError::Misuse { .. } => ExitStatus::Misuse,
            LogError::CleanEnd => ExitStatus::Clean,
        }
    }
}

impl From<ExitStatus> for std::process::ExitCode {
    fn from(s: ExitStatus) -> Self {
        // All variants fit in a u8.
        std::process::ExitCode::from(s.code() as u8)
    }
}
