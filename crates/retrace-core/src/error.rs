//! Configuration errors for the Retrace engine.
//!
//! Everything that can go wrong before the first event is logged lands
//! here: bad startup arguments, invalid configuration values, a log header
//! that cannot be trusted, or a mode the current build does not support.
//! All of them are fatal at startup.

use crate::mode::Mode;

/// Errors detected while parsing startup arguments, validating the engine
/// configuration, or opening a log.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// A recognized option was given without its value.
    #[error("option {option} requires a value")]
    MissingValue {
        /// The option missing its value.
        option: String,
    },
    /// A numeric option could not be parsed.
    #[error("option {option} expects a number, got {value:?}")]
    InvalidNumber {
        /// The option being parsed.
        option: String,
        /// The raw value that failed to parse.
        value: String,
    },
    /// More than one log path option was supplied.
    #[error("conflicting log options {first} and {second}")]
    ConflictingLogOptions {
        /// The option seen first.
        first: String,
        /// The option that conflicts with it.
        second: String,
    },
    /// The startup arguments could not be read at all.
    #[error("malformed startup arguments: {detail}")]
    MalformedArguments {
        /// What the argument parser reported.
        detail: String,
    },
    /// No log path was configured.
    #[error("no log path configured")]
    NoLogPath,
    /// Buffer capacity is below the minimum needed to hold any event.
    #[error("buffer capacity {configured} is below minimum of {minimum}")]
    BufferTooSmall {
        /// The configured capacity.
        configured: usize,
        /// The smallest accepted capacity.
        minimum: usize,
    },
    /// Buffer capacity is above the largest supported chunk size.
    #[error("buffer capacity {configured} exceeds maximum of {maximum}")]
    BufferTooLarge {
        /// The configured capacity.
        configured: usize,
        /// The largest accepted capacity.
        maximum: usize,
    },
    /// The requested mode was compiled out of this build.
    #[error("{requested} mode is not supported by this build")]
    UnsupportedMode {
        /// The mode that was asked for.
        requested: Mode,
    },
    /// The log header could not be decoded.
    #[error("malformed log header: {detail}")]
    MalformedHeader {
        /// Human-readable description of what went wrong.
        detail: String,
    },
    /// The log format version is not supported by this build.
    #[error("unsupported log format version {found}")]
    UnsupportedVersion {
        /// The version found in the header.
        found: u8,
    },
    /// The log was recorded by a differently instrumented build.
    #[error("build id mismatch: recorded={recorded:#018x}, current={current:#018x}")]
    BuildMismatch {
        /// Build id stored in the log header.
        recorded: u64,
        /// Build id of the running program.
        current: u64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_offending_option() {
        let err = ConfigError::InvalidNumber {
            option: "--retrace-stop-at".into(),
            value: "ten".into(),
        };
        assert_eq!(
            err.to_string(),
            "option --retrace-stop-at expects a number, got \"ten\""
        );
    }

    #[test]
    fn build_mismatch_is_hex() {
        let err = ConfigError::BuildMismatch {
            recorded: 0xAB,
            current: 0xCD,
        };
        assert_eq!(
            err.to_string(),
            "build id mismatch: recorded=0x00000000000000ab, current=0x00000000000000cd"
        );
    }
}
