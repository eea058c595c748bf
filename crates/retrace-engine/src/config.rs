//! Recorder configuration, startup arguments, and build-time mode support.
//!
//! [`RecorderConfig`] is the builder-input for a
//! [`RecorderContext`](crate::RecorderContext). It can be filled in programmatically or
//! parsed out of the program's startup arguments with
//! [`RecorderConfig::from_args`], which strips the options it recognizes
//! and hands everything else back to the host untouched.

use std::ffi::OsString;
use std::path::PathBuf;

use pico_args::Arguments;
use retrace_core::{ConfigError, Mode, Uid};
use retrace_log::{check_capacity, DEFAULT_BUFFER_CAPACITY};

// ── ModeSelection ──────────────────────────────────────────────────

/// How the run decides between record and replay.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ModeSelection {
    /// Replay if a non-empty log already exists at the path, record
    /// otherwise.
    #[default]
    Detect,
    /// Always use this mode.
    Fixed(Mode),
}

// ── Build-time support ─────────────────────────────────────────────

/// Whether this build can run in `mode`.
///
/// The `record-only` and `replay-only` cargo features compile one of the
/// two directions out.
pub const fn supports(mode: Mode) -> bool {
    match mode {
        Mode::Record => !cfg!(feature = "replay-only"),
        Mode::Replay => !cfg!(feature = "record-only"),
    }
}

/// The only mode this build supports, if it was restricted to one.
pub const fn build_mode() -> Option<Mode> {
    if cfg!(feature = "record-only") {
        Some(Mode::Record)
    } else if cfg!(feature = "replay-only") {
        Some(Mode::Replay)
    } else {
        None
    }
}

/// Fail with [`ConfigError::UnsupportedMode`] if `mode` was compiled out.
pub fn check_supported(mode: Mode) -> Result<(), ConfigError> {
    if supports(mode) {
        Ok(())
    } else {
        Err(ConfigError::UnsupportedMode { requested: mode })
    }
}

// ── RecorderConfig ─────────────────────────────────────────────────

/// Configuration for a record or replay run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecorderConfig {
    /// Mode selection. Default: [`ModeSelection::Detect`].
    pub mode: ModeSelection,
    /// Log file used by [`open`](crate::open) and [`setup`](crate::setup).
    /// Unused by the stream constructors. Default: `None`.
    pub log_path: Option<PathBuf>,
    /// Buffer capacity in bytes when recording. Replay uses the capacity
    /// stored in the log header. Default: 64 KiB.
    pub buffer_capacity: usize,
    /// Stop point at which to pause first. Default: `None`.
    pub stop_point_break: Option<u64>,
    /// Uid whose assignment pauses the run. Default: `None`.
    pub uid_break: Option<Uid>,
    /// Whether watch state is saved and restored. Default: `false`.
    pub watch_enabled: bool,
    /// Fingerprint of the instrumented build. A replay refuses logs
    /// recorded with a different id. Default: `0`.
    pub build_id: u64,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            mode: ModeSelection::Detect,
            log_path: None,
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            stop_point_break: None,
            uid_break: None,
            watch_enabled: false,
            build_id: 0,
        }
    }
}

impl RecorderConfig {
    /// Check structural invariants.
    ///
    /// The log path is not required here; only the file-based
    /// entry points need one.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_capacity(self.buffer_capacity)?;
        if let ModeSelection::Fixed(mode) = self.mode {
            check_supported(mode)?;
        }
        if let Some(uid) = self.uid_break {
            if uid.is_none() {
                return Err(ConfigError::InvalidNumber {
                    option: "uid_break".into(),
                    value: uid.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Parse startup arguments.
    ///
    /// Recognized options are removed; every other argument is returned in
    /// its original order. Options take their value either as the next
    /// argument or after `=`:
    ///
    /// | Option | Effect |
    /// |--------|--------|
    /// | `--retrace-log <path>` | log path, mode detected from the file |
    /// | `--retrace-record <path>` | log path, record mode |
    /// | `--retrace-replay <path>` | log path, replay mode |
    /// | `--retrace-buffer <bytes>` | buffer capacity |
    /// | `--retrace-stop-at <n>` | first stop-point break target |
    /// | `--retrace-watch` | enable watch state |
    ///
    /// Exactly one of the three log options must be present.
    ///
    /// # Examples
    ///
    /// ```
    /// use retrace_core::Mode;
    /// use retrace_engine::{ModeSelection, RecorderConfig};
    ///
    /// let args = ["prog", "--retrace-replay=run.log", "-v", "--retrace-stop-at", "7"];
    /// let (config, rest) = RecorderConfig::from_args(args.map(String::from)).unwrap();
    ///
    /// assert_eq!(config.mode, ModeSelection::Fixed(Mode::Replay));
    /// assert_eq!(config.stop_point_break, Some(7));
    /// assert_eq!(rest, ["prog", "-v"]);
    /// ```
    pub fn from_args<I>(args: I) -> Result<(Self, Vec<String>), ConfigError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut args = Arguments::from_vec(args.into_iter().map(OsString::from).collect());
        let mut config = Self::default();

        let mut log_options = Vec::new();
        for option in [LOG, RECORD, REPLAY] {
            for path in args.values_from_str::<_, String>(option).map_err(argument_error)? {
                log_options.push((option, path));
            }
        }
        let (option, path) = match log_options.as_slice() {
            [] => return Err(ConfigError::NoLogPath),
            [only] => only.clone(),
            [first, second, ..] => {
                return Err(ConfigError::ConflictingLogOptions {
                    first: first.0.into(),
                    second: second.0.into(),
                })
            }
        };
        config.log_path = Some(PathBuf::from(path));
        config.mode = match option {
            RECORD => ModeSelection::Fixed(Mode::Record),
            REPLAY => ModeSelection::Fixed(Mode::Replay),
            _ => ModeSelection::Detect,
        };

        if let Some(value) = last_value(&mut args, BUFFER)? {
            config.buffer_capacity = parse_number(BUFFER, &value)?;
        }
        if let Some(value) = last_value(&mut args, STOP_AT)? {
            config.stop_point_break = Some(parse_number(STOP_AT, &value)?);
        }
        while args.contains(WATCH) {
            config.watch_enabled = true;
        }

        let rest = args
            .finish()
            .into_iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect();
        Ok((config, rest))
    }
}

// ── Argument helpers ───────────────────────────────────────────────

const LOG: &str = "--retrace-log";
const RECORD: &str = "--retrace-record";
const REPLAY: &str = "--retrace-replay";
const BUFFER: &str = "--retrace-buffer";
const STOP_AT: &str = "--retrace-stop-at";
const WATCH: &str = "--retrace-watch";

/// Strip every occurrence of `option`; the last one wins.
fn last_value(args: &mut Arguments, option: &'static str) -> Result<Option<String>, ConfigError> {
    let values = args.values_from_str::<_, String>(option).map_err(argument_error)?;
    Ok(values.into_iter().last())
}

fn argument_error(err: pico_args::Error) -> ConfigError {
    match err {
        pico_args::Error::OptionWithoutAValue(option) => ConfigError::MissingValue {
            option: option.into(),
        },
        other => ConfigError::MalformedArguments {
            detail: other.to_string(),
        },
    }
}

fn parse_number<T: std::str::FromStr>(option: &'static str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidNumber {
        option: option.into(),
        value: value.into(),
    })
}
