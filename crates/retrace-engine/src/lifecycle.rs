//! File-based startup: argument handling, mode selection, log storage.
//!
//! [`setup`] is the single call an instrumented program makes before its
//! own `main` logic. It strips the recognized options, decides between
//! record and replay, opens the log file and returns the context together
//! with the host's remaining arguments.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter};
use std::path::Path;

use retrace_core::{ConfigError, Mode};
use retrace_log::LogError;
use tracing::{error, info};

use crate::config::{build_mode, check_supported, ModeSelection, RecorderConfig};
use crate::context::RecorderContext;

/// Parse startup arguments and open the run's log.
///
/// Returns the context and every argument that was not a recognized
/// option, in order.
pub fn setup<I>(args: I) -> Result<(RecorderContext, Vec<String>), LogError>
where
    I: IntoIterator<Item = String>,
{
    let (config, rest) = RecorderConfig::from_args(args).inspect_err(|e| {
        error!(error = %e, "invalid startup arguments");
    })?;
    let ctx = open(&config)?;
    Ok((ctx, rest))
}

/// Open the log at `config.log_path` in the selected mode.
pub fn open(config: &RecorderConfig) -> Result<RecorderContext, LogError> {
    open_inner(config).inspect_err(|e| {
        error!(error = %e, path = ?config.log_path, "failed to open log");
    })
}

fn open_inner(config: &RecorderConfig) -> Result<RecorderContext, LogError> {
    config.validate()?;
    let path = config.log_path.as_deref().ok_or(ConfigError::NoLogPath)?;
    let mode = match config.mode {
        ModeSelection::Fixed(mode) => mode,
        ModeSelection::Detect => match build_mode() {
            Some(mode) => mode,
            None => detect_mode(path)?,
        },
    };
    check_supported(mode)?;
    info!(path = %path.display(), %mode, "opening log");
    match mode {
        Mode::Record => {
            let file = File::create(path)?;
            RecorderContext::record(BufWriter::new(file), config)
        }
        Mode::Replay => {
            let file = File::open(path)?;
            RecorderContext::replay(BufReader::new(file), config)
        }
    }
}

/// Replay if a non-empty log exists at `path`, record otherwise.
pub fn detect_mode(path: &Path) -> Result<Mode, LogError> {
    match fs::metadata(path) {
        Ok(meta) if meta.len() > 0 => Ok(Mode::Replay),
        Ok(_) => Ok(Mode::Record),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Mode::Record),
        Err(e) => Err(e.into()),
    }
}
