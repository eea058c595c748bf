//! File-based startup: argument stripping and mode detection.

use retrace_core::{ConfigError, Mode};
use retrace_engine::{detect_mode, open, setup, ModeSelection, RecorderConfig};
use retrace_log::LogError;
use retrace_test_utils::init_test_logging;

fn args(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

#[test]
fn first_run_records_second_run_replays() {
    init_test_logging();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("run.log");
    let path_arg = path.to_str().unwrap();

    let (mut ctx, rest) = setup(args(&["prog", "--retrace-log", path_arg, "input"])).unwrap();
    assert_eq!(ctx.mode(), Mode::Record);
    assert_eq!(rest, args(&["prog", "input"]));
    ctx.emit(|| 0xC0FFEEu32).unwrap();
    ctx.stop_point();
    ctx.teardown().unwrap();
    drop(ctx);

    let log_arg = format!("--retrace-log={path_arg}");
    let (mut ctx, rest) = setup(args(&["prog", &log_arg])).unwrap();
    assert_eq!(ctx.mode(), Mode::Replay);
    assert_eq!(rest, args(&["prog"]));
    assert_eq!(ctx.emit(|| 0u32).unwrap(), 0xC0FFEE);
    ctx.stop_point();
    let summary = ctx.teardown().unwrap();
    assert_eq!(summary.stop_points, 1);
}

#[test]
fn dropped_context_still_finishes_the_log() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dropped.log");
    {
        let (mut ctx, _) = setup(args(&["--retrace-record", path.to_str().unwrap()])).unwrap();
        ctx.emit(|| 5u8).unwrap();
    }
    let config = RecorderConfig {
        mode: ModeSelection::Fixed(Mode::Replay),
        log_path: Some(path),
        ..RecorderConfig::default()
    };
    let mut ctx = open(&config).unwrap();
    assert_eq!(ctx.decode::<u8>().unwrap(), 5);
    ctx.teardown().unwrap();
}

#[test]
fn detect_mode_treats_empty_file_as_absent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("empty.log");
    assert_eq!(detect_mode(&path).unwrap(), Mode::Record);
    std::fs::write(&path, b"").unwrap();
    assert_eq!(detect_mode(&path).unwrap(), Mode::Record);
    std::fs::write(&path, b"x").unwrap();
    assert_eq!(detect_mode(&path).unwrap(), Mode::Replay);
}

#[test]
fn forced_replay_of_missing_log_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing.log");
    let err = setup(args(&["--retrace-replay", path.to_str().unwrap()])).unwrap_err();
    assert!(matches!(err, LogError::Io(_)), "{err:?}");
}

#[test]
fn open_without_path_is_config_error() {
    let err = open(&RecorderConfig::default()).unwrap_err();
    assert!(matches!(err, LogError::Config(ConfigError::NoLogPath)));
}

#[test]
fn bad_arguments_are_config_errors() {
    let err = setup(args(&["--retrace-log", "x", "--retrace-buffer", "4"])).unwrap_err();
    assert!(matches!(
        err,
        LogError::Config(ConfigError::BufferTooSmall { configured: 4, .. })
    ));
    let err = setup(args(&["prog"])).unwrap_err();
    assert!(matches!(err, LogError::Config(ConfigError::NoLogPath)));
}
