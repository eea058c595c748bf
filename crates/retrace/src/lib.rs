//! Retrace: a deterministic record-and-replay execution log engine.
//!
//! This is the top-level facade crate that re-exports the public API from all
//! Retrace sub-crates. For most users, adding `retrace` as a single dependency
//! is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use std::cell::RefCell;
//! use std::io::{self, Cursor, Write};
//! use std::rc::Rc;
//!
//! use retrace::prelude::*;
//!
//! // Log storage that stays readable after the context takes it.
//! #[derive(Clone, Default)]
//! struct Storage(Rc<RefCell<Vec<u8>>>);
//! impl Write for Storage {
//!     fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
//!         self.0.borrow_mut().extend_from_slice(buf);
//!         Ok(buf.len())
//!     }
//!     fn flush(&mut self) -> io::Result<()> { Ok(()) }
//! }
//!
//! // The instrumented program: the same code runs while recording and
//! // while replaying.
//! fn program(ctx: &mut RecorderContext, clock: u64) -> Result<u64, LogError> {
//!     let now = ctx.emit(|| clock)?;
//!     ctx.stop_point();
//!     ctx.call(|_| Ok(now % 1000))
//! }
//!
//! let config = RecorderConfig::default();
//! let storage = Storage::default();
//! let mut ctx = RecorderContext::record(storage.clone(), &config).unwrap();
//! let recorded = program(&mut ctx, 1_700_000_123).unwrap();
//! ctx.teardown().unwrap();
//!
//! // A different clock on replay makes no difference: the log wins.
//! let log = storage.0.borrow().clone();
//! let mut ctx = RecorderContext::replay(Cursor::new(log), &config).unwrap();
//! let replayed = program(&mut ctx, 42).unwrap();
//! ctx.teardown().unwrap();
//! assert_eq!(replayed, recorded);
//! ```
//!
//! # Modules
//!
//! Each module corresponds to a sub-crate. Use them for types not in the prelude:
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `retrace-core` | IDs, [`Mode`](types::Mode), config errors, collaborator traits |
//! | [`log`] | `retrace-log` | Log buffer, event codec, header and chunk framing, exit statuses |
//! | [`engine`] | `retrace-engine` | Recorder context, call protocol, identity, stop points, lifecycle |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Core types, traits, and IDs (`retrace-core`).
///
/// Contains object and callback identifiers, [`types::Mode`],
/// [`types::ConfigError`], and the collaborator traits
/// ([`types::Liveness`], [`types::WatchHook`]).
pub use retrace_core as types;

/// Log buffer and event codec (`retrace-log`).
///
/// [`log::LogWriter`] and [`log::LogReader`] move fixed-width
/// [`log::Event`]s through chunked storage; [`log::ExitStatus`] maps
/// errors to process statuses.
pub use retrace_log as log;

/// Record/replay engine (`retrace-engine`).
///
/// [`engine::RecorderContext`] is the per-run context; [`engine::setup`]
/// builds one from startup arguments.
pub use retrace_engine as engine;

/// Common imports for typical Retrace usage.
///
/// ```rust
/// use retrace::prelude::*;
/// ```
///
/// This imports the context, its configuration, the debugger seams, the
/// identifier types and the error types.
pub mod prelude {
    // Core types and traits
    pub use retrace_core::{
        BreakpointNum, CallbackId, ConfigError, Liveness, Mode, ObjectKey, Uid, WatchHook,
        WeakrefHandle,
    };

    // Log
    pub use retrace_log::{Event, ExitStatus, LogError};

    // Engine
    pub use retrace_engine::{
        setup, Answer, CommandSink, DebugHandler, ModeSelection, Pause, RecorderConfig,
        RecorderContext, Resume, RunSummary, UidDecision,
    };
}
