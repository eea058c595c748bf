//! Record/replay engine for Retrace.
//!
//! Provides [`RecorderContext`], the single explicit context every
//! instrumented operation goes through. In record mode it runs the real
//! nondeterministic operations and appends their outcomes to the log; in
//! replay mode it skips them and reads the outcomes back, reproducing the
//! recorded control flow byte for byte.
//!
//! # Components
//!
//! - [`call`]: foreign calls whose results are logged, including
//!   callbacks that re-enter the program while the call is in flight
//! - [`identity`]: monotonic object uids kept in a side table
//! - [`stop_point`]: stop-point counter, breakpoints, and the pause
//!   protocol handed to a [`DebugHandler`]
//! - [`weakref`] and [`finalize`]: weak reference verdicts and destructor
//!   order replayed from the log instead of the collector
//! - [`watch`]: counter snapshots around watchpoint evaluation
//! - [`debug`]: debugger command channel and pause hooks
//! - [`lifecycle`]: startup argument handling, mode selection, log files

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

#[cfg(all(feature = "record-only", feature = "replay-only"))]
compile_error!("features `record-only` and `replay-only` are mutually exclusive");

pub mod call;
pub mod config;
pub mod context;
pub mod debug;
pub mod finalize;
pub mod identity;
pub mod lifecycle;
pub mod metrics;
pub mod stop_point;
pub mod watch;
pub mod weakref;

pub use call::Callback;
pub use config::{ModeSelection, RecorderConfig};
pub use context::RecorderContext;
pub use debug::{
    read_answer, Answer, ChannelCommandSink, CommandSink, DebugHandler, UidDecision,
    WireCommandSink,
};
pub use finalize::Destructor;
pub use lifecycle::{detect_mode, open, setup};
pub use metrics::RunSummary;
pub use stop_point::{Pause, Resume, RunState};
