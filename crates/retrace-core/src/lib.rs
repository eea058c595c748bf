//! Core types and traits for the Retrace record/replay engine.
//!
//! This is the leaf crate with zero internal dependencies. It defines
//! the fundamental abstractions used throughout the Retrace workspace:
//! identifiers, the record/replay [`Mode`], configuration errors, and
//! the collaborator traits the host program implements.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod error;
pub mod id;
pub mod mode;
pub mod traits;

pub use error::ConfigError;
pub use id::{BreakpointNum, CallbackId, ObjectKey, Uid, WeakrefHandle, CALL_SENTINEL};
pub use mode::Mode;
pub use traits::{Liveness, WatchHook};
