//! Test utilities and mock collaborators for Retrace development.
//!
//! Provides in-memory log storage that stays readable after a context
//! takes ownership of it ([`SharedBuffer`]), a sink that fails on demand
//! ([`FailingWriter`]), scripted debugger collaborators in [`fixtures`],
//! and [`init_test_logging`].

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;

use std::cell::RefCell;
use std::io::{self, Cursor, Write};
use std::rc::Rc;
use std::sync::Once;

use retrace_engine::{RecorderConfig, RecorderContext};
use retrace_log::LogError;
use tracing_subscriber::EnvFilter;

pub use fixtures::{Observed, RecordingWatchHook, ScriptedDebugHandler};

/// Growable byte buffer with shared ownership.
///
/// Clone it, hand one clone to [`RecorderContext::record`], and read the
/// log back through the other.
#[derive(Clone, Debug, Default)]
pub struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything written so far.
    pub fn contents(&self) -> Vec<u8> {
        self.0.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Sink that accepts `budget` bytes and then fails every write.
#[derive(Debug)]
pub struct FailingWriter {
    budget: usize,
}

impl FailingWriter {
    pub fn after(budget: usize) -> Self {
        Self { budget }
    }
}

impl Write for FailingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.len() > self.budget {
            return Err(io::Error::other("storage full"));
        }
        self.budget -= buf.len();
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Record with `config`, run `body`, tear down, and return the log bytes.
pub fn record_with<F>(config: &RecorderConfig, body: F) -> Result<Vec<u8>, LogError>
where
    F: FnOnce(&mut RecorderContext) -> Result<(), LogError>,
{
    let log = SharedBuffer::new();
    let mut ctx = RecorderContext::record(log.clone(), config)?;
    body(&mut ctx)?;
    ctx.teardown()?;
    Ok(log.contents())
}

/// Open a replay context over recorded bytes.
pub fn replay_from(log: Vec<u8>, config: &RecorderConfig) -> Result<RecorderContext, LogError> {
    RecorderContext::replay(Cursor::new(log), config)
}

/// Install a fmt subscriber honoring `RUST_LOG`, once per process.
pub fn init_test_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}
