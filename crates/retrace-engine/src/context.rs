//! The recorder context: one explicit instance per run.
//!
//! [`RecorderContext`] owns the log stream (a [`LogWriter`] when recording,
//! a [`LogReader`] when replaying) together with every counter and side
//! table the instrumented operations consult. The operations themselves
//! live next to their state in [`call`](crate::call),
//! [`identity`](crate::identity), [`stop_point`](crate::stop_point),
//! [`weakref`](crate::weakref), [`finalize`](crate::finalize) and
//! [`watch`](crate::watch); this module holds construction, the raw
//! encode/decode gateway, the debugger channel and teardown.

use std::fmt;
use std::io::{Read, Write};

use retrace_core::Mode;
use retrace_log::{BuildMetadata, Event, LogError, LogReader, LogWriter, Site, Trailer};
use tracing::{info, warn};

use crate::call::CallbackRegistry;
use crate::config::{check_supported, RecorderConfig};
use crate::debug::{Answer, CommandSink, DebugHandler};
use crate::finalize::Finalizers;
use crate::identity::IdentityTable;
use crate::metrics::RunSummary;
use crate::stop_point::{RunState, StopPoints};
use crate::watch::WatchState;
use crate::weakref::WeakrefRegistry;

enum LogStream {
    Record(LogWriter<Box<dyn Write>>),
    Replay(LogReader<Box<dyn Read>>),
    Closed,
}

/// State shared by every instrumented operation of one run.
///
/// Created by [`record`](Self::record), [`replay`](Self::replay) or the
/// file-based [`open`](crate::open)/[`setup`](crate::setup); finished by
/// [`teardown`](Self::teardown). Dropping a context that was not torn down
/// runs a best-effort teardown and logs any failure.
///
/// # Examples
///
/// ```
/// use retrace_engine::{RecorderConfig, RecorderContext};
/// use retrace_log::LogError;
///
/// # fn main() -> Result<(), LogError> {
/// let config = RecorderConfig::default();
/// let mut ctx = RecorderContext::record(Vec::new(), &config)?;
/// let t = ctx.emit(|| 1_700_000_000u64)?;
/// ctx.stop_point();
/// let summary = ctx.teardown()?;
///
/// assert_eq!(t, 1_700_000_000);
/// assert_eq!(summary.stop_points, 1);
/// assert_eq!(summary.bytes, 8);
/// # Ok(())
/// # }
/// ```
pub struct RecorderContext {
    mode: Mode,
    stream: LogStream,
    io_totals: (u64, u64),
    pub(crate) identity: IdentityTable,
    pub(crate) stops: StopPoints,
    pub(crate) callbacks: CallbackRegistry,
    pub(crate) weakrefs: WeakrefRegistry,
    pub(crate) finalizers: Finalizers,
    pub(crate) watch: WatchState,
    handler: Option<Box<dyn DebugHandler>>,
    sink: Option<Box<dyn CommandSink>>,
}

impl RecorderContext {
    // ── Construction ───────────────────────────────────────────────

    /// Start recording into `sink`.
    ///
    /// Writes the log header immediately.
    pub fn record<W>(sink: W, config: &RecorderConfig) -> Result<Self, LogError>
    where
        W: Write + 'static,
    {
        check_supported(Mode::Record)?;
        config.validate()?;
        let metadata = BuildMetadata::current(config.build_id);
        let sink: Box<dyn Write> = Box::new(sink);
        let writer = LogWriter::new(sink, &metadata, config.buffer_capacity)?;
        info!(
            mode = %Mode::Record,
            capacity = config.buffer_capacity,
            build_id = config.build_id,
            "recording started"
        );
        Ok(Self::with_stream(Mode::Record, LogStream::Record(writer), config))
    }

    /// Start replaying from `source`.
    ///
    /// Reads and checks the header: the log must have been recorded by a
    /// build with the same `build_id`. The buffer capacity comes from the
    /// header, not from `config`.
    pub fn replay<R>(source: R, config: &RecorderConfig) -> Result<Self, LogError>
    where
        R: Read + 'static,
    {
        check_supported(Mode::Replay)?;
        config.validate()?;
        let source: Box<dyn Read> = Box::new(source);
        let reader = LogReader::open(source)?;
        let header = reader.header();
        if header.metadata.build_id != config.build_id {
            return Err(retrace_core::ConfigError::BuildMismatch {
                recorded: header.metadata.build_id,
                current: config.build_id,
            }
            .into());
        }
        info!(
            mode = %Mode::Replay,
            capacity = header.buffer_capacity,
            recorded_by = %header.metadata.engine_version,
            "replay started"
        );
        Ok(Self::with_stream(Mode::Replay, LogStream::Replay(reader), config))
    }

    fn with_stream(mode: Mode, stream: LogStream, config: &RecorderConfig) -> Self {
        Self {
            mode,
            stream,
            io_totals: (0, 0),
            identity: IdentityTable::new(config.uid_break),
            stops: StopPoints::new(config.stop_point_break),
            callbacks: CallbackRegistry::default(),
            weakrefs: WeakrefRegistry::default(),
            finalizers: Finalizers::default(),
            watch: WatchState::new(config.watch_enabled),
            handler: None,
            sink: None,
        }
    }

    /// Direction of this run.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Whether this run replays a log.
    pub fn is_replay(&self) -> bool {
        self.mode.is_replay()
    }

    /// Whether [`teardown`](Self::teardown) already ran.
    pub fn is_closed(&self) -> bool {
        matches!(self.stream, LogStream::Closed)
    }

    // ── Event gateway ──────────────────────────────────────────────

    /// Append one value to the log (record mode only).
    #[track_caller]
    pub fn encode<T: Event>(&mut self, value: T) -> Result<(), LogError> {
        self.encode_at(value, Site::caller())
    }

    /// Read the next value from the log (replay mode only).
    #[track_caller]
    pub fn decode<T: Event>(&mut self) -> Result<T, LogError> {
        self.decode_at(Site::caller())
    }

    pub(crate) fn encode_at<T: Event>(&mut self, value: T, site: Site) -> Result<(), LogError> {
        if self.watch.active() {
            return Err(inside_watch(site, "encode"));
        }
        match &mut self.stream {
            LogStream::Record(writer) => writer.encode(value),
            LogStream::Replay(_) => Err(wrong_direction(site, "encode", Mode::Replay)),
            LogStream::Closed => Err(torn_down(site)),
        }
    }

    /// Decode, turning a natural end of log that comes before the
    /// recorded number of stop points into corruption.
    ///
    /// Refused while a watch expression is being evaluated: the log holds
    /// only the deterministic stream.
    pub(crate) fn decode_at<T: Event>(&mut self, site: Site) -> Result<T, LogError> {
        if self.watch.active() {
            return Err(inside_watch(site, "decode"));
        }
        let seen = self.stops.seen;
        match &mut self.stream {
            LogStream::Replay(reader) => match reader.decode_at(site) {
                Err(LogError::CleanEnd) => Err(end_of_log(reader.trailer(), seen, site)),
                other => other,
            },
            LogStream::Record(_) => Err(wrong_direction(site, "decode", Mode::Record)),
            LogStream::Closed => Err(torn_down(site)),
        }
    }

    /// Push buffered values to the log sink now (record mode).
    ///
    /// A no-op in replay mode.
    #[track_caller]
    pub fn flush(&mut self) -> Result<(), LogError> {
        match &mut self.stream {
            LogStream::Record(writer) => writer.flush(),
            LogStream::Replay(_) => Ok(()),
            LogStream::Closed => Err(torn_down(Site::caller())),
        }
    }

    /// Interception point for a nondeterministic value.
    ///
    /// Record: run `real` and log its result. Replay: skip `real` and
    /// return the logged result.
    #[track_caller]
    pub fn emit<T, F>(&mut self, real: F) -> Result<T, LogError>
    where
        T: Event,
        F: FnOnce() -> T,
    {
        let site = Site::caller();
        match self.mode {
            Mode::Record => {
                let value = real();
                self.encode_at(value, site)?;
                Ok(value)
            }
            Mode::Replay => self.decode_at(site),
        }
    }

    /// Interception point for a side effect with no result: `real` runs
    /// only while recording.
    pub fn emit_void<F: FnOnce()>(&mut self, real: F) {
        if self.mode == Mode::Record {
            real();
        }
    }

    // ── Debugger ───────────────────────────────────────────────────

    /// Install the handler that takes control on pauses, returning the
    /// previous one.
    pub fn set_debug_handler(
        &mut self,
        handler: Box<dyn DebugHandler>,
    ) -> Option<Box<dyn DebugHandler>> {
        self.handler.replace(handler)
    }

    /// Remove the debug handler. Pauses then resume immediately.
    pub fn take_debug_handler(&mut self) -> Option<Box<dyn DebugHandler>> {
        self.handler.take()
    }

    /// Install the destination for [`send_answer`](Self::send_answer).
    pub fn set_command_sink(&mut self, sink: Box<dyn CommandSink>) {
        self.sink = Some(sink);
    }

    /// Run `f` with the debug handler detached and the state set to
    /// [`RunState::Paused`]. `None` if no handler is installed.
    pub(crate) fn with_paused_handler<R>(
        &mut self,
        f: impl FnOnce(&mut dyn DebugHandler, &mut Self) -> R,
    ) -> Option<R> {
        let mut handler = self.handler.take()?;
        let previous = std::mem::replace(&mut self.stops.state, RunState::Paused);
        let result = f(handler.as_mut(), self);
        self.stops.state = previous;
        if self.handler.is_none() {
            self.handler = Some(handler);
        }
        Some(result)
    }

    /// Send one answer to the debugger. Dropped silently when no
    /// command sink is installed.
    pub fn send_answer(
        &mut self,
        cmd: i32,
        arg1: i64,
        arg2: i64,
        arg3: i64,
        extra: &[u8],
    ) -> Result<(), LogError> {
        match self.sink.as_mut() {
            Some(sink) => sink.send(Answer {
                cmd,
                arg1,
                arg2,
                arg3,
                extra: extra.to_vec(),
            }),
            None => Ok(()),
        }
    }

    /// Query engine state by one-letter id.
    ///
    /// | Id | Value |
    /// |----|-------|
    /// | `b'c'` | stop points passed |
    /// | `b'b'` | stop-point break target, `-1` if disarmed |
    /// | `b'u'` | uid the next new object gets |
    /// | `b'i'` | uid break target, `-1` if disarmed |
    /// | `b'm'` | mode, `0` record or `1` replay |
    /// | `b'p'` | last breakpoint hit, `-1` if none |
    pub fn get_value(&self, id: u8) -> Option<i64> {
        let value = match id {
            b'c' => self.stops.seen as i64,
            b'b' => self.stops.target.map_or(-1, |t| t as i64),
            b'u' => self.identity.next_uid().0 as i64,
            b'i' => self.uid_break_target().map_or(-1, |uid| uid.0 as i64),
            b'm' => self.mode.code(),
            b'p' => self.stops.last_breakpoint.map_or(-1, |num| num.0),
            _ => return None,
        };
        Some(value)
    }

    // ── Teardown ───────────────────────────────────────────────────

    /// Counters for the run so far.
    pub fn summary(&self) -> RunSummary {
        let (bytes, chunks) = match &self.stream {
            LogStream::Record(writer) => (writer.bytes_written(), writer.chunks_written()),
            LogStream::Replay(reader) => (reader.bytes_read(), reader.chunks_read()),
            LogStream::Closed => self.io_totals,
        };
        RunSummary {
            mode: self.mode,
            stop_points: self.stops.seen,
            uids_assigned: self.identity.assigned(),
            bytes,
            chunks,
            callbacks_dispatched: self.callbacks.dispatched,
            destructors_run: self.finalizers.run,
        }
    }

    /// Finish the run and release the log stream.
    ///
    /// Record: flush, then write the end marker and trailer. Replay: check
    /// the log was consumed exactly up to its end marker and that as many
    /// stop points were passed as were recorded. Fails if called twice.
    #[track_caller]
    pub fn teardown(&mut self) -> Result<RunSummary, LogError> {
        let stream = std::mem::replace(&mut self.stream, LogStream::Closed);
        let result = match stream {
            LogStream::Record(writer) => self.finish_record(writer),
            LogStream::Replay(reader) => self.finish_replay(reader),
            LogStream::Closed => Err(torn_down(Site::caller())),
        };
        if let Ok(summary) = &result {
            info!(
                mode = %summary.mode,
                stop_points = summary.stop_points,
                uids = summary.uids_assigned,
                bytes = summary.bytes,
                chunks = summary.chunks,
                "run finished"
            );
        }
        result
    }

    fn finish_record(&mut self, writer: LogWriter<Box<dyn Write>>) -> Result<RunSummary, LogError> {
        let trailer = Trailer {
            stop_points: self.stops.seen,
            uids_assigned: self.identity.assigned(),
        };
        let buffered = writer.buffered() as u64;
        let totals = (
            writer.bytes_written() + buffered,
            writer.chunks_written() + u64::from(buffered > 0),
        );
        writer.finish(&trailer)?;
        self.io_totals = totals;
        Ok(self.summary())
    }

    #[track_caller]
    fn finish_replay(&mut self, reader: LogReader<Box<dyn Read>>) -> Result<RunSummary, LogError> {
        let site = Site::caller();
        self.io_totals = (reader.bytes_read(), reader.chunks_read());
        let trailer = reader.finish()?;
        if trailer.stop_points != self.stops.seen {
            return Err(LogError::corrupted(
                site,
                format!(
                    "replay passed {} stop points, log recorded {}",
                    self.stops.seen, trailer.stop_points
                ),
            ));
        }
        if trailer.uids_assigned != self.identity.assigned() {
            warn!(
                recorded = trailer.uids_assigned,
                replayed = self.identity.assigned(),
                "uid count differs from recording"
            );
        }
        Ok(self.summary())
    }
}

impl Drop for RecorderContext {
    fn drop(&mut self) {
        if self.is_closed() {
            return;
        }
        if let Err(e) = self.teardown() {
            warn!(mode = %self.mode, error = %e, "teardown on drop failed");
        }
    }
}

impl fmt::Debug for RecorderContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecorderContext")
            .field("mode", &self.mode)
            .field("closed", &self.is_closed())
            .field("stop_points", &self.stops.seen)
            .field("next_uid", &self.identity.next_uid())
            .field("state", &self.stops.state)
            .finish_non_exhaustive()
    }
}

fn torn_down(site: Site) -> LogError {
    LogError::misuse(site, "log already torn down")
}

fn wrong_direction(site: Site, op: &str, mode: Mode) -> LogError {
    LogError::misuse(site, format!("{op} is not available in {mode} mode"))
}

fn inside_watch(site: Site, op: &str) -> LogError {
    LogError::misuse(site, format!("{op} during watch evaluation"))
}

/// Narrow a length to the `u32` the log format stores.
pub(crate) fn log_count(len: usize, what: &str, site: Site) -> Result<u32, LogError> {
    u32::try_from(len)
        .map_err(|_| LogError::misuse(site, format!("{len} {what} exceed the u32 log limit")))
}

fn end_of_log(trailer: Option<&Trailer>, seen: u64, site: Site) -> LogError {
    match trailer {
        Some(t) if seen < t.stop_points => LogError::corrupted(
            site,
            format!(
                "log exhausted at stop point {seen} of {} recorded",
                t.stop_points
            ),
        ),
        _ => LogError::CleanEnd,
    }
}
