//! Debugger-facing seams: pause hooks and the command-and-answer channel.
//!
//! The engine never interprets debugger commands itself. When the run
//! pauses it hands the context to a [`DebugHandler`], which may inspect
//! counters with [`get_value`](crate::RecorderContext::get_value) and
//! reply through [`send_answer`](crate::RecorderContext::send_answer).
//! Answers travel through a [`CommandSink`]: either a byte stream
//! ([`WireCommandSink`]) or a channel to a debugger thread
//! ([`ChannelCommandSink`]).

use std::io::{self, Read, Write};

use crossbeam_channel::{Receiver, Sender};
use retrace_core::{ObjectKey, Uid};
use retrace_log::codec::{
    read_length_prefixed_bytes, read_u32_le, read_u64_le, write_length_prefixed_bytes,
    write_u32_le, write_u64_le,
};
use retrace_log::LogError;

use crate::context::RecorderContext;
use crate::stop_point::{Pause, Resume};

// ── DebugHandler ───────────────────────────────────────────────────

/// Outcome of the uid break path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UidDecision {
    /// Assign the candidate uid.
    Keep,
    /// Assign this uid instead. It must not be below the next free uid;
    /// lower values are rejected and the candidate is used.
    Override(Uid),
}

/// External command loop that takes control while the run is paused.
///
/// The handler is detached from the context for the duration of each
/// call, so re-entrant pauses triggered from inside a handler resume
/// immediately.
pub trait DebugHandler {
    /// The run reached a stop-point break target or a breakpoint.
    fn on_pause(&mut self, ctx: &mut RecorderContext, pause: Pause) -> Resume;

    /// An object is about to be assigned the armed break uid, or matched
    /// the break predicate.
    ///
    /// The default keeps the candidate.
    fn on_uid_break(
        &mut self,
        ctx: &mut RecorderContext,
        obj: ObjectKey,
        candidate: Uid,
    ) -> UidDecision {
        let _ = (ctx, obj, candidate);
        UidDecision::Keep
    }
}

// ── Answers ────────────────────────────────────────────────────────

/// Largest `extra` payload [`read_answer`] accepts (16 MiB).
pub const MAX_ANSWER_EXTRA: usize = 16 * 1024 * 1024;

/// One reply to the debugger: a command code, three integer slots and
/// an opaque byte payload.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Answer {
    /// Command code the answer belongs to.
    pub cmd: i32,
    /// First integer slot.
    pub arg1: i64,
    /// Second integer slot.
    pub arg2: i64,
    /// Third integer slot.
    pub arg3: i64,
    /// Payload bytes.
    pub extra: Vec<u8>,
}

/// Destination for debugger answers.
pub trait CommandSink {
    /// Deliver one answer.
    fn send(&mut self, answer: Answer) -> Result<(), LogError>;
}

/// Writes answers to a byte stream.
///
/// Wire layout: `[cmd i32][arg1 i64][arg2 i64][arg3 i64][len u32][extra]`,
/// all little-endian. Each answer is flushed before `send` returns.
pub struct WireCommandSink<W: Write> {
    out: W,
}

impl<W: Write> WireCommandSink<W> {
    /// Wrap a byte stream.
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Return the underlying stream.
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> CommandSink for WireCommandSink<W> {
    fn send(&mut self, answer: Answer) -> Result<(), LogError> {
        write_u32_le(&mut self.out, answer.cmd as u32)?;
        write_u64_le(&mut self.out, answer.arg1 as u64)?;
        write_u64_le(&mut self.out, answer.arg2 as u64)?;
        write_u64_le(&mut self.out, answer.arg3 as u64)?;
        write_length_prefixed_bytes(&mut self.out, &answer.extra)?;
        self.out.flush()?;
        Ok(())
    }
}

/// Decode one answer written by [`WireCommandSink`].
pub fn read_answer(r: &mut dyn Read) -> Result<Answer, LogError> {
    Ok(Answer {
        cmd: read_u32_le(r)? as i32,
        arg1: read_u64_le(r)? as i64,
        arg2: read_u64_le(r)? as i64,
        arg3: read_u64_le(r)? as i64,
        extra: read_length_prefixed_bytes(r, MAX_ANSWER_EXTRA)?,
    })
}

/// Sends answers over a crossbeam channel to a debugger thread.
pub struct ChannelCommandSink {
    tx: Sender<Answer>,
}

impl ChannelCommandSink {
    /// Wrap an existing sender.
    pub fn new(tx: Sender<Answer>) -> Self {
        Self { tx }
    }

    /// Create a sink together with the receiving end.
    pub fn unbounded() -> (Self, Receiver<Answer>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (Self { tx }, rx)
    }
}

impl CommandSink for ChannelCommandSink {
    fn send(&mut self, answer: Answer) -> Result<(), LogError> {
        self.tx.send(answer).map_err(|_| {
            LogError::Io(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "debugger channel disconnected",
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Answer {
        Answer {
            cmd: -3,
            arg1: 1,
            arg2: i64::MIN,
            arg3: 42,
            extra: b"frame 7".to_vec(),
        }
    }

    #[test]
    fn wire_layout() {
        let mut sink = WireCommandSink::new(Vec::new());
        sink.send(sample()).unwrap();
        let bytes = sink.into_inner();
        assert_eq!(bytes.len(), 4 + 8 * 3 + 4 + 7);
        assert_eq!(&bytes[..4], &(-3i32).to_le_bytes());
        assert_eq!(&bytes[bytes.len() - 7..], b"frame 7");

        let decoded = read_answer(&mut bytes.as_slice()).unwrap();
        assert_eq!(decoded, sample());
    }

    #[test]
    fn truncated_answer_is_io_error() {
        let mut sink = WireCommandSink::new(Vec::new());
        sink.send(sample()).unwrap();
        let bytes = sink.into_inner();
        let err = read_answer(&mut &bytes[..10]).unwrap_err();
        assert!(matches!(err, LogError::Io(_)));
    }

    #[test]
    fn channel_delivers_in_order() {
        let (mut sink, rx) = ChannelCommandSink::unbounded();
        sink.send(Answer { cmd: 1, ..Answer::default() }).unwrap();
        sink.send(Answer { cmd: 2, ..Answer::default() }).unwrap();
        assert_eq!(rx.recv().unwrap().cmd, 1);
        assert_eq!(rx.recv().unwrap().cmd, 2);
    }

    #[test]
    fn channel_reports_disconnect() {
        let (mut sink, rx) = ChannelCommandSink::unbounded();
        drop(rx);
        let err = sink.send(sample()).unwrap_err();
        assert!(matches!(err, LogError::Io(e) if e.kind() == io::ErrorKind::BrokenPipe));
    }
}
