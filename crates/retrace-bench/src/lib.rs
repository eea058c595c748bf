//! Benchmark workloads for the Retrace record/replay engine.
//!
//! - [`workload`]: a seeded, reproducible mix of instrumented operations
//! - [`run`]: drives a [`RecorderContext`] through a workload; the same
//!   call works in both modes

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use rand_chacha::rand_core::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use retrace_core::{CallbackId, ObjectKey};
use retrace_engine::RecorderContext;
use retrace_log::LogError;

/// Callback used by [`Op::Call`].
pub const BENCH_CALLBACK: u8 = 7;

/// One instrumented operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Op {
    /// Log a nondeterministic 64-bit value.
    Value(u64),
    /// Foreign call firing `callbacks` callbacks before returning.
    Call {
        /// Callbacks fired during the call.
        callbacks: u8,
    },
    /// Pass a stop point.
    StopPoint,
    /// First identity query for an object.
    Identity(ObjectKey),
}

/// Generate `n` operations from `seed`.
///
/// Roughly half are logged values, a quarter foreign calls with up to
/// three callbacks, and the rest split between stop points and identity
/// queries.
pub fn workload(seed: u64, n: usize) -> Vec<Op> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..n)
        .map(|i| match rng.next_u32() % 8 {
            0..=3 => Op::Value(rng.next_u64()),
            4 | 5 => Op::Call {
                callbacks: (rng.next_u32() % 4) as u8,
            },
            6 => Op::StopPoint,
            _ => Op::Identity(ObjectKey(i as u64)),
        })
        .collect()
}

/// Register the callback [`run`] needs.
pub fn install(ctx: &mut RecorderContext) {
    let id = bench_callback();
    ctx.register_callback(id, move |ctx| {
        ctx.callback_loc(id)?;
        ctx.emit(|| 0xABu8)?;
        Ok(())
    });
}

fn bench_callback() -> CallbackId {
    match CallbackId::new(BENCH_CALLBACK) {
        Some(id) => id,
        None => unreachable!("bench callback id is not the sentinel"),
    }
}

/// Execute `ops` against `ctx`, returning a checksum of every value seen.
pub fn run(ctx: &mut RecorderContext, ops: &[Op]) -> Result<u64, LogError> {
    let id = bench_callback();
    let mut checksum = 0u64;
    for op in ops {
        let v = match *op {
            Op::Value(v) => ctx.emit(|| v)?,
            Op::Call { callbacks } => ctx.call(|ctx| {
                for _ in 0..callbacks {
                    ctx.invoke_callback(id)?;
                }
                Ok(u64::from(callbacks))
            })?,
            Op::StopPoint => {
                ctx.stop_point();
                0
            }
            Op::Identity(obj) => ctx.unique_id(obj).0,
        };
        checksum = checksum.wrapping_mul(31).wrapping_add(v);
    }
    Ok(checksum)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workload_is_deterministic() {
        assert_eq!(workload(42, 500), workload(42, 500));
        assert_ne!(workload(42, 500), workload(43, 500));
    }

    #[test]
    fn workload_covers_every_op() {
        let ops = workload(7, 1000);
        assert!(ops.iter().any(|op| matches!(op, Op::Value(_))));
        assert!(ops.iter().any(|op| matches!(op, Op::Call { callbacks } if *callbacks > 0)));
        assert!(ops.iter().any(|op| matches!(op, Op::StopPoint)));
        assert!(ops.iter().any(|op| matches!(op, Op::Identity(_))));
    }
}
