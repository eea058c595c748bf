//! Values recorded through any buffer capacity replay bit for bit.

use proptest::prelude::*;
use retrace_engine::{RecorderConfig, RecorderContext};
use retrace_log::{LogError, MIN_BUFFER_CAPACITY};
use retrace_test_utils::{record_with, replay_from};

#[derive(Clone, Copy, Debug)]
enum Value {
    Byte(u8),
    Short(i16),
    Word(u32),
    Long(i64),
    Wide(u128),
    Float(f64),
    Flag(bool),
}

fn value() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<u8>().prop_map(Value::Byte),
        any::<i16>().prop_map(Value::Short),
        any::<u32>().prop_map(Value::Word),
        any::<i64>().prop_map(Value::Long),
        any::<u128>().prop_map(Value::Wide),
        any::<f64>().prop_map(Value::Float),
        any::<bool>().prop_map(Value::Flag),
    ]
}

/// Log each value in record mode; in replay mode the closures' results
/// are ignored and the same shapes are read back. Returns bit patterns.
fn program(ctx: &mut RecorderContext, values: &[Value]) -> Result<Vec<u128>, LogError> {
    values
        .iter()
        .map(|v| -> Result<u128, LogError> {
            Ok(match *v {
                Value::Byte(x) => u128::from(ctx.emit(|| x)?),
                Value::Short(x) => ctx.emit(|| x)? as u16 as u128,
                Value::Word(x) => u128::from(ctx.emit(|| x)?),
                Value::Long(x) => ctx.emit(|| x)? as u64 as u128,
                Value::Wide(x) => ctx.emit(|| x)?,
                Value::Float(x) => u128::from(ctx.emit(|| x)?.to_bits()),
                Value::Flag(x) => u128::from(ctx.emit(|| x)?),
            })
        })
        .collect()
}

/// Same shapes as `values` but different contents, so a replay that
/// re-executed the closures would be caught.
fn decoys(values: &[Value]) -> Vec<Value> {
    values
        .iter()
        .map(|v| match *v {
            Value::Byte(x) => Value::Byte(!x),
            Value::Short(x) => Value::Short(!x),
            Value::Word(x) => Value::Word(!x),
            Value::Long(x) => Value::Long(!x),
            Value::Wide(x) => Value::Wide(!x),
            Value::Float(x) => Value::Float(-x + 1.0),
            Value::Flag(x) => Value::Flag(!x),
        })
        .collect()
}

proptest! {
    #[test]
    fn round_trip_any_capacity(
        values in proptest::collection::vec(value(), 0..300),
        capacity in MIN_BUFFER_CAPACITY..96usize,
    ) {
        let config = RecorderConfig {
            buffer_capacity: capacity,
            ..RecorderConfig::default()
        };
        let mut recorded = Vec::new();
        let log = record_with(&config, |ctx| {
            recorded = program(ctx, &values)?;
            Ok(())
        })
        .unwrap();

        let mut ctx = replay_from(log, &config).unwrap();
        let replayed = program(&mut ctx, &decoys(&values)).unwrap();
        let summary = ctx.teardown().unwrap();

        prop_assert_eq!(replayed, recorded);
        let total: u64 = values
            .iter()
            .map(|v| match v {
                Value::Byte(_) | Value::Flag(_) => 1,
                Value::Short(_) => 2,
                Value::Word(_) => 4,
                Value::Long(_) | Value::Float(_) => 8,
                Value::Wide(_) => 16,
            })
            .sum();
        prop_assert_eq!(summary.bytes, total);
    }
}

#[test]
fn small_buffer_forces_many_chunks() {
    let config = RecorderConfig {
        buffer_capacity: MIN_BUFFER_CAPACITY,
        ..RecorderConfig::default()
    };
    let log = record_with(&config, |ctx| {
        for i in 0..100u64 {
            ctx.emit(|| i)?;
        }
        Ok(())
    })
    .unwrap();

    let mut ctx = replay_from(log, &config).unwrap();
    for i in 0..100u64 {
        assert_eq!(ctx.emit(|| 0u64).unwrap(), i);
    }
    let summary = ctx.teardown().unwrap();
    assert_eq!(summary.chunks, 50);
    assert_eq!(summary.bytes, 800);
}

#[test]
fn replay_uses_the_recorded_capacity() {
    let record_config = RecorderConfig {
        buffer_capacity: 24,
        ..RecorderConfig::default()
    };
    let log = record_with(&record_config, |ctx| {
        for i in 0..10u16 {
            ctx.emit(|| i)?;
        }
        Ok(())
    })
    .unwrap();

    // A different configured capacity does not matter on replay.
    let mut ctx = replay_from(log, &RecorderConfig::default()).unwrap();
    for i in 0..10u16 {
        assert_eq!(ctx.decode::<u16>().unwrap(), i);
    }
    ctx.teardown().unwrap();
}
