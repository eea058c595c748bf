//! Object identity: uids increase strictly in program order and replay
//! reproduces them without any identity events in the log.

use proptest::prelude::*;
use retrace_core::{ObjectKey, Uid};
use retrace_engine::{RecorderConfig, RecorderContext, UidDecision};
use retrace_test_utils::fixtures::Observed;
use retrace_test_utils::{record_with, replay_from, ScriptedDebugHandler};

fn ctx_with(config: &RecorderConfig) -> RecorderContext {
    RecorderContext::record(Vec::new(), config).unwrap()
}

#[test]
fn uids_start_at_one_and_are_stable() {
    let mut ctx = ctx_with(&RecorderConfig::default());
    let a = ctx.unique_id(ObjectKey(0xA));
    let b = ctx.unique_id(ObjectKey(0xB));
    assert_eq!(a, Uid(1));
    assert_eq!(b, Uid(2));
    assert_eq!(ctx.unique_id(ObjectKey(0xA)), a);
    assert_eq!(ctx.identityhash(ObjectKey(0xB)), 2);
    assert_eq!(ctx.object_for_uid(b), Some(ObjectKey(0xB)));
    assert_eq!(ctx.uids_assigned(), 2);
}

#[test]
fn forgotten_uids_are_not_reused() {
    let mut ctx = ctx_with(&RecorderConfig::default());
    ctx.unique_id(ObjectKey(1));
    assert_eq!(ctx.forget(ObjectKey(1)), Some(Uid(1)));
    assert_eq!(ctx.lookup_uid(ObjectKey(1)), None);
    // Same key again is a new object.
    assert_eq!(ctx.unique_id(ObjectKey(1)), Uid(2));
}

#[test]
fn replay_reproduces_numbering_without_log_events() {
    let program = |ctx: &mut RecorderContext| -> Vec<Uid> {
        let mut uids = Vec::new();
        for k in [5u64, 9, 5, 2, 9, 7] {
            uids.push(ctx.unique_id(ObjectKey(k)));
        }
        ctx.forget(ObjectKey(9));
        uids.push(ctx.unique_id(ObjectKey(9)));
        uids
    };

    let config = RecorderConfig::default();
    let mut recorded = Vec::new();
    let log = record_with(&config, |ctx| {
        recorded = program(ctx);
        Ok(())
    })
    .unwrap();

    let mut ctx = replay_from(log, &config).unwrap();
    let replayed = program(&mut ctx);
    let summary = ctx.teardown().unwrap();

    assert_eq!(recorded, vec![Uid(1), Uid(2), Uid(1), Uid(3), Uid(2), Uid(4), Uid(5)]);
    assert_eq!(replayed, recorded);
    assert_eq!(summary.bytes, 0);
    assert_eq!(summary.uids_assigned, 5);
}

#[test]
fn uid_break_consults_handler_and_disarms() {
    let config = RecorderConfig {
        uid_break: Some(Uid(2)),
        ..RecorderConfig::default()
    };
    let mut ctx = ctx_with(&config);
    let handler = ScriptedDebugHandler::new([]);
    let observed = handler.observed();
    ctx.set_debug_handler(Box::new(handler));

    assert_eq!(ctx.get_value(b'i'), Some(2));
    ctx.unique_id(ObjectKey(10));
    assert_eq!(ctx.unique_id(ObjectKey(20)), Uid(2));
    assert_eq!(ctx.uid_break_target(), None);
    assert_eq!(
        *observed.borrow(),
        vec![Observed::UidBreak {
            obj: ObjectKey(20),
            candidate: Uid(2)
        }]
    );
}

#[test]
fn uid_break_override_moves_the_counter() {
    let config = RecorderConfig {
        uid_break: Some(Uid(1)),
        ..RecorderConfig::default()
    };
    let mut ctx = ctx_with(&config);
    let handler =
        ScriptedDebugHandler::new([]).with_uid_decisions([UidDecision::Override(Uid(100))]);
    ctx.set_debug_handler(Box::new(handler));

    assert_eq!(ctx.unique_id(ObjectKey(1)), Uid(100));
    assert_eq!(ctx.unique_id(ObjectKey(2)), Uid(101));
}

#[test]
fn uid_break_override_below_counter_is_ignored() {
    let mut ctx = ctx_with(&RecorderConfig::default());
    ctx.unique_id(ObjectKey(1));
    ctx.unique_id(ObjectKey(2));
    assert!(ctx.track_object(Uid(3)));
    let handler =
        ScriptedDebugHandler::new([]).with_uid_decisions([UidDecision::Override(Uid(1))]);
    ctx.set_debug_handler(Box::new(handler));

    assert_eq!(ctx.unique_id(ObjectKey(3)), Uid(3));
    assert_eq!(ctx.object_for_uid(Uid(1)), Some(ObjectKey(1)));
}

#[test]
fn uid_break_override_at_the_top_of_the_range_is_ignored() {
    let config = RecorderConfig {
        uid_break: Some(Uid(1)),
        ..RecorderConfig::default()
    };
    let mut ctx = ctx_with(&config);
    let handler = ScriptedDebugHandler::new([])
        .with_uid_decisions([UidDecision::Override(Uid(u64::MAX))]);
    ctx.set_debug_handler(Box::new(handler));

    assert_eq!(ctx.unique_id(ObjectKey(1)), Uid(1));
    assert_eq!(ctx.unique_id(ObjectKey(2)), Uid(2));
    assert_eq!(ctx.object_for_uid(Uid(u64::MAX)), None);
}

#[test]
fn tracking_an_existing_uid_is_refused() {
    let mut ctx = ctx_with(&RecorderConfig::default());
    ctx.unique_id(ObjectKey(1));
    assert!(!ctx.track_object(Uid(1)));
    assert_eq!(ctx.uid_break_target(), None);
}

#[test]
fn break_predicate_routes_matching_objects() {
    let mut ctx = ctx_with(&RecorderConfig::default());
    let handler = ScriptedDebugHandler::new([]);
    let observed = handler.observed();
    ctx.set_debug_handler(Box::new(handler));
    ctx.set_uid_break_predicate(Some(Box::new(|obj: ObjectKey| obj.0 >= 100)));

    ctx.unique_id(ObjectKey(1));
    ctx.unique_id(ObjectKey(150));
    ctx.unique_id(ObjectKey(2));
    ctx.unique_id(ObjectKey(100));

    let hits: Vec<_> = observed
        .borrow()
        .iter()
        .map(|o| match o {
            Observed::UidBreak { obj, candidate } => (*obj, *candidate),
            other => panic!("unexpected {other:?}"),
        })
        .collect();
    assert_eq!(
        hits,
        vec![(ObjectKey(150), Uid(2)), (ObjectKey(100), Uid(4))]
    );
}

#[test]
fn uid_break_without_handler_keeps_candidate() {
    let config = RecorderConfig {
        uid_break: Some(Uid(1)),
        ..RecorderConfig::default()
    };
    let mut ctx = ctx_with(&config);
    assert_eq!(ctx.unique_id(ObjectKey(3)), Uid(1));
    assert_eq!(ctx.next_uid(), Uid(2));
}

proptest! {
    #[test]
    fn replayed_uids_match_recorded(keys in proptest::collection::vec(0u64..32, 0..100)) {
        let program = |ctx: &mut RecorderContext| -> Vec<Uid> {
            keys.iter().map(|&k| ctx.unique_id(ObjectKey(k))).collect()
        };
        let config = RecorderConfig::default();
        let mut recorded = Vec::new();
        let log = record_with(&config, |ctx| {
            recorded = program(ctx);
            Ok(())
        })
        .unwrap();
        let mut ctx = replay_from(log, &config).unwrap();
        let replayed = program(&mut ctx);
        ctx.teardown().unwrap();

        let mut last = Uid::NONE;
        let mut seen = std::collections::HashSet::new();
        for (&k, &uid) in keys.iter().zip(&recorded) {
            if seen.insert(k) {
                prop_assert!(uid > last);
                last = uid;
            }
        }
        prop_assert_eq!(replayed, recorded);
    }
}
