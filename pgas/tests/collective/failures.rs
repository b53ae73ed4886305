use super::helpers::{TIMEOUT, cluster, run_cluster, test_config};
use pgas::{LocalCluster, PgasError, Reducer};
use std::collections::BTreeSet;

#[test]
fn test_reduce_reports_every_failing_thread() {
    run_cluster(&[2, 2, 2], |t| {
        // Only odd threads declare and set the variable.
        if t.id() % 2 == 1 {
            t.declare("x").unwrap();
            t.put("x", &1u32).unwrap();
        }
        let world = t.world().unwrap();
        world.barrier().get_timeout(TIMEOUT).unwrap();
        if t.id() == 1 {
            let err = world
                .reduce::<u32>("x", Reducer::Sum)
                .get_timeout(TIMEOUT)
                .unwrap_err();
            assert!(matches!(err, PgasError::CollectiveFailed { operation: "reduce", .. }));
            let failed: BTreeSet<_> = err.failures().iter().filter_map(|f| f.thread).collect();
            assert_eq!(failed, BTreeSet::from([0, 2, 4]));
            assert!(err.cause().is_some());
            assert_eq!(err.suppressed().len(), 2);
            assert!(err.to_string().contains("(+2 suppressed)"), "got: {err}");
        }
        world.barrier().get_timeout(TIMEOUT).unwrap();
    });
}

#[test]
fn test_broadcast_to_undeclared_variable() {
    run_cluster(&[1, 1, 1], |t| {
        if t.id() != 2 {
            t.declare("v").unwrap();
        }
        let world = t.world().unwrap();
        world.barrier().get_timeout(TIMEOUT).unwrap();
        if t.id() == 0 {
            let err = world.broadcast("v", &5i64).get_timeout(TIMEOUT).unwrap_err();
            let cause = err.cause().unwrap();
            assert_eq!(cause.thread, Some(2));
            assert_eq!(cause.node, 2);
            assert!(cause.message.contains("not declared"));
            assert!(err.suppressed().is_empty());
        }
        world.barrier().get_timeout(TIMEOUT).unwrap();
        // Members that declared the variable still received the value.
        if t.id() != 2 {
            assert_eq!(t.get::<i64>("v").unwrap(), 5);
        }
    });
}

#[test]
fn test_gather_of_unset_variable() {
    run_cluster(&[3], |t| {
        t.declare("g").unwrap();
        if t.id() == 0 {
            t.put("g", &0u8).unwrap();
        }
        let world = t.world().unwrap();
        world.barrier().get_timeout(TIMEOUT).unwrap();
        if t.id() == 0 {
            let err = world.gather::<u8>("g").get_timeout(TIMEOUT).unwrap_err();
            assert_eq!(err.failures().len(), 2);
            assert!(err.failures().iter().all(|f| f.message.contains("has no value")));
        }
        world.barrier().get_timeout(TIMEOUT).unwrap();
    });
}

#[test]
fn test_failed_collective_does_not_block_later_ones() {
    run_cluster(&[2, 1], |t| {
        t.declare("ok").unwrap();
        t.put("ok", &1u32).unwrap();
        let world = t.world().unwrap();
        world.barrier().get_timeout(TIMEOUT).unwrap();
        assert!(world.reduce::<u32>("missing", Reducer::Sum).get_timeout(TIMEOUT).is_err());
        assert_eq!(
            world.reduce::<u32>("ok", Reducer::Sum).get_timeout(TIMEOUT).unwrap(),
            3
        );
    });
}

#[test]
fn test_panicking_reducer_fails_the_collective() {
    LocalCluster::builder()
        .nodes(&[1, 1, 1])
        .config(test_config())
        .reducer(7, |a: u32, b: u32| {
            assert!(a != 99 && b != 99, "refusing to combine 99");
            a + b
        })
        .build()
        .unwrap()
        .run(|t| {
            t.declare("x").unwrap();
            t.put("x", &if t.id() == 2 { 99u32 } else { 1 }).unwrap();
            let world = t.world().unwrap();
            world.barrier().get_timeout(TIMEOUT).unwrap();
            if t.id() == 1 {
                let err = world
                    .reduce::<u32>("x", Reducer::Custom(7))
                    .get_timeout(TIMEOUT)
                    .unwrap_err();
                assert!(matches!(err, PgasError::CollectiveFailed { operation: "reduce", .. }));
                let cause = err.cause().unwrap();
                assert!(cause.message.contains("reducer 7 panicked"), "got: {err}");
                assert!(cause.message.contains("refusing to combine 99"), "got: {err}");
            }
            // The runtime keeps serving collectives afterwards.
            world.barrier().get_timeout(TIMEOUT).unwrap();
            t.put("x", &2u32).unwrap();
            world.barrier().get_timeout(TIMEOUT).unwrap();
            if t.id() == 0 {
                let sum = world
                    .reduce::<u32>("x", Reducer::Custom(7))
                    .get_timeout(TIMEOUT)
                    .unwrap();
                assert_eq!(sum, 6);
            }
            world.barrier().get_timeout(TIMEOUT).unwrap();
        })
        .unwrap();
}

#[test]
fn test_panicking_thread_is_reported() {
    let err = cluster(&[1, 1])
        .run(|t| {
            if t.id() == 1 {
                panic!("boom");
            }
            t.id()
        })
        .unwrap_err();
    assert_eq!(
        err,
        PgasError::ThreadPanicked {
            thread: 1,
            message: "boom".into()
        }
    );
}
