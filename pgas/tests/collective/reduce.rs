use super::helpers::{LAYOUTS, TIMEOUT, declare_all, run_cluster, test_config};
use pgas::{LocalCluster, PgasError, ReduceOp, Reducer};

#[test]
fn test_sum_of_thread_ids() {
    for layout in LAYOUTS {
        let results = run_cluster(layout, |t| {
            declare_all(&t, "id");
            t.put("id", &u64::from(t.id())).unwrap();
            let world = t.world().unwrap();
            world.barrier().get_timeout(TIMEOUT).unwrap();
            world.reduce::<u64>("id", Reducer::Sum).get_timeout(TIMEOUT).unwrap()
        });
        let n = layout.iter().sum::<u32>() as u64;
        assert!(
            results.iter().all(|&r| r == n * (n - 1) / 2),
            "layout {layout:?}: {results:?}"
        );
    }
}

#[test]
fn test_min_max_prod() {
    let results = run_cluster(&[2, 1, 2], |t| {
        declare_all(&t, "v");
        t.put("v", &(i32::try_from(t.id()).unwrap() - 2)).unwrap();
        let world = t.world().unwrap();
        world.barrier().get_timeout(TIMEOUT).unwrap();
        let min = world.reduce::<i32>("v", Reducer::Min).get_timeout(TIMEOUT).unwrap();
        let max = world.reduce::<i32>("v", Reducer::Max).get_timeout(TIMEOUT).unwrap();
        let prod = world
            .reduce::<i32>("v", ReduceOp::Prod.into())
            .get_timeout(TIMEOUT)
            .unwrap();
        (min, max, prod)
    });
    // values: -2, -1, 0, 1, 2
    for r in results {
        assert_eq!(r, (-2, 2, 0));
    }
}

#[test]
fn test_elementwise_vector_sum() {
    let results = run_cluster(&[1, 1, 1, 1], |t| {
        declare_all(&t, "grad");
        let x = t.id() as f32;
        t.put("grad", &vec![x, 2.0 * x, 1.0]).unwrap();
        let world = t.world().unwrap();
        world.barrier().get_timeout(TIMEOUT).unwrap();
        if t.id() == 2 {
            Some(
                world
                    .reduce::<Vec<f32>>("grad", Reducer::Sum)
                    .get_timeout(TIMEOUT)
                    .unwrap(),
            )
        } else {
            None
        }
    });
    assert_eq!(results[2], Some(vec![6.0, 12.0, 4.0]));
}

#[test]
fn test_custom_reducer() {
    let cluster = LocalCluster::builder()
        .nodes(&[2, 2, 3])
        .config(test_config())
        .reducer(7, |a: u64, b: u64| a | b)
        .build()
        .unwrap();
    let results = cluster
        .run(|t| {
            declare_all(&t, "bit");
            t.put("bit", &(1u64 << t.id())).unwrap();
            let world = t.world().unwrap();
            world.barrier().get_timeout(TIMEOUT).unwrap();
            world
                .reduce::<u64>("bit", Reducer::Custom(7))
                .get_timeout(TIMEOUT)
                .unwrap()
        })
        .unwrap();
    assert!(results.iter().all(|&r| r == 0b111_1111));
}

#[test]
fn test_builtin_reducer_needs_numeric_type() {
    run_cluster(&[2], |t| {
        let err = t
            .world()
            .unwrap()
            .reduce::<String>("s", Reducer::Sum)
            .get_timeout(TIMEOUT)
            .unwrap_err();
        assert!(matches!(err, PgasError::NoBuiltinReducer { op: ReduceOp::Sum, .. }));
    });
}

#[test]
fn test_unregistered_reducer() {
    run_cluster(&[1, 1], |t| {
        let err = t
            .world()
            .unwrap()
            .reduce::<u32>("x", Reducer::Custom(99))
            .get_timeout(TIMEOUT)
            .unwrap_err();
        assert_eq!(
            err,
            PgasError::UnknownOperator {
                kind: "reducer",
                id: 99
            }
        );
    });
}
