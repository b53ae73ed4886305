use super::helpers::{LAYOUTS, TIMEOUT, declare_all, run_cluster};

#[test]
fn test_broadcast_from_first_thread() {
    for layout in LAYOUTS {
        let values = run_cluster(layout, |t| {
            declare_all(&t, "seed");
            let world = t.world().unwrap();
            if t.id() == 0 {
                world.broadcast("seed", &42u64).get_timeout(TIMEOUT).unwrap();
            }
            world.barrier().get_timeout(TIMEOUT).unwrap();
            t.get::<u64>("seed").unwrap()
        });
        assert!(values.iter().all(|&v| v == 42), "layout {layout:?}: {values:?}");
    }
}

#[test]
fn test_broadcast_from_thread_off_the_root() {
    let values = run_cluster(&[1, 2, 1, 3], |t| {
        declare_all(&t, "msg");
        let world = t.world().unwrap();
        if t.id() == t.thread_count() - 1 {
            world
                .broadcast("msg", &"hello".to_string())
                .get_timeout(TIMEOUT)
                .unwrap();
        }
        world.barrier().get_timeout(TIMEOUT).unwrap();
        t.get::<String>("msg").unwrap()
    });
    assert!(values.iter().all(|v| v == "hello"));
}

#[test]
fn test_broadcast_vector() {
    let values = run_cluster(&[3, 3], |t| {
        declare_all(&t, "weights");
        let world = t.world().unwrap();
        if t.id() == 4 {
            world
                .broadcast("weights", &vec![0.5f64, 1.5, -2.0])
                .get_timeout(TIMEOUT)
                .unwrap();
        }
        world.barrier().get_timeout(TIMEOUT).unwrap();
        t.get::<Vec<f64>>("weights").unwrap()
    });
    for v in values {
        assert_eq!(v, vec![0.5, 1.5, -2.0]);
    }
}

#[test]
fn test_concurrent_broadcasts_to_different_variables() {
    let values = run_cluster(&[2, 2, 2], |t| {
        let name = format!("from_{}", t.id());
        for i in 0..t.thread_count() {
            t.declare(&format!("from_{i}")).unwrap();
        }
        let world = t.world().unwrap();
        world.barrier().get_timeout(TIMEOUT).unwrap();
        world.broadcast(&name, &t.id()).get_timeout(TIMEOUT).unwrap();
        world.barrier().get_timeout(TIMEOUT).unwrap();
        (0..t.thread_count())
            .map(|i| t.get::<u32>(&format!("from_{i}")).unwrap())
            .collect::<Vec<_>>()
    });
    for v in values {
        assert_eq!(v, (0..6).collect::<Vec<u32>>());
    }
}
