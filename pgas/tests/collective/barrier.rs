use super::helpers::{LAYOUTS, TIMEOUT, run_cluster};
use std::sync::atomic::{AtomicUsize, Ordering};

#[test]
fn test_barrier_all_layouts() {
    for layout in LAYOUTS {
        run_cluster(layout, |t| {
            t.world().unwrap().barrier().get_timeout(TIMEOUT).unwrap();
        });
    }
}

#[test]
fn test_barrier_releases_only_after_everyone_arrived() {
    let arrived = AtomicUsize::new(0);
    let rounds = 5;
    let n = 6;
    let seen = run_cluster(&[2, 3, 1], |t| {
        let world = t.world().unwrap();
        let mut seen = Vec::new();
        for _ in 0..rounds {
            arrived.fetch_add(1, Ordering::SeqCst);
            world.barrier().get_timeout(TIMEOUT).unwrap();
            seen.push(arrived.load(Ordering::SeqCst));
            world.barrier().get_timeout(TIMEOUT).unwrap();
        }
        seen
    });
    for per_thread in seen {
        for (round, count) in per_thread.into_iter().enumerate() {
            assert_eq!(count, n * (round + 1));
        }
    }
}

#[test]
fn test_barrier_future_is_shared_by_clones() {
    run_cluster(&[2, 2], |t| {
        let fut = t.world().unwrap().barrier();
        let other = fut.clone();
        fut.get_timeout(TIMEOUT).unwrap();
        assert!(other.is_done());
    });
}
