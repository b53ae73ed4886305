use super::helpers::{LAYOUTS, TIMEOUT, declare_all, run_cluster};
use pgas::Reducer;

#[test]
fn test_split_by_parity() {
    for layout in LAYOUTS {
        let n = layout.iter().sum::<u32>();
        let results = run_cluster(layout, |t| {
            let world = t.world().unwrap();
            let sub = world.split(t.id() % 2, t.id()).get_timeout(TIMEOUT).unwrap();
            (sub.id(), sub.size(), sub.my_rank().unwrap())
        });
        let evens = n.div_ceil(2);
        for (id, (group, size, rank)) in results.iter().copied().enumerate() {
            let id = id as u32;
            assert_eq!(rank, id / 2, "layout {layout:?}");
            assert_eq!(size, if id % 2 == 0 { evens } else { n - evens });
            assert_eq!(group, results[(id % 2) as usize].0);
        }
        if n > 1 {
            assert_ne!(results[0].0, results[1].0);
        }
    }
}

#[test]
fn test_ordering_key_reverses_ranks() {
    let results = run_cluster(&[2, 2, 2], |t| {
        let sub = t
            .world()
            .unwrap()
            .split(0, 100 - t.id())
            .get_timeout(TIMEOUT)
            .unwrap();
        sub.my_rank().unwrap()
    });
    assert_eq!(results, vec![5, 4, 3, 2, 1, 0]);
}

#[test]
fn test_collectives_in_split_groups() {
    let results = run_cluster(&[1, 3, 2, 2], |t| {
        declare_all(&t, "id");
        t.put("id", &u64::from(t.id())).unwrap();
        let world = t.world().unwrap();
        world.barrier().get_timeout(TIMEOUT).unwrap();

        let sub = world.split(t.id() / 4, 0).get_timeout(TIMEOUT).unwrap();
        sub.barrier().get_timeout(TIMEOUT).unwrap();
        let sum = sub.reduce::<u64>("id", Reducer::Sum).get_timeout(TIMEOUT).unwrap();
        let gathered = sub.gather::<u64>("id").get_timeout(TIMEOUT).unwrap();
        (sum, gathered.into_values().collect::<Vec<_>>())
    });
    for (id, (sum, gathered)) in results.into_iter().enumerate() {
        if id < 4 {
            assert_eq!(sum, 6);
            assert_eq!(gathered, vec![0, 1, 2, 3]);
        } else {
            assert_eq!(sum, 4 + 5 + 6 + 7);
            assert_eq!(gathered, vec![4, 5, 6, 7]);
        }
    }
}

#[test]
fn test_repeated_and_nested_splits() {
    let results = run_cluster(&[2, 2, 2, 2], |t| {
        let world = t.world().unwrap();
        let halves = world.split(t.id() / 4, t.id()).get_timeout(TIMEOUT).unwrap();
        let again = world.split(t.id() / 4, t.id()).get_timeout(TIMEOUT).unwrap();
        assert_ne!(halves.id(), again.id());
        let quarters = halves
            .split(halves.my_rank().unwrap() / 2, 0)
            .get_timeout(TIMEOUT)
            .unwrap();
        quarters.barrier().get_timeout(TIMEOUT).unwrap();
        (quarters.size(), quarters.members().unwrap())
    });
    for (id, (size, members)) in results.into_iter().enumerate() {
        let base = (id as u32 / 2) * 2;
        assert_eq!(size, 2);
        assert_eq!(members, vec![base, base + 1]);
    }
}

#[test]
fn test_singleton_groups() {
    let results = run_cluster(&[3], |t| {
        let sub = t.world().unwrap().split(t.id(), 0).get_timeout(TIMEOUT).unwrap();
        sub.barrier().get_timeout(TIMEOUT).unwrap();
        (sub.size(), sub.my_rank().unwrap(), sub.name().is_none())
    });
    assert!(results.iter().all(|&r| r == (1, 0, true)));
}
