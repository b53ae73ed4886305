use super::helpers::{TIMEOUT, run_cluster};
use pgas::{PgasError, Reducer};
use std::collections::BTreeSet;

#[test]
fn test_everyone_joins_one_group() {
    let results = run_cluster(&[2, 1, 3], |t| {
        let group = t.join_group("all").get_timeout(TIMEOUT).unwrap();
        t.world().unwrap().barrier().get_timeout(TIMEOUT).unwrap();
        (group.id(), group.my_rank().unwrap(), group.size(), group.name().map(str::to_string))
    });
    let ids: BTreeSet<_> = results.iter().map(|r| r.0).collect();
    assert_eq!(ids.len(), 1);
    assert_ne!(*ids.first().unwrap(), 0);
    let ranks: BTreeSet<_> = results.iter().map(|r| r.1).collect();
    assert_eq!(ranks, (0..6).collect());
    for r in &results {
        assert_eq!(r.2, 6);
        assert_eq!(r.3.as_deref(), Some("all"));
    }
}

#[test]
fn test_collectives_in_joined_groups() {
    let results = run_cluster(&[1, 2, 2, 1], |t| {
        let name = if t.id() % 2 == 0 { "evens" } else { "odds" };
        let group = t.join_group(name).get_timeout(TIMEOUT).unwrap();
        t.declare("id").unwrap();
        t.put("id", &u64::from(t.id())).unwrap();
        t.world().unwrap().barrier().get_timeout(TIMEOUT).unwrap();

        group.barrier().get_timeout(TIMEOUT).unwrap();
        let sum = group.reduce::<u64>("id", Reducer::Sum).get_timeout(TIMEOUT).unwrap();
        let gathered = group.gather::<u64>("id").get_timeout(TIMEOUT).unwrap();
        let members: BTreeSet<u64> = gathered.into_values().collect();
        (sum, members)
    });
    for (id, (sum, members)) in results.into_iter().enumerate() {
        if id % 2 == 0 {
            assert_eq!(sum, 6);
            assert_eq!(members, BTreeSet::from([0, 2, 4]));
        } else {
            assert_eq!(sum, 9);
            assert_eq!(members, BTreeSet::from([1, 3, 5]));
        }
    }
}

#[test]
fn test_rank_maps_back_to_thread() {
    run_cluster(&[3, 3], |t| {
        let group = t.join_group("ring").get_timeout(TIMEOUT).unwrap();
        t.world().unwrap().barrier().get_timeout(TIMEOUT).unwrap();
        let rank = group.my_rank().unwrap();
        assert_eq!(group.thread_at(rank).unwrap(), t.id());
        assert!(matches!(
            group.thread_at(group.size()),
            Err(PgasError::InvalidRank { .. })
        ));
    });
}

#[test]
fn test_joining_twice_keeps_rank() {
    run_cluster(&[2, 2], |t| {
        let first = t.join_group("again").get_timeout(TIMEOUT).unwrap();
        let second = t.join_group("again").get_timeout(TIMEOUT).unwrap();
        assert_eq!(first.id(), second.id());
        assert_eq!(first.my_rank().unwrap(), second.my_rank().unwrap());
    });
}

#[test]
fn test_subset_join_and_lookup() {
    run_cluster(&[1, 1, 1], |t| {
        let world = t.world().unwrap();
        let joined = if t.id() != 1 {
            Some(t.join_group("pair").get_timeout(TIMEOUT).unwrap())
        } else {
            None
        };
        world.barrier().get_timeout(TIMEOUT).unwrap();
        match joined {
            Some(group) => {
                assert_eq!(group.size(), 2);
                assert_eq!(t.group(group.id()).unwrap().id(), group.id());
                group.barrier().get_timeout(TIMEOUT).unwrap();
            }
            None => assert!(t.group(1).is_err()),
        }
    });
}
