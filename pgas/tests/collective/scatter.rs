use super::helpers::{LAYOUTS, TIMEOUT, declare_all, run_cluster};
use pgas::PgasError;

#[test]
fn test_scatter_delivers_each_rank_its_value() {
    for layout in LAYOUTS {
        let results = run_cluster(layout, |t| {
            declare_all(&t, "slice");
            let world = t.world().unwrap();
            if t.id() == 0 {
                let values = (0..world.size()).map(|rank| (rank, rank * 2 + 1));
                world.scatter("slice", values).get_timeout(TIMEOUT).unwrap();
            }
            world.barrier().get_timeout(TIMEOUT).unwrap();
            t.get::<u32>("slice").unwrap()
        });
        for (id, v) in results.into_iter().enumerate() {
            assert_eq!(v, id as u32 * 2 + 1, "layout {layout:?}");
        }
    }
}

#[test]
fn test_partial_scatter_leaves_other_ranks_unset() {
    let results = run_cluster(&[1, 2, 1, 2], |t| {
        declare_all(&t, "part");
        let world = t.world().unwrap();
        if t.id() == 5 {
            let values = (0..world.size()).filter(|r| r % 2 == 0).map(|r| (r, vec![r; 2]));
            world.scatter("part", values).get_timeout(TIMEOUT).unwrap();
        }
        world.barrier().get_timeout(TIMEOUT).unwrap();
        t.get::<Vec<u32>>("part")
    });
    for (id, r) in results.into_iter().enumerate() {
        let id = id as u32;
        if id % 2 == 0 {
            assert_eq!(r.unwrap(), vec![id, id]);
        } else {
            assert_eq!(r.unwrap_err(), PgasError::VariableUnset { name: "part".into() });
        }
    }
}

#[test]
fn test_scatter_to_invalid_rank_fails() {
    run_cluster(&[2, 2], |t| {
        declare_all(&t, "x");
        let world = t.world().unwrap();
        if t.id() == 1 {
            let err = world
                .scatter("x", [(0u32, 1u8), (9, 2)])
                .get_timeout(TIMEOUT)
                .unwrap_err();
            assert_eq!(err.failures().len(), 1);
            assert!(err.to_string().contains("invalid rank 9"), "got: {err}");
        }
        world.barrier().get_timeout(TIMEOUT).unwrap();
        // The valid entry was still delivered.
        if t.id() == 0 {
            assert_eq!(t.get::<u8>("x").unwrap(), 1);
        }
    });
}
