use super::helpers::{LAYOUTS, TIMEOUT, declare_all, run_cluster};

#[test]
fn test_gather_keyed_by_rank() {
    for layout in LAYOUTS {
        let results = run_cluster(layout, |t| {
            declare_all(&t, "value");
            t.put("value", &(u64::from(t.id()) * 10)).unwrap();
            let world = t.world().unwrap();
            world.barrier().get_timeout(TIMEOUT).unwrap();
            world.gather::<u64>("value").get_timeout(TIMEOUT).unwrap()
        });
        let n = layout.iter().sum::<u32>();
        for map in results {
            assert_eq!(map.len(), n as usize);
            for (rank, value) in map {
                assert_eq!(value, u64::from(rank) * 10);
            }
        }
    }
}

#[test]
fn test_gather_strings_from_one_requester() {
    let results = run_cluster(&[2, 2, 1], |t| {
        declare_all(&t, "name");
        t.put("name", &format!("thread-{}", t.id())).unwrap();
        let world = t.world().unwrap();
        world.barrier().get_timeout(TIMEOUT).unwrap();
        if t.id() == 3 {
            Some(world.gather::<String>("name").get_timeout(TIMEOUT).unwrap())
        } else {
            None
        }
    });
    let map = results[3].as_ref().unwrap();
    let names: Vec<&str> = map.values().map(String::as_str).collect();
    assert_eq!(
        names,
        vec!["thread-0", "thread-1", "thread-2", "thread-3", "thread-4"]
    );
}
