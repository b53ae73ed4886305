use super::helpers::{TIMEOUT, run_cluster};
use std::time::Duration;

#[test]
fn test_timeout_leaves_operation_running() {
    run_cluster(&[2, 2], |t| {
        let world = t.world().unwrap();
        if t.id() == 3 {
            std::thread::sleep(Duration::from_millis(200));
        }
        let fut = world.barrier();
        if t.id() == 0 {
            let err = fut.get_timeout(Duration::from_millis(5)).unwrap_err();
            assert!(err.is_timeout());
            assert!(!fut.is_done());
        }
        fut.get_timeout(TIMEOUT).unwrap();
        assert!(fut.is_done());
    });
}

#[test]
fn test_async_wait() {
    run_cluster(&[1, 3], |t| {
        let world = t.world().unwrap();
        futures::executor::block_on(world.barrier().wait()).unwrap();
        t.declare("x").unwrap();
        t.put("x", &t.id()).unwrap();
        futures::executor::block_on(world.barrier().wait()).unwrap();
        let gathered = futures::executor::block_on(world.gather::<u32>("x").wait()).unwrap();
        assert_eq!(gathered.len(), 4);
    });
}
