use pgas::{LocalCluster, PgasConfig, PgasThread};
use std::time::Duration;

/// Upper bound for any single operation in these tests.
pub const TIMEOUT: Duration = Duration::from_secs(20);

/// Cluster shapes: threads per node.
pub const LAYOUTS: &[&[u32]] = &[
    &[1],
    &[4],
    &[1, 1],
    &[1, 1, 1, 1],
    &[2, 3, 1],
    &[1, 2, 1, 2, 1, 2, 1],
];

pub fn test_config() -> PgasConfig {
    PgasConfig {
        worker_threads: 2,
        ..PgasConfig::default()
    }
}

pub fn cluster(layout: &[u32]) -> LocalCluster {
    LocalCluster::builder()
        .nodes(layout)
        .config(test_config())
        .build()
        .unwrap()
}

/// Helper: run `body` on every logical thread of a fresh cluster and return
/// the results in thread order.
pub fn run_cluster<F, R>(layout: &[u32], body: F) -> Vec<R>
where
    F: Fn(PgasThread) -> R + Send + Sync,
    R: Send,
{
    cluster(layout).run(body).unwrap()
}

/// Declare `name` on every thread and wait until all have done so.
pub fn declare_all(thread: &PgasThread, name: &str) {
    thread.declare(name).unwrap();
    thread.world().unwrap().barrier().get_timeout(TIMEOUT).unwrap();
}
