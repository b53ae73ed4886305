//! Barrier synchronization across logical threads.
//!
//! Each thread sleeps for a different duration, then enters the barrier. No
//! thread proceeds past the barrier until all threads have arrived.
//!
//! ```bash
//! cargo run --example barrier
//! ```

use pgas::LocalCluster;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

fn main() -> pgas::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cluster = LocalCluster::builder().nodes(&[2, 2]).build()?;
    let start = Instant::now();

    cluster
        .run(|t| {
            let id = t.id();
            // Simulate different amounts of work per thread.
            std::thread::sleep(Duration::from_millis(u64::from(id) * 50));
            println!(
                "thread {id} arriving at barrier ({}ms elapsed)",
                start.elapsed().as_millis()
            );

            t.world()?.barrier().get()?;

            println!(
                "thread {id} passed barrier ({}ms elapsed)",
                start.elapsed().as_millis()
            );
            pgas::Result::Ok(())
        })?
        .into_iter()
        .collect()
}
