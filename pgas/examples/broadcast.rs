//! Broadcast a value from one thread into every thread's storage.
//!
//! ```bash
//! cargo run --example broadcast
//! ```

use pgas::LocalCluster;
use tracing_subscriber::EnvFilter;

fn main() -> pgas::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cluster = LocalCluster::builder().nodes(&[1, 2, 1]).build()?;

    let results = cluster.run(|t| -> pgas::Result<Vec<f32>> {
        let world = t.world()?;
        t.declare("params")?;
        world.barrier().get()?;

        if t.id() == 0 {
            world.broadcast("params", &vec![1.0f32, 2.0, 3.0]).get()?;
        }
        world.barrier().get()?;
        t.get("params")
    })?;

    for (id, r) in results.into_iter().enumerate() {
        println!("thread {id}: {:?}", r?);
    }
    Ok(())
}
