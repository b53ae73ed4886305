//! Dynamic groups: join by name, then split.
//!
//! ```bash
//! cargo run --example groups
//! ```

use pgas::{LocalCluster, Reducer};
use tracing_subscriber::EnvFilter;

fn main() -> pgas::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cluster = LocalCluster::builder().nodes(&[3, 3]).build()?;

    let results = cluster.run(|t| -> pgas::Result<String> {
        let world = t.world()?;
        t.declare("id")?;
        t.put("id", &t.id())?;

        let name = if t.id() < 3 { "low" } else { "high" };
        let joined = t.join_group(name).get()?;
        // Membership is complete everywhere once every join has returned.
        world.barrier().get()?;
        let joined_sum = joined.reduce::<u32>("id", Reducer::Sum).get()?;

        let parity = world.split(t.id() % 2, t.id()).get()?;
        let parity_sum = parity.reduce::<u32>("id", Reducer::Sum).get()?;

        Ok(format!(
            "thread {}: '{name}' rank {} sum {joined_sum}; parity group {} rank {} sum {parity_sum}",
            t.id(),
            joined.my_rank()?,
            parity.id(),
            parity.my_rank()?,
        ))
    })?;

    for line in results {
        println!("{}", line?);
    }
    Ok(())
}
