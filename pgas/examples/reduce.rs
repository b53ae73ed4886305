//! Reduce a per-thread value with a built-in and a custom reducer.
//!
//! ```bash
//! cargo run --example reduce
//! ```

use pgas::{LocalCluster, Reducer};
use tracing_subscriber::EnvFilter;

const GCD: u16 = 1;

fn gcd(a: u64, b: u64) -> u64 {
    if b == 0 { a } else { gcd(b, a % b) }
}

fn main() -> pgas::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cluster = LocalCluster::builder()
        .nodes(&[2, 2, 2])
        .reducer(GCD, gcd)
        .build()?;

    let results = cluster.run(|t| -> pgas::Result<Option<(u64, u64)>> {
        let world = t.world()?;
        t.declare("n")?;
        t.put("n", &(12 * (u64::from(t.id()) + 1)))?;
        world.barrier().get()?;

        if t.id() != 0 {
            return Ok(None);
        }
        let sum = world.reduce::<u64>("n", Reducer::Sum).get()?;
        let gcd = world.reduce::<u64>("n", Reducer::Custom(GCD)).get()?;
        Ok(Some((sum, gcd)))
    })?;

    if let Some((sum, gcd)) = results.into_iter().next().transpose()?.flatten() {
        println!("sum = {sum}, gcd = {gcd}");
    }
    Ok(())
}
