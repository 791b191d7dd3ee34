// src/bin/primitives_demo.rs
// Runs every primitive over one random array and checks the results against CPU references.

use anyhow::{bail, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use passforge::{gpu, Dispatcher, PipelineConfig};

const ELEMENT_COUNT: usize = 1 << 20;

fn main() -> Result<()> {
    env_logger::init();

    let mut rng = StdRng::seed_from_u64(7);
    let values: Vec<u32> = (0..ELEMENT_COUNT).map(|_| rng.gen()).collect();

    let ctx = gpu::ctx();
    let dispatcher = Dispatcher::new(&ctx.device, &values, &PipelineConfig::all_enabled())?;
    dispatcher.run(&ctx.device, &ctx.queue)?;

    let total = dispatcher.reduce_result(&ctx.device, &ctx.queue)?;
    let expected_total = values.iter().fold(0u32, |acc, &v| acc.wrapping_add(v));
    if total != expected_total {
        bail!("reduce mismatch: got {total}, expected {expected_total}");
    }
    println!("reduce: {} element(s) -> {total}", values.len());

    let prefix = dispatcher.scan_result(&ctx.device, &ctx.queue)?;
    let mut running = 0u32;
    for (i, (&got, &value)) in prefix.iter().zip(&values).enumerate() {
        running = running.wrapping_add(value);
        if got != running {
            bail!("scan mismatch at index {i}: got {got}, expected {running}");
        }
    }
    println!("scan: {} prefix value(s) verified", prefix.len());

    let sorted = dispatcher.sort_result(&ctx.device, &ctx.queue)?;
    let mut expected_sorted = values.clone();
    expected_sorted.sort_unstable();
    if let Some(i) = (0..sorted.len()).find(|&i| sorted[i] != expected_sorted[i]) {
        bail!(
            "sort mismatch at index {i}: got {}, expected {}",
            sorted[i],
            expected_sorted[i]
        );
    }
    println!("sort: {} key(s) verified", sorted.len());

    Ok(())
}
