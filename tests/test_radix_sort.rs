// tests/test_radix_sort.rs
// Tests for the chained least-significant-digit radix sort.
// This file exists to validate sorted output, pass chaining, and stability against CPU reference sorts.
// RELEVANT FILES:src/sort.rs,src/shaders/radix_histogram.wgsl,src/shaders/radix_scatter.wgsl

use anyhow::Result;
use passforge::{Dispatcher, PipelineConfig, SortConfig};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Device and queue for testing, or None when no adapter is available.
fn gpu_device() -> Option<(wgpu::Device, wgpu::Queue)> {
    let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::default());
    let adapter = match pollster::block_on(
        instance.request_adapter(&wgpu::RequestAdapterOptions::default()),
    ) {
        Some(adapter) => adapter,
        None => {
            println!("no adapter available; skipping");
            return None;
        }
    };
    pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor::default(), None)).ok()
}

fn sort_only(config: SortConfig) -> PipelineConfig {
    PipelineConfig {
        reduce: None,
        scan: None,
        sort: Some(config),
    }
}

#[test]
fn sort_random_full_range_keys() -> Result<()> {
    let Some((device, queue)) = gpu_device() else {
        return Ok(());
    };

    let mut rng = StdRng::seed_from_u64(31);
    let keys: Vec<u32> = (0..50_000).map(|_| rng.gen()).collect();

    let dispatcher = Dispatcher::new(&device, &keys, &sort_only(SortConfig::default()))?;
    assert_eq!(dispatcher.sort().expect("sort enabled").pass_count(), 4);
    dispatcher.run(&device, &queue)?;

    let mut expected = keys.clone();
    expected.sort_unstable();
    let sorted = dispatcher.sort_result(&device, &queue)?;
    assert_eq!(sorted.len(), expected.len());
    if let Some(i) = (0..sorted.len()).find(|&i| sorted[i] != expected[i]) {
        panic!(
            "first mismatch at {}: gpu {} cpu {}",
            i, sorted[i], expected[i]
        );
    }
    println!("sorted {} full-range keys over 4 passes", keys.len());

    Ok(())
}

#[test]
fn sort_is_stable_across_passes() -> Result<()> {
    let Some((device, queue)) = gpu_device() else {
        return Ok(());
    };

    // Key low byte is the sorted value; high bits carry the input position.
    // Any reordering of equal low bytes shows up as a high-bit mismatch.
    let mut rng = StdRng::seed_from_u64(37);
    let keys: Vec<u32> = (0..10_000u32)
        .map(|i| (i << 8) | rng.gen_range(0u32..256))
        .collect();

    let config = SortConfig {
        radix_bits: 4,
        key_bits: 8,
        ..SortConfig::default()
    };
    let dispatcher = Dispatcher::new(&device, &keys, &sort_only(config))?;
    assert_eq!(dispatcher.sort().expect("sort enabled").pass_count(), 2);
    dispatcher.run(&device, &queue)?;

    let mut expected = keys.clone();
    expected.sort_by_key(|key| key & 0xFF);
    assert_eq!(dispatcher.sort_result(&device, &queue)?, expected);
    println!("stable order held across 2 passes for {} keys", keys.len());

    Ok(())
}

#[test]
fn sort_narrow_segments_known_values() -> Result<()> {
    let Some((device, queue)) = gpu_device() else {
        return Ok(());
    };

    let config = SortConfig {
        segment_length: 2,
        radix_bits: 2,
        key_bits: 4,
        scan_segment_length: 2,
    };
    let dispatcher = Dispatcher::new(&device, &[5u32, 3, 8, 1], &sort_only(config))?;
    assert_eq!(dispatcher.sort().expect("sort enabled").pass_count(), 2);
    dispatcher.run(&device, &queue)?;
    assert_eq!(dispatcher.sort_result(&device, &queue)?, vec![1, 3, 5, 8]);

    Ok(())
}

#[test]
fn sort_ignores_bits_beyond_key_width() -> Result<()> {
    let Some((device, queue)) = gpu_device() else {
        return Ok(());
    };

    // radix_bits does not divide key_bits, so the last pass covers one bit.
    // Bits above key_bits vary across the keys and must not affect the order.
    let keys = vec![16u32, 17, 1, 19, 2];
    let config = SortConfig {
        segment_length: 2,
        radix_bits: 3,
        key_bits: 4,
        scan_segment_length: 2,
    };
    let dispatcher = Dispatcher::new(&device, &keys, &sort_only(config))?;
    assert_eq!(dispatcher.sort().expect("sort enabled").pass_count(), 2);
    dispatcher.run(&device, &queue)?;

    let mut expected = keys.clone();
    expected.sort_by_key(|key| key & 0xF);
    assert_eq!(dispatcher.sort_result(&device, &queue)?, expected);

    Ok(())
}

#[test]
fn sort_degenerate_inputs() -> Result<()> {
    let Some((device, queue)) = gpu_device() else {
        return Ok(());
    };

    let dispatcher = Dispatcher::new(&device, &[42u32], &sort_only(SortConfig::default()))?;
    dispatcher.run(&device, &queue)?;
    assert_eq!(dispatcher.sort_result(&device, &queue)?, vec![42]);

    let dispatcher = Dispatcher::new(&device, &[9u32, 9, 9], &sort_only(SortConfig::default()))?;
    dispatcher.run(&device, &queue)?;
    assert_eq!(dispatcher.sort_result(&device, &queue)?, vec![9, 9, 9]);

    Ok(())
}
