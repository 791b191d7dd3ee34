// src/sort.rs
// LSD radix sort over u32 keys built from histogram, nested scan, and scatter dispatches.
// This file exists to chain the per-digit passes, each scattering into a fresh output buffer that feeds the next pass while preserving equal-key order.
// RELEVANT FILES:src/shaders/radix_histogram.wgsl,src/shaders/radix_scatter.wgsl,src/scan.rs

use crate::config::{ScanConfig, SortConfig};
use crate::error::{ComputeError, ComputeResult};
use crate::kernel::{check_segment_limit, storage_buffer, uniform_u32, BufferRole, Kernel, KernelBuilder};
use crate::scan::ScanEngine;

const RADIX_HISTOGRAM_SHADER: &str = include_str!("shaders/radix_histogram.wgsl");
const RADIX_SCATTER_SHADER: &str = include_str!("shaders/radix_scatter.wgsl");

/// Shared shape of every sort pass.
///
/// `slot_length` is u64 so planning stays total for lengths near `u32::MAX`;
/// the engine checks it against the u32 buffer range after the device limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortPlan {
    pub workgroup_count: u32,
    pub slot_length: u64,
    pub pass_count: u32,
}

/// Pass shape for sorting `length` keys: one histogram slot per digit per
/// workgroup, laid out digit-major, and one pass per digit of the key.
pub fn plan_passes(length: u32, segment_length: u32, radix_bits: u32, key_bits: u32) -> SortPlan {
    let workgroup_count = length.max(1).div_ceil(segment_length);
    SortPlan {
        workgroup_count,
        slot_length: (1u64 << radix_bits) * u64::from(workgroup_count),
        pass_count: key_bits.div_ceil(radix_bits),
    }
}

struct SortPass {
    histogram: Kernel,
    scatter: Kernel,
    slot_scan: ScanEngine,
    output: wgpu::Buffer,
    _slot_counts: wgpu::Buffer,
    _local_rank: wgpu::Buffer,
}

/// Stable LSD radix sort. Keys are ordered by their low `key_bits` bits;
/// equal keys keep their input order.
pub struct RadixSortEngine {
    workgroup_count: u32,
    passes: Vec<SortPass>,
    _wg_count_uniform: wgpu::Buffer,
    _slot_length_uniform: wgpu::Buffer,
}

impl RadixSortEngine {
    /// Build every pass up front. Pass 0 reads the caller's input; pass i
    /// reads pass i-1's sorted output. The workgroup-count and slot-length
    /// uniforms are shared across passes since the array never changes shape.
    pub fn new(
        device: &wgpu::Device,
        input: &wgpu::Buffer,
        length_uniform: &wgpu::Buffer,
        length: u32,
        config: &SortConfig,
    ) -> ComputeResult<Self> {
        config.validate()?;
        if length == 0 {
            return Err(ComputeError::construction("sort input must not be empty"));
        }
        check_segment_limit(device, "pf.Sort", config.segment_length)?;

        let plan = plan_passes(
            length,
            config.segment_length,
            config.radix_bits,
            config.key_bits,
        );
        let max_workgroups = device.limits().max_compute_workgroups_per_dimension;
        if plan.workgroup_count > max_workgroups {
            return Err(ComputeError::construction(format!(
                "pf.Sort: {} workgroups exceed the device limit of {max_workgroups}",
                plan.workgroup_count
            )));
        }
        let slot_length = u32::try_from(plan.slot_length).map_err(|_| {
            ComputeError::construction(format!(
                "pf.Sort: {} histogram slots exceed the u32 buffer range",
                plan.slot_length
            ))
        })?;
        log::info!(
            "radix sort: {} pass(es), {} workgroup(s), {} histogram slot(s) for {} key(s)",
            plan.pass_count,
            plan.workgroup_count,
            plan.slot_length,
            length
        );

        let wg_count_uniform = uniform_u32(device, "pf.Sort.WorkgroupCount", plan.workgroup_count);
        let slot_length_uniform = uniform_u32(device, "pf.Sort.SlotLength", slot_length);
        let scan_config = ScanConfig {
            segment_length: config.scan_segment_length,
        };

        let mut passes: Vec<SortPass> = Vec::with_capacity(plan.pass_count as usize);
        for i in 0..plan.pass_count {
            let shift = i * config.radix_bits;
            // The last pass may cover fewer than radix_bits key bits.
            let digit_bits = config.radix_bits.min(config.key_bits - shift);
            let slot_counts = storage_buffer(
                device,
                &format!("pf.Sort.Pass{i}.SlotCounts"),
                slot_length,
            );
            let local_rank =
                storage_buffer(device, &format!("pf.Sort.Pass{i}.LocalRank"), length);
            let output = storage_buffer(device, &format!("pf.Sort.Pass{i}.Sorted"), length);

            let pass_input = match passes.last() {
                None => input,
                Some(prev) => &prev.output,
            };
            let histogram = KernelBuilder::new(device, &format!("pf.Sort.Pass{i}.Histogram"), RADIX_HISTOGRAM_SHADER)
                .constant("SEGMENT_LENGTH", config.segment_length)
                .constant("RADIX_BITS", config.radix_bits)
                .constant("RIGHT_SHIFT_BITS", shift)
                .constant("DIGIT_BITS", digit_bits)
                // @binding(0) array_length
                .bind(0, BufferRole::Uniform, length_uniform)
                // @binding(1) input_keys
                .bind(1, BufferRole::ReadOnlyStorage, pass_input)
                // @binding(2) slot_counts
                .bind(2, BufferRole::Storage, &slot_counts)
                // @binding(3) local_rank
                .bind(3, BufferRole::Storage, &local_rank)
                // @binding(4) workgroup_count
                .bind(4, BufferRole::Uniform, &wg_count_uniform)
                .build()?;

            let slot_scan = ScanEngine::new(
                device,
                &slot_counts,
                &slot_length_uniform,
                slot_length,
                &scan_config,
            )?;

            let scatter = KernelBuilder::new(device, &format!("pf.Sort.Pass{i}.Scatter"), RADIX_SCATTER_SHADER)
                .constant("SEGMENT_LENGTH", config.segment_length)
                .constant("RIGHT_SHIFT_BITS", shift)
                .constant("DIGIT_BITS", digit_bits)
                // @binding(0) array_length
                .bind(0, BufferRole::Uniform, length_uniform)
                // @binding(1) input_keys
                .bind(1, BufferRole::ReadOnlyStorage, pass_input)
                // @binding(2) slot_prefix
                .bind(2, BufferRole::ReadOnlyStorage, slot_scan.result_buffer())
                // @binding(3) local_rank
                .bind(3, BufferRole::ReadOnlyStorage, &local_rank)
                // @binding(4) sorted_keys
                .bind(4, BufferRole::Storage, &output)
                // @binding(5) workgroup_count
                .bind(5, BufferRole::Uniform, &wg_count_uniform)
                .build()?;

            passes.push(SortPass {
                histogram,
                scatter,
                slot_scan,
                output,
                _slot_counts: slot_counts,
                _local_rank: local_rank,
            });
        }

        Ok(Self {
            workgroup_count: plan.workgroup_count,
            passes,
            _wg_count_uniform: wg_count_uniform,
            _slot_length_uniform: slot_length_uniform,
        })
    }

    /// Record histogram, slot scan, and scatter for each pass in digit order.
    pub fn encode(&self, encoder: &mut wgpu::CommandEncoder) -> ComputeResult<()> {
        for pass in &self.passes {
            pass.histogram
                .dispatch(encoder, self.workgroup_count, 1, 1)?;
            pass.slot_scan.encode(encoder)?;
            pass.scatter.dispatch(encoder, self.workgroup_count, 1, 1)?;
        }
        Ok(())
    }

    /// Last pass's output; holds the fully sorted keys after execution.
    pub fn result_buffer(&self) -> &wgpu::Buffer {
        &self.passes[self.passes.len() - 1].output
    }

    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_shape_for_full_keys() {
        let plan = plan_passes(1000, 256, 8, 32);
        assert_eq!(
            plan,
            SortPlan {
                workgroup_count: 4,
                slot_length: 1024,
                pass_count: 4,
            }
        );
    }

    #[test]
    fn narrow_keys_take_fewer_passes() {
        let plan = plan_passes(4, 2, 2, 4);
        assert_eq!(
            plan,
            SortPlan {
                workgroup_count: 2,
                slot_length: 8,
                pass_count: 2,
            }
        );
    }

    #[test]
    fn single_element_still_plans_one_workgroup() {
        let plan = plan_passes(1, 256, 8, 32);
        assert_eq!(plan.workgroup_count, 1);
        assert_eq!(plan.slot_length, 256);
        assert_eq!(plan.pass_count, 4);
    }

    #[test]
    fn uneven_key_bits_round_up() {
        let plan = plan_passes(100, 256, 3, 32);
        assert_eq!(plan.pass_count, 11);
    }

    #[test]
    fn maximum_length_plan_does_not_wrap() {
        let plan = plan_passes(u32::MAX, 256, 8, 32);
        assert_eq!(plan.workgroup_count, 1 << 24);
        assert_eq!(plan.slot_length, 1u64 << 32);
    }
}
