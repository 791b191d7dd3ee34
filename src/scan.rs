// src/scan.rs
// Inclusive prefix scan over u32 arrays, built from per-segment scans plus a recursive scan of segment sums.
// This file exists to wire the scan levels together and replay their combine kernels coarsest-to-finest, the order the folded offsets depend on.
// RELEVANT FILES:src/shaders/scan_segment.wgsl,src/shaders/scan_combine.wgsl,src/sort.rs

use crate::config::ScanConfig;
use crate::error::{ComputeError, ComputeResult};
use crate::kernel::{check_segment_limit, storage_buffer, uniform_u32, BufferRole, Kernel, KernelBuilder};

const SEGMENT_SCAN_SHADER: &str = include_str!("shaders/scan_segment.wgsl");
const SCAN_COMBINE_SHADER: &str = include_str!("shaders/scan_combine.wgsl");

/// Array length and segment count at one scan level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelPlan {
    pub length: u32,
    pub segment_count: u32,
}

/// Level layout for scanning `length` elements. Level 0 covers the input;
/// each further level scans the previous level's segment sums, ending at a
/// level that fits in a single segment.
pub fn plan_levels(length: u32, segment_length: u32) -> Vec<LevelPlan> {
    let mut plans = Vec::new();
    let mut current = length.max(1);
    loop {
        let segment_count = current.div_ceil(segment_length);
        plans.push(LevelPlan {
            length: current,
            segment_count,
        });
        if segment_count == 1 {
            return plans;
        }
        current = segment_count;
    }
}

struct ScanLevel {
    up: Kernel,
    // The coarsest level never needs combining.
    combine: Option<Kernel>,
    prefix_sum: wgpu::Buffer,
    segment_sum: wgpu::Buffer,
    segment_count: u32,
    // Levels after the first own their length uniform.
    _length_uniform: Option<wgpu::Buffer>,
}

/// Multi-level inclusive scan engine.
///
/// Execution order is every level's segment scan finest-to-coarsest, then the
/// combine kernels coarsest-to-finest. Combining a level before its coarser
/// neighbor has been combined would fold partial offsets into it, so the
/// reversal is load-bearing.
pub struct ScanEngine {
    levels: Vec<ScanLevel>,
}

impl ScanEngine {
    pub fn new(
        device: &wgpu::Device,
        input: &wgpu::Buffer,
        length_uniform: &wgpu::Buffer,
        length: u32,
        config: &ScanConfig,
    ) -> ComputeResult<Self> {
        config.validate()?;
        if length == 0 {
            return Err(ComputeError::construction("scan input must not be empty"));
        }
        check_segment_limit(device, "pf.Scan", config.segment_length)?;

        let plans = plan_levels(length, config.segment_length);
        log::info!(
            "scan engine: {} level(s) for {} element(s)",
            plans.len(),
            length
        );

        let mut levels: Vec<ScanLevel> = Vec::with_capacity(plans.len());
        for (k, plan) in plans.iter().enumerate() {
            let prefix_sum =
                storage_buffer(device, &format!("pf.Scan.Level{k}.Prefix"), plan.length);
            let segment_sum = storage_buffer(
                device,
                &format!("pf.Scan.Level{k}.SegmentSums"),
                plan.segment_count,
            );
            let level = match levels.last() {
                None => {
                    let up = KernelBuilder::new(device, &format!("pf.Scan.Level{k}.Up"), SEGMENT_SCAN_SHADER)
                        .constant("SEGMENT_LENGTH", config.segment_length)
                        // @binding(0) array_length
                        .bind(0, BufferRole::Uniform, length_uniform)
                        // @binding(1) input_values
                        .bind(1, BufferRole::ReadOnlyStorage, input)
                        // @binding(2) prefix_sum
                        .bind(2, BufferRole::Storage, &prefix_sum)
                        // @binding(3) segment_sums
                        .bind(3, BufferRole::Storage, &segment_sum)
                        .build()?;
                    ScanLevel {
                        up,
                        combine: None,
                        prefix_sum,
                        segment_sum,
                        segment_count: plan.segment_count,
                        _length_uniform: None,
                    }
                }
                Some(prev) => {
                    let level_uniform =
                        uniform_u32(device, &format!("pf.Scan.Level{k}.Length"), plan.length);
                    let up = KernelBuilder::new(device, &format!("pf.Scan.Level{k}.Up"), SEGMENT_SCAN_SHADER)
                        .constant("SEGMENT_LENGTH", config.segment_length)
                        // @binding(0) array_length
                        .bind(0, BufferRole::Uniform, &level_uniform)
                        // @binding(1) input_values
                        .bind(1, BufferRole::ReadOnlyStorage, &prev.segment_sum)
                        // @binding(2) prefix_sum
                        .bind(2, BufferRole::Storage, &prefix_sum)
                        // @binding(3) segment_sums
                        .bind(3, BufferRole::Storage, &segment_sum)
                        .build()?;
                    ScanLevel {
                        up,
                        combine: None,
                        prefix_sum,
                        segment_sum,
                        segment_count: plan.segment_count,
                        _length_uniform: Some(level_uniform),
                    }
                }
            };
            levels.push(level);
        }

        // Combine kernels fold level k+1's scanned totals into level k, so
        // every level except the coarsest gets one.
        let mut combines: Vec<Kernel> = Vec::new();
        for k in 0..levels.len().saturating_sub(1) {
            let level_length_uniform = match &levels[k]._length_uniform {
                Some(uniform) => uniform,
                None => length_uniform,
            };
            let combine = KernelBuilder::new(device, &format!("pf.Scan.Level{k}.Combine"), SCAN_COMBINE_SHADER)
                .constant("SEGMENT_LENGTH", config.segment_length)
                // @binding(0) array_length
                .bind(0, BufferRole::Uniform, level_length_uniform)
                // @binding(1) prefix_sum
                .bind(1, BufferRole::Storage, &levels[k].prefix_sum)
                // @binding(2) segment_prefix
                .bind(2, BufferRole::ReadOnlyStorage, &levels[k + 1].prefix_sum)
                .build()?;
            combines.push(combine);
        }
        for (level, combine) in levels.iter_mut().zip(combines) {
            level.combine = Some(combine);
        }

        Ok(Self { levels })
    }

    /// Record segment scans finest-to-coarsest, then combines in reverse.
    pub fn encode(&self, encoder: &mut wgpu::CommandEncoder) -> ComputeResult<()> {
        for level in &self.levels {
            level.up.dispatch(encoder, level.segment_count, 1, 1)?;
        }
        for level in self.levels.iter().rev() {
            if let Some(combine) = &level.combine {
                combine.dispatch(encoder, level.segment_count, 1, 1)?;
            }
        }
        Ok(())
    }

    /// Level-0 prefix buffer; holds the inclusive scan after execution.
    pub fn result_buffer(&self) -> &wgpu::Buffer {
        &self.levels[0].prefix_sum
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }
}
