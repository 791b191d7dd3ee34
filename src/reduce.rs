// src/reduce.rs
// Multi-stage sum reduction collapsing a u32 array to a single value on the GPU.
// This file exists to chain segment-reduce dispatches, each stage shrinking the array by the segment length, until one partial remains.
// RELEVANT FILES:src/shaders/reduce_segment.wgsl,src/kernel.rs,src/dispatch.rs

use crate::config::ReduceConfig;
use crate::error::{ComputeError, ComputeResult};
use crate::kernel::{check_segment_limit, storage_buffer, uniform_u32, BufferRole, Kernel, KernelBuilder};

const SEGMENT_REDUCE_SHADER: &str = include_str!("shaders/reduce_segment.wgsl");

/// Array lengths flowing through one reduce stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StagePlan {
    pub input_length: u32,
    pub output_length: u32,
}

/// Stage layout for reducing `length` elements with the given segment length.
/// Always yields at least one stage; the last stage outputs a single value.
pub fn plan_stages(length: u32, segment_length: u32) -> Vec<StagePlan> {
    let mut plans = Vec::new();
    let mut current = length.max(1);
    loop {
        let output = current.div_ceil(segment_length);
        plans.push(StagePlan {
            input_length: current,
            output_length: output,
        });
        if output == 1 {
            return plans;
        }
        current = output;
    }
}

struct ReduceStage {
    kernel: Kernel,
    output: wgpu::Buffer,
    dispatch: u32,
    // Stages after the first own their input-length uniform.
    _length_uniform: Option<wgpu::Buffer>,
}

/// Chain of segment-reduce kernels whose final stage holds the total sum.
pub struct ReductionChain {
    stages: Vec<ReduceStage>,
}

impl ReductionChain {
    /// Build the full chain up front. Stage 0 reads the caller's buffers;
    /// every later stage reads the previous stage's partial sums through its
    /// own length uniform.
    pub fn new(
        device: &wgpu::Device,
        input: &wgpu::Buffer,
        length_uniform: &wgpu::Buffer,
        length: u32,
        config: &ReduceConfig,
    ) -> ComputeResult<Self> {
        config.validate()?;
        if length == 0 {
            return Err(ComputeError::construction("reduce input must not be empty"));
        }
        check_segment_limit(device, "pf.Reduce", config.segment_length)?;

        let plans = plan_stages(length, config.segment_length);
        log::info!(
            "reduce chain: {} stage(s) for {} element(s)",
            plans.len(),
            length
        );

        let mut stages: Vec<ReduceStage> = Vec::with_capacity(plans.len());
        for (i, plan) in plans.iter().enumerate() {
            let output = storage_buffer(
                device,
                &format!("pf.Reduce.Stage{i}.Partials"),
                plan.output_length,
            );
            let stage = match stages.last() {
                None => {
                    let kernel = KernelBuilder::new(device, &format!("pf.Reduce.Stage{i}"), SEGMENT_REDUCE_SHADER)
                        .constant("SEGMENT_LENGTH", config.segment_length)
                        // @binding(0) array_length
                        .bind(0, BufferRole::Uniform, length_uniform)
                        // @binding(1) input_values
                        .bind(1, BufferRole::ReadOnlyStorage, input)
                        // @binding(2) partial_sums
                        .bind(2, BufferRole::Storage, &output)
                        .build()?;
                    ReduceStage {
                        kernel,
                        output,
                        dispatch: plan.output_length,
                        _length_uniform: None,
                    }
                }
                Some(prev) => {
                    let stage_uniform = uniform_u32(
                        device,
                        &format!("pf.Reduce.Stage{i}.Length"),
                        plan.input_length,
                    );
                    let kernel = KernelBuilder::new(device, &format!("pf.Reduce.Stage{i}"), SEGMENT_REDUCE_SHADER)
                        .constant("SEGMENT_LENGTH", config.segment_length)
                        // @binding(0) array_length
                        .bind(0, BufferRole::Uniform, &stage_uniform)
                        // @binding(1) input_values
                        .bind(1, BufferRole::ReadOnlyStorage, &prev.output)
                        // @binding(2) partial_sums
                        .bind(2, BufferRole::Storage, &output)
                        .build()?;
                    ReduceStage {
                        kernel,
                        output,
                        dispatch: plan.output_length,
                        _length_uniform: Some(stage_uniform),
                    }
                }
            };
            stages.push(stage);
        }

        Ok(Self { stages })
    }

    /// Record every stage in order. Later stages read earlier outputs, so the
    /// encoder's pass order is the data dependency order.
    pub fn encode(&self, encoder: &mut wgpu::CommandEncoder) -> ComputeResult<()> {
        for stage in &self.stages {
            stage.kernel.dispatch(encoder, stage.dispatch, 1, 1)?;
        }
        Ok(())
    }

    /// Single-element buffer holding the total after execution.
    pub fn result_buffer(&self) -> &wgpu::Buffer {
        &self.stages[self.stages.len() - 1].output
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }
}
