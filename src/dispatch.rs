// src/dispatch.rs
// Front door that uploads an input array once and runs the enabled primitives over it.
// This file exists to own the shared input buffers, build each enabled engine against them, and submit every recorded pass in one command encoder.
// RELEVANT FILES:src/reduce.rs,src/scan.rs,src/sort.rs,src/readback.rs

use crate::config::PipelineConfig;
use crate::error::{ComputeError, ComputeResult};
use crate::kernel::{storage_buffer_init, uniform_u32};
use crate::readback::read_buffer_u32;
use crate::reduce::ReductionChain;
use crate::scan::ScanEngine;
use crate::sort::RadixSortEngine;

/// Owns the uploaded input and the engines built over it.
///
/// The input buffer and its length uniform are shared by every enabled
/// engine, so the array is uploaded exactly once.
pub struct Dispatcher {
    input: wgpu::Buffer,
    _length_uniform: wgpu::Buffer,
    length: u32,
    reduce: Option<ReductionChain>,
    scan: Option<ScanEngine>,
    sort: Option<RadixSortEngine>,
}

impl Dispatcher {
    pub fn new(
        device: &wgpu::Device,
        values: &[u32],
        config: &PipelineConfig,
    ) -> ComputeResult<Self> {
        config.validate()?;
        if values.is_empty() {
            return Err(ComputeError::construction("input must not be empty"));
        }
        let length = u32::try_from(values.len())
            .map_err(|_| ComputeError::construction("input length exceeds u32 range"))?;

        let input = storage_buffer_init(device, "pf.Input", values);
        let length_uniform = uniform_u32(device, "pf.InputLength", length);

        let reduce = config
            .reduce
            .as_ref()
            .map(|c| ReductionChain::new(device, &input, &length_uniform, length, c))
            .transpose()?;
        let scan = config
            .scan
            .as_ref()
            .map(|c| ScanEngine::new(device, &input, &length_uniform, length, c))
            .transpose()?;
        let sort = config
            .sort
            .as_ref()
            .map(|c| RadixSortEngine::new(device, &input, &length_uniform, length, c))
            .transpose()?;

        log::debug!(
            "dispatcher ready: {length} element(s), reduce={} scan={} sort={}",
            reduce.is_some(),
            scan.is_some(),
            sort.is_some()
        );

        Ok(Self {
            input,
            _length_uniform: length_uniform,
            length,
            reduce,
            scan,
            sort,
        })
    }

    /// Record every enabled engine into one encoder and submit it.
    pub fn run(&self, device: &wgpu::Device, queue: &wgpu::Queue) -> ComputeResult<()> {
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("pf.Dispatcher.Encoder"),
        });
        if let Some(reduce) = &self.reduce {
            reduce.encode(&mut encoder)?;
        }
        if let Some(scan) = &self.scan {
            scan.encode(&mut encoder)?;
        }
        if let Some(sort) = &self.sort {
            sort.encode(&mut encoder)?;
        }
        queue.submit(Some(encoder.finish()));
        Ok(())
    }

    /// Total sum from the reduction chain's last stage.
    pub fn reduce_result(&self, device: &wgpu::Device, queue: &wgpu::Queue) -> ComputeResult<u32> {
        let chain = self
            .reduce
            .as_ref()
            .ok_or_else(|| ComputeError::construction("reduce pipeline not enabled"))?;
        let values = read_buffer_u32(device, queue, chain.result_buffer(), 1)?;
        Ok(values[0])
    }

    /// Inclusive prefix sums, one per input element.
    pub fn scan_result(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
    ) -> ComputeResult<Vec<u32>> {
        let engine = self
            .scan
            .as_ref()
            .ok_or_else(|| ComputeError::construction("scan pipeline not enabled"))?;
        read_buffer_u32(device, queue, engine.result_buffer(), self.length)
    }

    /// Fully sorted copy of the input keys.
    pub fn sort_result(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
    ) -> ComputeResult<Vec<u32>> {
        let engine = self
            .sort
            .as_ref()
            .ok_or_else(|| ComputeError::construction("sort pipeline not enabled"))?;
        read_buffer_u32(device, queue, engine.result_buffer(), self.length)
    }

    pub fn input_buffer(&self) -> &wgpu::Buffer {
        &self.input
    }

    pub fn length(&self) -> u32 {
        self.length
    }

    pub fn reduce(&self) -> Option<&ReductionChain> {
        self.reduce.as_ref()
    }

    pub fn scan(&self) -> Option<&ScanEngine> {
        self.scan.as_ref()
    }

    pub fn sort(&self) -> Option<&RadixSortEngine> {
        self.sort.as_ref()
    }
}
