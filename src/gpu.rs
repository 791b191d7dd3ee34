use once_cell::sync::OnceCell;

use crate::error::{ComputeError, ComputeResult};

pub struct GpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub adapter: wgpu::Adapter,
}

impl GpuContext {
    /// Acquire an adapter and device suitable for the compute pipelines.
    pub fn new() -> ComputeResult<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .ok_or_else(|| ComputeError::device("no suitable GPU adapter"))?;

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("passforge-device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_defaults(),
            },
            None,
        ))
        .map_err(|e| ComputeError::device(format!("request_device failed: {e}")))?;

        Ok(GpuContext {
            device,
            queue,
            adapter,
        })
    }
}

static CTX: OnceCell<GpuContext> = OnceCell::new();

/// Process-wide context, initialized on first use. Panics when no adapter is
/// available; fallible callers use [`GpuContext::new`] directly.
pub fn ctx() -> &'static GpuContext {
    CTX.get_or_init(|| GpuContext::new().expect("GPU context initialization failed"))
}
