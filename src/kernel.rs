//! Compute kernel construction and dispatch.
//!
//! [`KernelBuilder`] wires a WGSL source, its buffer bindings, and the
//! specialization constants the source references into a ready-to-dispatch
//! [`Kernel`]. Constants are injected as a `const` header ahead of the source
//! text, so shaders reference names like `SEGMENT_LENGTH` without declaring
//! them.

use crate::error::{ComputeError, ComputeResult};

/// How a buffer is exposed to the shader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferRole {
    Uniform,
    Storage,
    ReadOnlyStorage,
}

impl BufferRole {
    /// Usage flag a bound buffer must carry to serve this role.
    pub fn required_usage(self) -> wgpu::BufferUsages {
        match self {
            BufferRole::Uniform => wgpu::BufferUsages::UNIFORM,
            BufferRole::Storage | BufferRole::ReadOnlyStorage => wgpu::BufferUsages::STORAGE,
        }
    }

    pub fn binding_type(self) -> wgpu::BindingType {
        match self {
            BufferRole::Uniform => wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            BufferRole::Storage => wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only: false },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            BufferRole::ReadOnlyStorage => wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only: true },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
        }
    }
}

/// Storage buffer holding `element_count` u32 values, writable from shaders
/// and copyable in both directions.
pub fn storage_buffer(device: &wgpu::Device, label: &str, element_count: u32) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size: u64::from(element_count) * 4,
        usage: wgpu::BufferUsages::STORAGE
            | wgpu::BufferUsages::COPY_SRC
            | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

/// Storage buffer pre-filled with `contents`.
pub fn storage_buffer_init(device: &wgpu::Device, label: &str, contents: &[u32]) -> wgpu::Buffer {
    use wgpu::util::DeviceExt;
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(label),
        contents: bytemuck::cast_slice(contents),
        usage: wgpu::BufferUsages::STORAGE
            | wgpu::BufferUsages::COPY_SRC
            | wgpu::BufferUsages::COPY_DST,
    })
}

/// Single-value uniform buffer, rewritable through the queue.
pub fn uniform_u32(device: &wgpu::Device, label: &str, value: u32) -> wgpu::Buffer {
    use wgpu::util::DeviceExt;
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(label),
        contents: bytemuck::bytes_of(&value),
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
    })
}

/// Segment lengths become workgroup sizes, so they must fit the device.
pub fn check_segment_limit(
    device: &wgpu::Device,
    label: &str,
    segment_length: u32,
) -> ComputeResult<()> {
    let limits = device.limits();
    if segment_length > limits.max_compute_workgroup_size_x
        || segment_length > limits.max_compute_invocations_per_workgroup
    {
        return Err(ComputeError::construction(format!(
            "{label}: segment_length {segment_length} exceeds device workgroup limits \
             (size_x {}, invocations {})",
            limits.max_compute_workgroup_size_x, limits.max_compute_invocations_per_workgroup
        )));
    }
    Ok(())
}

struct BindingSpec<'a> {
    slot: u32,
    role: BufferRole,
    buffer: &'a wgpu::Buffer,
}

fn constant_header(constants: &[(&'static str, u32)]) -> String {
    let mut header = String::new();
    for (name, value) in constants {
        header.push_str(&format!("const {name}: u32 = {value}u;\n"));
    }
    header
}

/// Builder for a single compute kernel.
pub struct KernelBuilder<'a> {
    device: &'a wgpu::Device,
    label: String,
    source: &'a str,
    entry_point: &'a str,
    bindings: Vec<BindingSpec<'a>>,
    constants: Vec<(&'static str, u32)>,
}

impl<'a> KernelBuilder<'a> {
    pub fn new(device: &'a wgpu::Device, label: &str, source: &'a str) -> Self {
        Self {
            device,
            label: label.to_string(),
            source,
            entry_point: "main",
            bindings: Vec::new(),
            constants: Vec::new(),
        }
    }

    /// Attach `buffer` at `slot` with the given role.
    pub fn bind(mut self, slot: u32, role: BufferRole, buffer: &'a wgpu::Buffer) -> Self {
        self.bindings.push(BindingSpec { slot, role, buffer });
        self
    }

    /// Declare a u32 specialization constant the source refers to.
    pub fn constant(mut self, name: &'static str, value: u32) -> Self {
        self.constants.push((name, value));
        self
    }

    /// Compile the specialized source, then assemble the pipeline and its
    /// bind group. Shader and pipeline errors are captured through a
    /// validation error scope instead of panicking the device.
    pub fn build(self) -> ComputeResult<Kernel> {
        for (i, spec) in self.bindings.iter().enumerate() {
            if self.bindings[..i].iter().any(|prior| prior.slot == spec.slot) {
                return Err(ComputeError::construction(format!(
                    "{}: binding slot {} declared twice",
                    self.label, spec.slot
                )));
            }
            if !spec.buffer.usage().contains(spec.role.required_usage()) {
                return Err(ComputeError::construction(format!(
                    "{}: buffer at slot {} lacks the usage its {:?} role requires",
                    self.label, spec.slot, spec.role
                )));
            }
        }
        for (i, (name, _)) in self.constants.iter().enumerate() {
            if self.constants[..i].iter().any(|(prior, _)| prior == name) {
                return Err(ComputeError::construction(format!(
                    "{}: constant {} declared twice",
                    self.label, name
                )));
            }
        }

        let source = format!("{}{}", constant_header(&self.constants), self.source);
        let shader_label = format!("{}.Shader", self.label);
        let layout_label = format!("{}.BindGroupLayout", self.label);
        let pipeline_layout_label = format!("{}.PipelineLayout", self.label);
        let pipeline_label = format!("{}.Pipeline", self.label);
        let bind_group_label = format!("{}.BindGroup", self.label);

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(&shader_label),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            });
        if let Some(err) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(ComputeError::compile(format!("{}: {err}", self.label)));
        }

        let layout_entries: Vec<wgpu::BindGroupLayoutEntry> = self
            .bindings
            .iter()
            .map(|spec| wgpu::BindGroupLayoutEntry {
                binding: spec.slot,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: spec.role.binding_type(),
                count: None,
            })
            .collect();
        let bind_group_layout =
            self.device
                .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some(&layout_label),
                    entries: &layout_entries,
                });
        let pipeline_layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(&pipeline_layout_label),
                bind_group_layouts: &[&bind_group_layout],
                push_constant_ranges: &[],
            });

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let pipeline = self
            .device
            .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(&pipeline_label),
                layout: Some(&pipeline_layout),
                module: &module,
                entry_point: self.entry_point,
            });
        if let Some(err) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(ComputeError::compile(format!("{}: {err}", self.label)));
        }

        let group_entries: Vec<wgpu::BindGroupEntry> = self
            .bindings
            .iter()
            .map(|spec| wgpu::BindGroupEntry {
                binding: spec.slot,
                resource: spec.buffer.as_entire_binding(),
            })
            .collect();
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&bind_group_label),
            layout: &bind_group_layout,
            entries: &group_entries,
        });

        log::debug!(
            "built kernel {} ({} bindings, {} constants)",
            self.label,
            self.bindings.len(),
            self.constants.len()
        );

        Ok(Kernel {
            label: self.label,
            pipeline,
            bind_group,
            max_workgroups_per_dim: self.device.limits().max_compute_workgroups_per_dimension,
        })
    }
}

/// A compiled compute pipeline with its bound resources.
pub struct Kernel {
    label: String,
    pipeline: wgpu::ComputePipeline,
    bind_group: wgpu::BindGroup,
    max_workgroups_per_dim: u32,
}

impl Kernel {
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Record one dispatch in its own compute pass. Every axis must be in
    /// `1..=max_compute_workgroups_per_dimension`.
    pub fn dispatch(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        x: u32,
        y: u32,
        z: u32,
    ) -> ComputeResult<()> {
        for (axis, count) in [("x", x), ("y", y), ("z", z)] {
            if count == 0 || count > self.max_workgroups_per_dim {
                return Err(ComputeError::dispatch_size(format!(
                    "{}: {axis} workgroup count {count} outside 1..={}",
                    self.label, self.max_workgroups_per_dim
                )));
            }
        }
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some(&self.label),
            timestamp_writes: None,
        });
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.bind_group, &[]);
        pass.dispatch_workgroups(x, y, z);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COUNTER_SRC: &str = r#"
@group(0) @binding(0) var<storage, read_write> data: array<u32>;

@compute @workgroup_size(1)
fn main(@builtin(global_invocation_id) gid: vec3<u32>) {
    if (gid.x == 0u) {
        data[0] = data[0] + 1u;
    }
}
"#;

    fn test_device() -> Option<(wgpu::Device, wgpu::Queue)> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::default());
        let adapter = match pollster::block_on(
            instance.request_adapter(&wgpu::RequestAdapterOptions::default()),
        ) {
            Some(adapter) => adapter,
            None => return None,
        };
        pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor::default(), None)).ok()
    }

    #[test]
    fn constant_header_formats_declarations() {
        let header = constant_header(&[("SEGMENT_LENGTH", 256), ("RADIX_BITS", 8)]);
        assert_eq!(
            header,
            "const SEGMENT_LENGTH: u32 = 256u;\nconst RADIX_BITS: u32 = 8u;\n"
        );
        assert!(constant_header(&[]).is_empty());
    }

    #[test]
    fn duplicate_binding_slot_rejected() {
        let Some((device, _queue)) = test_device() else {
            println!("no adapter available; skipping");
            return;
        };
        let buffer = storage_buffer(&device, "test.Data", 4);
        let result = KernelBuilder::new(&device, "test.DupSlot", COUNTER_SRC)
            .bind(0, BufferRole::Storage, &buffer)
            .bind(0, BufferRole::Storage, &buffer)
            .build();
        assert!(matches!(result, Err(ComputeError::Construction(_))));
    }

    #[test]
    fn role_conflicting_buffer_rejected() {
        let Some((device, _queue)) = test_device() else {
            println!("no adapter available; skipping");
            return;
        };
        let uniform = uniform_u32(&device, "test.Length", 4);
        let result = KernelBuilder::new(&device, "test.RoleConflict", COUNTER_SRC)
            .bind(0, BufferRole::Storage, &uniform)
            .build();
        assert!(matches!(result, Err(ComputeError::Construction(_))));

        let storage = storage_buffer(&device, "test.Data", 4);
        let result = KernelBuilder::new(&device, "test.RoleConflict", COUNTER_SRC)
            .bind(0, BufferRole::Uniform, &storage)
            .build();
        assert!(matches!(result, Err(ComputeError::Construction(_))));
    }

    #[test]
    fn duplicate_constant_rejected() {
        let Some((device, _queue)) = test_device() else {
            println!("no adapter available; skipping");
            return;
        };
        let buffer = storage_buffer(&device, "test.Data", 4);
        let result = KernelBuilder::new(&device, "test.DupConst", COUNTER_SRC)
            .bind(0, BufferRole::Storage, &buffer)
            .constant("SEGMENT_LENGTH", 64)
            .constant("SEGMENT_LENGTH", 128)
            .build();
        assert!(matches!(result, Err(ComputeError::Construction(_))));
    }

    #[test]
    fn invalid_source_reports_compile_error() {
        let Some((device, _queue)) = test_device() else {
            println!("no adapter available; skipping");
            return;
        };
        let buffer = storage_buffer(&device, "test.Data", 4);
        let result = KernelBuilder::new(&device, "test.BadSource", "this is not wgsl")
            .bind(0, BufferRole::Storage, &buffer)
            .build();
        assert!(matches!(result, Err(ComputeError::Compile(_))));
    }

    #[test]
    fn zero_workgroup_dispatch_rejected() {
        let Some((device, _queue)) = test_device() else {
            println!("no adapter available; skipping");
            return;
        };
        let buffer = storage_buffer(&device, "test.Data", 4);
        let kernel = KernelBuilder::new(&device, "test.ZeroDispatch", COUNTER_SRC)
            .bind(0, BufferRole::Storage, &buffer)
            .build()
            .unwrap();
        let mut encoder =
            device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
        match kernel.dispatch(&mut encoder, 0, 1, 1) {
            Err(ComputeError::DispatchSize(msg)) => assert!(msg.contains(kernel.label())),
            other => panic!("expected a dispatch size error, got {other:?}"),
        }
    }
}
