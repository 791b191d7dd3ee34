//! Copy GPU buffer contents back to host memory.

use crate::error::{ComputeError, ComputeResult};

/// Read the first `element_count` u32 values out of `buffer`.
///
/// Stages the copy through a private MAP_READ buffer and blocks until the map
/// resolves, so the queue is fully drained when this returns.
pub fn read_buffer_u32(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    buffer: &wgpu::Buffer,
    element_count: u32,
) -> ComputeResult<Vec<u32>> {
    if element_count == 0 {
        return Ok(Vec::new());
    }
    let byte_len = u64::from(element_count) * 4;
    if byte_len > buffer.size() {
        return Err(ComputeError::readback(format!(
            "requested {byte_len} bytes from a {}-byte buffer",
            buffer.size()
        )));
    }

    let staging = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("pf.Readback.Staging"),
        size: byte_len,
        usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("pf.Readback.Encoder"),
    });
    encoder.copy_buffer_to_buffer(buffer, 0, &staging, 0, byte_len);
    queue.submit(Some(encoder.finish()));

    let slice = staging.slice(..);
    let (sender, receiver) = futures_intrusive::channel::shared::oneshot_channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = sender.send(result);
    });
    device.poll(wgpu::Maintain::Wait);
    match pollster::block_on(receiver.receive()) {
        Some(Ok(())) => {}
        Some(Err(e)) => {
            return Err(ComputeError::readback(format!("buffer map failed: {e}")));
        }
        None => {
            return Err(ComputeError::readback("buffer map callback dropped"));
        }
    }

    let view = slice.get_mapped_range();
    let data: Vec<u32> = bytemuck::cast_slice(&view).to_vec();
    drop(view);
    staging.unmap();
    Ok(data)
}
