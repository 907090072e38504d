//! The interface between the tessellators and the GPU.
//!
//! The tessellators don't talk to a graphics API directly. They request buffer space from a
//! [Device], upload the records they staged on the CPU with [Device::write] and issue their draws
//! through it. This keeps buffer management (pooling, mapping, ring buffers...) on the side of
//! the renderer.
//!
//! [RecordingDevice] is an implementation that keeps everything in memory. It is useful for
//! testing and for looking at what the tessellators produce.
//!
//! # Allocation model
//!
//! Allocations are counted in records of a given stride. A [BufferSlice] gives the buffer the
//! records live in, the index of the first record (which is also the base instance or base vertex
//! to draw them with) and the number of records available. Records can be given back with the
//! `put_back_*` methods, most recent first, like popping from a stack.

use crate::records::{DrawIndirectCommand, StrokeInstance, StrokePatch};
use std::mem::size_of;

/// Identifies a device buffer.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(pub u32);

/// A range of records in a device buffer.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct BufferSlice {
    pub buffer: BufferId,
    /// Index of the first record in the buffer.
    pub offset: u32,
    /// Number of records in the slice.
    pub count: u32,
}

pub trait Device {
    /// Allocates space for `max_count` indirect draw commands.
    fn allocate_indirect_commands(&mut self, max_count: u32) -> Option<BufferSlice>;

    /// Gives back the last `count` commands of the most recent indirect command allocation.
    fn put_back_indirect_commands(&mut self, count: u32);

    /// Allocates space for exactly `count` records of `stride` bytes.
    fn allocate_vertices(&mut self, stride: usize, count: u32) -> Option<BufferSlice>;

    /// Allocates space for at least `min_count` and ideally `preferred_count` records of `stride`
    /// bytes.
    ///
    /// The count of the returned slice is the actual capacity.
    fn allocate_vertices_at_least(
        &mut self,
        stride: usize,
        min_count: u32,
        preferred_count: u32,
    ) -> Option<BufferSlice>;

    /// Gives back the last `count` records of vertex space.
    ///
    /// The records are taken from the most recent allocation first and may span several
    /// allocations.
    fn put_back_vertices(&mut self, stride: usize, count: u32);

    /// Uploads bytes at an offset into a buffer.
    fn write(&mut self, buffer: BufferId, byte_offset: usize, bytes: &[u8]);

    fn bind_buffers(&mut self, instance_buffer: Option<BufferId>, vertex_buffer: Option<BufferId>);

    /// Draws `count` indirect commands starting at command `offset` of `buffer`.
    fn draw_indirect(&mut self, buffer: BufferId, offset: u32, count: u32);

    fn draw(&mut self, vertex_count: u32, base_vertex: u32);
}

/// A draw recorded by [RecordingDevice], with the buffers that were bound at the time.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum DrawCall {
    Indirect {
        instance_buffer: Option<BufferId>,
        buffer: BufferId,
        offset: u32,
        count: u32,
    },
    Direct {
        vertex_buffer: Option<BufferId>,
        vertex_count: u32,
        base_vertex: u32,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum BufferKind {
    IndirectCommands,
    Vertices,
}

#[derive(Clone, Debug)]
struct RecordedBuffer {
    kind: BufferKind,
    stride: usize,
    bytes: Vec<u8>,
}

/// A [Device] that records everything in memory.
///
/// Every allocation gets its own buffer, so the offset of every slice is zero. Allocations fail
/// once the total size of the buffers would exceed the byte budget, if any.
#[derive(Clone, Debug, Default)]
pub struct RecordingDevice {
    buffers: Vec<RecordedBuffer>,
    draw_calls: Vec<DrawCall>,
    bound_instances: Option<BufferId>,
    bound_vertices: Option<BufferId>,
    budget: Option<usize>,
}

impl RecordingDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes allocations fail once the device holds more than `bytes` bytes.
    pub fn with_byte_budget(bytes: usize) -> Self {
        RecordingDevice {
            budget: Some(bytes),
            ..Self::default()
        }
    }

    pub fn draw_calls(&self) -> &[DrawCall] {
        &self.draw_calls
    }

    pub fn clear_draw_calls(&mut self) {
        self.draw_calls.clear();
    }

    /// Number of bytes currently allocated.
    pub fn allocated_bytes(&self) -> usize {
        self.buffers.iter().map(|b| b.bytes.len()).sum()
    }

    pub fn buffer_count(&self) -> usize {
        self.buffers.len()
    }

    /// The raw content of a buffer.
    pub fn buffer_bytes(&self, buffer: BufferId) -> &[u8] {
        &self.buffers[buffer.0 as usize].bytes
    }

    pub fn indirect_commands(&self, buffer: BufferId) -> Vec<DrawIndirectCommand> {
        self.decode(buffer)
    }

    pub fn stroke_instances(&self, buffer: BufferId) -> Vec<StrokeInstance> {
        self.decode(buffer)
    }

    pub fn stroke_patches(&self, buffer: BufferId) -> Vec<StrokePatch> {
        self.decode(buffer)
    }

    /// Every stroke instance drawn by the recorded indirect draws, in draw order.
    pub fn drawn_instances(&self) -> Vec<StrokeInstance> {
        let mut result = Vec::new();
        for call in &self.draw_calls {
            if let DrawCall::Indirect {
                instance_buffer: Some(instance_buffer),
                buffer,
                offset,
                count,
            } = *call
            {
                let commands = self.indirect_commands(buffer);
                let instances = self.stroke_instances(instance_buffer);
                let start = offset as usize;
                for cmd in &commands[start..start + count as usize] {
                    let first = cmd.base_instance as usize;
                    let last = first + cmd.instance_count as usize;
                    result.extend_from_slice(&instances[first..last]);
                }
            }
        }

        result
    }

    /// Every stroke patch drawn by the recorded direct draws, in draw order.
    pub fn drawn_patches(&self) -> Vec<StrokePatch> {
        let mut result = Vec::new();
        for call in &self.draw_calls {
            if let DrawCall::Direct {
                vertex_buffer: Some(vertex_buffer),
                vertex_count,
                base_vertex,
            } = *call
            {
                let patches = self.stroke_patches(vertex_buffer);
                let first = base_vertex as usize;
                result.extend_from_slice(&patches[first..first + vertex_count as usize]);
            }
        }

        result
    }

    fn decode<T: bytemuck::Pod>(&self, buffer: BufferId) -> Vec<T> {
        self.buffer_bytes(buffer)
            .chunks_exact(size_of::<T>())
            .map(bytemuck::pod_read_unaligned)
            .collect()
    }

    fn allocate(&mut self, kind: BufferKind, stride: usize, count: u32) -> Option<BufferSlice> {
        let size = stride * count as usize;
        if let Some(budget) = self.budget {
            if self.allocated_bytes() + size > budget {
                return None;
            }
        }

        let buffer = BufferId(self.buffers.len() as u32);
        self.buffers.push(RecordedBuffer {
            kind,
            stride,
            bytes: vec![0; size],
        });

        Some(BufferSlice {
            buffer,
            offset: 0,
            count,
        })
    }

    fn put_back(&mut self, kind: BufferKind, stride: usize, count: u32) {
        let mut size = stride * count as usize;
        for buffer in self.buffers.iter_mut().rev().filter(|b| b.kind == kind) {
            if size == 0 {
                break;
            }
            debug_assert_eq!(buffer.stride, stride);
            let n = size.min(buffer.bytes.len());
            let len = buffer.bytes.len() - n;
            buffer.bytes.truncate(len);
            size -= n;
        }
        debug_assert_eq!(size, 0, "putting back more than was allocated");
    }
}

impl Device for RecordingDevice {
    fn allocate_indirect_commands(&mut self, max_count: u32) -> Option<BufferSlice> {
        self.allocate(
            BufferKind::IndirectCommands,
            size_of::<DrawIndirectCommand>(),
            max_count,
        )
    }

    fn put_back_indirect_commands(&mut self, count: u32) {
        self.put_back(
            BufferKind::IndirectCommands,
            size_of::<DrawIndirectCommand>(),
            count,
        );
    }

    fn allocate_vertices(&mut self, stride: usize, count: u32) -> Option<BufferSlice> {
        self.allocate(BufferKind::Vertices, stride, count)
    }

    fn allocate_vertices_at_least(
        &mut self,
        stride: usize,
        min_count: u32,
        preferred_count: u32,
    ) -> Option<BufferSlice> {
        let preferred_count = preferred_count.max(min_count);
        self.allocate(BufferKind::Vertices, stride, preferred_count)
            .or_else(|| self.allocate(BufferKind::Vertices, stride, min_count))
    }

    fn put_back_vertices(&mut self, stride: usize, count: u32) {
        self.put_back(BufferKind::Vertices, stride, count);
    }

    fn write(&mut self, buffer: BufferId, byte_offset: usize, bytes: &[u8]) {
        let dst = &mut self.buffers[buffer.0 as usize].bytes;
        dst[byte_offset..byte_offset + bytes.len()].copy_from_slice(bytes);
    }

    fn bind_buffers(&mut self, instance_buffer: Option<BufferId>, vertex_buffer: Option<BufferId>) {
        self.bound_instances = instance_buffer;
        self.bound_vertices = vertex_buffer;
    }

    fn draw_indirect(&mut self, buffer: BufferId, offset: u32, count: u32) {
        self.draw_calls.push(DrawCall::Indirect {
            instance_buffer: self.bound_instances,
            buffer,
            offset,
            count,
        });
    }

    fn draw(&mut self, vertex_count: u32, base_vertex: u32) {
        self.draw_calls.push(DrawCall::Direct {
            vertex_buffer: self.bound_vertices,
            vertex_count,
            base_vertex,
        });
    }
}

#[test]
fn recording_device_allocations() {
    let mut device = RecordingDevice::new();
    let cmds = device.allocate_indirect_commands(4).unwrap();
    assert_eq!(cmds.count, 4);
    assert_eq!(device.allocated_bytes(), 64);

    device.put_back_indirect_commands(3);
    assert_eq!(device.allocated_bytes(), 16);

    let cmd = DrawIndirectCommand {
        vertex_count: 6,
        instance_count: 2,
        base_vertex: 0,
        base_instance: 1,
    };
    device.write(cmds.buffer, 0, bytemuck::bytes_of(&cmd));
    assert_eq!(device.indirect_commands(cmds.buffer), vec![cmd]);

    let vertices = device.allocate_vertices_at_least(8, 2, 16).unwrap();
    assert_eq!(vertices.count, 16);
    assert_eq!(device.buffer_count(), 2);

    // Putting back spans allocations.
    device.allocate_vertices(8, 4).unwrap();
    device.put_back_vertices(8, 6);
    assert_eq!(device.allocated_bytes(), 16 + 14 * 8);

    device.bind_buffers(None, Some(vertices.buffer));
    device.draw(16, 0);
    assert_eq!(device.draw_calls().len(), 1);
    device.clear_draw_calls();
    assert!(device.draw_calls().is_empty());
}

#[test]
fn recording_device_budget() {
    let mut device = RecordingDevice::with_byte_budget(100);
    assert!(device.allocate_vertices(10, 20).is_none());
    // Falls back to the minimum count.
    let slice = device.allocate_vertices_at_least(10, 5, 20).unwrap();
    assert_eq!(slice.count, 5);
    assert!(device.allocate_indirect_commands(4).is_none());
    assert!(device.allocate_indirect_commands(3).is_some());
}
