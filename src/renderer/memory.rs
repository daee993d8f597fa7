use gfx_hal::{
    adapter::MemoryType, buffer, memory as m, prelude::*, Backend, Limits, MemoryTypeId,
};
use std::iter;
use std::mem::{self, ManuallyDrop};
use std::ptr;

use super::buffer::Buffer;
use crate::error::{gpu, RenderError, Result};

/// A buffer with its own CPU-visible allocation, filled once at creation.
pub struct Memory<'a, B: Backend> {
    pub buffer: ManuallyDrop<Buffer<'a, B>>,
    memory: ManuallyDrop<B::Memory>,
}

impl<'a, B: Backend> Memory<'a, B> {
    pub fn upload<T: Copy>(
        device: &'a B::Device,
        content: &[T],
        usage: buffer::Usage,
        limits: &Limits,
        memory_types: &[MemoryType],
    ) -> Result<Self> {
        let len = mem::size_of_val(content) as u64;
        let mut buffer = Buffer::new(device, len, usage, limits)?;
        let memory = Self::fill(&mut buffer, content, memory_types)?;
        Ok(Memory {
            buffer: ManuallyDrop::new(buffer),
            memory,
        })
    }

    fn fill<T: Copy>(
        buffer: &mut Buffer<'a, B>,
        content: &[T],
        memory_types: &[MemoryType],
    ) -> Result<ManuallyDrop<B::Memory>> {
        let device = buffer.device;
        unsafe {
            let buffer_req = device.get_buffer_requirements(&buffer.buf);
            let memory_type = upload_type(memory_types, buffer_req.type_mask as u64)
                .ok_or(RenderError::NoUploadMemoryType)?;
            let memory = device
                .allocate_memory(memory_type, buffer_req.size)
                .map_err(gpu("allocate upload memory"))?;
            if let Err(err) = Self::write(device, &memory, &mut buffer.buf, content, buffer.len) {
                device.free_memory(memory);
                return Err(err);
            }
            Ok(ManuallyDrop::new(memory))
        }
    }

    unsafe fn write<T: Copy>(
        device: &B::Device,
        memory: &B::Memory,
        buf: &mut B::Buffer,
        content: &[T],
        len: u64,
    ) -> Result<()> {
        device
            .bind_buffer_memory(memory, 0, buf)
            .map_err(gpu("bind buffer memory"))?;
        let mapping = device
            .map_memory(memory, m::Segment::ALL)
            .map_err(gpu("map memory"))?;
        ptr::copy_nonoverlapping(content.as_ptr() as *const u8, mapping, len as usize);
        let flushed = device
            .flush_mapped_memory_ranges(iter::once((memory, m::Segment::ALL)))
            .map_err(gpu("flush mapped memory"));
        device.unmap_memory(memory);
        flushed
    }
}

/// First memory type allowed by `type_mask` that the CPU can write.
fn upload_type(properties: &[MemoryType], type_mask: u64) -> Option<MemoryTypeId> {
    properties
        .iter()
        .enumerate()
        .position(|(id, mem_type)| {
            type_mask & (1 << id) != 0 && mem_type.properties.contains(m::Properties::CPU_VISIBLE)
        })
        .map(MemoryTypeId::from)
}

impl<'a, B: Backend> Drop for Memory<'a, B> {
    fn drop(&mut self) {
        unsafe {
            let device = self.buffer.device;
            ManuallyDrop::drop(&mut self.buffer);
            device.free_memory(ManuallyDrop::into_inner(ptr::read(&self.memory)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mem_type(properties: m::Properties) -> MemoryType {
        MemoryType {
            properties,
            heap_index: 0,
        }
    }

    #[test]
    fn picks_first_cpu_visible_type_in_mask() {
        let types = [
            mem_type(m::Properties::DEVICE_LOCAL),
            mem_type(m::Properties::CPU_VISIBLE | m::Properties::COHERENT),
            mem_type(m::Properties::CPU_VISIBLE),
        ];
        assert_eq!(upload_type(&types, 0b111), Some(MemoryTypeId(1)));
        assert_eq!(upload_type(&types, 0b101), Some(MemoryTypeId(2)));
    }

    #[test]
    fn no_type_when_mask_excludes_cpu_visible() {
        let types = [
            mem_type(m::Properties::DEVICE_LOCAL),
            mem_type(m::Properties::CPU_VISIBLE),
        ];
        assert_eq!(upload_type(&types, 0b01), None);
    }
}
