use gfx_hal::{buffer, prelude::*, Backend, Limits};
use std::mem::ManuallyDrop;
use std::ptr;

use crate::error::{gpu, RenderError, Result};

pub struct Buffer<'a, B: Backend> {
    pub device: &'a B::Device,
    pub buf: ManuallyDrop<B::Buffer>,
    /// Bytes of content, before padding.
    pub len: u64,
}

impl<'a, B: Backend> Buffer<'a, B> {
    pub fn new(
        device: &'a B::Device,
        len: u64,
        usage: buffer::Usage,
        limits: &Limits,
    ) -> Result<Self> {
        if len == 0 {
            return Err(RenderError::EmptyBuffer);
        }
        let memory_size = padded_len(len, limits.non_coherent_atom_size as u64);
        let buf = unsafe { device.create_buffer(memory_size, usage) }
            .map_err(gpu("create buffer"))?;

        Ok(Buffer {
            device,
            buf: ManuallyDrop::new(buf),
            len,
        })
    }
}

/// Rounds `len` up to a whole number of non-coherent atoms so flushes stay
/// in bounds.
pub fn padded_len(len: u64, atom: u64) -> u64 {
    if atom <= 1 {
        return len;
    }
    ((len + atom - 1) / atom) * atom
}

impl<'a, B: Backend> Drop for Buffer<'a, B> {
    fn drop(&mut self) {
        unsafe {
            self.device
                .destroy_buffer(ManuallyDrop::into_inner(ptr::read(&self.buf)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::padded_len;

    #[test]
    fn pads_to_atom_multiples() {
        assert_eq!(padded_len(112, 64), 128);
        assert_eq!(padded_len(128, 64), 128);
        assert_eq!(padded_len(12, 256), 256);
    }

    #[test]
    fn unit_atom_keeps_length() {
        assert_eq!(padded_len(112, 1), 112);
        assert_eq!(padded_len(112, 0), 112);
    }
}
