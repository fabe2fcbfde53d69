//! Growable GPU buffers
//!
//! Vertex and instance buffers grow geometrically: capacity is the next
//! power of two at or above the required byte size, never below 4 bytes.
//! Growing destroys the old buffer and allocates a fresh one, which means
//! callers must re-upload the full range after a grow; within capacity,
//! incremental `write` windows are cheap.

use chartgpu_shared::{ChartError, ChartResult};

/// Smallest capacity a buffer is ever created with.
pub const MIN_CAPACITY_BYTES: u64 = 4;

/// Round `required` up to the next power-of-two capacity.
pub fn next_capacity(required: u64) -> u64 {
    required.max(MIN_CAPACITY_BYTES).next_power_of_two()
}

pub struct GrowableBuffer {
    buffer: Option<wgpu::Buffer>,
    capacity: u64,
    used: u64,
    usage: wgpu::BufferUsages,
    label: String,
}

impl GrowableBuffer {
    pub fn new(usage: wgpu::BufferUsages, label: impl Into<String>) -> Self {
        Self {
            buffer: None,
            capacity: 0,
            used: 0,
            usage: usage | wgpu::BufferUsages::COPY_DST,
            label: label.into(),
        }
    }

    pub fn capacity_bytes(&self) -> u64 {
        self.capacity
    }

    pub fn used_bytes(&self) -> u64 {
        self.used
    }

    pub fn buffer(&self) -> Option<&wgpu::Buffer> {
        self.buffer.as_ref()
    }

    /// Make sure at least `required` bytes fit. Returns `true` when the
    /// buffer was (re)allocated, in which case any previous contents are
    /// gone and the caller must re-upload the full range.
    pub fn ensure_capacity(&mut self, device: &wgpu::Device, required: u64) -> bool {
        if required <= self.capacity && self.buffer.is_some() {
            return false;
        }
        let capacity = next_capacity(required);
        if let Some(old) = self.buffer.take() {
            old.destroy();
        }
        log::debug!("{}: grow to {} bytes", self.label, capacity);
        self.buffer = Some(device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(&self.label),
            size: capacity,
            usage: self.usage,
            mapped_at_creation: false,
        }));
        self.capacity = capacity;
        true
    }

    /// Write `data` at `offset`, growing first when needed. Returns `true`
    /// when the write forced a reallocation.
    pub fn write(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        offset: u64,
        data: &[u8],
    ) -> ChartResult<bool> {
        let end = offset
            .checked_add(data.len() as u64)
            .ok_or_else(|| ChartError::data("buffer write range overflow"))?;
        let grew = self.ensure_capacity(device, end);
        let buffer = self
            .buffer
            .as_ref()
            .ok_or_else(|| ChartError::data("buffer allocation failed"))?;
        if !data.is_empty() {
            queue.write_buffer(buffer, offset, data);
        }
        self.used = self.used.max(end);
        Ok(grew)
    }

    /// Replace the full contents.
    pub fn upload(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        data: &[u8],
    ) -> ChartResult<()> {
        self.used = 0;
        self.write(device, queue, 0, data)?;
        self.used = data.len() as u64;
        Ok(())
    }

    pub fn destroy(&mut self) {
        if let Some(buffer) = self.buffer.take() {
            buffer.destroy();
        }
        self.capacity = 0;
        self.used = 0;
    }
}

impl Drop for GrowableBuffer {
    fn drop(&mut self) {
        self.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_is_power_of_two_at_or_above_required() {
        for required in [1u64, 3, 4, 5, 100, 1024, 1025, 1_000_000] {
            let capacity = next_capacity(required);
            assert!(capacity >= required);
            assert!(capacity.is_power_of_two());
            // The previous power of two would not fit (above the minimum).
            if capacity > MIN_CAPACITY_BYTES {
                assert!(capacity / 2 < required);
            }
        }
    }

    #[test]
    fn capacity_is_always_word_aligned() {
        for required in 0..64u64 {
            assert_eq!(next_capacity(required) % 4, 0);
        }
    }

    #[test]
    fn minimum_capacity_is_four_bytes() {
        assert_eq!(next_capacity(0), MIN_CAPACITY_BYTES);
        assert_eq!(next_capacity(1), MIN_CAPACITY_BYTES);
    }
}
