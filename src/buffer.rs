//! Device-resident memory regions.

use std::sync::{Arc, Mutex};

use ocl_core as cl;

use crate::compute;
use crate::device::Device;
use crate::error::Result;

/// How a [`Buffer`] may be accessed from kernel code.
///
/// Mirrors the subset of `cl_mem_flags` the runtime exposes; mirrors
/// `ReadOnly`/`ReadWrite`/`WriteOnly` one-for-one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessFlags {
    ReadOnly,
    ReadWrite,
    WriteOnly,
}

impl AccessFlags {
    fn to_mem_flags(self) -> cl::MemFlags {
        match self {
            AccessFlags::ReadOnly => cl::MemFlags::READ_ONLY,
            AccessFlags::ReadWrite => cl::MemFlags::READ_WRITE,
            AccessFlags::WriteOnly => cl::MemFlags::WRITE_ONLY,
        }
    }
}

/// A device-resident memory region of a known byte size.
///
/// Created against one [`Device`] and reachable from that device's
/// kernels, the task that created it, and any closure that captured it.
/// `copy_from`/`copy_to` are implemented via map/memcpy/unmap on the
/// owning device's queue rather than `clEnqueueRead/WriteBuffer`: on
/// integrated devices the map path is zero-copy, and the runtime picks it
/// uniformly rather than special-casing device kinds.
pub struct Buffer {
    device: Arc<Device>,
    size: usize,
    mem: Mutex<cl::Mem>,
}

impl Buffer {
    /// Allocates `size` bytes on `device` with the given access flags.
    pub fn new(device: Arc<Device>, flags: AccessFlags, size: usize) -> Result<Buffer> {
        let mem = device.cl_context(|context| {
            compute::create_buffer::<u8>(context, flags.to_mem_flags(), size)
        })?;

        Ok(Buffer { device, size, mem: Mutex::new(mem) })
    }

    /// The byte size this buffer was allocated with.
    pub fn size(&self) -> usize {
        self.size
    }

    /// The device this buffer lives on.
    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    /// Copies `min(self.size(), host.len())` bytes from `host` into the
    /// device memory.
    pub fn copy_from(&self, host: &[u8]) -> Result<()> {
        let mem = self.mem.lock().unwrap();
        let len = self.size.min(host.len());

        self.device.cl_queue(|queue| unsafe {
            let mut mapped =
                compute::map_buffer::<u8>(queue, &mem, cl::MapFlags::WRITE, 0, len)?;
            mapped[..len].copy_from_slice(&host[..len]);
            compute::unmap(queue, &mem, &mapped)
        })
    }

    /// Copies `min(self.size(), host.len())` bytes from the device memory
    /// into `host`, then blocks until the copy has completed.
    pub fn copy_to(&self, host: &mut [u8]) -> Result<()> {
        let mem = self.mem.lock().unwrap();
        let len = self.size.min(host.len());

        self.device.cl_queue(|queue| {
            let mapped =
                unsafe { compute::map_buffer::<u8>(queue, &mem, cl::MapFlags::READ, 0, len) }?;
            host[..len].copy_from_slice(&mapped[..len]);
            compute::unmap(queue, &mem, &mapped)?;
            compute::finish(queue)
        })
    }

    /// Calls `f` with the raw memory object, holding this buffer's mutex
    /// for the duration of the call. Used by [`Kernel::set_arg`] to bind a
    /// buffer argument without exposing `cl::Mem` outside the crate.
    pub(crate) fn cl_mem<R>(&self, f: impl FnOnce(&cl::Mem) -> R) -> R {
        let mem = self.mem.lock().unwrap();
        f(&mem)
    }
}

impl std::fmt::Debug for Buffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Buffer")
            .field("device", &self.device.id())
            .field("size", &self.size)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_flags_map_to_distinct_mem_flags() {
        assert_eq!(AccessFlags::ReadOnly.to_mem_flags(), cl::MemFlags::READ_ONLY);
        assert_eq!(AccessFlags::ReadWrite.to_mem_flags(), cl::MemFlags::READ_WRITE);
        assert_eq!(AccessFlags::WriteOnly.to_mem_flags(), cl::MemFlags::WRITE_ONLY);
    }
}
