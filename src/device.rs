//! A single physical compute device and the context/queue pair built over
//! it.

use std::sync::Mutex;

use ocl_core as cl;

use crate::compute;
use crate::error::Result;

/// The coarse device category this runtime schedules against.
///
/// Mirrors `ocl_core::DeviceType`'s bitflags but narrowed to the three
/// kinds a [`Task`](crate::task::Task)'s [`Hint`](crate::task::Hint) can
/// target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceType {
    Cpu,
    Gpu,
    Accelerator,
}

impl DeviceType {
    fn from_raw(raw: cl::DeviceType) -> DeviceType {
        if raw.contains(cl::DeviceType::GPU) {
            DeviceType::Gpu
        } else if raw.contains(cl::DeviceType::ACCELERATOR) {
            DeviceType::Accelerator
        } else {
            DeviceType::Cpu
        }
    }
}

struct Handles {
    device: cl::DeviceId,
    context: cl::Context,
    queue: cl::CommandQueue,
}

/// One physical compute unit with its own context and command queue.
///
/// The device id, context and queue are reachable only through the
/// scoped-callback accessors ([`Device::cl_device`], [`Device::cl_context`],
/// [`Device::cl_queue`]); each acquires an internal mutex for the duration
/// of the callback so that a `Buffer`, a `Kernel`, and this device's
/// `Worker` can all safely reach into the same handles from different
/// threads.
pub struct Device {
    id: usize,
    kind: DeviceType,
    name: String,
    handles: Mutex<Handles>,
}

impl Device {
    /// Builds a context and a queue over `raw`, recording it as device
    /// number `id` in the enumeration order. `queue_properties` is passed
    /// straight through to the underlying command queue; `None` gets the
    /// in-order default.
    pub(crate) fn new(
        raw: &compute::RawDevice,
        id: usize,
        queue_properties: Option<cl::CommandQueueProperties>,
    ) -> Result<Device> {
        let context = compute::create_context(&raw.platform, &raw.id)?;
        let queue = compute::create_queue(&context, &raw.id, queue_properties)?;

        Ok(Device {
            id,
            kind: DeviceType::from_raw(raw.kind),
            name: raw.name.clone(),
            handles: Mutex::new(Handles { device: raw.id, context, queue }),
        })
    }

    /// This device's position in the runtime's enumeration order. Stable
    /// for the lifetime of the owning [`Runtime`](crate::runtime::Runtime).
    pub fn id(&self) -> usize {
        self.id
    }

    /// The device's category, as classified at construction time.
    pub fn kind(&self) -> DeviceType {
        self.kind
    }

    /// The vendor-reported device name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Calls `f` with the raw device id, holding this device's mutex for
    /// the duration of the call.
    pub(crate) fn cl_device<R>(&self, f: impl FnOnce(&cl::DeviceId) -> R) -> R {
        let handles = self.handles.lock().unwrap();
        f(&handles.device)
    }

    /// Calls `f` with the device's context, holding this device's mutex
    /// for the duration of the call.
    pub(crate) fn cl_context<R>(&self, f: impl FnOnce(&cl::Context) -> R) -> R {
        let handles = self.handles.lock().unwrap();
        f(&handles.context)
    }

    /// Calls `f` with the device's command queue, holding this device's
    /// mutex for the duration of the call.
    pub(crate) fn cl_queue<R>(&self, f: impl FnOnce(&cl::CommandQueue) -> R) -> R {
        let handles = self.handles.lock().unwrap();
        f(&handles.queue)
    }
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("name", &self.name)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_gpu_over_accelerator_over_cpu() {
        assert_eq!(DeviceType::from_raw(cl::DeviceType::GPU), DeviceType::Gpu);
        assert_eq!(
            DeviceType::from_raw(cl::DeviceType::ACCELERATOR),
            DeviceType::Accelerator
        );
        assert_eq!(DeviceType::from_raw(cl::DeviceType::CPU), DeviceType::Cpu);
        assert_eq!(DeviceType::from_raw(cl::DeviceType::DEFAULT), DeviceType::Cpu);
    }
}
