//! Kernel handles and their bound arguments.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use ocl_core as cl;
use ocl_core::ArgVal;

use crate::buffer::Buffer;
use crate::compute;
use crate::error::Result;
use crate::program::Program;

/// A primitive value that can be bound to a kernel argument slot without
/// the caller needing to know the argument's exact Rust type ahead of
/// time.
///
/// Exists for callers assembling argument lists dynamically (from a
/// parsed task description, say) where the concrete primitive type is
/// only known at runtime.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ExtraArgument {
    Char(i8),
    Int(i32),
    UChar(u8),
    Float(f32),
    Short(i16),
}

struct State {
    per_device: Vec<cl::Kernel>,
    offset: usize,
    work_size: usize,
    buffers: HashMap<u32, Arc<Buffer>>,
}

/// One named entry point of a [`Program`], instantiated once per device.
///
/// Setting a buffer argument binds only the handle belonging to that
/// buffer's own device, since a `cl_mem` is only valid within the context
/// it was allocated from. Setting a primitive argument binds every
/// per-device handle at once, since scalars have no device affinity.
pub struct Kernel {
    state: Mutex<State>,
}

impl Kernel {
    /// Creates a handle to the entry point named `name` on every device
    /// `program` was compiled for.
    pub fn new(name: &str, program: &Program, device_count: usize) -> Result<Kernel> {
        let per_device = program.cl_programs(|programs| {
            (0..device_count)
                .map(|device_id| compute::create_kernel(&programs[device_id], name))
                .collect::<Result<Vec<_>>>()
        })?;

        Ok(Kernel {
            state: Mutex::new(State {
                per_device,
                offset: 0,
                work_size: 1,
                buffers: HashMap::new(),
            }),
        })
    }

    /// Sets the one-dimensional execution range `[offset, offset +
    /// work_size)` this kernel will be enqueued over.
    pub fn set_work_range(&self, offset: usize, work_size: usize) -> &Kernel {
        let mut state = self.state.lock().unwrap();
        state.offset = offset;
        state.work_size = work_size;
        self
    }

    /// The currently configured work-range offset.
    pub fn offset(&self) -> usize {
        self.state.lock().unwrap().offset
    }

    /// The currently configured work-range size.
    pub fn work_size(&self) -> usize {
        self.state.lock().unwrap().work_size
    }

    /// Binds `buffer` to argument slot `arg_index`, on the handle for
    /// `buffer`'s own device only.
    pub fn set_buffer_arg(&self, arg_index: u32, buffer: Arc<Buffer>) -> Result<&Kernel> {
        let mut state = self.state.lock().unwrap();
        let device_id = buffer.device().id();

        buffer.cl_mem(|mem| {
            compute::set_kernel_arg(&state.per_device[device_id], arg_index, ArgVal::mem(mem))
        })?;

        state.buffers.insert(arg_index, buffer);
        Ok(self)
    }

    /// Binds `value` to argument slot `arg_index` on every per-device
    /// handle. Clears any buffer previously bound at that slot.
    pub fn set_primitive_arg<T: cl::OclPrm>(&self, arg_index: u32, value: T) -> Result<&Kernel> {
        let mut state = self.state.lock().unwrap();
        for kernel in &state.per_device {
            compute::set_kernel_arg(kernel, arg_index, ArgVal::scalar(&value))?;
        }
        state.buffers.remove(&arg_index);
        Ok(self)
    }

    /// Binds `value` to argument slot `arg_index`, dispatching on its
    /// variant to the matching [`Kernel::set_primitive_arg`] instantiation.
    pub fn set_extra_arg(&self, arg_index: u32, value: ExtraArgument) -> Result<&Kernel> {
        match value {
            ExtraArgument::Char(v) => self.set_primitive_arg(arg_index, v),
            ExtraArgument::Int(v) => self.set_primitive_arg(arg_index, v),
            ExtraArgument::UChar(v) => self.set_primitive_arg(arg_index, v),
            ExtraArgument::Float(v) => self.set_primitive_arg(arg_index, v),
            ExtraArgument::Short(v) => self.set_primitive_arg(arg_index, v),
        }
    }

    /// The buffer currently bound at `arg_index`, if the last argument set
    /// there was a buffer rather than a primitive.
    pub fn buffer(&self, arg_index: u32) -> Option<Arc<Buffer>> {
        self.state.lock().unwrap().buffers.get(&arg_index).cloned()
    }

    /// Calls `f` with the per-device kernel handle for `device_id`,
    /// holding this kernel's mutex for the duration of the call.
    pub(crate) fn cl_kernel<R>(&self, device_id: usize, f: impl FnOnce(&cl::Kernel) -> R) -> R {
        let state = self.state.lock().unwrap();
        f(&state.per_device[device_id])
    }
}

impl std::fmt::Debug for Kernel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock().unwrap();
        f.debug_struct("Kernel")
            .field("offset", &state.offset)
            .field("work_size", &state.work_size)
            .field("bound_buffers", &state.buffers.len())
            .finish()
    }
}
