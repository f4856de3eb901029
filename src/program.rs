//! Compiled kernel sources.

use std::sync::{Arc, Mutex};

use ocl_core as cl;

use crate::compute;
use crate::device::Device;
use crate::error::Result;

/// A source string compiled once against every [`Device`] in a
/// [`Runtime`](crate::runtime::Runtime).
///
/// Different devices may select different targets for the same source, so
/// the runtime never assumes one compiled binary is portable: each device
/// gets its own `create_program_with_source` + `build_program` pass,
/// indexed by that device's id. A [`Kernel`](crate::kernel::Kernel) later
/// picks the entry matching whichever device it is asked to run on. The
/// per-device handles are reachable only through [`Program::cl_programs`],
/// the same mutex-scoped-callback discipline `Device`, `Buffer` and
/// `Kernel` use for their own inner handles.
pub struct Program {
    per_device: Mutex<Vec<cl::Program>>,
}

impl Program {
    /// Compiles `source` against every device in `devices`, in order, with
    /// `options` passed to the compiler. Fails with `ProgramCompilation`
    /// carrying the build log of whichever device failed first.
    pub fn new(devices: &[Arc<Device>], source: &str, options: &str) -> Result<Program> {
        let mut per_device = Vec::with_capacity(devices.len());

        for device in devices {
            let program = device.cl_context(|context| {
                device.cl_device(|device_id| {
                    compute::build_program(context, std::slice::from_ref(device_id), source, options)
                })
            })?;
            per_device.push(program);
        }

        Ok(Program { per_device: Mutex::new(per_device) })
    }

    /// Calls `f` with the per-device compiled-program vector, holding this
    /// program's mutex for the duration of the call.
    pub(crate) fn cl_programs<R>(&self, f: impl FnOnce(&[cl::Program]) -> R) -> R {
        let programs = self.per_device.lock().unwrap();
        f(&programs)
    }

    /// Builds a `Program` with no compiled entries, for scheduler/task
    /// tests that exercise kernel-less bookkeeping and never touch a real
    /// device.
    #[cfg(test)]
    pub(crate) fn empty_for_test() -> Program {
        Program { per_device: Mutex::new(Vec::new()) }
    }
}

impl std::fmt::Debug for Program {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Program")
            .field("devices", &self.per_device.lock().unwrap().len())
            .finish()
    }
}
