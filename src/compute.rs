//! The thin façade over [`ocl_core`] that the rest of this crate is built
//! on. Nothing above this module talks to `ocl_core` directly; `compute`
//! simply renames and narrows its functions to the handful this runtime
//! actually needs, and translates its `OclCoreResult` into this crate's
//! own [`Result`](crate::error::Result).
//!
//! `ocl_core` links against the platform's ICD loader at process start
//! rather than exposing a dynamic-load call the way the original runtime's
//! host API did; [`load`] models that contract as an idempotent, refcounted
//! probe instead (see its own doc comment) and [`enumerate_devices`] does
//! the actual platform/device discovery.

use std::ffi::CString;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

use ocl_core as cl;
use ocl_core::{
    ArgVal, CommandQueueProperties, ContextProperties, DeviceInfo, DeviceInfoResult, DeviceType,
    Kernel as KernelCore, MapFlags, MemFlags, OclPrm, Program as ProgramCore, ProgramBuildInfo,
    ProgramBuildInfoResult,
};

use crate::error::{Error, Result};

/// Process-wide reference count standing in for the original runtime's
/// dynamic `load()`/`close()` pair.
///
/// `ocl_core` links against the platform's ICD loader at process start
/// rather than exposing an explicit dynamic-load call, so there is nothing
/// to actually load here; what the original contract needs preserved is
/// the idempotent, refcounted *lifecycle*, so that constructing several
/// [`Runtime`](crate::runtime::Runtime)s in one process is well-defined and
/// none of them tears down shared state out from under another.
static LOAD_REFCOUNT: AtomicUsize = AtomicUsize::new(0);

/// Binds the device-compute library for the calling `Runtime`, incrementing
/// the process-wide refcount. Returns `false` (matching the boolean
/// `load()` contract) only if platform enumeration itself fails, in which
/// case the caller should surface `RuntimeConstructionError`.
pub fn load() -> bool {
    if cl::get_platform_ids().is_err() {
        return false;
    }
    LOAD_REFCOUNT.fetch_add(1, Ordering::SeqCst);
    true
}

/// Releases one `Runtime`'s hold on the device-compute library. The
/// underlying ICD loader is never actually unloaded from the process (it
/// has no unload hook); this only keeps the refcount accurate so it can be
/// inspected (e.g. in tests asserting `Runtime` drop behavior).
pub fn unload() {
    LOAD_REFCOUNT.fetch_sub(1, Ordering::SeqCst);
}

/// Current number of live `Runtime`s holding the device-compute library.
#[cfg(test)]
pub(crate) fn load_refcount() -> usize {
    LOAD_REFCOUNT.load(Ordering::SeqCst)
}

/// A platform/device pair as returned by [`enumerate_devices`].
///
/// `ocl_core` keeps platforms and devices as opaque ids; this struct is
/// the smallest amount of bookkeeping needed to later build a context and
/// a queue for one specific device.
#[derive(Clone)]
pub struct RawDevice {
    pub platform: cl::PlatformId,
    pub id: cl::DeviceId,
    pub name: String,
    pub kind: cl::DeviceType,
}

impl fmt::Debug for RawDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawDevice")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish()
    }
}

/// Enumerates every device on every platform the ICD loader knows about.
///
/// Mirrors the original runtime's device discovery: it never filters by
/// type itself, leaving that decision to [`Device`](crate::device::Device)
/// construction.
pub fn enumerate_devices() -> Result<Vec<RawDevice>> {
    let platforms = cl::get_platform_ids().map_err(Error::runtime_construction)?;

    let mut devices = Vec::new();
    for platform in platforms {
        let ids = cl::get_device_ids(&platform, Some(DeviceType::ALL), None)
            .map_err(Error::runtime_construction)?;

        for id in ids {
            let name = match cl::get_device_info(&id, DeviceInfo::Name) {
                Ok(DeviceInfoResult::Name(name)) => name,
                _ => String::from("unknown device"),
            };
            let kind = match cl::get_device_info(&id, DeviceInfo::Type) {
                Ok(DeviceInfoResult::Type(t)) => t,
                _ => DeviceType::DEFAULT,
            };

            devices.push(RawDevice { platform, id, name, kind });
        }
    }

    Ok(devices)
}

/// Creates a single-device context.
pub fn create_context(platform: &cl::PlatformId, device: &cl::DeviceId) -> Result<cl::Context> {
    let props = ContextProperties::new().platform(*platform);
    cl::create_context(Some(&props), &[*device], None, None).map_err(Error::device_construction)
}

/// Creates a command queue for `device` within `context`.
///
/// `properties` defaults to in-order execution when `None`: kernel
/// ordering within a [`Task`](crate::task::Task) is otherwise the
/// caller's responsibility, enforced by submitting kernels to the queue in
/// sequence. Passing `CommandQueueProperties::OUT_OF_ORDER_EXEC_MODE_ENABLE`
/// opts a device out of that guarantee.
pub fn create_queue(
    context: &cl::Context,
    device: &cl::DeviceId,
    properties: Option<CommandQueueProperties>,
) -> Result<cl::CommandQueue> {
    cl::create_command_queue(context, device, properties).map_err(Error::device_construction)
}

/// Allocates a device buffer of `len` elements of `T`, uninitialized.
pub fn create_buffer<T: OclPrm>(
    context: &cl::Context,
    flags: MemFlags,
    len: usize,
) -> Result<cl::Mem> {
    unsafe { cl::create_buffer::<_, T>(context, flags, len, None) }
        .map_err(Error::buffer_construction)
}

/// Compiles `source` for every device in `devices`, returning the build
/// log (from the first device that failed) as an error on failure.
pub fn build_program(
    context: &cl::Context,
    devices: &[cl::DeviceId],
    source: &str,
    options: &str,
) -> Result<ProgramCore> {
    let src = CString::new(source).map_err(Error::program_compilation)?;
    let program =
        cl::create_program_with_source(context, &[src]).map_err(Error::program_compilation)?;

    let opts = CString::new(options).map_err(Error::program_compilation)?;
    if let Err(build_err) = cl::build_program(&program, Some(devices), &opts, None, None) {
        let mut log = build_err.to_string();
        for device in devices {
            if let Ok(ProgramBuildInfoResult::Log(device_log)) =
                cl::get_program_build_info(&program, device, ProgramBuildInfo::BuildLog)
            {
                if !device_log.trim().is_empty() {
                    log.push('\n');
                    log.push_str(&device_log);
                }
            }
        }
        return Err(Error::program_compilation(log));
    }

    Ok(program)
}

/// Creates a per-device kernel handle for the entry point named `name`.
pub fn create_kernel(program: &ProgramCore, name: &str) -> Result<KernelCore> {
    cl::create_kernel(program, name).map_err(Error::kernel_construction)
}

/// Binds a single argument slot of `kernel` to `value`.
pub fn set_kernel_arg(kernel: &KernelCore, index: u32, value: ArgVal) -> Result<()> {
    cl::set_kernel_arg(kernel, index, value).map_err(Error::kernel_argument)
}

/// Enqueues `kernel` over a one-dimensional range `[offset, offset +
/// global_size)`, optionally subdivided into work-groups of `local_size`.
///
/// # Safety
///
/// Caller must ensure every argument slot of `kernel` has been bound and
/// that no other thread enqueues work on `queue`'s device concurrently
/// with a command that could race with it; the runtime upholds the
/// second condition with a single global launch lock.
pub unsafe fn enqueue_ndrange(
    queue: &cl::CommandQueue,
    kernel: &KernelCore,
    offset: usize,
    global_size: usize,
    local_size: Option<usize>,
) -> Result<()> {
    let gwo = [offset, 0, 0];
    let gws = [global_size, 1, 1];
    let lws = local_size.map(|l| [l, 1, 1]);

    cl::enqueue_kernel(
        queue,
        kernel,
        1,
        Some(gwo),
        &gws,
        lws,
        None::<cl::Event>,
        None::<&mut cl::Event>,
    )
    .map_err(Error::worker_execution)
}

/// Maps `len` elements of `buffer`, starting at element `offset`, into
/// host address space and returns the mapped slice.
///
/// # Safety
///
/// The returned `MemMap` must be unmapped with [`unmap`] before `buffer`
/// is reused for a command that touches the same region.
pub unsafe fn map_buffer<T: OclPrm>(
    queue: &cl::CommandQueue,
    buffer: &cl::Mem,
    flags: MapFlags,
    offset: usize,
    len: usize,
) -> Result<cl::MemMap<T>> {
    cl::enqueue_map_buffer::<T, _, cl::Event, &mut cl::Event>(
        queue,
        buffer,
        true,
        flags,
        offset,
        len,
        None::<cl::Event>,
        None::<&mut cl::Event>,
    )
    .map_err(Error::buffer_map)
}

/// Unmaps a region previously mapped with [`map_buffer`].
pub fn unmap<T: OclPrm>(
    queue: &cl::CommandQueue,
    buffer: &cl::Mem,
    mapped: &cl::MemMap<T>,
) -> Result<()> {
    cl::enqueue_unmap_mem_object(
        queue,
        buffer,
        mapped,
        None::<cl::Event>,
        None::<&mut cl::Event>,
    )
    .map_err(Error::buffer_map)
}

/// Blocks until every command previously enqueued on `queue` has
/// completed.
pub fn finish(queue: &cl::CommandQueue) -> Result<()> {
    cl::finish(queue).map_err(Error::worker_execution)
}
