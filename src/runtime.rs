//! The top-level handle applications construct: enumerates devices,
//! starts one worker per device, and hands out task submission.

use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use ocl_core::CommandQueueProperties;

use crate::compute;
use crate::device::Device;
use crate::error::{Error, Result};
use crate::host_runtime::{HostRuntimeToken, NullHostRuntime};
use crate::scheduler::{Fcfs, Scheduler};
use crate::task::Task;
use crate::worker::Worker;

/// Owns the whole device/scheduler/worker graph and is the only way an
/// application submits work.
///
/// Parameterized by the chosen [`Scheduler`] implementation, defaulting
/// to [`Fcfs`]; construct with [`Runtime::with_scheduler`] to use
/// [`Heft`](crate::scheduler::Heft) or a custom policy instead.
pub struct Runtime {
    devices: Vec<Arc<Device>>,
    scheduler: Arc<dyn Scheduler>,
    workers: Vec<Arc<Worker>>,
    drained: Arc<Condvar>,
    drained_lock: Mutex<()>,
}

impl Runtime {
    /// Enumerates every platform/device the system's OpenCL installation
    /// exposes, builds a [`Fcfs`] scheduler over them, and starts one
    /// worker per device with no host-runtime attach hook and in-order
    /// queues.
    pub fn new() -> Result<Runtime> {
        Runtime::with_scheduler(Arc::new(Fcfs::new()), Arc::new(NullHostRuntime))
    }

    /// Like [`Runtime::new`], but with an explicit scheduler and
    /// host-runtime attach hook. Queues are in-order; use
    /// [`RuntimeBuilder`] to change that.
    pub fn with_scheduler(
        scheduler: Arc<dyn Scheduler>,
        host_runtime: Arc<dyn HostRuntimeToken>,
    ) -> Result<Runtime> {
        RuntimeBuilder::new()
            .scheduler(scheduler)
            .host_runtime(host_runtime)
            .build()
    }

    fn build_with(
        scheduler: Arc<dyn Scheduler>,
        host_runtime: Arc<dyn HostRuntimeToken>,
        queue_properties: Option<CommandQueueProperties>,
    ) -> Result<Runtime> {
        if !compute::load() {
            return Err(Error::runtime_construction("failed to bind the OpenCL library"));
        }

        let raw_devices = match compute::enumerate_devices() {
            Ok(devices) => devices,
            Err(err) => {
                compute::unload();
                return Err(err);
            }
        };

        let mut devices = Vec::with_capacity(raw_devices.len());
        for (id, raw) in raw_devices.iter().enumerate() {
            match Device::new(raw, id, queue_properties) {
                Ok(device) => devices.push(Arc::new(device)),
                Err(err) => {
                    compute::unload();
                    return Err(err);
                }
            }
        }

        let workers: Vec<Arc<Worker>> =
            devices.iter().map(|device| Arc::new(Worker::new(device.clone()))).collect();

        let drained = Arc::new(Condvar::new());
        for worker in &workers {
            worker.run(scheduler.clone(), host_runtime.clone(), drained.clone());
        }

        Ok(Runtime { devices, scheduler, workers, drained, drained_lock: Mutex::new(()) })
    }

    /// The enumerated devices, in stable id order.
    pub fn devices(&self) -> &[Arc<Device>] {
        &self.devices
    }

    /// Pushes `task` into the scheduler and wakes every worker so
    /// whichever one it is assigned to notices right away. Never fails:
    /// errors that occur while the task later runs are reported through
    /// its own error sink, or logged, rather than returned here.
    pub fn submit_task(&self, task: Arc<Task>) {
        self.scheduler.push(task);
        for worker in &self.workers {
            worker.wake_up();
        }
    }

    /// Blocks until every submitted task has run its finish callback to
    /// completion.
    ///
    /// Rather than busy-spinning on `scheduler.has_work()`, this waits on
    /// a condition variable every worker notifies each time it goes
    /// idle — the transition most likely to coincide with the scheduler
    /// draining. Because that notification race is inherently best-effort
    /// (a worker can go idle and the scheduler can still briefly show
    /// work for another device), the wait is bounded and rechecks
    /// `has_work()` itself; the actual proof that every device is done
    /// comes from the `Worker::finish` idle-latch acquired below, which
    /// blocks until each worker's thread is provably back at its own
    /// condition variable.
    pub fn finish(&self) {
        let mut guard = self.drained_lock.lock().unwrap();
        while self.scheduler.has_work() {
            let (next_guard, _timeout) =
                self.drained.wait_timeout(guard, Duration::from_millis(1)).unwrap();
            guard = next_guard;
        }
        drop(guard);

        for worker in &self.workers {
            worker.finish();
        }
    }
}

/// Builds a [`Runtime`] with non-default construction-time knobs: an
/// explicit [`Scheduler`], a [`HostRuntimeToken`], and command queue
/// properties applied to every enumerated device.
///
/// Mirrors the teacher's own `*Builder` types (e.g. a pro-que builder that
/// accumulates optional fields and defers the fallible work to a final
/// `build()` call) rather than a long constructor argument list.
pub struct RuntimeBuilder {
    scheduler: Option<Arc<dyn Scheduler>>,
    host_runtime: Option<Arc<dyn HostRuntimeToken>>,
    queue_properties: Option<CommandQueueProperties>,
}

impl RuntimeBuilder {
    pub fn new() -> RuntimeBuilder {
        RuntimeBuilder { scheduler: None, host_runtime: None, queue_properties: None }
    }

    /// Sets the scheduling policy. Defaults to [`Fcfs`] if never called.
    pub fn scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> RuntimeBuilder {
        self.scheduler = Some(scheduler);
        self
    }

    /// Sets the host-runtime attach/detach hook. Defaults to
    /// [`NullHostRuntime`] if never called.
    pub fn host_runtime(mut self, host_runtime: Arc<dyn HostRuntimeToken>) -> RuntimeBuilder {
        self.host_runtime = Some(host_runtime);
        self
    }

    /// Sets the command queue properties used for every device's queue.
    /// Defaults to in-order execution (`None`) if never called.
    pub fn queue_properties(mut self, properties: CommandQueueProperties) -> RuntimeBuilder {
        self.queue_properties = Some(properties);
        self
    }

    /// Enumerates devices and constructs the `Runtime`, consuming the
    /// builder.
    pub fn build(self) -> Result<Runtime> {
        Runtime::build_with(
            self.scheduler.unwrap_or_else(|| Arc::new(Fcfs::new())),
            self.host_runtime.unwrap_or_else(|| Arc::new(NullHostRuntime)),
            self.queue_properties,
        )
    }
}

impl Default for RuntimeBuilder {
    fn default() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }
}

impl Drop for Runtime {
    /// Releases this `Runtime`'s hold on the device-compute library. The
    /// workers themselves join on their own `Drop` impl; this only
    /// balances the refcount incremented in [`Runtime::with_scheduler`].
    fn drop(&mut self) {
        compute::unload();
    }
}
