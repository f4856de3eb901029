//! One OS thread per [`Device`], pulling tasks from a [`Scheduler`] and
//! running them to completion.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};

use crate::compute;
use crate::device::Device;
use crate::error::Error;
use crate::host_runtime::HostRuntimeToken;
use crate::scheduler::Scheduler;
use crate::task::Task;

/// Guards every `enqueueNDRange` call across every device in the runtime.
///
/// A deliberate conservatism rather than a performance choice: some
/// vendor OpenCL drivers are not safe under concurrent kernel-launch
/// calls from independent command queues, so this runtime never issues
/// two launches at once regardless of which device they target.
static KERNEL_LAUNCH: Mutex<()> = Mutex::new(());

/// Pulls tasks assigned to one [`Device`] from a [`Scheduler`] and runs
/// them to completion, one at a time, on its own OS thread.
///
/// The thread sleeps on `work_cv` whenever the scheduler has nothing for
/// this device, and wakes on [`Worker::wake_up`] or when asked to stop.
/// `idle` is the latch proper: `true` whenever the thread is not in the
/// middle of [`Worker::execute_task`], `false` for the duration of one.
/// [`Worker::finish`] doesn't just acquire the `idle` mutex — a momentary
/// lock/unlock around `execute_task` would let it return while a task is
/// still mid-flight — it waits on `idle_cv` until `idle` actually reads
/// `true`, which the worker thread only signals once it is genuinely back
/// at its own wait point.
pub struct Worker {
    device: Arc<Device>,
    idle: Mutex<bool>,
    work_cv: Condvar,
    idle_cv: Condvar,
    kill: AtomicBool,
    running: AtomicBool,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Worker {
    /// Creates a worker bound to `device`. Call [`Worker::run`] to start
    /// its thread.
    pub fn new(device: Arc<Device>) -> Worker {
        Worker {
            device,
            idle: Mutex::new(true),
            work_cv: Condvar::new(),
            idle_cv: Condvar::new(),
            kill: AtomicBool::new(false),
            running: AtomicBool::new(false),
            handle: Mutex::new(None),
        }
    }

    /// Starts the worker's thread, bound to `scheduler` and an optional
    /// host-runtime attach/detach hook. `activity` is notified every time
    /// this worker goes idle, which is how
    /// [`Runtime::finish`](crate::runtime::Runtime::finish) learns the
    /// scheduler may have drained without polling it in a hot loop.
    /// Idempotent: a second call on an already-running worker does
    /// nothing.
    pub fn run(
        self: &Arc<Self>,
        scheduler: Arc<dyn Scheduler>,
        host_runtime: Arc<dyn HostRuntimeToken>,
        activity: Arc<Condvar>,
    ) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }

        let worker = Arc::clone(self);
        let thread_handle =
            thread::spawn(move || worker.thread_main(scheduler, host_runtime, activity));
        *self.handle.lock().unwrap() = Some(thread_handle);
    }

    fn thread_main(
        &self,
        scheduler: Arc<dyn Scheduler>,
        host_runtime: Arc<dyn HostRuntimeToken>,
        activity: Arc<Condvar>,
    ) {
        if let Err(err) = host_runtime.attach() {
            eprintln!("taskcl: worker for device {} failed to attach to host runtime: {}", self.device.id(), err);
            return;
        }

        let mut idle = self.idle.lock().unwrap();
        loop {
            let task = scheduler.pop(self.device.id(), self.device.kind());

            if let Some(task) = task {
                *idle = false;
                drop(idle);
                self.execute_task(&task);
                idle = self.idle.lock().unwrap();
                *idle = true;
                self.idle_cv.notify_all();
                activity.notify_all();
                continue;
            }

            if self.kill.load(Ordering::SeqCst) {
                break;
            }

            idle = self.work_cv.wait(idle).unwrap();
        }

        host_runtime.detach();
    }

    fn execute_task(&self, task: &Task) {
        task.call_configure(&self.device);

        for kernel in task.kernels() {
            if task.is_cancelled() {
                break;
            }

            let offset = kernel.offset();
            let work_size = kernel.work_size();
            let device_id = self.device.id();

            let result = self.device.cl_queue(|queue| {
                let launch_result = kernel.cl_kernel(device_id, |kernel_handle| {
                    let _launch_guard = KERNEL_LAUNCH.lock().unwrap();
                    unsafe { compute::enqueue_ndrange(queue, kernel_handle, offset, work_size, None) }
                });
                launch_result.and_then(|()| compute::finish(queue))
            });

            if let Err(err) = result {
                self.report_error(task, err);
                return;
            }
        }

        task.call_finish(&self.device);
    }

    fn report_error(&self, task: &Task, err: Error) {
        if !task.report_error(&err) {
            eprintln!("taskcl: worker for device {} failed to execute task: {}", self.device.id(), err);
        }
    }

    /// Wakes the worker if it is currently idle on its condition
    /// variable.
    pub fn wake_up(&self) {
        self.work_cv.notify_one();
    }

    /// Blocks until the worker is genuinely idle — back at its wait point
    /// between tasks, its finish callback for any in-flight task already
    /// returned. Only meaningful once the caller knows no more tasks will
    /// be assigned to this device (otherwise the worker may already have
    /// picked up new work by the time this returns).
    pub fn finish(&self) {
        let mut idle = self.idle.lock().unwrap();
        while !*idle {
            idle = self.idle_cv.wait(idle).unwrap();
        }
    }

    /// The device this worker drives.
    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.kill.store(true, Ordering::SeqCst);
        self.work_cv.notify_one();
        if let Some(handle) = self.handle.lock().unwrap().take() {
            let _ = handle.join();
        }
    }
}
