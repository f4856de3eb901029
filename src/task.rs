//! Task composition: ordered kernels plus host-side configure/finish
//! callbacks.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::device::Device;
use crate::error::{Error, Result};
use crate::kernel::Kernel;
use crate::program::Program;

/// A shared flag a caller can use to ask a [`Worker`](crate::worker::Worker)
/// to stop running a task's remaining kernels.
///
/// Not part of the base contract: a task with no token attached always runs
/// every kernel to completion, exactly as before. Checked only *between*
/// kernel launches, never mid-launch, so a cancelled task still observes
/// every effect of whichever kernel was already in flight when `cancel` was
/// called.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Creates a fresh, not-yet-cancelled token.
    pub fn new() -> CancelToken {
        CancelToken(Arc::new(AtomicBool::new(false)))
    }

    /// Requests cancellation. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// True once [`CancelToken::cancel`] has been called.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Invoked from a [`Worker`](crate::worker::Worker) thread when a task's
/// configure callback, a kernel launch, or its finish callback fails. If a
/// task registers none, the worker logs the error's `Display` text to
/// stderr once instead.
pub type TaskErrorSink = dyn Fn(&Error) + Send + Sync;

/// A coarse scheduling preference for the FCFS scheduler.
///
/// `TargetGpu` is satisfied by a GPU or an accelerator device; `TargetCpu`
/// is satisfied only by a CPU device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hint {
    TargetCpu,
    TargetGpu,
}

impl Default for Hint {
    fn default() -> Hint {
        Hint::TargetGpu
    }
}

/// A pair of projected per-device-class costs, used by the HEFT-style
/// scheduler to estimate a task's completion time on a candidate device.
///
/// Lower is cheaper. The default `(1.0, 1.0)` makes every task equally at
/// home on either device class, so HEFT degenerates to pure load
/// balancing unless the caller supplies real estimates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Score {
    pub cpu: f64,
    pub gpu: f64,
}

impl Default for Score {
    fn default() -> Score {
        Score { cpu: 1.0, gpu: 1.0 }
    }
}

impl Score {
    pub fn new(cpu: f64, gpu: f64) -> Score {
        Score { cpu, gpu }
    }
}

/// Invoked once before a task's kernels run (to bind buffers and
/// arguments) and once after they finish (to drain results). Receives the
/// device the task was assigned to and the task's kernels, keyed by the
/// name they were added under.
pub type KernelCallback = dyn Fn(&Device, &HashMap<String, Arc<Kernel>>) + Send + Sync;

struct State {
    kernels: Vec<Arc<Kernel>>,
    kernels_by_name: HashMap<String, Arc<Kernel>>,
    configure: Option<Arc<KernelCallback>>,
    finish: Option<Arc<KernelCallback>>,
    error_sink: Option<Arc<TaskErrorSink>>,
    cancel: Option<CancelToken>,
}

/// An ordered sequence of kernels that run on whichever device the
/// scheduler assigns, bracketed by a configure callback (binds buffers
/// and arguments) and a finish callback (drains results).
///
/// Kernels within a task always run in the order they were added; the
/// task contract guarantees kernel N observes every write kernel N−1
/// made, which the [`Worker`](crate::worker::Worker) upholds by waiting
/// for each kernel to finish before enqueuing the next.
pub struct Task {
    program: Arc<Program>,
    device_count: usize,
    hint: Hint,
    score: Score,
    state: Mutex<State>,
}

impl Task {
    /// Creates an empty task against `program`, defaulting to
    /// `Hint::TargetGpu` and `Score::default()`.
    pub fn new(program: Arc<Program>, device_count: usize) -> Task {
        Task {
            program,
            device_count,
            hint: Hint::default(),
            score: Score::default(),
            state: Mutex::new(State {
                kernels: Vec::new(),
                kernels_by_name: HashMap::new(),
                configure: None,
                finish: None,
                error_sink: None,
                cancel: None,
            }),
        }
    }

    /// Sets the FCFS scheduling hint.
    pub fn with_hint(mut self, hint: Hint) -> Task {
        self.hint = hint;
        self
    }

    /// Sets the HEFT per-device-class cost estimate.
    pub fn with_score(mut self, score: Score) -> Task {
        self.score = score;
        self
    }

    /// Attaches a [`CancelToken`] a caller can use to stop this task's
    /// remaining kernels from being enqueued. Checked only between kernel
    /// launches; has no effect on a task that has already started its last
    /// kernel.
    pub fn set_cancel_token(&self, token: CancelToken) {
        self.state.lock().unwrap().cancel = Some(token);
    }

    /// Whether this task's cancel token, if any, has been cancelled.
    pub(crate) fn is_cancelled(&self) -> bool {
        match &self.state.lock().unwrap().cancel {
            Some(token) => token.is_cancelled(),
            None => false,
        }
    }

    /// Appends a kernel named `name`, built against this task's program.
    /// Kernels run in the order they are added.
    pub fn add_kernel(&self, name: &str) -> Result<()> {
        let kernel = Arc::new(Kernel::new(name, &self.program, self.device_count)?);
        let mut state = self.state.lock().unwrap();
        state.kernels.push(kernel.clone());
        state.kernels_by_name.insert(name.to_string(), kernel);
        Ok(())
    }

    /// Registers the callback invoked once, on the worker's thread, just
    /// before this task's kernels run.
    pub fn set_configure<F>(&self, f: F)
    where
        F: Fn(&Device, &HashMap<String, Arc<Kernel>>) + Send + Sync + 'static,
    {
        self.state.lock().unwrap().configure = Some(Arc::new(f));
    }

    /// Registers the callback invoked once, on the worker's thread, after
    /// this task's last kernel has completed.
    pub fn set_finish<F>(&self, f: F)
    where
        F: Fn(&Device, &HashMap<String, Arc<Kernel>>) + Send + Sync + 'static,
    {
        self.state.lock().unwrap().finish = Some(Arc::new(f));
    }

    /// Registers the callback a worker routes this task's errors to.
    /// Without one, the worker logs the error's `Display` text to stderr
    /// once and drops it.
    pub fn set_error_sink<F>(&self, f: F)
    where
        F: Fn(&Error) + Send + Sync + 'static,
    {
        self.state.lock().unwrap().error_sink = Some(Arc::new(f));
    }

    /// Routes `error` to this task's error sink, if one was registered.
    /// Returns `true` if a sink handled it.
    pub(crate) fn report_error(&self, error: &Error) -> bool {
        let state = self.state.lock().unwrap();
        match &state.error_sink {
            Some(sink) => {
                sink(error);
                true
            }
            None => false,
        }
    }

    /// This task's FCFS scheduling hint.
    pub fn hint(&self) -> Hint {
        self.hint
    }

    /// This task's HEFT cost estimate.
    pub fn score(&self) -> Score {
        self.score
    }

    /// The kernels added so far, in the order they were added.
    pub(crate) fn kernels(&self) -> Vec<Arc<Kernel>> {
        self.state.lock().unwrap().kernels.clone()
    }

    /// Invokes the configure callback, if one was registered.
    pub(crate) fn call_configure(&self, device: &Device) {
        let state = self.state.lock().unwrap();
        if let Some(f) = &state.configure {
            f(device, &state.kernels_by_name);
        }
    }

    /// Invokes the finish callback, if one was registered.
    pub(crate) fn call_finish(&self, device: &Device) {
        let state = self.state.lock().unwrap();
        if let Some(f) = &state.finish {
            f(device, &state.kernels_by_name);
        }
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock().unwrap();
        f.debug_struct("Task")
            .field("kernels", &state.kernels.len())
            .field("hint", &self.hint)
            .field("score", &self.score)
            .finish()
    }
}
