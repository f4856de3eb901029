//! Attaching a worker's OS thread to an embedding host language runtime.
//!
//! The original runtime this crate's scheduling model descends from ran
//! embedded inside a JVM: every worker thread had to call
//! `AttachCurrentThread`/`DetachCurrentThread` around its lifetime so JNI
//! calls issued from task callbacks stayed valid. Rust has no JVM to
//! attach to by default, but a caller embedding this crate inside some
//! other managed runtime (a JVM via JNI, a CLR, a scripting VM) needs the
//! same hook, so the attach/detach contract is kept as a trait a worker
//! calls into rather than something this crate hardcodes.

use crate::error::Result;

/// A hook a [`Worker`](crate::worker::Worker) calls on its own thread,
/// once on entry and once on exit.
///
/// Implementations must be safe to call from any worker thread
/// concurrently; a common implementation attaches/detaches the calling
/// thread from an embedding VM.
pub trait HostRuntimeToken: Send + Sync {
    /// Called once, on the worker's thread, before it starts pulling
    /// tasks from the scheduler. An error here aborts the worker's
    /// startup with `RuntimeConstructionError`.
    fn attach(&self) -> Result<()>;

    /// Called once, on the worker's thread, after it has been asked to
    /// stop and is about to exit.
    fn detach(&self);
}

/// The default [`HostRuntimeToken`]: does nothing. Used when this crate
/// is not embedded inside another managed runtime.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullHostRuntime;

impl HostRuntimeToken for NullHostRuntime {
    fn attach(&self) -> Result<()> {
        Ok(())
    }

    fn detach(&self) {}
}
