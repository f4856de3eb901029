//! `taskcl` schedules and executes ordered sequences of compute kernels
//! (`Task`s) across a heterogeneous set of devices (CPU, GPU, accelerator)
//! exposed by the system's OpenCL installation.
//!
//! A host application builds a [`Program`] from kernel source, composes
//! [`Task`]s out of named [`Kernel`]s and [`Buffer`]s, and submits them to a
//! [`Runtime`]. The runtime owns one [`Worker`] thread per enumerated
//! [`Device`] and a pluggable [`Scheduler`] that decides which device runs
//! which task. Ordering within a task, device/context/queue ownership, and
//! cross-thread access discipline are all handled by this crate; marshalling
//! host-side arrays into kernel arguments and parsing kernel source are left
//! to the caller.
//!
//! ## Foundations
//!
//! The device-facing API surface is a thin wrapper around [`ocl_core`], the
//! low-level OpenCL binding. This crate never talks to the OpenCL ICD loader
//! directly; [`compute`] simply renames and narrows `ocl_core`'s functions to
//! the handful this runtime actually needs.

pub mod compute;
pub mod error;

mod buffer;
mod device;
mod host_runtime;
mod kernel;
mod program;
mod runtime;
mod scheduler;
mod task;
mod types;
mod worker;

pub use crate::buffer::{AccessFlags, Buffer};
pub use crate::device::{Device, DeviceType};
pub use crate::error::{Error, Result};
pub use crate::host_runtime::{HostRuntimeToken, NullHostRuntime};
pub use crate::kernel::{ExtraArgument, Kernel};
pub use crate::program::Program;
pub use crate::runtime::{Runtime, RuntimeBuilder};
pub use crate::scheduler::{Fcfs, Heft, Scheduler};
pub use crate::task::{CancelToken, Hint, Score, Task, TaskErrorSink};
pub use crate::types::{bytes_per_element, size_generator, ElementType};
pub use crate::worker::Worker;

#[doc(no_inline)]
pub use ocl_core as core;
