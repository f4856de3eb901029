//! The crate-wide error type.
//!
//! Every fallible operation in `taskcl` returns `Result<T>`. Each variant
//! below corresponds to one stage of the object model described in the
//! module docs: a failure always indicates which subsystem produced it,
//! and carries either the OpenCL status text or (for `ProgramCompilation`)
//! the compiler's own build log.

use std::fmt;

/// The crate-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong inside `taskcl`.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The OpenCL library failed to load, or platform/device enumeration
    /// failed. Fatal; the `Runtime` is not constructed.
    #[error("failed to initialize the OpenCL runtime: {0}")]
    RuntimeConstruction(String),

    /// A `Device`'s context or queue failed to build, or its device type
    /// was unrecognized. Fatal for that device.
    #[error("device construction failed: {0}")]
    DeviceConstruction(String),

    /// A `Program` failed to compile on at least one device. Carries the
    /// compiler's build log.
    #[error("OpenCL kernel compilation failed:\n{0}")]
    ProgramCompilation(String),

    /// A `Kernel` failed to be created on one or more devices.
    #[error("kernel construction failed: {0}")]
    KernelConstruction(String),

    /// `clSetKernelArg` (or its equivalent) returned a failure code.
    #[error("failed to set kernel argument: {0}")]
    KernelArgument(String),

    /// A `Buffer` failed to allocate.
    #[error("buffer construction failed: {0}")]
    BufferConstruction(String),

    /// A `Buffer` failed to map into host address space.
    #[error("failed to map buffer: {0}")]
    BufferMap(String),

    /// A kernel launch or queue finish returned a failure code while a
    /// `Worker` executed a `Task`.
    #[error("worker failed to execute task: {0}")]
    WorkerExecution(String),
}

impl Error {
    pub(crate) fn runtime_construction<E: fmt::Display>(err: E) -> Error {
        Error::RuntimeConstruction(err.to_string())
    }

    pub(crate) fn device_construction<E: fmt::Display>(err: E) -> Error {
        Error::DeviceConstruction(err.to_string())
    }

    pub(crate) fn program_compilation<E: fmt::Display>(log: E) -> Error {
        Error::ProgramCompilation(log.to_string())
    }

    pub(crate) fn kernel_construction<E: fmt::Display>(err: E) -> Error {
        Error::KernelConstruction(err.to_string())
    }

    pub(crate) fn kernel_argument<E: fmt::Display>(err: E) -> Error {
        Error::KernelArgument(err.to_string())
    }

    pub(crate) fn buffer_construction<E: fmt::Display>(err: E) -> Error {
        Error::BufferConstruction(err.to_string())
    }

    pub(crate) fn buffer_map<E: fmt::Display>(err: E) -> Error {
        Error::BufferMap(err.to_string())
    }

    pub(crate) fn worker_execution<E: fmt::Display>(err: E) -> Error {
        Error::WorkerExecution(err.to_string())
    }
}
