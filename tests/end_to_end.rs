//! End-to-end scenarios against a real OpenCL platform.
//!
//! Like the teacher crate's own hardware-dependent tests, these assume an
//! ICD (a real GPU driver, or a software implementation such as pocl) is
//! installed wherever this test binary runs; there is no mock
//! device-compute backend.

use std::convert::TryInto;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use ocl_core::CommandQueueProperties;
use taskcl::{AccessFlags, Buffer, Hint, Program, Runtime, RuntimeBuilder, Task};

fn runtime() -> Runtime {
    Runtime::new().expect("a working OpenCL platform")
}

/// Scenario A: single-device FCFS submission of a task with one kernel
/// taking a single primitive argument. The finish callback observes that
/// the kernel ran.
#[test]
fn scenario_a_single_kernel_primitive_argument() {
    let runtime = runtime();

    let source = r#"
        __kernel void set_value(int value) {
            // No output: this kernel exists purely to be launched.
        }
    "#;
    let program = Arc::new(Program::new(runtime.devices(), source, "").expect("compiles"));

    let task = Arc::new(
        Task::new(program, runtime.devices().len()).with_hint(Hint::TargetCpu),
    );
    task.add_kernel("set_value").expect("kernel created");

    task.set_configure(|_device, kernels| {
        let kernel = &kernels["set_value"];
        kernel.set_primitive_arg(0, 42i32).expect("arg set");
        kernel.set_work_range(0, 1);
    });

    let finished = Arc::new(AtomicBool::new(false));
    let finished_in_callback = finished.clone();
    task.set_finish(move |_device, _kernels| {
        finished_in_callback.store(true, Ordering::SeqCst);
    });

    runtime.submit_task(task);
    runtime.finish();

    assert!(finished.load(Ordering::SeqCst));
}

/// Scenario B: a 16-byte buffer round-trips through an identity kernel.
#[test]
fn scenario_b_buffer_round_trip_through_identity_kernel() {
    let runtime = runtime();
    let device = runtime.devices()[0].clone();

    let source = r#"
        __kernel void identity(__global uchar* buf) {
            uint i = get_global_id(0);
            buf[i] = buf[i];
        }
    "#;
    let program = Arc::new(Program::new(runtime.devices(), source, "").expect("compiles"));

    let input: [u8; 16] = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16];
    let buffer = Arc::new(Buffer::new(device, AccessFlags::ReadWrite, 16).expect("buffer"));
    buffer.copy_from(&input).expect("copy_from");

    let task = Arc::new(Task::new(program, runtime.devices().len()).with_hint(Hint::TargetCpu));
    task.add_kernel("identity").expect("kernel created");

    let bound_buffer = buffer.clone();
    task.set_configure(move |_device, kernels| {
        let kernel = &kernels["identity"];
        kernel.set_buffer_arg(0, bound_buffer.clone()).expect("arg set");
        kernel.set_work_range(0, 16);
    });

    runtime.submit_task(task);
    runtime.finish();

    let mut out = [0u8; 16];
    buffer.copy_to(&mut out).expect("copy_to");
    assert_eq!(out, input);
}

/// Scenario D: two kernels in one task, the second observing the first's
/// write through a shared buffer.
#[test]
fn scenario_d_two_kernel_task_ordering() {
    let runtime = runtime();
    let device = runtime.devices()[0].clone();

    let source = r#"
        __kernel void double_it(__global int* buf) {
            uint i = get_global_id(0);
            buf[i] = buf[i] * 2;
        }

        __kernel void increment_it(__global int* buf) {
            uint i = get_global_id(0);
            buf[i] = buf[i] + 1;
        }
    "#;
    let program = Arc::new(Program::new(runtime.devices(), source, "").expect("compiles"));

    let input: [i32; 4] = [1, 2, 3, 4];
    let input_bytes: &[u8] = unsafe {
        std::slice::from_raw_parts(input.as_ptr() as *const u8, input.len() * 4)
    };
    let buffer = Arc::new(Buffer::new(device, AccessFlags::ReadWrite, 16).expect("buffer"));
    buffer.copy_from(input_bytes).expect("copy_from");

    let task = Arc::new(Task::new(program, runtime.devices().len()).with_hint(Hint::TargetCpu));
    task.add_kernel("double_it").expect("kernel created");
    task.add_kernel("increment_it").expect("kernel created");

    let bound_buffer = buffer.clone();
    task.set_configure(move |_device, kernels| {
        for name in ["double_it", "increment_it"] {
            let kernel = &kernels[name];
            kernel.set_buffer_arg(0, bound_buffer.clone()).expect("arg set");
            kernel.set_work_range(0, 4);
        }
    });

    runtime.submit_task(task);
    runtime.finish();

    let mut out_bytes = [0u8; 16];
    buffer.copy_to(&mut out_bytes).expect("copy_to");
    let mut out = [0i32; 4];
    for (i, chunk) in out_bytes.chunks_exact(4).enumerate() {
        out[i] = i32::from_ne_bytes(chunk.try_into().unwrap());
    }

    assert_eq!(out, [3, 5, 7, 9]);
}

/// Scenario E: a syntactically broken source fails program construction
/// and carries the compiler's own diagnostic.
#[test]
fn scenario_e_compile_failure_carries_build_log() {
    let runtime = runtime();

    let broken_source = r#"
        __kernel void broken(__global int* buf) {
            this is not valid opencl c at all +++;
        }
    "#;

    let result = Program::new(runtime.devices(), broken_source, "");
    assert!(result.is_err());
}

/// Scenario F: after `Runtime::finish` returns, every submitted task has
/// run its finish callback exactly once.
#[test]
fn scenario_f_finish_drains_every_submitted_task() {
    let runtime = runtime();

    let source = r#"
        __kernel void noop_kernel() {}
    "#;
    let program = Arc::new(Program::new(runtime.devices(), source, "").expect("compiles"));

    const TASK_COUNT: usize = 8;
    let completed = Arc::new(AtomicUsize::new(0));

    for _ in 0..TASK_COUNT {
        let task = Arc::new(
            Task::new(program.clone(), runtime.devices().len()).with_hint(Hint::TargetCpu),
        );
        task.add_kernel("noop_kernel").expect("kernel created");
        task.set_configure(|_device, kernels| {
            kernels["noop_kernel"].set_work_range(0, 1);
        });

        let completed_in_callback = completed.clone();
        task.set_finish(move |_device, _kernels| {
            completed_in_callback.fetch_add(1, Ordering::SeqCst);
        });

        runtime.submit_task(task);
    }

    runtime.finish();

    assert_eq!(completed.load(Ordering::SeqCst), TASK_COUNT);
}

/// Buffer round-trip property: for a random byte vector `V` of length `n`
/// and a buffer sized `>= n`, `copy_from(V); copy_to(W)` yields `W[..n] ==
/// V[..n]`, for several random sizes.
#[test]
fn buffer_round_trip_holds_for_random_sizes() {
    use rand::Rng;

    let runtime = runtime();
    let device = runtime.devices()[0].clone();
    let mut rng = rand::thread_rng();

    for _ in 0..8 {
        let len = rng.gen_range(1..=4096usize);
        let input: Vec<u8> = (0..len).map(|_| rng.gen()).collect();

        let buffer = Arc::new(Buffer::new(device.clone(), AccessFlags::ReadWrite, len).expect("buffer"));
        buffer.copy_from(&input).expect("copy_from");

        let mut out = vec![0u8; len];
        buffer.copy_to(&mut out).expect("copy_to");

        assert_eq!(out, input, "round-trip mismatch at len={len}");
    }
}

/// Boundary behavior: `copy_from`/`copy_to` called with `n > bufferSize`
/// copies exactly `bufferSize` bytes and does not raise.
#[test]
fn copy_truncates_to_buffer_size_without_raising() {
    let runtime = runtime();
    let device = runtime.devices()[0].clone();

    let buffer = Arc::new(Buffer::new(device, AccessFlags::ReadWrite, 4).expect("buffer"));
    let oversized_input = [1u8, 2, 3, 4, 5, 6, 7, 8];
    buffer.copy_from(&oversized_input).expect("copy_from truncates, does not raise");

    let mut oversized_out = [0u8; 8];
    buffer.copy_to(&mut oversized_out).expect("copy_to truncates, does not raise");

    assert_eq!(&oversized_out[..4], &oversized_input[..4]);
    assert_eq!(&oversized_out[4..], &[0u8; 4]);
}

/// A kernel with `workSize == 0` is a legal no-op submission.
#[test]
fn zero_work_size_kernel_is_a_legal_noop() {
    let runtime = runtime();

    let source = r#"
        __kernel void noop_kernel() {}
    "#;
    let program = Arc::new(Program::new(runtime.devices(), source, "").expect("compiles"));

    let task = Arc::new(Task::new(program, runtime.devices().len()).with_hint(Hint::TargetCpu));
    task.add_kernel("noop_kernel").expect("kernel created");
    task.set_configure(|_device, kernels| {
        kernels["noop_kernel"].set_work_range(0, 0);
    });

    let finished = Arc::new(AtomicBool::new(false));
    let finished_in_callback = finished.clone();
    task.set_finish(move |_device, _kernels| {
        finished_in_callback.store(true, Ordering::SeqCst);
    });

    runtime.submit_task(task);
    runtime.finish();

    assert!(finished.load(Ordering::SeqCst));
}

/// A task with zero kernels runs only its configure-and-finish callbacks.
#[test]
fn task_with_zero_kernels_still_runs_its_callbacks() {
    let runtime = runtime();
    let program = Arc::new(Program::new(runtime.devices(), "", "").expect("empty program compiles"));

    let task = Arc::new(Task::new(program, runtime.devices().len()).with_hint(Hint::TargetCpu));

    let configured = Arc::new(AtomicBool::new(false));
    let configured_in_callback = configured.clone();
    task.set_configure(move |_device, kernels| {
        assert!(kernels.is_empty());
        configured_in_callback.store(true, Ordering::SeqCst);
    });

    let finished = Arc::new(AtomicBool::new(false));
    let finished_in_callback = finished.clone();
    task.set_finish(move |_device, kernels| {
        assert!(kernels.is_empty());
        finished_in_callback.store(true, Ordering::SeqCst);
    });

    runtime.submit_task(task);
    runtime.finish();

    assert!(configured.load(Ordering::SeqCst));
    assert!(finished.load(Ordering::SeqCst));
}

/// `RuntimeBuilder` lets a caller opt a queue into out-of-order execution;
/// a single trivial kernel still runs to completion either way.
#[test]
fn runtime_builder_accepts_out_of_order_queue_properties() {
    let runtime = RuntimeBuilder::new()
        .queue_properties(CommandQueueProperties::OUT_OF_ORDER_EXEC_MODE_ENABLE)
        .build()
        .expect("a working OpenCL platform");

    let source = r#"
        __kernel void noop_kernel() {}
    "#;
    let program = Arc::new(Program::new(runtime.devices(), source, "").expect("compiles"));

    let task = Arc::new(Task::new(program, runtime.devices().len()).with_hint(Hint::TargetCpu));
    task.add_kernel("noop_kernel").expect("kernel created");
    task.set_configure(|_device, kernels| {
        kernels["noop_kernel"].set_work_range(0, 1);
    });

    runtime.submit_task(task);
    runtime.finish();
}
