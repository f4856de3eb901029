//! Policies deciding which device runs which task.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::device::DeviceType;
use crate::task::{Hint, Task};

/// Decides which device runs which submitted [`Task`].
///
/// Implementations never fail: `pop` returns `None` rather than raising
/// when there is nothing runnable for the given device right now.
pub trait Scheduler: Send + Sync {
    /// Takes ownership of `task` and enqueues it.
    fn push(&self, task: Arc<Task>);

    /// Returns a task ready to run on the device with the given id and
    /// type, or `None` if there is nothing for it right now.
    fn pop(&self, device_id: usize, device_type: DeviceType) -> Option<Arc<Task>>;

    /// True if any task is still queued or assigned but not yet popped.
    fn has_work(&self) -> bool;
}

fn hint_matches(hint: Hint, device_type: DeviceType) -> bool {
    match hint {
        Hint::TargetCpu => device_type == DeviceType::Cpu,
        Hint::TargetGpu => matches!(device_type, DeviceType::Gpu | DeviceType::Accelerator),
    }
}

/// A single mutex-guarded FIFO, shared by every device.
///
/// `pop` returns the front task if its [`Hint`] permits the requesting
/// device's type; otherwise it searches forward for the first compatible
/// task and removes it, preserving the relative order of everything else
/// still queued.
pub struct Fcfs {
    queue: Mutex<VecDeque<Arc<Task>>>,
}

impl Fcfs {
    pub fn new() -> Fcfs {
        Fcfs { queue: Mutex::new(VecDeque::new()) }
    }
}

impl Default for Fcfs {
    fn default() -> Fcfs {
        Fcfs::new()
    }
}

impl Scheduler for Fcfs {
    fn push(&self, task: Arc<Task>) {
        self.queue.lock().unwrap().push_back(task);
    }

    fn pop(&self, _device_id: usize, device_type: DeviceType) -> Option<Arc<Task>> {
        let mut queue = self.queue.lock().unwrap();
        let position = queue.iter().position(|task| hint_matches(task.hint(), device_type))?;
        queue.remove(position)
    }

    fn has_work(&self) -> bool {
        !self.queue.lock().unwrap().is_empty()
    }
}

/// A list-scheduling heuristic: every submitted task is immediately
/// assigned to whichever device minimizes `deviceFreeTime[d] +
/// score_for(deviceType(d))`, ties broken by lowest device id. Each
/// device then reads its own FIFO subqueue.
///
/// This is HEFT specialized to independent tasks (no dependency DAG):
/// assignment happens at submission time rather than after a full
/// topological pass, which is exactly list scheduling when every task is
/// a root.
pub struct Heft {
    devices: Vec<DeviceType>,
    free_at: Mutex<Vec<f64>>,
    queues: Vec<Mutex<VecDeque<Arc<Task>>>>,
}

impl Heft {
    /// Builds a HEFT scheduler over the given device types, indexed by
    /// their enumeration id.
    pub fn new(devices: Vec<DeviceType>) -> Heft {
        let free_at = Mutex::new(vec![0.0; devices.len()]);
        let queues = devices.iter().map(|_| Mutex::new(VecDeque::new())).collect();
        Heft { devices, free_at, queues }
    }

    fn score_for(task: &Task, device_type: DeviceType) -> f64 {
        let score = task.score();
        match device_type {
            DeviceType::Cpu => score.cpu,
            DeviceType::Gpu | DeviceType::Accelerator => score.gpu,
        }
    }
}

impl Scheduler for Heft {
    fn push(&self, task: Arc<Task>) {
        let mut free_at = self.free_at.lock().unwrap();

        let mut best_device = 0usize;
        let mut best_projected = f64::INFINITY;
        for (device_id, &device_type) in self.devices.iter().enumerate() {
            let projected = free_at[device_id] + Heft::score_for(&task, device_type);
            if projected < best_projected {
                best_projected = projected;
                best_device = device_id;
            }
        }

        free_at[best_device] = best_projected;
        self.queues[best_device].lock().unwrap().push_back(task);
    }

    fn pop(&self, device_id: usize, _device_type: DeviceType) -> Option<Arc<Task>> {
        self.queues[device_id].lock().unwrap().pop_front()
    }

    fn has_work(&self) -> bool {
        self.queues.iter().any(|q| !q.lock().unwrap().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::Program;
    use crate::task::Score;

    fn task_with_hint(hint: Hint) -> Arc<Task> {
        let program = Arc::new(Program::empty_for_test());
        Arc::new(Task::new(program, 0).with_hint(hint))
    }

    #[test]
    fn fcfs_searches_forward_for_a_compatible_task() {
        let scheduler = Fcfs::new();
        scheduler.push(task_with_hint(Hint::TargetCpu));
        scheduler.push(task_with_hint(Hint::TargetGpu));

        let popped = scheduler.pop(1, DeviceType::Gpu).unwrap();
        assert_eq!(popped.hint(), Hint::TargetGpu);
        assert!(scheduler.has_work());

        let popped = scheduler.pop(0, DeviceType::Cpu).unwrap();
        assert_eq!(popped.hint(), Hint::TargetCpu);
        assert!(!scheduler.has_work());
    }

    #[test]
    fn fcfs_returns_none_when_nothing_matches() {
        let scheduler = Fcfs::new();
        scheduler.push(task_with_hint(Hint::TargetGpu));
        assert!(scheduler.pop(0, DeviceType::Cpu).is_none());
    }

    #[test]
    fn heft_assigns_to_lowest_projected_completion_with_device_id_tiebreak() {
        // Scenario C from the published scheduling properties: CPU(id=0),
        // GPU(id=1), both free at t=0. T1/T2 score (10, 1), T3 score
        // (1, 10). Expect GPU = [T1, T2], CPU = [T3].
        let scheduler = Heft::new(vec![DeviceType::Cpu, DeviceType::Gpu]);
        let program = Arc::new(Program::empty_for_test());

        let t1 = Arc::new(Task::new(program.clone(), 0).with_score(Score::new(10.0, 1.0)));
        let t2 = Arc::new(Task::new(program.clone(), 0).with_score(Score::new(10.0, 1.0)));
        let t3 = Arc::new(Task::new(program, 0).with_score(Score::new(1.0, 10.0)));

        scheduler.push(t1);
        scheduler.push(t2);
        scheduler.push(t3);

        assert!(scheduler.pop(1, DeviceType::Gpu).is_some());
        assert!(scheduler.pop(1, DeviceType::Gpu).is_some());
        assert!(scheduler.pop(1, DeviceType::Gpu).is_none());

        assert!(scheduler.pop(0, DeviceType::Cpu).is_some());
        assert!(scheduler.pop(0, DeviceType::Cpu).is_none());
    }
}
