//! Worker pool manager
//!
//! A fixed set of named threads ("units") pulling from one FIFO queue.
//! Each unit takes a task only when it is idle, so at most one task per
//! unit is ever in flight and the queue head always goes to the first unit
//! that frees up.
//!
//! ```text
//! submit ──► [ FIFO queue ] ──► unit 0 ─┐
//!                           ├─► unit 1 ─┼─► per-task reply channel ──► PendingResult
//!                           └─► unit N ─┘
//! ```
//!
//! Units start lazily on the first submit. A unit that panics mid-task
//! rejects that task with [`OfflineError::UnitRuntime`] and goes back to
//! the idle set as it is. There is no cancellation and no timeout.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, TryRecvError, bounded, unbounded};
use parking_lot::Mutex;
use serde::Serialize;

use crate::config::resolve_pool_size;
use crate::error::{OfflineError, OfflineResult};
use crate::job::TaskId;

/// Unit of work a pool unit can run
pub trait PoolJob: Send + 'static {
    type Output: Send + 'static;

    fn run(self) -> OfflineResult<Self::Output>;
}

struct QueuedTask<J: PoolJob> {
    id: TaskId,
    job: J,
    reply: Sender<OfflineResult<J::Output>>,
}

/// Per-unit state visible to observers
#[derive(Debug, Default)]
struct UnitSlot {
    busy: AtomicBool,
    /// 0 = no task
    current: AtomicU64,
}

#[derive(Debug, Default)]
struct PoolShared {
    units: Vec<UnitSlot>,
    queued: AtomicUsize,
    completed: AtomicUsize,
    failed: AtomicUsize,
}

/// Snapshot of one unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolWorker {
    pub id: usize,
    pub busy: bool,
    pub current_task: Option<TaskId>,
}

/// Pool-wide counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolStats {
    pub queued: usize,
    pub in_flight: usize,
    pub completed: usize,
    pub failed: usize,
}

enum PoolState<J: PoolJob> {
    NotStarted,
    Running {
        queue: Sender<QueuedTask<J>>,
        handles: Vec<JoinHandle<()>>,
    },
    Failed {
        unit: usize,
        reason: String,
    },
}

/// Fixed-size pool of execution units
pub struct WorkerPool<J: PoolJob> {
    size: usize,
    state: Mutex<PoolState<J>>,
    shared: Arc<PoolShared>,
    next_task: AtomicU64,
    #[cfg(test)]
    fail_unit: Option<usize>,
}

impl<J: PoolJob> WorkerPool<J> {
    /// Pool of `workers` units (0 = one per core), clamped to 1..=16
    pub fn new(workers: usize) -> Self {
        let size = resolve_pool_size(workers);
        Self {
            size,
            state: Mutex::new(PoolState::NotStarted),
            shared: Arc::new(PoolShared {
                units: (0..size).map(|_| UnitSlot::default()).collect(),
                ..Default::default()
            }),
            next_task: AtomicU64::new(1),
            #[cfg(test)]
            fail_unit: None,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_started(&self) -> bool {
        matches!(*self.state.lock(), PoolState::Running { .. })
    }

    /// Spawn all units. Idempotent; a failed start stays failed.
    pub fn start(&self) -> OfflineResult<()> {
        let mut state = self.state.lock();
        self.ensure_started(&mut state)
    }

    /// Queue `job`; ownership moves to the pool
    pub fn submit(&self, job: J) -> PendingResult<J::Output> {
        let id = self.next_task.fetch_add(1, Ordering::Relaxed);
        let (reply, receiver) = bounded(1);
        let pending = PendingResult { task: id, receiver };

        let mut state = self.state.lock();
        if let Err(err) = self.ensure_started(&mut state) {
            let _ = reply.send(Err(err));
            return pending;
        }

        if let PoolState::Running { queue, .. } = &*state {
            self.shared.queued.fetch_add(1, Ordering::SeqCst);
            if let Err(send_err) = queue.send(QueuedTask { id, job, reply }) {
                self.shared.queued.fetch_sub(1, Ordering::SeqCst);
                let _ = send_err.0.reply.send(Err(OfflineError::UnitRuntime {
                    task: id,
                    reason: "pool queue closed".into(),
                }));
            } else {
                log::debug!("Task {} queued", id);
            }
        }
        pending
    }

    /// Per-unit snapshots
    pub fn workers(&self) -> Vec<PoolWorker> {
        self.shared
            .units
            .iter()
            .enumerate()
            .map(|(id, slot)| {
                let current = slot.current.load(Ordering::SeqCst);
                PoolWorker {
                    id,
                    busy: slot.busy.load(Ordering::SeqCst),
                    current_task: (current != 0).then_some(current),
                }
            })
            .collect()
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            queued: self.shared.queued.load(Ordering::SeqCst),
            in_flight: self
                .shared
                .units
                .iter()
                .filter(|slot| slot.busy.load(Ordering::SeqCst))
                .count(),
            completed: self.shared.completed.load(Ordering::SeqCst),
            failed: self.shared.failed.load(Ordering::SeqCst),
        }
    }

    fn ensure_started(&self, state: &mut PoolState<J>) -> OfflineResult<()> {
        match state {
            PoolState::Running { .. } => return Ok(()),
            PoolState::Failed { unit, reason } => {
                return Err(OfflineError::PoolInit {
                    unit: *unit,
                    reason: reason.clone(),
                });
            }
            PoolState::NotStarted => {}
        }

        let (queue, tasks) = unbounded::<QueuedTask<J>>();
        let mut handles = Vec::with_capacity(self.size);

        for unit in 0..self.size {
            match self.spawn_unit(unit, tasks.clone()) {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    // Fatal: wind down the units that did start
                    drop(queue);
                    for handle in handles {
                        let _ = handle.join();
                    }
                    let reason = e.to_string();
                    log::error!("Worker pool failed to start unit {}: {}", unit, reason);
                    *state = PoolState::Failed {
                        unit,
                        reason: reason.clone(),
                    };
                    return Err(OfflineError::PoolInit { unit, reason });
                }
            }
        }

        log::info!("Worker pool started with {} units", self.size);
        *state = PoolState::Running { queue, handles };
        Ok(())
    }

    fn spawn_unit(
        &self,
        unit: usize,
        tasks: Receiver<QueuedTask<J>>,
    ) -> std::io::Result<JoinHandle<()>> {
        #[cfg(test)]
        if self.fail_unit == Some(unit) {
            return Err(std::io::Error::other("simulated spawn failure"));
        }

        let shared = Arc::clone(&self.shared);
        thread::Builder::new()
            .name(format!("rv-unit-{}", unit))
            .spawn(move || unit_loop(unit, tasks, shared))
    }
}

impl<J: PoolJob> Drop for WorkerPool<J> {
    fn drop(&mut self) {
        let state = std::mem::replace(self.state.get_mut(), PoolState::NotStarted);
        if let PoolState::Running { queue, handles } = state {
            // Units drain what is queued, then see the closed channel
            drop(queue);
            for handle in handles {
                let _ = handle.join();
            }
            log::info!("Worker pool shut down");
        }
    }
}

fn unit_loop<J: PoolJob>(unit: usize, tasks: Receiver<QueuedTask<J>>, shared: Arc<PoolShared>) {
    let slot = &shared.units[unit];

    for QueuedTask { id, job, reply } in tasks.iter() {
        shared.queued.fetch_sub(1, Ordering::SeqCst);
        slot.current.store(id, Ordering::SeqCst);
        slot.busy.store(true, Ordering::SeqCst);
        log::debug!("Unit {} took task {}", unit, id);

        let result = match panic::catch_unwind(AssertUnwindSafe(move || job.run())) {
            Ok(Ok(output)) => {
                shared.completed.fetch_add(1, Ordering::SeqCst);
                Ok(output)
            }
            Ok(Err(err)) => {
                shared.failed.fetch_add(1, Ordering::SeqCst);
                log::warn!("Task {} failed on unit {}: {}", id, unit, err);
                Err(err)
            }
            Err(payload) => {
                shared.failed.fetch_add(1, Ordering::SeqCst);
                let reason = panic_message(payload.as_ref());
                log::error!("Unit {} faulted on task {}: {}", unit, id, reason);
                Err(OfflineError::UnitRuntime { task: id, reason })
            }
        };

        slot.busy.store(false, Ordering::SeqCst);
        slot.current.store(0, Ordering::SeqCst);

        // The caller may have dropped its handle
        let _ = reply.send(result);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unit panicked".to_string()
    }
}

/// Handle to a submitted task's eventual result
#[derive(Debug)]
pub struct PendingResult<T> {
    task: TaskId,
    receiver: Receiver<OfflineResult<T>>,
}

impl<T> PendingResult<T> {
    pub fn task_id(&self) -> TaskId {
        self.task
    }

    /// Block until the task finishes
    pub fn wait(self) -> OfflineResult<T> {
        self.receiver.recv().unwrap_or_else(|_| Err(self.lost()))
    }

    /// Result if the task has finished, `None` while it is queued or running
    pub fn try_wait(&self) -> Option<OfflineResult<T>> {
        match self.receiver.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(self.lost())),
        }
    }

    fn lost(&self) -> OfflineError {
        OfflineError::UnitRuntime {
            task: self.task,
            reason: "unit dropped the task without a result".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    enum TestJob {
        Value(u32),
        Fail,
        Panic,
    }

    impl PoolJob for TestJob {
        type Output = u32;

        fn run(self) -> OfflineResult<u32> {
            match self {
                TestJob::Value(v) => Ok(v),
                TestJob::Fail => Err(OfflineError::Encode("bad".into())),
                TestJob::Panic => panic!("unit exploded"),
            }
        }
    }

    #[test]
    fn test_lazy_start() {
        let pool: WorkerPool<TestJob> = WorkerPool::new(2);
        assert!(!pool.is_started());
        assert_eq!(pool.submit(TestJob::Value(7)).wait().unwrap(), 7);
        assert!(pool.is_started());
        assert!(pool.start().is_ok());
    }

    #[test]
    fn test_task_error_is_structured() {
        let pool: WorkerPool<TestJob> = WorkerPool::new(1);
        let err = pool.submit(TestJob::Fail).wait().unwrap_err();
        assert!(matches!(err, OfflineError::Encode(_)));
        assert_eq!(pool.stats().failed, 1);
    }

    #[test]
    fn test_panic_rejects_task_and_unit_survives() {
        let pool: WorkerPool<TestJob> = WorkerPool::new(1);
        let err = pool.submit(TestJob::Panic).wait().unwrap_err();
        match err {
            OfflineError::UnitRuntime { reason, .. } => assert_eq!(reason, "unit exploded"),
            other => panic!("unexpected error {other:?}"),
        }

        // Same single unit keeps serving
        assert_eq!(pool.submit(TestJob::Value(3)).wait().unwrap(), 3);
        let stats = pool.stats();
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.in_flight, 0);
    }

    #[test]
    fn test_spawn_failure_rejects_every_submit() {
        let mut pool: WorkerPool<TestJob> = WorkerPool::new(4);
        pool.fail_unit = Some(2);

        let first = pool.submit(TestJob::Value(1)).wait().unwrap_err();
        assert!(matches!(first, OfflineError::PoolInit { unit: 2, .. }));
        let second = pool.submit(TestJob::Value(2)).wait().unwrap_err();
        assert!(matches!(second, OfflineError::PoolInit { unit: 2, .. }));
        assert!(!pool.is_started());
    }

    #[test]
    fn test_try_wait_eventually_resolves() {
        let pool: WorkerPool<TestJob> = WorkerPool::new(1);
        let pending = pool.submit(TestJob::Value(11));
        let mut result = None;
        for _ in 0..500 {
            result = pending.try_wait();
            if result.is_some() {
                break;
            }
            thread::sleep(Duration::from_millis(2));
        }
        assert_eq!(result.unwrap().unwrap(), 11);
    }

    #[test]
    fn test_idle_snapshot() {
        let pool: WorkerPool<TestJob> = WorkerPool::new(3);
        pool.start().unwrap();
        let workers = pool.workers();
        assert_eq!(workers.len(), 3);
        assert!(workers.iter().all(|w| !w.busy && w.current_task.is_none()));
        assert_eq!(pool.stats(), PoolStats::default());
    }
}
