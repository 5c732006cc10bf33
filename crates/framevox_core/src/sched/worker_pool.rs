//! # Worker Pool
//!
//! Fixed worker threads, a FIFO queue and a wait-all barrier.
//!
//! ## Locking
//!
//! One mutex guards the queue, the task records, the active counter and the
//! stop mode. Tasks run with that lock released. The worker-handle list has
//! its own lock, held only to serialize reconfigurations.

use std::collections::{HashMap, VecDeque};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, info, trace, warn};

use super::{PoolStats, TaskHandle, TaskId};
use crate::config::PoolConfig;
use crate::error::{PoolError, PoolResult};
use crate::task::{DeferredTask, Invokable, RunStatus};

/// Completions between two purges of finished task records.
pub const DEFAULT_PURGE_INTERVAL: usize = 100;

/// What the workers should do once the queue is empty (or right away).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum StopMode {
    /// Normal operation.
    Running,
    /// Shutdown: finish the queue, then exit.
    Draining,
    /// Reconfiguration: finish the current task, then exit. The queue is
    /// left for the reconfiguring thread to discard.
    Halting,
}

/// Bookkeeping for one submitted task.
struct TaskRecord {
    task: Arc<dyn Invokable>,
    completed: bool,
    notify: Arc<Condvar>,
}

/// Everything behind the pool lock.
struct PoolState {
    queue: VecDeque<TaskId>,
    records: HashMap<TaskId, TaskRecord>,
    active: usize,
    mode: StopMode,
    /// Set by `shutdown`; survives a reconfiguration in progress.
    shutdown_requested: bool,
    next_id: u64,
    completions_since_purge: usize,
    stats: PoolStats,
}

impl PoolState {
    fn is_idle(&self) -> bool {
        self.active == 0 && self.queue.is_empty()
    }

    fn purge_completed(&mut self) -> usize {
        let before = self.records.len();
        self.records.retain(|_, record| !record.completed);
        let purged = before - self.records.len();
        self.stats.purged += purged as u64;
        purged
    }
}

struct Shared {
    state: Mutex<PoolState>,
    /// Signalled on submission and on stop.
    work_available: Condvar,
    /// Signalled when the pool becomes idle.
    all_done: Condvar,
    purge_interval: usize,
}

/// A pool of persistent worker threads.
///
/// # Example
///
/// ```rust,ignore
/// let pool = WorkerPool::new(4)?;
/// let handle = pool.spawn(|| expensive())?;
/// pool.wait_all();
/// let value = handle.result()?;
/// ```
///
/// Calling `wait_all` from inside a task running on the same pool deadlocks.
pub struct WorkerPool {
    shared: Arc<Shared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    /// Starts a pool with `threads` workers.
    ///
    /// # Errors
    ///
    /// Returns an error if `threads` is zero or a thread cannot be spawned.
    pub fn new(threads: usize) -> PoolResult<Self> {
        Self::with_purge_interval(threads, DEFAULT_PURGE_INTERVAL)
    }

    /// Starts a pool from configuration.
    ///
    /// # Errors
    ///
    /// See [`WorkerPool::new`].
    pub fn from_config(config: &PoolConfig) -> PoolResult<Self> {
        Self::with_purge_interval(config.threads, config.purge_interval)
    }

    /// Starts a pool that purges finished records every `purge_interval`
    /// completions.
    ///
    /// # Errors
    ///
    /// See [`WorkerPool::new`].
    pub fn with_purge_interval(threads: usize, purge_interval: usize) -> PoolResult<Self> {
        if threads == 0 {
            return Err(PoolError::InvalidThreadCount(threads));
        }

        let shared = Arc::new(Shared {
            state: Mutex::new(PoolState {
                queue: VecDeque::new(),
                records: HashMap::new(),
                active: 0,
                mode: StopMode::Running,
                shutdown_requested: false,
                next_id: 0,
                completions_since_purge: 0,
                stats: PoolStats::default(),
            }),
            work_available: Condvar::new(),
            all_done: Condvar::new(),
            purge_interval: purge_interval.max(1),
        });

        let pool = Self {
            shared,
            workers: Mutex::new(Vec::with_capacity(threads)),
        };
        pool.spawn_workers(&mut pool.workers.lock(), threads)?;
        Ok(pool)
    }

    /// Enqueues a task and returns its ID.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::SubmissionRejected`] while the pool is stopping.
    pub fn submit(&self, task: Arc<dyn Invokable>) -> PoolResult<TaskId> {
        let mut state = self.shared.state.lock();

        if state.mode != StopMode::Running {
            state.stats.rejected += 1;
            warn!(mode = ?state.mode, "submission rejected: pool is stopping");
            return Err(PoolError::SubmissionRejected);
        }

        let id = TaskId(state.next_id);
        state.next_id += 1;
        state.active += 1;
        state.stats.submitted += 1;
        state.records.insert(
            id,
            TaskRecord {
                task,
                completed: false,
                notify: Arc::new(Condvar::new()),
            },
        );
        state.queue.push_back(id);
        drop(state);

        self.shared.work_available.notify_one();
        Ok(id)
    }

    /// Wraps a closure in a [`DeferredTask`], submits it and returns a typed
    /// handle to its result.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::SubmissionRejected`] while the pool is stopping.
    pub fn spawn<F, R>(&self, f: F) -> PoolResult<TaskHandle<R>>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let task = Arc::new(DeferredTask::new(f));
        let id = self.submit(Arc::clone(&task) as Arc<dyn Invokable>)?;
        Ok(TaskHandle { id, task })
    }

    /// Blocks until every task submitted so far has finished or been drained.
    pub fn wait_all(&self) {
        let mut state = self.shared.state.lock();
        while !state.is_idle() {
            self.shared.all_done.wait(&mut state);
        }
    }

    /// Blocks until the task completes. Returns at once if the ID is unknown
    /// (purged records count as done).
    pub fn wait(&self, id: TaskId) {
        let mut state = self.shared.state.lock();
        loop {
            let notify = match state.records.get(&id) {
                Some(record) if !record.completed => Arc::clone(&record.notify),
                _ => return,
            };
            notify.wait(&mut state);
        }
    }

    /// Returns true if the task completed, was drained, or is unknown.
    #[must_use]
    pub fn is_task_complete(&self, id: TaskId) -> bool {
        self.shared
            .state
            .lock()
            .records
            .get(&id)
            .map_or(true, |record| record.completed)
    }

    /// Stops every worker, discards queued tasks that have not started, and
    /// restarts with `threads` workers.
    ///
    /// Tasks already picked up by a worker finish normally. Discarded tasks
    /// are completed without running, so waiters on them wake up.
    ///
    /// # Errors
    ///
    /// Returns an error if `threads` is zero (the pool is left untouched) or
    /// a thread cannot be spawned.
    pub fn set_thread_count(&self, threads: usize) -> PoolResult<()> {
        if threads == 0 {
            return Err(PoolError::InvalidThreadCount(threads));
        }

        let mut workers = self.workers.lock();
        let previous = workers.len();

        self.shared.state.lock().mode = StopMode::Halting;
        self.shared.work_available.notify_all();
        join_all(&mut workers);

        // Workers are gone and submissions are refused, so the queue is ours.
        let drained: Vec<(TaskId, Arc<dyn Invokable>)> = {
            let mut state = self.shared.state.lock();
            let ids: Vec<TaskId> = state.queue.drain(..).collect();
            ids.into_iter()
                .filter_map(|id| {
                    state
                        .records
                        .get(&id)
                        .filter(|record| !record.completed)
                        .map(|record| (id, Arc::clone(&record.task)))
                })
                .collect()
        };

        for (_, task) in &drained {
            task.discard();
        }

        let purged = {
            let mut state = self.shared.state.lock();
            for (id, _) in &drained {
                if let Some(record) = state.records.get_mut(id) {
                    record.completed = true;
                    record.notify.notify_all();
                }
            }
            state.active = state.active.saturating_sub(drained.len());
            state.stats.drained += drained.len() as u64;
            let purged = state.purge_completed();
            state.completions_since_purge = 0;
            state.mode = if state.shutdown_requested {
                StopMode::Draining
            } else {
                StopMode::Running
            };
            if state.is_idle() {
                self.shared.all_done.notify_all();
            }
            purged
        };

        if !drained.is_empty() {
            debug!(count = drained.len(), "drained queued tasks");
        }
        info!(from = previous, to = threads, purged, "worker pool reconfigured");

        // Workers started after a shutdown find the queue empty and exit.
        self.spawn_workers(&mut workers, threads)
    }

    /// Stops accepting work. Workers finish the queue and then exit.
    ///
    /// Issued during [`WorkerPool::set_thread_count`], the pool comes back
    /// from the reconfiguration already draining. Does not block; dropping
    /// the pool joins the workers.
    pub fn shutdown(&self) {
        {
            let mut state = self.shared.state.lock();
            state.shutdown_requested = true;
            if state.mode == StopMode::Running {
                state.mode = StopMode::Draining;
                info!(queued = state.queue.len(), "worker pool shutting down");
            }
        }
        self.shared.work_available.notify_all();
    }

    /// Returns false while the pool is shutting down or being reconfigured.
    #[must_use]
    pub fn is_accepting(&self) -> bool {
        self.shared.state.lock().mode == StopMode::Running
    }

    /// Returns the number of worker threads started by the last
    /// (re)configuration.
    #[must_use]
    pub fn thread_count(&self) -> usize {
        self.workers.lock().len()
    }

    /// Returns the number of submitted tasks that have not completed yet.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.shared.state.lock().active
    }

    /// Returns the number of task records currently held.
    #[must_use]
    pub fn tracked_count(&self) -> usize {
        self.shared.state.lock().records.len()
    }

    /// Returns a snapshot of the pool counters.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        self.shared.state.lock().stats
    }

    fn spawn_workers(&self, workers: &mut Vec<JoinHandle<()>>, threads: usize) -> PoolResult<()> {
        for index in 0..threads {
            let shared = Arc::clone(&self.shared);
            let handle = thread::Builder::new()
                .name(format!("framevox-worker-{index}"))
                .spawn(move || worker_loop(&shared, index))
                .map_err(PoolError::ThreadSpawn)?;
            workers.push(handle);
        }
        Ok(())
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
        join_all(self.workers.get_mut());
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("WorkerPool")
            .field("queued", &state.queue.len())
            .field("active", &state.active)
            .field("mode", &state.mode)
            .finish_non_exhaustive()
    }
}

fn join_all(workers: &mut Vec<JoinHandle<()>>) {
    for handle in workers.drain(..) {
        if handle.join().is_err() {
            warn!("worker thread terminated abnormally");
        }
    }
}

/// Body of every worker thread.
fn worker_loop(shared: &Shared, worker: usize) {
    debug!(worker, "worker started");

    loop {
        let (id, task) = {
            let mut state = shared.state.lock();
            let next = loop {
                match state.mode {
                    StopMode::Halting => break None,
                    StopMode::Draining if state.queue.is_empty() => break None,
                    _ => {}
                }
                if let Some(id) = state.queue.pop_front() {
                    break Some(id);
                }
                shared.work_available.wait(&mut state);
            };

            let Some(id) = next else {
                debug!(worker, "worker exiting");
                return;
            };

            match state.records.get(&id) {
                Some(record) if !record.completed => (id, Arc::clone(&record.task)),
                _ => continue,
            }
        };

        // Failures stay inside the task. A foreign Invokable that unwinds
        // anyway is counted as failed.
        let status = panic::catch_unwind(AssertUnwindSafe(|| task.run()))
            .unwrap_or(RunStatus::Failed);
        drop(task);

        let mut state = shared.state.lock();
        if let Some(record) = state.records.get_mut(&id) {
            record.completed = true;
            record.notify.notify_all();
        }
        state.active = state.active.saturating_sub(1);
        state.stats.completed += 1;
        if status == RunStatus::Failed {
            state.stats.failed += 1;
        }
        if state.is_idle() {
            shared.all_done.notify_all();
        }

        state.completions_since_purge += 1;
        if state.completions_since_purge >= shared.purge_interval {
            state.completions_since_purge = 0;
            let purged = state.purge_completed();
            trace!(worker, purged, "purged completed task records");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn test_zero_threads_rejected() {
        assert!(matches!(
            WorkerPool::new(0),
            Err(PoolError::InvalidThreadCount(0))
        ));
    }

    #[test]
    fn test_ids_are_monotonic() {
        let pool = WorkerPool::new(2).unwrap();
        let a = pool.submit(Arc::new(DeferredTask::new(|| ()))).unwrap();
        let b = pool.submit(Arc::new(DeferredTask::new(|| ()))).unwrap();
        let c = pool.submit(Arc::new(DeferredTask::new(|| ()))).unwrap();
        assert!(a < b && b < c);
        assert_eq!(a.get(), 0);
        pool.wait_all();
    }

    #[test]
    fn test_spawn_returns_result() {
        let pool = WorkerPool::new(2).unwrap();
        let handle = pool.spawn(|| 21 * 2).unwrap();
        assert_eq!(handle.result(), Ok(42));
        assert!(handle.is_complete());
        pool.wait(handle.id());
        assert!(pool.is_task_complete(handle.id()));
    }

    #[test]
    fn test_wait_all_completes_everything() {
        let pool = WorkerPool::new(3).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..200)
            .map(|_| {
                let counter = Arc::clone(&counter);
                let task = Arc::new(DeferredTask::new(move || {
                    counter.fetch_add(1, Ordering::Relaxed);
                }));
                pool.submit(task.clone()).unwrap();
                task
            })
            .collect();

        pool.wait_all();
        assert_eq!(counter.load(Ordering::Relaxed), 200);
        assert!(tasks.iter().all(|t| t.is_complete()));
        assert_eq!(pool.active_count(), 0);
    }

    #[test]
    fn test_failure_does_not_kill_worker() {
        let pool = WorkerPool::new(1).unwrap();
        let bad = pool.spawn(|| -> u32 { panic!("bad strip") }).unwrap();
        let good = pool.spawn(|| 7u32).unwrap();

        pool.wait_all();
        assert!(bad.result().is_err());
        assert_eq!(good.result(), Ok(7));

        let stats = pool.stats();
        assert_eq!(stats.completed, 2);
        assert_eq!(stats.failed, 1);
    }

    #[test]
    fn test_submit_after_shutdown_rejected() {
        let pool = WorkerPool::new(2).unwrap();
        pool.shutdown();
        let result = pool.submit(Arc::new(DeferredTask::new(|| ())));
        assert!(matches!(result, Err(PoolError::SubmissionRejected)));
        assert_eq!(pool.stats().rejected, 1);
    }

    #[test]
    fn test_shutdown_finishes_queue() {
        let pool = WorkerPool::new(1).unwrap();
        let handles: Vec<_> = (0..10)
            .map(|i| {
                pool.spawn(move || {
                    thread::sleep(Duration::from_millis(1));
                    i
                })
                .unwrap()
            })
            .collect();
        pool.shutdown();
        drop(pool);

        for (i, handle) in handles.iter().enumerate() {
            assert_eq!(handle.result(), Ok(i));
        }
    }

    #[test]
    fn test_set_thread_count_after_shutdown_restarts() {
        let pool = WorkerPool::new(1).unwrap();
        pool.shutdown();
        pool.set_thread_count(3).unwrap();
        assert_eq!(pool.thread_count(), 3);
        assert_eq!(pool.spawn(|| 1).unwrap().result(), Ok(1));
    }

    #[test]
    fn test_set_thread_count_zero_rejected() {
        let pool = WorkerPool::new(2).unwrap();
        assert!(pool.set_thread_count(0).is_err());
        assert_eq!(pool.thread_count(), 2);
    }

    #[test]
    fn test_records_are_purged() {
        let pool = WorkerPool::with_purge_interval(2, 10).unwrap();
        for _ in 0..100 {
            pool.spawn(|| ()).unwrap();
        }
        pool.wait_all();
        assert!(pool.tracked_count() < 100);
        assert!(pool.stats().purged > 0);
    }

    #[test]
    fn test_wait_unknown_id_returns() {
        let pool = WorkerPool::new(1).unwrap();
        pool.wait(TaskId(12345));
        assert!(pool.is_task_complete(TaskId(12345)));
    }
}
