//! # Scheduling
//!
//! A fixed set of persistent worker threads fed from one FIFO queue.
//!
//! ```text
//!   submit ──> [ queue: id id id ... ] ──> worker 0 ─┐
//!                                      ──> worker 1 ─┼──> record.completed
//!                                      ──> worker N ─┘         │
//!                                                              v
//!                                              wait(id) / wait_all() wake up
//! ```
//!
//! Start order is FIFO. Completion order across workers is not. The only
//! global ordering guarantee is [`WorkerPool::wait_all`].

mod worker_pool;

use std::fmt;
use std::sync::Arc;

use crate::error::TaskResult;
use crate::task::{DeferredTask, Invokable};

pub use worker_pool::{WorkerPool, DEFAULT_PURGE_INTERVAL};

/// Identifier assigned to a submitted task.
///
/// IDs increase monotonically per pool and are never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl TaskId {
    /// Returns the raw ID value.
    #[inline]
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task#{}", self.0)
    }
}

/// Pool diagnostics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Tasks accepted by `submit`.
    pub submitted: u64,
    /// Tasks run to completion by a worker (including failed ones).
    pub completed: u64,
    /// Tasks whose run captured a failure.
    pub failed: u64,
    /// Queued tasks discarded by a reconfiguration.
    pub drained: u64,
    /// Submissions refused because the pool was stopping.
    pub rejected: u64,
    /// Completed records removed from the task map.
    pub purged: u64,
}

/// A typed handle to a task created by [`WorkerPool::spawn`].
pub struct TaskHandle<R> {
    id: TaskId,
    task: Arc<DeferredTask<R>>,
}

impl<R: Send + 'static> TaskHandle<R> {
    /// Returns the pool-assigned ID.
    #[inline]
    #[must_use]
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Blocks until the task completes and returns its result.
    ///
    /// # Errors
    ///
    /// See [`DeferredTask::result`].
    pub fn result(&self) -> TaskResult<R> {
        self.task.result()
    }

    /// Blocks until the task completes.
    ///
    /// # Errors
    ///
    /// Returns the captured failure, if any.
    pub fn wait(&self) -> TaskResult<()> {
        self.task.wait()
    }

    /// Returns true once the task finished running or was discarded.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.task.is_complete()
    }

    /// Returns the underlying task.
    #[must_use]
    pub fn task(&self) -> &Arc<DeferredTask<R>> {
        &self.task
    }
}

impl<R> fmt::Debug for TaskHandle<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("id", &self.id)
            .field("task", &self.task)
            .finish()
    }
}
