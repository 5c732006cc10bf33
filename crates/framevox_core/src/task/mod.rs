//! # Deferred Tasks
//!
//! A task is a unit of work that is built on one thread and run on another.
//!
//! ## The Problem
//!
//! ```text
//! Submitter:  build work, hand it away, maybe ask for the answer later
//! Worker:     run whatever it is given, never crash because of it
//! ```
//!
//! The worker must not know the concrete result type of the work it runs,
//! while the submitter must get that concrete result back.
//!
//! ## The Solution
//!
//! ```text
//!   DeferredTask<R> ──(Arc)──> submitter: result() -> R
//!        │
//!        └──(Arc<dyn Invokable>)──> worker: run(), is_complete(), has_started()
//! ```
//!
//! The worker only sees the [`Invokable`] capability set. Results and
//! failures stay inside the task until a caller asks for them.

mod deferred;

pub use deferred::DeferredTask;

/// Outcome of a single [`Invokable::run`] call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunStatus {
    /// The callable finished and its result was stored.
    Succeeded,
    /// The callable failed and the failure was stored.
    Failed,
    /// The task had already been run; nothing happened.
    AlreadyRun,
}

impl RunStatus {
    /// Returns true if the run produced a result.
    #[inline]
    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Succeeded)
    }
}

/// The type-erased capability set a worker needs to drive a task.
///
/// Implementations must capture their own failures: `run` is expected to
/// return normally even when the underlying work fails.
pub trait Invokable: Send + Sync {
    /// Runs the task. Must be called at most once by the scheduler.
    fn run(&self) -> RunStatus;

    /// Returns true once the task has finished running (successfully or not).
    fn is_complete(&self) -> bool;

    /// Returns true once the task has begun running.
    fn has_started(&self) -> bool;

    /// Completes a task that will never run, so anyone waiting on it wakes up.
    ///
    /// Called by the pool for tasks drained by a reconfiguration. A no-op if
    /// the task already ran.
    fn discard(&self) {}
}
