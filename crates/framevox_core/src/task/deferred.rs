//! # Deferred Task
//!
//! Concrete task holding a callable, its result slot and a completion signal.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use super::{Invokable, RunStatus};
use crate::error::{TaskError, TaskFailure, TaskResult};

/// Boxed work, already bound to its arguments.
type Job<R> = Box<dyn FnOnce() -> Result<R, TaskFailure> + Send>;

/// Lock-protected lifecycle of a task.
struct TaskState<R> {
    started: bool,
    completed: bool,
    /// `None` before completion, or after a successful result was taken.
    outcome: Option<Result<R, TaskFailure>>,
}

/// A deferred computation with thread-safe result delivery.
///
/// Built by the submitter, shared with a worker pool through `Arc`, and run
/// exactly once. `result()` blocks until the run finished and then hands out
/// the value, or the captured failure.
///
/// # Example
///
/// ```rust,ignore
/// let task = Arc::new(DeferredTask::with_args(|(a, b)| a + b, (2, 3)));
/// pool.submit(task.clone())?;
/// assert_eq!(task.result()?, 5);
/// ```
pub struct DeferredTask<R> {
    /// Taken by the first `run()`.
    job: Mutex<Option<Job<R>>>,
    state: Mutex<TaskState<R>>,
    done: Condvar,
}

impl<R: Send + 'static> DeferredTask<R> {
    /// Creates a task from a callable with no bound arguments.
    #[must_use]
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce() -> R + Send + 'static,
    {
        Self::from_job(Box::new(move || Ok(f())))
    }

    /// Creates a task from a callable and the arguments it will be invoked with.
    ///
    /// Arguments are moved into the task now and handed to the callable when
    /// the task runs. Use a tuple for several arguments.
    #[must_use]
    pub fn with_args<A, F>(f: F, args: A) -> Self
    where
        A: Send + 'static,
        F: FnOnce(A) -> R + Send + 'static,
    {
        Self::from_job(Box::new(move || Ok(f(args))))
    }

    /// Creates a task whose `Err` return is captured as a failure.
    #[must_use]
    pub fn fallible<E, F>(f: F) -> Self
    where
        E: fmt::Display,
        F: FnOnce() -> Result<R, E> + Send + 'static,
    {
        Self::from_job(Box::new(move || {
            f().map_err(|e| TaskFailure::Errored(e.to_string()))
        }))
    }

    fn from_job(job: Job<R>) -> Self {
        Self {
            job: Mutex::new(Some(job)),
            state: Mutex::new(TaskState {
                started: false,
                completed: false,
                outcome: None,
            }),
            done: Condvar::new(),
        }
    }

    /// Blocks until the task completes, then returns its result.
    ///
    /// # Errors
    ///
    /// - [`TaskError::Failed`] if the task failed. Repeated calls keep
    ///   reporting the same failure.
    /// - [`TaskError::ResultTaken`] if a previous call already took the value.
    pub fn result(&self) -> TaskResult<R> {
        let mut state = self.state.lock();
        while !state.completed {
            self.done.wait(&mut state);
        }

        match state.outcome.take() {
            Some(Ok(value)) => Ok(value),
            Some(Err(failure)) => {
                state.outcome = Some(Err(failure.clone()));
                Err(TaskError::Failed(failure))
            }
            None => Err(TaskError::ResultTaken),
        }
    }

    /// Blocks until the task completes without taking its result.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::Failed`] if the task failed.
    pub fn wait(&self) -> TaskResult<()> {
        let mut state = self.state.lock();
        while !state.completed {
            self.done.wait(&mut state);
        }

        match &state.outcome {
            Some(Err(failure)) => Err(TaskError::Failed(failure.clone())),
            _ => Ok(()),
        }
    }

    /// Waits up to `timeout` for completion. Returns true if completed.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        while !state.completed {
            if self.done.wait_until(&mut state, deadline).timed_out() {
                return state.completed;
            }
        }
        true
    }

    /// Returns the captured failure without blocking, if the task failed.
    #[must_use]
    pub fn failure(&self) -> Option<TaskFailure> {
        match &self.state.lock().outcome {
            Some(Err(failure)) => Some(failure.clone()),
            _ => None,
        }
    }
}

impl<R: Send + 'static> Invokable for DeferredTask<R> {
    fn run(&self) -> RunStatus {
        let Some(job) = self.job.lock().take() else {
            return RunStatus::AlreadyRun;
        };

        self.state.lock().started = true;

        let outcome = match panic::catch_unwind(AssertUnwindSafe(job)) {
            Ok(outcome) => outcome,
            Err(payload) => Err(TaskFailure::Panicked(panic_message(payload.as_ref()))),
        };
        let status = if outcome.is_ok() {
            RunStatus::Succeeded
        } else {
            RunStatus::Failed
        };

        let mut state = self.state.lock();
        state.outcome = Some(outcome);
        state.completed = true;
        self.done.notify_all();

        status
    }

    fn is_complete(&self) -> bool {
        self.state.lock().completed
    }

    fn has_started(&self) -> bool {
        self.state.lock().started
    }

    fn discard(&self) {
        if self.job.lock().take().is_none() {
            return;
        }

        let mut state = self.state.lock();
        state.outcome = Some(Err(TaskFailure::Discarded));
        state.completed = true;
        self.done.notify_all();
    }
}

impl<R> fmt::Debug for DeferredTask<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("DeferredTask")
            .field("started", &state.started)
            .field("completed", &state.completed)
            .finish_non_exhaustive()
    }
}

/// Extracts a readable message from a panic payload.
fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
