//! # Core Error Types
//!
//! All errors that can surface from the scheduling and pooling layer.

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// A failure captured inside a task while it ran.
///
/// Failures never escape into the worker that ran the task. They are stored
/// in the task and handed to whoever asks for its result.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TaskFailure {
    /// The callable panicked. Holds the panic message when it was a string.
    Panicked(String),
    /// A fallible callable returned `Err`. Holds the rendered error.
    Errored(String),
    /// The task was drained from a queue by a reconfiguration and never ran.
    Discarded,
}

impl TaskFailure {
    /// Returns the failure message.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Panicked(msg) | Self::Errored(msg) => msg,
            Self::Discarded => "discarded before it ran",
        }
    }
}

impl fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Panicked(msg) => write!(f, "task panicked: {msg}"),
            Self::Errored(msg) => write!(f, "task returned an error: {msg}"),
            Self::Discarded => f.write_str("task discarded before it ran"),
        }
    }
}

/// Errors observed by a caller awaiting a task.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    /// The task ran and failed.
    #[error("{0}")]
    Failed(TaskFailure),

    /// The result was already moved out by an earlier `result()` call.
    #[error("task result already taken")]
    ResultTaken,
}

/// Result type for awaiting tasks.
pub type TaskResult<T> = Result<T, TaskError>;

/// Errors that can occur in the worker pool and strip passes.
#[derive(Error, Debug)]
pub enum PoolError {
    /// The pool is stopping and no longer accepts work.
    #[error("submission rejected: worker pool is stopping")]
    SubmissionRejected,

    /// A pool cannot run with zero workers.
    #[error("invalid thread count: {0} (must be at least 1)")]
    InvalidThreadCount(usize),

    /// The OS refused to start a worker thread.
    #[error("failed to spawn worker thread: {0}")]
    ThreadSpawn(#[source] io::Error),

    /// A strip task failed during a strip pass.
    #[error("strip {strip} failed: {failure}")]
    StripFailed {
        /// Index of the failing strip.
        strip: usize,
        /// The captured failure.
        failure: TaskFailure,
    },
}

/// Result type for pool operations.
pub type PoolResult<T> = Result<T, PoolError>;

/// Errors raised while loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config {path}: {source}")]
    Io {
        /// Path that was read.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },

    /// The config text is not valid TOML for this schema.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config parsed but a value is out of range.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Result type for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_display() {
        let failure = TaskFailure::Panicked("boom".to_string());
        assert_eq!(failure.to_string(), "task panicked: boom");
        assert_eq!(failure.message(), "boom");

        let err = TaskError::Failed(TaskFailure::Errored("bad input".to_string()));
        assert_eq!(err.to_string(), "task returned an error: bad input");
    }

    #[test]
    fn test_strip_failed_display() {
        let err = PoolError::StripFailed {
            strip: 3,
            failure: TaskFailure::Panicked("oops".to_string()),
        };
        assert_eq!(err.to_string(), "strip 3 failed: task panicked: oops");
    }
}
