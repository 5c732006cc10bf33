//! # Strip Scheduling
//!
//! Splits an extent into one horizontal strip per worker and runs a pass
//! over all strips with a barrier at the end.
//!
//! ```text
//!   extent = 17, workers = 4
//!
//!   [0..4) [4..8) [8..12) [12..17)
//!    base   base   base   base + extra
//! ```
//!
//! A frame is processed as a chain of such passes: generate, barrier, mesh,
//! barrier, publish.

use std::ops::Range;
use std::sync::Arc;

use crate::error::{PoolError, PoolResult, TaskError};
use crate::sched::{TaskHandle, WorkerPool};

/// One contiguous strip `[start, end)` of an extent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Strip {
    /// Position of the strip in its plan.
    pub index: usize,
    /// First row, inclusive.
    pub start: usize,
    /// Last row, exclusive.
    pub end: usize,
}

impl Strip {
    /// Returns the number of rows in the strip.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.end - self.start
    }

    /// Returns true for a strip with no rows.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Returns the strip as a row range.
    #[inline]
    #[must_use]
    pub const fn rows(&self) -> Range<usize> {
        self.start..self.end
    }
}

/// A partition of `extent` rows into `workers` strips.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StripPlan {
    extent: usize,
    strips: Vec<Strip>,
}

impl StripPlan {
    /// Partitions `extent` rows over `workers` strips.
    ///
    /// Every strip gets `extent / workers` rows and the last one also takes
    /// the remainder. A worker count of zero is treated as one.
    #[must_use]
    pub fn new(extent: usize, workers: usize) -> Self {
        let workers = workers.max(1);
        let base = extent / workers;
        let extra = extent % workers;

        let strips = (0..workers)
            .map(|index| {
                let start = index * base;
                let end = if index + 1 == workers {
                    start + base + extra
                } else {
                    start + base
                };
                Strip { index, start, end }
            })
            .collect();

        Self { extent, strips }
    }

    /// Returns the partitioned extent.
    #[inline]
    #[must_use]
    pub const fn extent(&self) -> usize {
        self.extent
    }

    /// Returns every strip, empty ones included.
    #[inline]
    #[must_use]
    pub fn strips(&self) -> &[Strip] {
        &self.strips
    }

    /// Returns every strip size, empty ones included.
    #[must_use]
    pub fn sizes(&self) -> Vec<usize> {
        self.strips.iter().map(Strip::len).collect()
    }

    /// Iterates the strips that have work to do.
    pub fn iter(&self) -> impl Iterator<Item = Strip> + '_ {
        self.strips.iter().copied().filter(|strip| !strip.is_empty())
    }
}

/// Runs `f` once per non-empty strip on `pool` and waits for all of them.
///
/// # Errors
///
/// Returns [`PoolError::SubmissionRejected`] if the pool is stopping, or
/// [`PoolError::StripFailed`] for the first strip (in strip order) whose
/// task failed. Every submitted strip has finished when this returns.
pub fn run_strip_pass<F>(pool: &WorkerPool, plan: &StripPlan, f: F) -> PoolResult<()>
where
    F: Fn(Strip) + Send + Sync + 'static,
{
    let f = Arc::new(f);
    let mut handles: Vec<(Strip, TaskHandle<()>)> = Vec::with_capacity(plan.strips().len());

    for strip in plan.iter() {
        let f = Arc::clone(&f);
        match pool.spawn(move || f(strip)) {
            Ok(handle) => handles.push((strip, handle)),
            Err(err) => {
                // Strips already queued still touch shared state; let them land.
                pool.wait_all();
                return Err(err);
            }
        }
    }

    pool.wait_all();

    for (strip, handle) in handles {
        if let Err(err) = handle.wait() {
            let failure = match err {
                TaskError::Failed(failure) => failure,
                TaskError::ResultTaken => continue,
            };
            return Err(PoolError::StripFailed {
                strip: strip.index,
                failure,
            });
        }
    }

    Ok(())
}
