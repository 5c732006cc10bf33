//! # Buffer Pool
//!
//! Thread-safe recycler for growable `Vec<T>` buffers.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

/// A pool of reusable `Vec<T>` buffers.
///
/// Buffers leave the pool by value and come back through [`BufferPool::release`].
/// A released buffer is cleared but keeps its capacity, so the next
/// `acquire` gets memory that is already large enough.
///
/// # Thread Safety
///
/// One lock guards the free stack. It is held only for a push or a pop.
///
/// # Example
///
/// ```rust,ignore
/// let pool: BufferPool<Vertex> = BufferPool::new(4444);
///
/// let mut vertices = pool.acquire();   // len 0, capacity >= 4444
/// vertices.push(vertex);
/// pool.release(vertices);              // back on the stack, capacity kept
/// ```
pub struct BufferPool<T> {
    /// Free buffers, all of length zero.
    free: Mutex<Vec<Vec<T>>>,
    /// Buffers ever created by this pool, adopted ones included.
    created: AtomicUsize,
    /// Buffers handed out by `acquire` and not yet released.
    checked_out: AtomicUsize,
    /// Capacity reserved for freshly created buffers.
    default_capacity: usize,
}

impl<T> BufferPool<T> {
    /// Creates an empty pool.
    ///
    /// # Arguments
    ///
    /// * `default_capacity` - Elements reserved in every newly created buffer
    #[must_use]
    pub fn new(default_capacity: usize) -> Self {
        Self {
            free: Mutex::new(Vec::new()),
            created: AtomicUsize::new(0),
            checked_out: AtomicUsize::new(0),
            default_capacity,
        }
    }

    /// Creates a pool with `count` buffers already allocated.
    #[must_use]
    pub fn with_preallocated(default_capacity: usize, count: usize) -> Self {
        let free = (0..count)
            .map(|_| Vec::with_capacity(default_capacity))
            .collect();
        Self {
            free: Mutex::new(free),
            created: AtomicUsize::new(count),
            checked_out: AtomicUsize::new(0),
            default_capacity,
        }
    }

    /// Returns the capacity reserved for new buffers.
    #[inline]
    #[must_use]
    pub const fn default_capacity(&self) -> usize {
        self.default_capacity
    }

    /// Takes a buffer out of the pool.
    ///
    /// # Returns
    ///
    /// A recycled buffer if one is free, otherwise a new one with
    /// `default_capacity` reserved. Always of length zero.
    #[must_use]
    pub fn acquire(&self) -> Vec<T> {
        self.checked_out.fetch_add(1, Ordering::Relaxed);
        if let Some(buffer) = self.free.lock().pop() {
            return buffer;
        }

        self.created.fetch_add(1, Ordering::Relaxed);
        Vec::with_capacity(self.default_capacity)
    }

    /// Returns a buffer to the pool. Its contents are dropped, its capacity kept.
    ///
    /// A buffer that did not come from [`BufferPool::acquire`] is adopted and
    /// counted in [`BufferPool::total_created`].
    pub fn release(&self, mut buffer: Vec<T>) {
        buffer.clear();
        let returned = self
            .checked_out
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1))
            .is_ok();
        if !returned {
            self.created.fetch_add(1, Ordering::Relaxed);
        }
        self.free.lock().push(buffer);
    }

    /// Takes a buffer that goes back to the pool when the guard is dropped.
    #[must_use]
    pub fn acquire_guard(&self) -> PooledVec<'_, T> {
        PooledVec {
            buffer: self.acquire(),
            pool: self,
        }
    }

    /// Returns how many buffers this pool has ever created.
    ///
    /// Monotonic, including across [`BufferPool::clear`].
    #[inline]
    #[must_use]
    pub fn total_created(&self) -> usize {
        self.created.load(Ordering::Relaxed)
    }

    /// Returns how many buffers are waiting on the free stack.
    #[must_use]
    pub fn available(&self) -> usize {
        self.free.lock().len()
    }

    /// Frees every buffer currently on the free stack.
    ///
    /// Buffers checked out by callers are unaffected.
    pub fn clear(&self) {
        let dropped = std::mem::take(&mut *self.free.lock());
        drop(dropped);
    }
}

impl<T> fmt::Debug for BufferPool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferPool")
            .field("available", &self.available())
            .field("total_created", &self.total_created())
            .field("default_capacity", &self.default_capacity)
            .finish()
    }
}

/// A buffer borrowed from a [`BufferPool`] and returned to it on drop.
pub struct PooledVec<'a, T> {
    buffer: Vec<T>,
    pool: &'a BufferPool<T>,
}

impl<T> PooledVec<'_, T> {
    /// Keeps the buffer instead of returning it to the pool.
    #[must_use]
    pub fn into_inner(mut self) -> Vec<T> {
        std::mem::take(&mut self.buffer)
    }
}

impl<T> Deref for PooledVec<'_, T> {
    type Target = Vec<T>;

    fn deref(&self) -> &Vec<T> {
        &self.buffer
    }
}

impl<T> DerefMut for PooledVec<'_, T> {
    fn deref_mut(&mut self) -> &mut Vec<T> {
        &mut self.buffer
    }
}

impl<T> Drop for PooledVec<'_, T> {
    fn drop(&mut self) {
        // Zero capacity means `into_inner` already took the buffer.
        if self.buffer.capacity() > 0 {
            self.pool.release(std::mem::take(&mut self.buffer));
        }
    }
}
