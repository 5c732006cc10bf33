//! # Slot Allocator
//!
//! Stable-ID table with deferred commit and delete.
//!
//! ## Rules
//!
//! - `write` hands out an ID immediately, the payload appears at `commit`
//! - The free list only ever holds tombstoned IDs
//! - `commit` applies deletions first, then writes
//! - A write and a delete of the same ID in one cycle: the delete wins

use std::collections::HashSet;

use parking_lot::{Mutex, MutexGuard};
use tracing::trace;

use super::{Aabb, NoopBackend, SlotBackend, SlotId};

/// One row of the table. Tombstoned when it holds no payload.
#[derive(Debug)]
pub struct SlotEntry<P> {
    payload: Option<P>,
    bounds: Aabb,
}

impl<P> SlotEntry<P> {
    const fn tombstone() -> Self {
        Self {
            payload: None,
            bounds: Aabb {
                min: [0.0; 3],
                max: [0.0; 3],
            },
        }
    }

    /// Returns the payload, or `None` for a tombstone.
    #[inline]
    #[must_use]
    pub fn payload(&self) -> Option<&P> {
        self.payload.as_ref()
    }

    /// Returns the bounds installed with the payload.
    #[inline]
    #[must_use]
    pub fn bounds(&self) -> &Aabb {
        &self.bounds
    }

    /// Returns true if the entry holds a payload.
    #[inline]
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.payload.is_some()
    }
}

struct PendingWrite<P> {
    id: SlotId,
    payload: P,
    bounds: Aabb,
}

/// Table and staging, all behind one lock.
struct SlotTable<P> {
    entries: Vec<SlotEntry<P>>,
    /// Stack of tombstoned IDs; the top is handed out next.
    free: Vec<SlotId>,
    next_fresh: u32,
    live: usize,
    pending_writes: Vec<PendingWrite<P>>,
    pending_deletes: Vec<SlotId>,
    /// IDs with a staged write.
    staged: HashSet<SlotId>,
    /// IDs already on `pending_deletes`.
    marked: HashSet<SlotId>,
}

impl<P> SlotTable<P> {
    fn has_live(&self, id: SlotId) -> bool {
        self.entries.get(id.index()).is_some_and(SlotEntry::is_live)
    }
}

/// Counts from a single commit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct CommitSummary {
    deleted: usize,
    written: usize,
    cancelled: usize,
}

/// A stable-ID slot table shared between producers and one consumer.
///
/// # Thread Safety
///
/// `write` and `mark_for_deletion` may be called from any thread. `commit`
/// is meant for a single consumer; the returned [`SlotView`] holds the table
/// lock, so producers block until it is dropped.
///
/// # Example
///
/// ```rust,ignore
/// let slots: SlotAllocator<Mesh> = SlotAllocator::new(6222);
///
/// // Producer threads
/// let id = slots.write(mesh, bounds);
/// slots.mark_for_deletion(old_id);
///
/// // Consumer thread, once per frame
/// for (id, mesh, bounds) in slots.commit().iter() {
///     draw(mesh, bounds);
/// }
/// ```
pub struct SlotAllocator<P> {
    table: Mutex<SlotTable<P>>,
}

impl<P> SlotAllocator<P> {
    /// Creates a table with `initial_slots` tombstoned rows.
    ///
    /// Row 0 is always present and reserved. IDs `1..initial_slots` sit on
    /// the free list and are handed out lowest first.
    #[must_use]
    pub fn new(initial_slots: usize) -> Self {
        let rows = u32::try_from(initial_slots.max(1)).unwrap_or(u32::MAX);
        let entries = (0..rows).map(|_| SlotEntry::tombstone()).collect();
        let free = (1..rows).rev().map(SlotId).collect();

        Self {
            table: Mutex::new(SlotTable {
                entries,
                free,
                next_fresh: rows,
                live: 0,
                pending_writes: Vec::new(),
                pending_deletes: Vec::new(),
                staged: HashSet::new(),
                marked: HashSet::new(),
            }),
        }
    }

    /// Stages a payload and returns the ID it will live under.
    ///
    /// The ID comes from the free list when possible, otherwise it is fresh.
    /// The payload becomes visible at the next `commit`.
    ///
    /// # Panics
    ///
    /// Panics if the free list is empty and every `u32` ID has been handed
    /// out. Like running out of memory, this is not recoverable.
    pub fn write(&self, payload: P, bounds: Aabb) -> SlotId {
        let mut table = self.table.lock();

        let id = match table.free.pop() {
            Some(id) => id,
            None => {
                let id = SlotId(table.next_fresh);
                let Some(next) = table.next_fresh.checked_add(1) else {
                    drop(table);
                    panic!("slot IDs exhausted: {} fresh IDs handed out", u32::MAX);
                };
                table.next_fresh = next;
                id
            }
        };

        table.staged.insert(id);
        table.pending_writes.push(PendingWrite {
            id,
            payload,
            bounds,
        });
        id
    }

    /// Stages a deletion.
    ///
    /// # Returns
    ///
    /// True if the deletion was staged. Deleting the reserved ID, an unknown
    /// or tombstoned ID, or an ID already staged for deletion is a no-op that
    /// returns false.
    pub fn mark_for_deletion(&self, id: SlotId) -> bool {
        if id.is_reserved() {
            return false;
        }

        let mut table = self.table.lock();
        if !(table.has_live(id) || table.staged.contains(&id)) {
            return false;
        }
        if !table.marked.insert(id) {
            return false;
        }

        table.pending_deletes.push(id);
        true
    }

    /// Applies staged changes and returns a view of the live entries.
    pub fn commit(&self) -> SlotView<'_, P> {
        self.commit_with(&mut NoopBackend)
    }

    /// Applies staged changes, running `backend` for every payload that is
    /// installed or released, and returns a view of the live entries.
    pub fn commit_with<B>(&self, backend: &mut B) -> SlotView<'_, P>
    where
        B: SlotBackend<P> + ?Sized,
    {
        let mut guard = self.table.lock();
        let table = &mut *guard;
        let mut summary = CommitSummary::default();

        for id in table.pending_deletes.drain(..) {
            // Staged writes for this ID are cancelled below.
            let Some(entry) = table.entries.get_mut(id.index()) else {
                continue;
            };
            if let Some(payload) = entry.payload.take() {
                entry.bounds = Aabb::default();
                backend.release(id, payload);
                table.free.push(id);
                table.live -= 1;
                summary.deleted += 1;
            }
        }

        for write in table.pending_writes.drain(..) {
            let PendingWrite {
                id,
                payload,
                bounds,
            } = write;

            if table.marked.contains(&id) {
                backend.release(id, payload);
                table.free.push(id);
                summary.cancelled += 1;
                continue;
            }

            let index = id.index();
            if index >= table.entries.len() {
                table.entries.resize_with(index + 1, SlotEntry::tombstone);
            }
            let entry = &mut table.entries[index];
            backend.upload(id, &payload, &bounds);
            entry.payload = Some(payload);
            entry.bounds = bounds;
            table.live += 1;
            summary.written += 1;
        }

        table.staged.clear();
        table.marked.clear();

        if summary != CommitSummary::default() {
            trace!(
                deleted = summary.deleted,
                written = summary.written,
                cancelled = summary.cancelled,
                live = table.live,
                "slot commit"
            );
        }

        SlotView { table: guard }
    }

    /// Returns a view of the live entries without committing.
    pub fn view(&self) -> SlotView<'_, P> {
        SlotView {
            table: self.table.lock(),
        }
    }

    /// Returns the number of staged writes plus staged deletions.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        let table = self.table.lock();
        table.pending_writes.len() + table.pending_deletes.len()
    }

    /// Returns the number of live entries as of the last commit.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.table.lock().live
    }

    /// Returns the number of rows in the table, tombstones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.lock().entries.len()
    }

    /// Returns true if no entry is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live_count() == 0
    }

    /// Returns the number of IDs waiting on the free list.
    #[must_use]
    pub fn free_len(&self) -> usize {
        self.table.lock().free.len()
    }
}

impl<P> std::fmt::Debug for SlotAllocator<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let table = self.table.lock();
        f.debug_struct("SlotAllocator")
            .field("rows", &table.entries.len())
            .field("live", &table.live)
            .field("free", &table.free.len())
            .field("pending_writes", &table.pending_writes.len())
            .field("pending_deletes", &table.pending_deletes.len())
            .finish()
    }
}

/// Read access to the committed table. Holds the table lock while alive.
pub struct SlotView<'a, P> {
    table: MutexGuard<'a, SlotTable<P>>,
}

impl<P> SlotView<'_, P> {
    /// Iterates live entries in ID order, skipping tombstones.
    pub fn iter(&self) -> impl Iterator<Item = (SlotId, &P, &Aabb)> + '_ {
        self.table
            .entries
            .iter()
            .enumerate()
            .filter_map(|(index, entry)| {
                let payload = entry.payload.as_ref()?;
                let id = SlotId(u32::try_from(index).ok()?);
                Some((id, payload, &entry.bounds))
            })
    }

    /// Returns the live entry for `id`.
    #[must_use]
    pub fn get(&self, id: SlotId) -> Option<(&P, &Aabb)> {
        let entry = self.table.entries.get(id.index())?;
        entry.payload.as_ref().map(|payload| (payload, &entry.bounds))
    }

    /// Returns the raw entry for `id`, tombstone or not.
    #[must_use]
    pub fn entry(&self, id: SlotId) -> Option<&SlotEntry<P>> {
        self.table.entries.get(id.index())
    }

    /// Returns the number of live entries.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.table.live
    }

    /// Returns the number of rows, tombstones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.entries.len()
    }

    /// Returns true if no entry is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.live == 0
    }
}
