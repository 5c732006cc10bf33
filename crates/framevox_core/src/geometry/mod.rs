//! # Geometry Slots
//!
//! Stable IDs for published geometry, written by many producers and read by
//! one consumer once per cycle.
//!
//! ```text
//!   producers:  write(payload, bounds) -> id      mark_for_deletion(id)
//!                         │                              │
//!                         v                              v
//!                 [ pending writes ]            [ pending deletes ]
//!                         └──────────┬───────────────────┘
//!                                    v
//!   consumer:                    commit()  ──> SlotView (live entries only)
//! ```

mod slot_allocator;

use std::fmt;

pub use slot_allocator::{SlotAllocator, SlotEntry, SlotView};

/// Axis-aligned bounding box.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Aabb {
    /// Minimum corner.
    pub min: [f32; 3],
    /// Maximum corner.
    pub max: [f32; 3],
}

impl Aabb {
    /// Creates a box from its corners.
    #[inline]
    #[must_use]
    pub const fn new(min: [f32; 3], max: [f32; 3]) -> Self {
        Self { min, max }
    }

    /// Returns the center point.
    #[inline]
    #[must_use]
    pub fn center(&self) -> [f32; 3] {
        [
            (self.min[0] + self.max[0]) * 0.5,
            (self.min[1] + self.max[1]) * 0.5,
            (self.min[2] + self.max[2]) * 0.5,
        ]
    }

    /// Returns true if `point` lies inside or on the box.
    #[inline]
    #[must_use]
    pub fn contains(&self, point: [f32; 3]) -> bool {
        (0..3).all(|axis| point[axis] >= self.min[axis] && point[axis] <= self.max[axis])
    }
}

/// Stable identifier of a slot. `0` is reserved and never handed out.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(u32);

impl SlotId {
    /// The reserved ID. Deleting it is always a no-op.
    pub const RESERVED: Self = Self(0);

    /// Wraps a raw ID.
    #[inline]
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw ID.
    #[inline]
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }

    /// Returns true for the reserved ID.
    #[inline]
    #[must_use]
    pub const fn is_reserved(self) -> bool {
        self.0 == 0
    }

    #[inline]
    const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "slot#{}", self.0)
    }
}

/// Consumer-side hooks run during [`SlotAllocator::commit_with`].
///
/// This is where a renderer would upload or free GPU buffers.
pub trait SlotBackend<P> {
    /// Called after a payload was installed in a slot.
    fn upload(&mut self, id: SlotId, payload: &P, bounds: &Aabb);

    /// Called with a payload leaving the table (deleted or cancelled).
    fn release(&mut self, id: SlotId, payload: P);
}

/// Backend that does nothing; released payloads are dropped.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopBackend;

impl<P> SlotBackend<P> for NoopBackend {
    fn upload(&mut self, _id: SlotId, _payload: &P, _bounds: &Aabb) {}

    fn release(&mut self, _id: SlotId, _payload: P) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aabb_contains() {
        let bounds = Aabb::new([0.0, 0.0, 0.0], [16.0, 30.0, 16.0]);
        assert!(bounds.contains([8.0, 15.0, 8.0]));
        assert!(bounds.contains([16.0, 30.0, 16.0]));
        assert!(!bounds.contains([-0.5, 1.0, 1.0]));
        assert_eq!(bounds.center(), [8.0, 15.0, 8.0]);
    }

    #[test]
    fn test_reserved_slot() {
        assert!(SlotId::RESERVED.is_reserved());
        assert!(!SlotId::new(1).is_reserved());
        assert_eq!(SlotId::new(7).to_string(), "slot#7");
    }
}
