//! Strongly-typed identifiers for device resources, arenas and timelines.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identifies a buffer resource on a [`Device`](crate::Device).
///
/// Assigned by the device when the resource is created. Ids are never
/// reused by a device within its lifetime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(pub u64);

impl fmt::Display for BufferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "buffer#{}", self.0)
    }
}

/// Identifies a texture resource on a [`Device`](crate::Device).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u64);

impl fmt::Display for TextureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "texture#{}", self.0)
    }
}

/// Counter for unique [`ArenaId`] allocation.
static ARENA_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier of an allocator instance.
///
/// Every allocation carries the id of the arena that produced it, so
/// handing an allocation to the wrong arena is detected instead of
/// corrupting the other arena's free list.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArenaId(pub u64);

impl ArenaId {
    /// Allocate a fresh id from the process-wide counter.
    pub fn next() -> Self {
        Self(ARENA_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ArenaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "arena#{}", self.0)
    }
}

/// A point on a device's submission timeline.
///
/// Every submitted command list is assigned the next fence value; the
/// device reports the highest value whose work has completed. Values
/// compare in submission order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FenceValue(pub u64);

impl FenceValue {
    /// The value that is complete before anything is submitted.
    pub const ZERO: Self = Self(0);

    /// The value following this one.
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for FenceValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Names a compute or graphics program.
///
/// Shader source lives outside this core; a program is referenced purely
/// by a stable name that the executing device resolves.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramId(&'static str);

impl ProgramId {
    /// Create a program id from its stable name.
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    /// The program's name.
    pub const fn name(self) -> &'static str {
        self.0
    }
}

impl fmt::Display for ProgramId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}
