//! Allocation handles.

use std::ops::Range;
use std::sync::{Arc, Mutex, Weak};

use strata_core::ArenaId;

use crate::allocator::ModelResourceAllocator;
use crate::error::ArenaError;

/// A range of elements reserved in every parallel buffer of one arena.
///
/// Created by [`ModelResourceAllocator::allocate`] and returned with
/// [`ModelResourceAllocator::free`]. The handle carries the id of the
/// arena that created it, so a free into the wrong arena is rejected.
/// Clones denote the same range; freeing one of them frees it for all.
#[must_use]
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Allocation {
    pub(crate) origin: ArenaId,
    pub(crate) gpu_index: u64,
    pub(crate) element_count: u64,
    pub(crate) element_size: u64,
}

impl Allocation {
    /// The arena that created this allocation.
    pub fn origin(&self) -> ArenaId {
        self.origin
    }

    /// First element; valid as an index into every parallel buffer.
    pub fn gpu_index(&self) -> u64 {
        self.gpu_index
    }

    /// Number of reserved elements.
    pub fn element_count(&self) -> u64 {
        self.element_count
    }

    /// Element index range `[gpu_index, gpu_index + element_count)`.
    pub fn elements(&self) -> Range<u64> {
        self.gpu_index..self.gpu_index + self.element_count
    }

    /// The range in bytes of the arena's combined element size.
    pub fn byte_range(&self) -> Range<u64> {
        self.gpu_index * self.element_size..(self.gpu_index + self.element_count) * self.element_size
    }
}

/// An allocator shared between owners of [`OwnedAllocation`]s.
pub type SharedAllocator = Arc<Mutex<ModelResourceAllocator>>;

/// An [`Allocation`] that returns its range when dropped.
///
/// Holds only a weak link to the allocator: dropping the allocator first
/// simply forgets the range.
#[must_use]
#[derive(Debug)]
pub struct OwnedAllocation {
    allocation: Option<Allocation>,
    allocator: Weak<Mutex<ModelResourceAllocator>>,
}

impl OwnedAllocation {
    /// Allocate `elements` from `allocator` and take ownership of the range.
    pub fn allocate(allocator: &SharedAllocator, elements: u64) -> Result<Self, ArenaError> {
        let allocation = lock(allocator).allocate(elements)?;
        Ok(Self {
            allocation: Some(allocation),
            allocator: Arc::downgrade(allocator),
        })
    }

    /// The owned allocation.
    pub fn allocation(&self) -> &Allocation {
        match &self.allocation {
            Some(allocation) => allocation,
            None => unreachable!("allocation is only taken on drop or release"),
        }
    }

    /// First element of the owned range.
    pub fn gpu_index(&self) -> u64 {
        self.allocation().gpu_index()
    }

    /// Give up ownership without freeing; the caller must free the result.
    pub fn release(mut self) -> Allocation {
        match self.allocation.take() {
            Some(allocation) => allocation,
            None => unreachable!("allocation is only taken on drop or release"),
        }
    }
}

impl Drop for OwnedAllocation {
    fn drop(&mut self) {
        let Some(allocation) = self.allocation.take() else {
            return;
        };
        let Some(allocator) = self.allocator.upgrade() else {
            return;
        };
        if let Err(err) = lock(&allocator).free(allocation) {
            log::warn!("owned allocation could not be freed: {err}");
        };
    }
}

fn lock(allocator: &Mutex<ModelResourceAllocator>) -> std::sync::MutexGuard<'_, ModelResourceAllocator> {
    match allocator.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
