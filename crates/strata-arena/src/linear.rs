//! Fixed-capacity single-element stack over parallel buffers.

use std::sync::Arc;

use smallvec::SmallVec;
use strata_core::{ArenaId, Buffer, BufferView, Device};

use crate::allocation::Allocation;
use crate::allocator::{create_arena_buffer, ArenaBufferDesc};
use crate::error::ArenaError;

/// Hands out one element at a time and takes them back in reverse order.
///
/// Used for per-frame records whose lifetimes nest. The capacity is fixed
/// at construction; freeing anything but the most recent allocation is
/// rejected with [`ArenaError::NotAtEnd`].
#[derive(Debug)]
pub struct ModelResourceLinearAllocator {
    id: ArenaId,
    name: String,
    buffers: SmallVec<[Buffer; 4]>,
    element_size: u64,
    capacity: u64,
    current: u64,
}

impl ModelResourceLinearAllocator {
    /// Create `capacity` elements in each declared buffer.
    pub fn new(
        device: &Arc<dyn Device>,
        name: impl Into<String>,
        descs: &[ArenaBufferDesc],
        capacity: u64,
    ) -> Result<Self, ArenaError> {
        let name = name.into();
        if descs.is_empty() {
            return Err(ArenaError::InvalidConfig {
                reason: format!("linear arena '{name}' declares no buffers"),
            });
        }
        if capacity == 0 {
            return Err(ArenaError::InvalidConfig {
                reason: format!("linear arena '{name}' has zero capacity"),
            });
        }
        let mut buffers = SmallVec::new();
        for desc in descs {
            if desc.layout.stride() == 0 {
                return Err(ArenaError::InvalidConfig {
                    reason: format!("buffer '{}' has a zero stride", desc.name),
                });
            }
            buffers.push(create_arena_buffer(device, &name, desc, capacity)?);
        }
        let element_size = descs.iter().map(|d| u64::from(d.layout.stride())).sum();
        Ok(Self {
            id: ArenaId::next(),
            name,
            buffers,
            element_size,
            capacity,
            current: 0,
        })
    }

    /// Take the next element. Only single-element requests are valid.
    pub fn allocate(&mut self, elements: u64) -> Result<Allocation, ArenaError> {
        if elements != 1 {
            return Err(ArenaError::InvalidRequest {
                reason: format!("linear arena '{}' allocates one element, not {elements}", self.name),
            });
        }
        if self.current == self.capacity {
            return Err(ArenaError::OutOfGpuMemory {
                requested: 1,
                capacity: self.capacity,
                max_elements: self.capacity,
            });
        }
        let gpu_index = self.current;
        self.current += 1;
        Ok(Allocation {
            origin: self.id,
            gpu_index,
            element_count: 1,
            element_size: self.element_size,
        })
    }

    /// Return the most recent allocation.
    pub fn free(&mut self, allocation: Allocation) -> Result<(), ArenaError> {
        if allocation.origin != self.id {
            return Err(ArenaError::ForeignAllocation {
                arena: self.id,
                origin: allocation.origin,
            });
        }
        if self.current == 0 || allocation.gpu_index != self.current - 1 {
            return Err(ArenaError::NotAtEnd {
                gpu_index: allocation.gpu_index,
                end: self.current,
            });
        }
        self.current -= 1;
        Ok(())
    }

    /// Shader read view of buffer `i`.
    pub fn srv(&self, i: usize) -> BufferView {
        self.buffers[i].srv()
    }

    /// Shader read-write view of buffer `i`.
    pub fn uav(&self, i: usize) -> BufferView {
        self.buffers[i].uav()
    }

    /// Elements currently taken.
    pub fn used_elements(&self) -> u64 {
        self.current
    }

    /// Fixed capacity.
    pub fn elements(&self) -> u64 {
        self.capacity
    }

    /// Process-unique id stamped on every allocation.
    pub fn id(&self) -> ArenaId {
        self.id
    }
}
