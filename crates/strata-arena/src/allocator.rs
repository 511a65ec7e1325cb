//! Growable parallel-buffer arena.

use std::sync::Arc;

use indexmap::IndexMap;
use smallvec::SmallVec;
use strata_core::{
    create_buffer, ArenaId, Buffer, BufferDesc, BufferLayout, BufferView, Device, DeviceError,
    Format, ViewKind,
};

use crate::allocation::Allocation;
use crate::config::ArenaConfig;
use crate::error::ArenaError;
use crate::growth::gpu_allocation_strategy;
use crate::ranges::FreeRanges;

/// Extra view a parallel buffer exposes besides its shader views.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExtraView {
    /// Shader read and read-write views only.
    #[default]
    None,
    /// Also usable as a vertex stream.
    Vertex,
    /// Also usable as an index buffer. Requires an index format.
    Index,
}

/// Declaration of one parallel buffer in an arena.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArenaBufferDesc {
    /// Debug name; the arena name is prefixed.
    pub name: String,
    /// Element layout.
    pub layout: BufferLayout,
    /// Extra view the buffer exposes.
    pub extra_view: ExtraView,
}

impl ArenaBufferDesc {
    /// A structured buffer of `stride`-byte elements.
    pub fn structured(name: impl Into<String>, stride: u32) -> Self {
        Self {
            name: name.into(),
            layout: BufferLayout::Structured { stride },
            extra_view: ExtraView::None,
        }
    }

    /// A typed buffer of `format` elements.
    pub fn formatted(name: impl Into<String>, format: Format, extra_view: ExtraView) -> Self {
        Self {
            name: name.into(),
            layout: BufferLayout::Format(format),
            extra_view,
        }
    }
}

#[derive(Debug)]
struct ArenaBuffer {
    desc: ArenaBufferDesc,
    buffer: Buffer,
}

/// A set of parallel GPU buffers sharing one element capacity.
///
/// Element `i` of every buffer belongs to the same record. Allocations
/// are ranges of element indices valid in all buffers at once; growth
/// recreates every buffer at the new capacity and copies the old contents
/// before the old buffers are released.
pub struct ModelResourceAllocator {
    id: ArenaId,
    name: String,
    device: Arc<dyn Device>,
    config: ArenaConfig,
    buffers: SmallVec<[ArenaBuffer; 4]>,
    ranges: FreeRanges,
    /// Live allocations keyed by first element.
    live: IndexMap<u64, u64>,
    used: u64,
    growth_count: u64,
}

impl ModelResourceAllocator {
    /// Create an arena from a mixed list of buffer declarations.
    pub fn new(
        device: Arc<dyn Device>,
        name: impl Into<String>,
        descs: Vec<ArenaBufferDesc>,
        config: ArenaConfig,
    ) -> Result<Self, ArenaError> {
        let name = name.into();
        config.validate()?;
        if descs.is_empty() {
            return Err(ArenaError::InvalidConfig {
                reason: format!("arena '{name}' declares no buffers"),
            });
        }
        for desc in &descs {
            if desc.layout.stride() == 0 {
                return Err(ArenaError::InvalidConfig {
                    reason: format!("buffer '{}' has a zero stride", desc.name),
                });
            }
            if desc.extra_view == ExtraView::Index
                && !matches!(desc.layout, BufferLayout::Format(f) if f.is_index_format())
            {
                return Err(ArenaError::InvalidConfig {
                    reason: format!("buffer '{}' has an index view without an index format", desc.name),
                });
            }
        }

        let capacity = config.initial_elements;
        let mut buffers = SmallVec::new();
        for desc in descs {
            let buffer = create_arena_buffer(&device, &name, &desc, capacity)?;
            buffers.push(ArenaBuffer { desc, buffer });
        }

        let id = ArenaId::next();
        log::debug!("arena '{name}' ({id}) created with {capacity} elements");
        Ok(Self {
            id,
            name,
            device,
            config,
            buffers,
            ranges: FreeRanges::new(capacity),
            live: IndexMap::new(),
            used: 0,
            growth_count: 0,
        })
    }

    /// Create an arena of typed buffers, one per `(format, extra view)`.
    pub fn with_formats(
        device: Arc<dyn Device>,
        name: impl Into<String>,
        formats: &[(Format, ExtraView)],
        config: ArenaConfig,
    ) -> Result<Self, ArenaError> {
        let descs = formats
            .iter()
            .enumerate()
            .map(|(i, &(format, extra))| ArenaBufferDesc::formatted(format!("{i}"), format, extra))
            .collect();
        Self::new(device, name, descs, config)
    }

    /// Create an arena of structured buffers, one per element byte size.
    pub fn with_strides(
        device: Arc<dyn Device>,
        name: impl Into<String>,
        strides: &[u32],
        config: ArenaConfig,
    ) -> Result<Self, ArenaError> {
        let descs = strides
            .iter()
            .enumerate()
            .map(|(i, &stride)| ArenaBufferDesc::structured(format!("{i}"), stride))
            .collect();
        Self::new(device, name, descs, config)
    }

    // ── Allocation ──────────────────────────────────────────────

    /// Reserve `elements` contiguous elements in every parallel buffer.
    ///
    /// Grows the arena when no free range fits, then retries once.
    pub fn allocate(&mut self, elements: u64) -> Result<Allocation, ArenaError> {
        if elements == 0 {
            return Err(ArenaError::InvalidRequest {
                reason: "cannot allocate zero elements".into(),
            });
        }

        let start = match self.ranges.allocate(elements) {
            Some(start) => start,
            None => {
                self.grow(elements)?;
                self.ranges
                    .allocate(elements)
                    .ok_or_else(|| self.out_of_memory(elements))?
            }
        };

        self.live.insert(start, elements);
        self.used += elements;
        Ok(Allocation {
            origin: self.id,
            gpu_index: start,
            element_count: elements,
            element_size: self.element_size_bytes(),
        })
    }

    /// Return an allocation's range. The arena never shrinks.
    pub fn free(&mut self, allocation: Allocation) -> Result<(), ArenaError> {
        if allocation.origin != self.id {
            return Err(ArenaError::ForeignAllocation {
                arena: self.id,
                origin: allocation.origin,
            });
        }
        let not_live = ArenaError::NotLive {
            gpu_index: allocation.gpu_index,
            element_count: allocation.element_count,
        };
        match self.live.get(&allocation.gpu_index) {
            Some(&count) if count == allocation.element_count => {}
            _ => return Err(not_live),
        }
        if !self.ranges.free(allocation.gpu_index, allocation.element_count) {
            return Err(not_live);
        }
        self.live.swap_remove(&allocation.gpu_index);
        self.used -= allocation.element_count;
        Ok(())
    }

    fn out_of_memory(&self, requested: u64) -> ArenaError {
        ArenaError::OutOfGpuMemory {
            requested,
            capacity: self.elements(),
            max_elements: self.config.max_elements,
        }
    }

    // ── Growth ──────────────────────────────────────────────────

    /// Grow so that `requested` contiguous elements fit at the tail.
    fn grow(&mut self, requested: u64) -> Result<(), ArenaError> {
        let old = self.elements();
        let stride = self
            .buffers
            .iter()
            .map(|b| u64::from(b.desc.layout.stride()))
            .max()
            .unwrap_or(1);
        let new = gpu_allocation_strategy(stride, old, requested).min(self.config.max_elements);
        if new <= old || new - old + self.ranges.trailing_free() < requested {
            log::warn!(
                "arena '{}' cannot fit {requested} elements under max {}",
                self.name,
                self.config.max_elements
            );
            return Err(self.out_of_memory(requested));
        }

        let mut replacements = SmallVec::<[Buffer; 4]>::new();
        for entry in &self.buffers {
            match create_arena_buffer(&self.device, &self.name, &entry.desc, new) {
                Ok(buffer) => replacements.push(buffer),
                Err(ArenaError::Device(DeviceError::OutOfMemory { .. })) => {
                    return Err(self.out_of_memory(requested));
                }
                Err(err) => return Err(err),
            }
        }

        let mut cmd = self.device.create_command_list("arena-grow");
        for (entry, replacement) in self.buffers.iter().zip(&replacements) {
            let bytes = entry.buffer.byte_size();
            if bytes > 0 {
                cmd.copy_buffer_region(&entry.buffer.raw(), 0, &replacement.raw(), 0, bytes);
            }
        }
        if !cmd.is_empty() {
            self.device.submit_blocking(cmd, self.config.fence_timeout)?;
        }

        // The copy has completed, so the old buffers can be released.
        for (entry, replacement) in self.buffers.iter_mut().zip(replacements) {
            entry.buffer = replacement;
        }
        self.ranges.grow(new);
        self.growth_count += 1;
        log::debug!(
            "arena '{}' grew from {old} to {new} elements for a request of {requested}",
            self.name
        );
        Ok(())
    }

    // ── Views ───────────────────────────────────────────────────

    /// Shader read view of buffer `i`.
    pub fn srv(&self, i: usize) -> BufferView {
        self.buffers[i].buffer.srv()
    }

    /// Shader read-write view of buffer `i`.
    pub fn uav(&self, i: usize) -> BufferView {
        self.buffers[i].buffer.uav()
    }

    /// Index view of buffer `i`, if it was declared with one.
    pub fn index_view(&self, i: usize) -> Option<BufferView> {
        let entry = self.buffers.get(i)?;
        (entry.desc.extra_view == ExtraView::Index).then(|| entry.buffer.view(ViewKind::Index))
    }

    /// Vertex view of buffer `i`, if it was declared with one.
    pub fn vertex_view(&self, i: usize) -> Option<BufferView> {
        let entry = self.buffers.get(i)?;
        (entry.desc.extra_view == ExtraView::Vertex).then(|| entry.buffer.view(ViewKind::Vertex))
    }

    /// Shader read views of every buffer, in declaration order.
    pub fn srvs(&self) -> Vec<BufferView> {
        self.buffers.iter().map(|b| b.buffer.srv()).collect()
    }

    /// Shader read-write views of every buffer, in declaration order.
    pub fn uavs(&self) -> Vec<BufferView> {
        self.buffers.iter().map(|b| b.buffer.uav()).collect()
    }

    /// The owner of buffer `i`.
    ///
    /// Views taken from it go stale after the next growth.
    pub fn buffer(&self, i: usize) -> &Buffer {
        &self.buffers[i].buffer
    }

    // ── Accessors ───────────────────────────────────────────────

    /// Current capacity in elements, identical across buffers.
    pub fn elements(&self) -> u64 {
        self.ranges.capacity()
    }

    /// Elements held by live allocations.
    pub fn used_elements(&self) -> u64 {
        self.used
    }

    /// Number of parallel buffers.
    pub fn buffer_count(&self) -> usize {
        self.buffers.len()
    }

    /// Element count of buffer `i`.
    pub fn buffer_elements(&self, i: usize) -> u64 {
        self.buffers[i].buffer.element_count()
    }

    /// How many times the arena has grown.
    pub fn growth_count(&self) -> u64 {
        self.growth_count
    }

    /// Sum of the element strides of every buffer.
    pub fn element_size_bytes(&self) -> u64 {
        self.buffers
            .iter()
            .map(|b| u64::from(b.desc.layout.stride()))
            .sum()
    }

    /// Number of live allocations.
    pub fn live_allocations(&self) -> usize {
        self.live.len()
    }

    /// Process-unique id stamped on every allocation.
    pub fn id(&self) -> ArenaId {
        self.id
    }

    /// Debug name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The arena's configuration.
    pub fn config(&self) -> &ArenaConfig {
        &self.config
    }
}

impl std::fmt::Debug for ModelResourceAllocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelResourceAllocator")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("elements", &self.elements())
            .field("used", &self.used)
            .field("buffers", &self.buffers.len())
            .field("growth_count", &self.growth_count)
            .finish()
    }
}

pub(crate) fn create_arena_buffer(
    device: &Arc<dyn Device>,
    arena: &str,
    desc: &ArenaBufferDesc,
    elements: u64,
) -> Result<Buffer, ArenaError> {
    let buffer_desc = BufferDesc::new(format!("{arena}/{}", desc.name), desc.layout, elements);
    Ok(create_buffer(device, buffer_desc)?)
}
