//! Data lines: growable GPU record lists with device-side counters.
//!
//! A line is a records buffer plus two counters:
//!
//! - `count`: the append counter. Stages reserve slots with an atomic add
//!   on it, so after a pass it holds the end of everything appended.
//! - `index`: where the records of the current sub-stage begin.
//!
//! Stages work on pairs of lines. The *append* line owns the storage; the
//! *draw* line aliases the same records and describes only what the last
//! pass added. [`begin_delta`] copies the append count into the draw
//! index before the pass, and [`end_delta`] stores
//! `append.count - draw.index` (saturating) into the draw count after it.
//! Consumers then read records `[draw.index, draw.index + draw.count)`.
//! No count ever travels to the CPU.

use std::sync::Arc;
use std::time::Duration;

use strata_core::{
    create_buffer, Buffer, BufferDesc, BufferLayout, BufferUsage, BufferView, CommandList, Device,
    DrawIndexedIndirectArgs, Format, GraphicsPipeline, ViewKind,
};

use crate::buffer_math::BufferMath;
use crate::config::CullerConfig;
use crate::count::CountBuffer;
use crate::error::CullError;
use crate::record::ClusterInstanceData;

const RECORD_USAGE: BufferUsage = BufferUsage::GPU_READ
    .union(BufferUsage::GPU_READ_WRITE)
    .union(BufferUsage::COPY_SRC)
    .union(BufferUsage::COPY_DST);

// ── Storage ─────────────────────────────────────────────────────

/// A records buffer that can be resized with its contents kept.
#[derive(Debug)]
struct LineStorage {
    name: String,
    layout: BufferLayout,
    usage: BufferUsage,
    fence_timeout: Duration,
    buffer: Option<Buffer>,
}

impl LineStorage {
    fn new(
        device: &Arc<dyn Device>,
        name: String,
        layout: BufferLayout,
        usage: BufferUsage,
        elements: u64,
        config: &CullerConfig,
    ) -> Result<Self, CullError> {
        let mut storage = Self {
            name,
            layout,
            usage,
            fence_timeout: config.fence_timeout,
            buffer: None,
        };
        storage.resize(device, elements, false)?;
        Ok(storage)
    }

    fn capacity(&self) -> u64 {
        self.buffer.as_ref().map_or(0, Buffer::element_count)
    }

    /// Returns whether the buffer was replaced or dropped.
    fn resize(&mut self, device: &Arc<dyn Device>, elements: u64, shrink: bool) -> Result<bool, CullError> {
        let current = self.capacity();
        if elements == 0 {
            return Ok(self.buffer.take().is_some());
        }
        if elements < current && !shrink || elements == current {
            return Ok(false);
        }

        let buffer = create_buffer(
            device,
            BufferDesc::new(self.name.clone(), self.layout, elements).usage(self.usage),
        )?;
        let keep = current.min(elements);
        if let (Some(old), true) = (&self.buffer, keep > 0) {
            let mut cmd = device.create_command_list("line-resize");
            cmd.copy_buffer_region(
                &old.raw(),
                0,
                &buffer.raw(),
                0,
                keep * u64::from(self.layout.stride()),
            );
            device.submit_blocking(cmd, self.fence_timeout)?;
        }
        log::debug!(
            "data line '{}' resized from {current} to {elements} elements",
            self.name
        );
        self.buffer = Some(buffer);
        Ok(true)
    }
}

// ── Line trait ──────────────────────────────────────────────────

/// A records list with an append counter and a sub-stage start index.
pub trait DataLine {
    /// Debug name.
    fn name(&self) -> &str;

    /// Append counter.
    fn count(&self) -> &CountBuffer;

    /// First record of the current sub-stage.
    fn index(&self) -> &CountBuffer;

    /// Writable view of every record, owned or aliased; `None` when the
    /// line has no storage.
    fn records(&self) -> Option<&BufferView>;

    /// Point this line's records at `source`'s.
    fn alias_records(&mut self, source: &Self)
    where
        Self: Sized;

    /// Record a reset of both counters to zero.
    fn reset(&self, cmd: &mut CommandList) {
        self.count().clear(cmd);
        self.index().clear(cmd);
    }
}

/// The records of `line`, or [`CullError::MissingStorage`].
pub(crate) fn require_records<L: DataLine>(line: &L) -> Result<BufferView, CullError> {
    line.records().cloned().ok_or_else(|| CullError::MissingStorage {
        line: line.name().to_string(),
    })
}

/// Alias `draw` onto `append` and remember where this sub-stage starts.
pub fn begin_delta<L: DataLine>(cmd: &mut CommandList, append: &L, draw: &mut L) {
    draw.alias_records(append);
    BufferMath::copy_count(cmd, &append.count().raw(), &draw.index().raw());
}

/// Store the number of records appended since [`begin_delta`] in `draw`'s
/// count. Saturates at zero.
pub fn end_delta<L: DataLine>(cmd: &mut CommandList, append: &L, draw: &L) {
    BufferMath::subtract(
        cmd,
        &append.count().srv(),
        &draw.index().srv(),
        &draw.count().uav(),
    );
}

/// An append line and the draw line that describes its latest sub-stage.
#[derive(Debug)]
pub struct LinePair<'a, L> {
    /// Owner of the records and the running append count.
    pub append: &'a L,
    /// Alias describing what the current pass appended.
    pub draw: &'a mut L,
}

impl<'a, L: DataLine> LinePair<'a, L> {
    /// Pair `append` with `draw`.
    pub fn new(append: &'a L, draw: &'a mut L) -> Self {
        Self { append, draw }
    }

    /// [`begin_delta`] on this pair.
    pub fn begin(&mut self, cmd: &mut CommandList) {
        begin_delta(cmd, self.append, self.draw);
    }

    /// [`end_delta`] on this pair.
    pub fn end(&self, cmd: &mut CommandList) {
        end_delta(cmd, self.append, self.draw);
    }

    /// Records and append counter of the append line, for binding.
    pub(crate) fn output(&self) -> Result<(BufferView, BufferView), CullError> {
        Ok((require_records(self.append)?, self.append.count().uav()))
    }
}

// ── Cluster line ────────────────────────────────────────────────

/// A list of [`ClusterInstanceData`] records.
#[derive(Debug)]
pub struct ClusterDataLine {
    storage: LineStorage,
    records: Option<BufferView>,
    count: CountBuffer,
    index: CountBuffer,
}

impl ClusterDataLine {
    /// A line with room for `elements` records; zero creates a line with
    /// counters only, suitable as a draw alias.
    pub fn new(device: &Arc<dyn Device>, name: &str, elements: u64) -> Result<Self, CullError> {
        Self::with_config(device, name, elements, &CullerConfig::default())
    }

    /// Like [`new`](Self::new), with resize copies bounded by `config.fence_timeout`.
    pub fn with_config(
        device: &Arc<dyn Device>,
        name: &str,
        elements: u64,
        config: &CullerConfig,
    ) -> Result<Self, CullError> {
        let storage = LineStorage::new(
            device,
            format!("{name}/clusters"),
            BufferLayout::of::<ClusterInstanceData>(),
            RECORD_USAGE,
            elements,
            config,
        )?;
        let records = storage.buffer.as_ref().map(Buffer::uav);
        Ok(Self {
            storage,
            records,
            count: CountBuffer::new(device, &format!("{name}/count"), 1)?,
            index: CountBuffer::new(device, &format!("{name}/index"), 1)?,
        })
    }

    /// Records this line owns.
    pub fn capacity(&self) -> u64 {
        self.storage.capacity()
    }

    /// Shader-readable view of the records.
    pub fn clusters_srv(&self) -> Option<BufferView> {
        self.records.as_ref().map(|v| v.with_kind(ViewKind::ShaderRead))
    }

    /// Shader-writable view of the records.
    pub fn clusters_uav(&self) -> Option<BufferView> {
        self.records.clone()
    }

    /// Grow, or shrink when `shrink` is set, keeping the first
    /// `min(old, new)` records. Zero drops the storage.
    ///
    /// Draw lines aliasing the old storage see released views afterwards
    /// and must be re-aliased.
    pub fn resize(&mut self, device: &Arc<dyn Device>, elements: u64, shrink: bool) -> Result<(), CullError> {
        if self.storage.resize(device, elements, shrink)? {
            self.records = self.storage.buffer.as_ref().map(Buffer::uav);
        }
        Ok(())
    }
}

impl DataLine for ClusterDataLine {
    fn name(&self) -> &str {
        &self.storage.name
    }

    fn count(&self) -> &CountBuffer {
        &self.count
    }

    fn index(&self) -> &CountBuffer {
        &self.index
    }

    fn records(&self) -> Option<&BufferView> {
        self.records.as_ref()
    }

    fn alias_records(&mut self, source: &Self) {
        self.records = source.records.clone();
    }
}

// ── Index line ──────────────────────────────────────────────────

/// A list of `u32` indexes, bindable as an index buffer.
#[derive(Debug)]
pub struct IndexDataLine {
    storage: LineStorage,
    records: Option<BufferView>,
    count: CountBuffer,
    index: CountBuffer,
}

impl IndexDataLine {
    /// A line with room for `elements` indexes.
    pub fn new(device: &Arc<dyn Device>, name: &str, elements: u64) -> Result<Self, CullError> {
        Self::with_config(device, name, elements, &CullerConfig::default())
    }

    /// [`new`](Self::new) under `config`.
    pub fn with_config(
        device: &Arc<dyn Device>,
        name: &str,
        elements: u64,
        config: &CullerConfig,
    ) -> Result<Self, CullError> {
        let storage = LineStorage::new(
            device,
            format!("{name}/indexes"),
            BufferLayout::Format(Format::R32Uint),
            RECORD_USAGE,
            elements,
            config,
        )?;
        let records = storage.buffer.as_ref().map(Buffer::uav);
        Ok(Self {
            storage,
            records,
            count: CountBuffer::new(device, &format!("{name}/index-count"), 1)?,
            index: CountBuffer::new(device, &format!("{name}/index-index"), 1)?,
        })
    }

    /// Indexes this line owns.
    pub fn capacity(&self) -> u64 {
        self.storage.capacity()
    }

    /// The records as an index buffer.
    pub fn index_view(&self) -> Option<BufferView> {
        self.records.as_ref().map(|v| v.with_kind(ViewKind::Index))
    }

    /// Shader-writable view of the indexes.
    pub fn indexes_uav(&self) -> Option<BufferView> {
        self.records.clone()
    }

    /// Same contract as [`ClusterDataLine::resize`].
    pub fn resize(&mut self, device: &Arc<dyn Device>, elements: u64, shrink: bool) -> Result<(), CullError> {
        if self.storage.resize(device, elements, shrink)? {
            self.records = self.storage.buffer.as_ref().map(Buffer::uav);
        }
        Ok(())
    }
}

impl DataLine for IndexDataLine {
    fn name(&self) -> &str {
        &self.storage.name
    }

    fn count(&self) -> &CountBuffer {
        &self.count
    }

    fn index(&self) -> &CountBuffer {
        &self.index
    }

    fn records(&self) -> Option<&BufferView> {
        self.records.as_ref()
    }

    fn alias_records(&mut self, source: &Self) {
        self.records = source.records.clone();
    }
}

// ── Draw line ───────────────────────────────────────────────────

/// Indirect draw arguments plus their GPU draw count.
#[derive(Debug)]
pub struct DrawDataLine {
    storage: LineStorage,
    count: CountBuffer,
}

impl DrawDataLine {
    /// Argument records a new line holds unless told otherwise.
    pub const DEFAULT_ARGS: u64 = 100;

    /// Counters in the count buffer; the draw count is element 0.
    pub const COUNT_ELEMENTS: u64 = 4;

    /// A line with room for `elements` draws.
    pub fn new(device: &Arc<dyn Device>, name: &str, elements: u64) -> Result<Self, CullError> {
        Self::with_config(device, name, elements, &CullerConfig::default())
    }

    /// [`new`](Self::new) under `config`.
    pub fn with_config(
        device: &Arc<dyn Device>,
        name: &str,
        elements: u64,
        config: &CullerConfig,
    ) -> Result<Self, CullError> {
        let storage = LineStorage::new(
            device,
            format!("{name}/args"),
            BufferLayout::of::<DrawIndexedIndirectArgs>(),
            RECORD_USAGE | BufferUsage::INDIRECT_ARGS,
            elements,
            config,
        )?;
        Ok(Self {
            storage,
            count: CountBuffer::new(device, &format!("{name}/draw-count"), Self::COUNT_ELEMENTS)?,
        })
    }

    /// Draws this line can hold.
    pub fn capacity(&self) -> u64 {
        self.storage.capacity()
    }

    /// Writable view of the argument records.
    pub fn args(&self) -> Option<BufferView> {
        self.storage.buffer.as_ref().map(Buffer::uav)
    }

    /// The draw counter.
    pub fn count(&self) -> &CountBuffer {
        &self.count
    }

    /// Record a reset of the draw count.
    pub fn reset(&self, cmd: &mut CommandList) {
        self.count.clear(cmd);
    }

    /// Same contract as [`ClusterDataLine::resize`].
    pub fn resize(&mut self, device: &Arc<dyn Device>, elements: u64, shrink: bool) -> Result<(), CullError> {
        self.storage.resize(device, elements, shrink)?;
        Ok(())
    }

    /// Record the indexed draws this line describes, at most
    /// [`capacity`](Self::capacity) of them.
    pub fn draw_indexed_indirect(
        &self,
        cmd: &mut CommandList,
        pipeline: GraphicsPipeline,
        index_buffer: &BufferView,
    ) -> Result<(), CullError> {
        let args = self.storage.buffer.as_ref().ok_or_else(|| CullError::MissingStorage {
            line: self.storage.name.clone(),
        })?;
        let max_draws = u32::try_from(args.element_count()).unwrap_or(u32::MAX);
        cmd.draw_indexed_indirect(
            pipeline,
            index_buffer,
            &args.raw(),
            0,
            &self.count.raw(),
            0,
            max_draws,
        );
        Ok(())
    }
}

// ── Model line ──────────────────────────────────────────────────

bitflags::bitflags! {
    /// Which parts a [`ModelDataLine`] creates.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct LineContent: u32 {
        /// A cluster line.
        const CLUSTERS = 1;
        /// An index line.
        const INDEXES = 2;
        /// A draw line.
        const DRAWS = 4;
        /// Every part.
        const ALL = Self::CLUSTERS.bits() | Self::INDEXES.bits() | Self::DRAWS.bits();
    }
}

/// Initial record capacities of a [`ModelDataLine`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LineSizes {
    /// Cluster records.
    pub clusters: u64,
    /// Indexes.
    pub indexes: u64,
    /// Draw argument records.
    pub draws: u64,
}

impl Default for LineSizes {
    fn default() -> Self {
        Self {
            clusters: 0,
            indexes: 0,
            draws: DrawDataLine::DEFAULT_ARGS,
        }
    }
}

/// A cluster line, an index line and a draw line created together.
#[derive(Debug)]
pub struct ModelDataLine {
    content: LineContent,
    clusters: Option<ClusterDataLine>,
    indexes: Option<IndexDataLine>,
    draws: Option<DrawDataLine>,
}

impl ModelDataLine {
    /// Create the parts selected by `content`.
    pub fn new(
        device: &Arc<dyn Device>,
        name: &str,
        content: LineContent,
        sizes: LineSizes,
    ) -> Result<Self, CullError> {
        Self::with_config(device, name, content, sizes, &CullerConfig::default())
    }

    /// [`new`](Self::new) with every part built under `config`.
    pub fn with_config(
        device: &Arc<dyn Device>,
        name: &str,
        content: LineContent,
        sizes: LineSizes,
        config: &CullerConfig,
    ) -> Result<Self, CullError> {
        let clusters = content
            .contains(LineContent::CLUSTERS)
            .then(|| ClusterDataLine::with_config(device, name, sizes.clusters, config))
            .transpose()?;
        let indexes = content
            .contains(LineContent::INDEXES)
            .then(|| IndexDataLine::with_config(device, name, sizes.indexes, config))
            .transpose()?;
        let draws = content
            .contains(LineContent::DRAWS)
            .then(|| DrawDataLine::with_config(device, name, sizes.draws, config))
            .transpose()?;
        Ok(Self {
            content,
            clusters,
            indexes,
            draws,
        })
    }

    /// Parts this line was created with.
    pub fn content(&self) -> LineContent {
        self.content
    }

    /// The cluster part.
    pub fn clusters(&self) -> Option<&ClusterDataLine> {
        self.clusters.as_ref()
    }

    /// The cluster part, mutably.
    pub fn clusters_mut(&mut self) -> Option<&mut ClusterDataLine> {
        self.clusters.as_mut()
    }

    /// The index part.
    pub fn indexes(&self) -> Option<&IndexDataLine> {
        self.indexes.as_ref()
    }

    /// The index part, mutably.
    pub fn indexes_mut(&mut self) -> Option<&mut IndexDataLine> {
        self.indexes.as_mut()
    }

    /// The draw part.
    pub fn draws(&self) -> Option<&DrawDataLine> {
        self.draws.as_ref()
    }

    /// The draw part, mutably.
    pub fn draws_mut(&mut self) -> Option<&mut DrawDataLine> {
        self.draws.as_mut()
    }

    /// Record a reset of every part's counters.
    pub fn reset(&self, cmd: &mut CommandList) {
        if let Some(clusters) = &self.clusters {
            clusters.reset(cmd);
        }
        if let Some(indexes) = &self.indexes {
            indexes.reset(cmd);
        }
        if let Some(draws) = &self.draws {
            draws.reset(cmd);
        }
    }
}
