//! GPU-resident `u32` counters.

use std::sync::Arc;

use strata_core::{
    create_buffer, Buffer, BufferDesc, BufferLayout, BufferUsage, BufferView, CommandList, Device,
    DeviceError, Format,
};

/// Usage of every counter: read and written by programs, copied, and
/// readable as indirect arguments.
pub const COUNT_USAGE: BufferUsage = BufferUsage::GPU_READ
    .union(BufferUsage::GPU_READ_WRITE)
    .union(BufferUsage::INDIRECT_ARGS)
    .union(BufferUsage::COPY_SRC)
    .union(BufferUsage::COPY_DST);

/// A small `R32Uint` buffer holding one or more counters.
///
/// Element 0 is the counter stages read; extra elements exist where a
/// consumer expects a padded count record.
#[derive(Debug)]
pub struct CountBuffer {
    buffer: Buffer,
}

impl CountBuffer {
    /// A zeroed counter buffer of `elements` elements.
    pub fn new(device: &Arc<dyn Device>, name: &str, elements: u64) -> Result<Self, DeviceError> {
        let buffer = create_buffer(
            device,
            BufferDesc::new(name, BufferLayout::Format(Format::R32Uint), elements.max(1))
                .usage(COUNT_USAGE),
        )?;
        Ok(Self { buffer })
    }

    /// The owning buffer.
    pub fn buffer(&self) -> &Buffer {
        &self.buffer
    }

    /// Number of counters.
    pub fn elements(&self) -> u64 {
        self.buffer.element_count()
    }

    /// Shader-readable view.
    pub fn srv(&self) -> BufferView {
        self.buffer.srv()
    }

    /// Shader-writable view.
    pub fn uav(&self) -> BufferView {
        self.buffer.uav()
    }

    /// Byte view for copies.
    pub fn raw(&self) -> BufferView {
        self.buffer.raw()
    }

    /// Record a reset of every counter to zero.
    pub fn clear(&self, cmd: &mut CommandList) {
        cmd.clear_buffer(&self.buffer.uav(), 0);
    }
}
