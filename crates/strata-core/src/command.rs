//! Recorded GPU commands.
//!
//! A [`CommandList`] is a plain recording: nothing executes until the
//! list is handed to [`Device::submit`](crate::Device::submit). Devices
//! execute the commands of one list, and lists across submissions, in
//! order.

use crate::pipeline::{ComputePipeline, GraphicsPipeline};
use crate::view::{BufferView, TextureView};

/// One recorded command.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Run `pipeline` over `groups` workgroups.
    Dispatch {
        /// Program and bindings.
        pipeline: ComputePipeline,
        /// Workgroup counts on x, y and z.
        groups: [u32; 3],
    },
    /// Run `pipeline` with workgroup counts read from `args`.
    DispatchIndirect {
        /// Program and bindings.
        pipeline: ComputePipeline,
        /// Buffer holding a [`DispatchArgs`](crate::DispatchArgs) record.
        args: BufferView,
        /// Byte offset of the record within `args`.
        byte_offset: u64,
    },
    /// Copy bytes between buffers. Offsets are relative to each view.
    CopyBuffer {
        /// Source range.
        src: BufferView,
        /// Byte offset into `src`.
        src_offset: u64,
        /// Destination range.
        dst: BufferView,
        /// Byte offset into `dst`.
        dst_offset: u64,
        /// Number of bytes.
        bytes: u64,
    },
    /// Copy rows of texels from a buffer into one texture subresource.
    CopyBufferToTexture {
        /// Source staging range.
        src: BufferView,
        /// Byte offset of the first row within `src`.
        src_offset: u64,
        /// Bytes between consecutive rows in `src`.
        row_pitch: u32,
        /// Destination texture.
        dst: TextureView,
        /// Destination mip level.
        mip: u32,
        /// Destination array slice.
        slice: u32,
        /// Destination x in texels.
        x: u32,
        /// Destination y in texels.
        y: u32,
        /// Region width in texels.
        width: u32,
        /// Region height in texels.
        height: u32,
    },
    /// Fill every element of a buffer range with a 32-bit pattern.
    ClearBuffer {
        /// Destination range.
        dst: BufferView,
        /// Fill value.
        value: u32,
    },
    /// Fill every texel of every mip with a 32-bit pattern.
    ClearTexture {
        /// Destination texture.
        dst: TextureView,
        /// Fill value.
        value: u32,
    },
    /// Indexed, instanced draws whose arguments and count live on the GPU.
    DrawIndexedIndirect {
        /// Program and bindings.
        pipeline: GraphicsPipeline,
        /// Index buffer.
        index_buffer: BufferView,
        /// Buffer of [`DrawIndexedIndirectArgs`](crate::DrawIndexedIndirectArgs).
        args: BufferView,
        /// Byte offset of the first argument record.
        args_offset: u64,
        /// Buffer holding the draw count.
        count: BufferView,
        /// Byte offset of the count.
        count_offset: u64,
        /// Upper bound on draws regardless of the GPU count.
        max_draws: u32,
    },
}

/// An ordered recording of [`Command`]s.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CommandList {
    name: String,
    commands: Vec<Command>,
}

impl CommandList {
    /// An empty list with a debug name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            commands: Vec::new(),
        }
    }

    /// Debug name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Record a direct dispatch.
    pub fn dispatch(&mut self, pipeline: ComputePipeline, x: u32, y: u32, z: u32) {
        self.commands.push(Command::Dispatch {
            pipeline,
            groups: [x, y, z],
        });
    }

    /// Record a dispatch whose group counts are read from `args`.
    pub fn dispatch_indirect(&mut self, pipeline: ComputePipeline, args: &BufferView, byte_offset: u64) {
        self.commands.push(Command::DispatchIndirect {
            pipeline,
            args: args.clone(),
            byte_offset,
        });
    }

    /// Record a buffer-to-buffer byte copy.
    pub fn copy_buffer_region(
        &mut self,
        src: &BufferView,
        src_offset: u64,
        dst: &BufferView,
        dst_offset: u64,
        bytes: u64,
    ) {
        self.commands.push(Command::CopyBuffer {
            src: src.clone(),
            src_offset,
            dst: dst.clone(),
            dst_offset,
            bytes,
        });
    }

    /// Record a copy of `src` rows into a texture region.
    #[allow(clippy::too_many_arguments)]
    pub fn copy_buffer_to_texture(
        &mut self,
        src: &BufferView,
        src_offset: u64,
        row_pitch: u32,
        dst: &TextureView,
        mip: u32,
        slice: u32,
        origin: (u32, u32),
        extent: (u32, u32),
    ) {
        self.commands.push(Command::CopyBufferToTexture {
            src: src.clone(),
            src_offset,
            row_pitch,
            dst: dst.clone(),
            mip,
            slice,
            x: origin.0,
            y: origin.1,
            width: extent.0,
            height: extent.1,
        });
    }

    /// Record a buffer fill.
    pub fn clear_buffer(&mut self, dst: &BufferView, value: u32) {
        self.commands.push(Command::ClearBuffer {
            dst: dst.clone(),
            value,
        });
    }

    /// Record a texture fill.
    pub fn clear_texture(&mut self, dst: &TextureView, value: u32) {
        self.commands.push(Command::ClearTexture {
            dst: dst.clone(),
            value,
        });
    }

    /// Record an indirect indexed draw.
    #[allow(clippy::too_many_arguments)]
    pub fn draw_indexed_indirect(
        &mut self,
        pipeline: GraphicsPipeline,
        index_buffer: &BufferView,
        args: &BufferView,
        args_offset: u64,
        count: &BufferView,
        count_offset: u64,
        max_draws: u32,
    ) {
        self.commands.push(Command::DrawIndexedIndirect {
            pipeline,
            index_buffer: index_buffer.clone(),
            args: args.clone(),
            args_offset,
            count: count.clone(),
            count_offset,
            max_draws,
        });
    }

    /// Recorded commands in order.
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Number of recorded commands.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Consume the list into its commands.
    pub fn into_commands(self) -> Vec<Command> {
        self.commands
    }
}
