//! Owning resource handles and their descriptions.
//!
//! A [`Buffer`] or [`Texture`] is the single owner of a device resource.
//! Owners can only be created through [`create_buffer`] and
//! [`create_texture`], and dropping the owner releases the device
//! resource. Views handed out by an owner ([`BufferView`],
//! [`TextureView`]) hold only a weak link back, so they can be checked
//! against the owner's lifetime but never keep the resource alive.

use std::fmt;
use std::sync::Arc;

use crate::device::Device;
use crate::error::DeviceError;
use crate::format::Format;
use crate::id::{BufferId, TextureId};
use crate::view::{BufferView, TextureView, ViewKind};

// ── Buffer description ──────────────────────────────────────────

/// How the elements of a buffer are laid out.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BufferLayout {
    /// Typed elements of a pixel format.
    Format(Format),
    /// Opaque structured elements of a fixed byte stride.
    Structured {
        /// Element size in bytes.
        stride: u32,
    },
}

impl BufferLayout {
    /// Size of one element in bytes.
    pub const fn stride(self) -> u32 {
        match self {
            Self::Format(format) => format.byte_size(),
            Self::Structured { stride } => stride,
        }
    }

    /// Layout of a structured buffer of `T` records.
    pub const fn of<T>() -> Self {
        Self::Structured {
            stride: std::mem::size_of::<T>() as u32,
        }
    }
}

bitflags::bitflags! {
    /// Usage flags of a buffer.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u32 {
        /// Readable by shaders.
        const GPU_READ = 1 << 0;
        /// Readable and writable by shaders.
        const GPU_READ_WRITE = 1 << 1;
        /// May source indirect dispatch or draw arguments.
        const INDIRECT_ARGS = 1 << 2;
        /// CPU-writable staging memory.
        const UPLOAD = 1 << 3;
        /// Source of copy commands.
        const COPY_SRC = 1 << 4;
        /// Destination of copy commands.
        const COPY_DST = 1 << 5;
    }
}

impl BufferUsage {
    /// Usage for a shader-writable buffer that copies may target and source.
    pub const fn storage() -> Self {
        Self::GPU_READ
            .union(Self::GPU_READ_WRITE)
            .union(Self::COPY_SRC)
            .union(Self::COPY_DST)
    }
}

/// Description of a buffer resource.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BufferDesc {
    /// Debug name.
    pub name: String,
    /// Number of elements.
    pub element_count: u64,
    /// Element layout.
    pub layout: BufferLayout,
    /// Usage flags.
    pub usage: BufferUsage,
}

impl BufferDesc {
    /// A storage buffer of `element_count` elements.
    pub fn new(name: impl Into<String>, layout: BufferLayout, element_count: u64) -> Self {
        Self {
            name: name.into(),
            element_count,
            layout,
            usage: BufferUsage::storage(),
        }
    }

    /// Replace the usage flags.
    pub fn usage(mut self, usage: BufferUsage) -> Self {
        self.usage = usage;
        self
    }

    /// Total size in bytes.
    pub fn byte_size(&self) -> u64 {
        self.element_count * u64::from(self.layout.stride())
    }
}

// ── Texture description ─────────────────────────────────────────

/// Description of a 2D (array) texture resource.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextureDesc {
    /// Debug name.
    pub name: String,
    /// Width of mip 0 in texels.
    pub width: u32,
    /// Height of mip 0 in texels.
    pub height: u32,
    /// Number of mip levels.
    pub mip_levels: u32,
    /// Number of array slices.
    pub array_slices: u32,
    /// Texel format.
    pub format: Format,
}

impl TextureDesc {
    /// A single-slice texture with one mip level.
    pub fn new(name: impl Into<String>, width: u32, height: u32, format: Format) -> Self {
        Self {
            name: name.into(),
            width,
            height,
            mip_levels: 1,
            array_slices: 1,
            format,
        }
    }

    /// Replace the mip level count.
    pub fn mip_levels(mut self, mip_levels: u32) -> Self {
        self.mip_levels = mip_levels;
        self
    }

    /// Replace the array slice count.
    pub fn array_slices(mut self, array_slices: u32) -> Self {
        self.array_slices = array_slices;
        self
    }

    /// Extent of `mip`, never smaller than one texel.
    pub fn mip_extent(&self, mip: u32) -> (u32, u32) {
        mip_extent(self.width, self.height, mip)
    }

    /// Number of mips in a full chain down to 1x1.
    pub fn full_mip_chain(width: u32, height: u32) -> u32 {
        32 - width.max(height).max(1).leading_zeros()
    }
}

/// Extent of `mip` for a `width` x `height` base level.
pub(crate) fn mip_extent(width: u32, height: u32, mip: u32) -> (u32, u32) {
    let w = width.checked_shr(mip).unwrap_or(0).max(1);
    let h = height.checked_shr(mip).unwrap_or(0).max(1);
    (w, h)
}

// ── Owners ──────────────────────────────────────────────────────

pub(crate) struct BufferShared {
    pub(crate) id: BufferId,
    pub(crate) desc: BufferDesc,
    device: Arc<dyn Device>,
}

impl Drop for BufferShared {
    fn drop(&mut self) {
        self.device.release_buffer_resource(self.id);
    }
}

/// Exclusive owner of a device buffer.
///
/// Not `Clone`: there is exactly one owner per resource. Dropping it
/// releases the resource and invalidates every view created from it.
pub struct Buffer {
    shared: Arc<BufferShared>,
}

impl Buffer {
    /// Device id of the resource.
    pub fn id(&self) -> BufferId {
        self.shared.id
    }

    /// The description the buffer was created from.
    pub fn desc(&self) -> &BufferDesc {
        &self.shared.desc
    }

    /// Number of elements.
    pub fn element_count(&self) -> u64 {
        self.shared.desc.element_count
    }

    /// Element layout.
    pub fn layout(&self) -> BufferLayout {
        self.shared.desc.layout
    }

    /// Total size in bytes.
    pub fn byte_size(&self) -> u64 {
        self.shared.desc.byte_size()
    }

    /// A view of kind `kind` over the whole buffer.
    pub fn view(&self, kind: ViewKind) -> BufferView {
        self.view_range(kind, 0, self.element_count())
    }

    /// A view of kind `kind` over `count` elements starting at `first`.
    ///
    /// The range is clamped to the buffer.
    pub fn view_range(&self, kind: ViewKind, first: u64, count: u64) -> BufferView {
        let len = self.element_count();
        let first = first.min(len);
        let count = count.min(len - first);
        BufferView::new(
            self.shared.id,
            kind,
            first,
            count,
            self.shared.desc.layout,
            Arc::downgrade(&self.shared),
        )
    }

    /// Shader-readable view of the whole buffer.
    pub fn srv(&self) -> BufferView {
        self.view(ViewKind::ShaderRead)
    }

    /// Shader-writable view of the whole buffer.
    pub fn uav(&self) -> BufferView {
        self.view(ViewKind::ShaderReadWrite)
    }

    /// Untyped byte view, the shape copy commands take.
    pub fn raw(&self) -> BufferView {
        self.view(ViewKind::Raw)
    }
}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("id", &self.shared.id)
            .field("name", &self.shared.desc.name)
            .field("elements", &self.shared.desc.element_count)
            .finish()
    }
}

pub(crate) struct TextureShared {
    pub(crate) id: TextureId,
    pub(crate) desc: TextureDesc,
    device: Arc<dyn Device>,
}

impl Drop for TextureShared {
    fn drop(&mut self) {
        self.device.release_texture_resource(self.id);
    }
}

/// Exclusive owner of a device texture.
pub struct Texture {
    shared: Arc<TextureShared>,
}

impl Texture {
    /// Device id of the resource.
    pub fn id(&self) -> TextureId {
        self.shared.id
    }

    /// The description the texture was created from.
    pub fn desc(&self) -> &TextureDesc {
        &self.shared.desc
    }

    /// Shader-readable view over every mip and slice.
    pub fn srv(&self) -> TextureView {
        TextureView::new(
            self.shared.id,
            &self.shared.desc,
            Arc::downgrade(&self.shared),
        )
    }
}

impl fmt::Debug for Texture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Texture")
            .field("id", &self.shared.id)
            .field("name", &self.shared.desc.name)
            .field("width", &self.shared.desc.width)
            .field("height", &self.shared.desc.height)
            .finish()
    }
}

// ── Factories ───────────────────────────────────────────────────

/// Create a buffer on `device` and wrap it in its owner.
pub fn create_buffer(device: &Arc<dyn Device>, desc: BufferDesc) -> Result<Buffer, DeviceError> {
    if desc.layout.stride() == 0 {
        return Err(DeviceError::InvalidDescription {
            reason: format!("buffer '{}' has a zero element stride", desc.name),
        });
    }
    let id = device.create_buffer_resource(&desc)?;
    Ok(Buffer {
        shared: Arc::new(BufferShared {
            id,
            desc,
            device: Arc::clone(device),
        }),
    })
}

/// Create a texture on `device` and wrap it in its owner.
pub fn create_texture(
    device: &Arc<dyn Device>,
    desc: TextureDesc,
) -> Result<Texture, DeviceError> {
    if desc.width == 0 || desc.height == 0 || desc.mip_levels == 0 || desc.array_slices == 0 {
        return Err(DeviceError::InvalidDescription {
            reason: format!("texture '{}' has an empty extent", desc.name),
        });
    }
    let id = device.create_texture_resource(&desc)?;
    Ok(Texture {
        shared: Arc::new(TextureShared {
            id,
            desc,
            device: Arc::clone(device),
        }),
    })
}
