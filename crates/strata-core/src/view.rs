//! Non-owning views over buffers and textures, and sampler state.

use std::fmt;
use std::sync::Weak;

use crate::format::Format;
use crate::id::{BufferId, TextureId};
use crate::resource::{BufferLayout, BufferShared, TextureDesc, TextureShared};

/// How a shader or fixed-function stage interprets a buffer view.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ViewKind {
    /// Shader resource view.
    ShaderRead,
    /// Unordered access view.
    ShaderReadWrite,
    /// Index buffer view.
    Index,
    /// Vertex buffer view.
    Vertex,
    /// Untyped bytes, used by copies.
    Raw,
}

/// A non-owning range of a [`Buffer`](crate::Buffer).
///
/// Views are cheap to clone and carry a weak link to their owner;
/// [`is_alive`](BufferView::is_alive) reports whether the owner still
/// exists. Views are only constructed by their owner.
#[derive(Clone)]
pub struct BufferView {
    buffer: BufferId,
    kind: ViewKind,
    first_element: u64,
    element_count: u64,
    layout: BufferLayout,
    owner: Weak<BufferShared>,
}

impl BufferView {
    pub(crate) fn new(
        buffer: BufferId,
        kind: ViewKind,
        first_element: u64,
        element_count: u64,
        layout: BufferLayout,
        owner: Weak<BufferShared>,
    ) -> Self {
        Self {
            buffer,
            kind,
            first_element,
            element_count,
            layout,
            owner,
        }
    }

    /// Id of the viewed buffer.
    pub fn buffer(&self) -> BufferId {
        self.buffer
    }

    /// Interpretation of the view.
    pub fn kind(&self) -> ViewKind {
        self.kind
    }

    /// First element covered by the view.
    pub fn first_element(&self) -> u64 {
        self.first_element
    }

    /// Number of elements covered.
    pub fn element_count(&self) -> u64 {
        self.element_count
    }

    /// Element layout of the underlying buffer.
    pub fn layout(&self) -> BufferLayout {
        self.layout
    }

    /// Element stride in bytes.
    pub fn stride(&self) -> u32 {
        self.layout.stride()
    }

    /// Byte offset of the first element within the buffer.
    pub fn byte_offset(&self) -> u64 {
        self.first_element * u64::from(self.stride())
    }

    /// Length of the view in bytes.
    pub fn byte_len(&self) -> u64 {
        self.element_count * u64::from(self.stride())
    }

    /// Whether the owning buffer still exists.
    pub fn is_alive(&self) -> bool {
        self.owner.strong_count() > 0
    }

    /// The same range reinterpreted as `kind`.
    pub fn with_kind(&self, kind: ViewKind) -> Self {
        Self {
            kind,
            ..self.clone()
        }
    }

    /// A view of the single element at `index` relative to this view.
    ///
    /// Returns `None` when `index` is outside the view.
    pub fn element(&self, index: u64) -> Option<Self> {
        self.subrange(index, 1)
    }

    /// A view of `count` elements starting at `first` relative to this view.
    pub fn subrange(&self, first: u64, count: u64) -> Option<Self> {
        let end = first.checked_add(count)?;
        if end > self.element_count {
            return None;
        }
        Some(Self {
            first_element: self.first_element + first,
            element_count: count,
            ..self.clone()
        })
    }
}

impl PartialEq for BufferView {
    fn eq(&self, other: &Self) -> bool {
        self.buffer == other.buffer
            && self.kind == other.kind
            && self.first_element == other.first_element
            && self.element_count == other.element_count
            && self.layout == other.layout
    }
}

impl fmt::Debug for BufferView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferView")
            .field("buffer", &self.buffer)
            .field("kind", &self.kind)
            .field("first_element", &self.first_element)
            .field("element_count", &self.element_count)
            .field("alive", &self.is_alive())
            .finish()
    }
}

/// A non-owning view over every mip and slice of a
/// [`Texture`](crate::Texture).
#[derive(Clone)]
pub struct TextureView {
    texture: TextureId,
    format: Format,
    width: u32,
    height: u32,
    mip_levels: u32,
    array_slices: u32,
    owner: Weak<TextureShared>,
}

impl TextureView {
    pub(crate) fn new(texture: TextureId, desc: &TextureDesc, owner: Weak<TextureShared>) -> Self {
        Self {
            texture,
            format: desc.format,
            width: desc.width,
            height: desc.height,
            mip_levels: desc.mip_levels,
            array_slices: desc.array_slices,
            owner,
        }
    }

    /// Id of the viewed texture.
    pub fn texture(&self) -> TextureId {
        self.texture
    }

    /// Texel format.
    pub fn format(&self) -> Format {
        self.format
    }

    /// Width of mip 0.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height of mip 0.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Number of mip levels.
    pub fn mip_levels(&self) -> u32 {
        self.mip_levels
    }

    /// Number of array slices.
    pub fn array_slices(&self) -> u32 {
        self.array_slices
    }

    /// Extent of `mip`, never smaller than one texel.
    pub fn mip_extent(&self, mip: u32) -> (u32, u32) {
        crate::resource::mip_extent(self.width, self.height, mip)
    }

    /// Whether the owning texture still exists.
    pub fn is_alive(&self) -> bool {
        self.owner.strong_count() > 0
    }
}

impl PartialEq for TextureView {
    fn eq(&self, other: &Self) -> bool {
        self.texture == other.texture
    }
}

impl fmt::Debug for TextureView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextureView")
            .field("texture", &self.texture)
            .field("format", &self.format)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("mip_levels", &self.mip_levels)
            .finish()
    }
}

/// Texel filtering.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Filter {
    /// Nearest texel.
    Point,
    /// Bilinear blend.
    Linear,
}

/// Handling of coordinates outside `[0, size)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AddressMode {
    /// Clamp to the edge texel.
    Clamp,
    /// Repeat the texture.
    Wrap,
}

/// Sampler state bound next to a texture.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SamplerDesc {
    /// Filtering mode.
    pub filter: Filter,
    /// Addressing mode on both axes.
    pub address: AddressMode,
}

impl SamplerDesc {
    /// Point sampling with clamp-to-edge addressing.
    pub const POINT_CLAMP: Self = Self {
        filter: Filter::Point,
        address: AddressMode::Clamp,
    };
}

impl Default for SamplerDesc {
    fn default() -> Self {
        Self::POINT_CLAMP
    }
}
