//! Pixel and element formats for typed buffers and textures.

use std::fmt;

/// Element format of a typed buffer or a texture texel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Format {
    /// One normalized byte.
    R8Unorm,
    /// 16-bit unsigned integer; valid for index buffers.
    R16Uint,
    /// 32-bit unsigned integer; valid for index and count buffers.
    R32Uint,
    /// 32-bit signed integer.
    R32Sint,
    /// 32-bit float; the depth pyramid format.
    R32Float,
    /// Two 16-bit floats.
    R16G16Float,
    /// Two 32-bit floats, e.g. texture coordinates.
    R32G32Float,
    /// Three 32-bit floats, e.g. positions and normals.
    R32G32B32Float,
    /// Four 32-bit floats, e.g. tangents.
    R32G32B32A32Float,
    /// Four normalized bytes, e.g. vertex colors.
    R8G8B8A8Unorm,
    /// Four 32-bit unsigned integers.
    R32G32B32A32Uint,
}

impl Format {
    /// Size of one element in bytes.
    pub const fn byte_size(self) -> u32 {
        match self {
            Self::R8Unorm => 1,
            Self::R16Uint => 2,
            Self::R32Uint | Self::R32Sint | Self::R32Float => 4,
            Self::R16G16Float | Self::R8G8B8A8Unorm => 4,
            Self::R32G32Float => 8,
            Self::R32G32B32Float => 12,
            Self::R32G32B32A32Float | Self::R32G32B32A32Uint => 16,
        }
    }

    /// Whether the format may back an index buffer view.
    pub const fn is_index_format(self) -> bool {
        matches!(self, Self::R16Uint | Self::R32Uint)
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_sizes_match_component_layout() {
        assert_eq!(Format::R8Unorm.byte_size(), 1);
        assert_eq!(Format::R16Uint.byte_size(), 2);
        assert_eq!(Format::R32G32B32Float.byte_size(), 12);
        assert_eq!(Format::R32G32B32A32Uint.byte_size(), 16);
    }

    #[test]
    fn only_integer_formats_index() {
        assert!(Format::R16Uint.is_index_format());
        assert!(Format::R32Uint.is_index_format());
        assert!(!Format::R32Float.is_index_format());
    }
}
