//! GPU record layouts read and written by the culling stages.
//!
//! Every record is `#[repr(C)]` and [`Pod`] so it can be uploaded,
//! read back and handed to kernels as raw bytes.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};
use strata_core::Aabb;

/// One cluster reference in a cluster data line.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
pub struct ClusterInstanceData {
    /// Instance the cluster is drawn for.
    pub instance_pointer: u32,
    /// Global index of the cluster in the scene's cluster buffers.
    pub cluster_pointer: u32,
}

/// The cluster range an instance draws with its selected LOD.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct InstanceLod {
    /// First cluster.
    pub cluster_pointer: u32,
    /// Number of clusters.
    pub cluster_count: u32,
}

/// Axis-aligned bounds padded to 32 bytes.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct BoundingBox {
    /// Minimum corner.
    pub min: [f32; 3],
    _pad0: f32,
    /// Maximum corner.
    pub max: [f32; 3],
    _pad1: f32,
}

impl BoundingBox {
    /// Bounds from two corners.
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self {
            min: min.to_array(),
            _pad0: 0.0,
            max: max.to_array(),
            _pad1: 0.0,
        }
    }

    /// Bounds of half-size `extents` around `center`.
    pub fn from_center_extents(center: Vec3, extents: Vec3) -> Self {
        Self::new(center - extents, center + extents)
    }

    /// As an [`Aabb`].
    pub fn to_aabb(self) -> Aabb {
        Aabb::new(Vec3::from_array(self.min), Vec3::from_array(self.max))
    }
}

impl From<Aabb> for BoundingBox {
    fn from(aabb: Aabb) -> Self {
        Self::new(aabb.min, aabb.max)
    }
}

/// Normal cone of a cluster, in the cluster's local space.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct ClusterCone {
    /// Cone apex.
    pub apex: [f32; 3],
    /// Cosine bound; `1.0` or more disables backface rejection.
    pub cutoff: f32,
    /// Average facing direction.
    pub axis: [f32; 3],
    _pad: f32,
}

impl ClusterCone {
    /// A cone that never rejects.
    pub const DISABLED: Self = Self {
        apex: [0.0; 3],
        cutoff: 1.0,
        axis: [0.0, 0.0, 1.0],
        _pad: 0.0,
    };

    /// A cone at `apex` facing `axis`.
    pub fn new(apex: Vec3, axis: Vec3, cutoff: f32) -> Self {
        Self {
            apex: apex.to_array(),
            cutoff,
            axis: axis.to_array(),
            _pad: 0.0,
        }
    }
}

/// Where a cluster's geometry lives in the scene's index and vertex arenas.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct ClusterBinding {
    /// First index in the scene index buffer.
    pub index_pointer: u32,
    /// Number of indexes.
    pub index_count: u32,
    /// Base vertex added to every index.
    pub vertex_pointer: u32,
    _pad: u32,
}

impl ClusterBinding {
    /// A binding of `index_count` indexes at `index_pointer`.
    pub fn new(index_pointer: u32, index_count: u32, vertex_pointer: u32) -> Self {
        Self {
            index_pointer,
            index_count,
            vertex_pointer,
            _pad: 0,
        }
    }
}

/// Column-major instance transform.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct InstanceTransform {
    /// Matrix columns, flattened.
    pub matrix: [f32; 16],
}

impl InstanceTransform {
    /// Identity transform.
    pub const IDENTITY: Self = Self {
        matrix: [
            1.0, 0.0, 0.0, 0.0, //
            0.0, 1.0, 0.0, 0.0, //
            0.0, 0.0, 1.0, 0.0, //
            0.0, 0.0, 0.0, 1.0,
        ],
    };

    /// As a matrix.
    pub fn to_mat4(self) -> Mat4 {
        Mat4::from_cols_array(&self.matrix)
    }
}

impl Default for InstanceTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl From<Mat4> for InstanceTransform {
    fn from(m: Mat4) -> Self {
        Self {
            matrix: m.to_cols_array(),
        }
    }
}

/// Material class of an instance; selects the partition its clusters
/// land in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum MaterialClass {
    /// Fully opaque.
    #[default]
    Opaque,
    /// Alpha tested.
    AlphaClipped,
    /// Blended.
    Transparent,
    /// Terrain patches.
    Terrain,
}

impl MaterialClass {
    /// All classes in partition order.
    pub const ALL: [Self; 4] = [
        Self::Opaque,
        Self::AlphaClipped,
        Self::Transparent,
        Self::Terrain,
    ];

    /// Value stored in the instance material buffer.
    pub const fn to_raw(self) -> u32 {
        match self {
            Self::Opaque => 0,
            Self::AlphaClipped => 1,
            Self::Transparent => 2,
            Self::Terrain => 3,
        }
    }

    /// Decode a stored value. Unknown values are treated as opaque.
    pub const fn from_raw(raw: u32) -> Self {
        match raw {
            1 => Self::AlphaClipped,
            2 => Self::Transparent,
            3 => Self::Terrain,
            _ => Self::Opaque,
        }
    }
}

/// An instance that survived instance culling, with the place its
/// clusters were reserved in the target cluster line.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct FrustumCullingOutput {
    /// Surviving instance.
    pub instance_pointer: u32,
    /// First cluster of its LOD.
    pub cluster_pointer: u32,
    /// Number of clusters.
    pub cluster_count: u32,
    /// Absolute slot of its first cluster in the target line.
    pub cluster_base: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::size_of;

    #[test]
    fn record_layouts_have_fixed_sizes() {
        assert_eq!(size_of::<ClusterInstanceData>(), 8);
        assert_eq!(size_of::<InstanceLod>(), 8);
        assert_eq!(size_of::<BoundingBox>(), 32);
        assert_eq!(size_of::<ClusterCone>(), 32);
        assert_eq!(size_of::<ClusterBinding>(), 16);
        assert_eq!(size_of::<InstanceTransform>(), 64);
        assert_eq!(size_of::<FrustumCullingOutput>(), 16);
    }

    #[test]
    fn material_classes_round_trip_and_default_to_opaque() {
        for class in MaterialClass::ALL {
            assert_eq!(MaterialClass::from_raw(class.to_raw()), class);
        }
        assert_eq!(MaterialClass::from_raw(99), MaterialClass::Opaque);
    }

    #[test]
    fn transforms_keep_column_order() {
        let m = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));
        let t = InstanceTransform::from(m);
        assert_eq!(&t.matrix[12..15], &[1.0, 2.0, 3.0]);
        assert_eq!(t.to_mat4(), m);
        assert_eq!(InstanceTransform::default().to_mat4(), Mat4::IDENTITY);
    }
}
