//! Cameras and the constant block every culling program reads.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};
use strata_core::Frustum;

use crate::pyramid::DepthPyramid;

/// FNV-1a prime used by the change-tracking hashes.
pub const FNV_PRIME: u32 = 16_777_619;

/// FNV-1a offset basis used by the change-tracking hashes.
pub const FNV_OFFSET_BASIS: u32 = 2_166_136_261;

/// Fold `bytes` into an FNV-1a hash.
pub fn fnv1a(mut hash: u32, bytes: &[u8]) -> u32 {
    for &byte in bytes {
        hash ^= u32::from(byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Constant block shared by the culling programs.
///
/// Field order is the binding layout; every field is four-byte aligned.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct CullConstants {
    /// Left, right, bottom, top, near, far planes as `(n, d)`.
    pub planes: [[f32; 4]; 6],
    /// Column-major projection x view.
    pub view_projection: [f32; 16],
    /// Column-major view matrix.
    pub view: [f32; 16],
    /// Column-major camera-to-world matrix.
    pub inverse_view: [f32; 16],
    /// Camera position, `w = 1`.
    pub camera_position: [f32; 4],
    /// Unit forward direction, `w = 0`.
    pub camera_direction: [f32; 4],
    /// Near and far distances.
    pub near_far: [f32; 2],
    /// Depth pyramid mip 0 extent in texels.
    pub pyramid_size: [f32; 2],
    /// Pyramid mips usable by occlusion; 1 without a pyramid.
    pub mip_count: u32,
    /// Instances in the scene.
    pub instance_count: u32,
    /// [`FNV_PRIME`].
    pub fnv_prime: u32,
    /// [`FNV_OFFSET_BASIS`].
    pub fnv_offset_basis: u32,
    /// Non-zero when a depth pyramid is bound.
    pub depth_test: u32,
    /// Non-zero to mark every visible caster as changed.
    pub force: u32,
    /// Non-zero when cluster tracking buffers are bound.
    pub tracking: u32,
    /// Largest index count of one cluster.
    pub cluster_size: u32,
}

impl CullConstants {
    /// Attach `pyramid`, or disable depth testing when `None`.
    pub fn with_depth(mut self, pyramid: Option<&DepthPyramid>) -> Self {
        match pyramid {
            Some(pyramid) => {
                let (w, h) = pyramid.size();
                self.pyramid_size = [w as f32, h as f32];
                self.mip_count = pyramid.mip_levels();
                self.depth_test = 1;
            }
            None => {
                self.pyramid_size = [0.0, 0.0];
                self.mip_count = 1;
                self.depth_test = 0;
            }
        }
        self
    }

    /// Set the scene's instance count.
    pub fn with_instance_count(mut self, instance_count: u32) -> Self {
        self.instance_count = instance_count;
        self
    }

    /// Set the per-cluster index bound.
    pub fn with_cluster_size(mut self, cluster_size: u32) -> Self {
        self.cluster_size = cluster_size;
        self
    }

    /// Projection x view as a matrix.
    pub fn view_projection(&self) -> Mat4 {
        Mat4::from_cols_array(&self.view_projection)
    }

    /// Camera position.
    pub fn position(&self) -> Vec3 {
        Vec3::new(
            self.camera_position[0],
            self.camera_position[1],
            self.camera_position[2],
        )
    }
}

/// A camera as the culling stages see it.
///
/// Projections map depth to `[0, 1]` with `0` at the near plane, and the
/// depth pyramid stores the farthest depth of each texel.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CullCamera {
    /// World to view.
    pub view: Mat4,
    /// View to clip.
    pub projection: Mat4,
    /// World-space position.
    pub position: Vec3,
    /// Near plane distance.
    pub near: f32,
    /// Far plane distance.
    pub far: f32,
}

impl CullCamera {
    /// A camera from explicit matrices; the position is recovered from
    /// `view`.
    pub fn new(view: Mat4, projection: Mat4, near: f32, far: f32) -> Self {
        Self {
            view,
            projection,
            position: view.inverse().w_axis.truncate(),
            near,
            far,
        }
    }

    /// A perspective camera at `eye` looking at `target`.
    pub fn look_at(eye: Vec3, target: Vec3, up: Vec3, fov_y: f32, aspect: f32, near: f32, far: f32) -> Self {
        Self {
            view: Mat4::look_at_rh(eye, target, up),
            projection: Mat4::perspective_rh(fov_y, aspect, near, far),
            position: eye,
            near,
            far,
        }
    }

    /// An orthographic camera, the usual shape of a directional light.
    pub fn orthographic(eye: Vec3, target: Vec3, up: Vec3, half_extent: f32, near: f32, far: f32) -> Self {
        Self {
            view: Mat4::look_at_rh(eye, target, up),
            projection: Mat4::orthographic_rh(
                -half_extent,
                half_extent,
                -half_extent,
                half_extent,
                near,
                far,
            ),
            position: eye,
            near,
            far,
        }
    }

    /// Projection x view.
    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }

    /// Normalized clip planes.
    pub fn frustum(&self) -> Frustum {
        Frustum::from_view_projection(self.view_projection())
    }

    /// Unit forward direction in world space.
    pub fn forward(&self) -> Vec3 {
        -self.view.inverse().z_axis.truncate().normalize_or_zero()
    }

    /// The constant block for this camera, without a depth pyramid.
    pub fn constants(&self) -> CullConstants {
        let inverse_view = self.view.inverse();
        CullConstants {
            planes: self.frustum().to_arrays(),
            view_projection: self.view_projection().to_cols_array(),
            view: self.view.to_cols_array(),
            inverse_view: inverse_view.to_cols_array(),
            camera_position: self.position.extend(1.0).to_array(),
            camera_direction: self.forward().extend(0.0).to_array(),
            near_far: [self.near, self.far],
            pyramid_size: [0.0, 0.0],
            mip_count: 1,
            instance_count: 0,
            fnv_prime: FNV_PRIME,
            fnv_offset_basis: FNV_OFFSET_BASIS,
            depth_test: 0,
            force: 0,
            tracking: 0,
            cluster_size: crate::CullerConfig::DEFAULT_CLUSTER_SIZE,
        }
    }
}
