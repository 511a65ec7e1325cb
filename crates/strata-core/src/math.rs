//! Frustum and bounding-volume math shared by the CPU and the kernels.
//!
//! Depth follows the `[0, 1]` clip-space convention of glam's
//! `perspective_*` and `orthographic_*` constructors.

use glam::{Mat4, Vec3, Vec4};

/// Relative slack of the box-plane test.
///
/// Extracted planes carry rounding error, so a box exactly on a plane can
/// land a few ulps outside it. The slack scales with the magnitude of the
/// terms being summed.
pub const PLANE_TOLERANCE: f32 = 1e-5;

/// Whether the positive vertex `p` is far enough behind the plane
/// `(n, d)` to reject the box.
fn behind(n: Vec3, d: f32, p: Vec3) -> bool {
    let slack = PLANE_TOLERANCE * (1.0 + d.abs() + n.abs().dot(p.abs()));
    n.dot(p) + d < -slack
}

/// A plane `normal . p + d = 0` with the normal pointing inside.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Plane {
    /// Unit normal.
    pub normal: Vec3,
    /// Signed offset.
    pub d: f32,
}

impl Plane {
    /// A normalized plane from `(a, b, c, d)` coefficients.
    pub fn from_coefficients(v: Vec4) -> Self {
        let normal = v.truncate();
        let len = normal.length();
        if len <= f32::EPSILON {
            return Self { normal, d: v.w };
        }
        Self {
            normal: normal / len,
            d: v.w / len,
        }
    }

    /// Signed distance of `p`; negative means outside.
    pub fn distance(&self, p: Vec3) -> f32 {
        self.normal.dot(p) + self.d
    }

    /// The plane packed as `(nx, ny, nz, d)`.
    pub fn to_array(self) -> [f32; 4] {
        [self.normal.x, self.normal.y, self.normal.z, self.d]
    }
}

/// Axis-aligned bounding box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    /// Minimum corner.
    pub min: Vec3,
    /// Maximum corner.
    pub max: Vec3,
}

impl Aabb {
    /// A box from its corners.
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// A box of half-size `extents` around `center`.
    pub fn from_center_extents(center: Vec3, extents: Vec3) -> Self {
        Self {
            min: center - extents,
            max: center + extents,
        }
    }

    /// Center point.
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Half-size.
    pub fn extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    /// The eight corners.
    pub fn corners(&self) -> [Vec3; 8] {
        let (a, b) = (self.min, self.max);
        [
            Vec3::new(a.x, a.y, a.z),
            Vec3::new(b.x, a.y, a.z),
            Vec3::new(a.x, b.y, a.z),
            Vec3::new(b.x, b.y, a.z),
            Vec3::new(a.x, a.y, b.z),
            Vec3::new(b.x, a.y, b.z),
            Vec3::new(a.x, b.y, b.z),
            Vec3::new(b.x, b.y, b.z),
        ]
    }

    /// The box enclosing this box after an affine transform.
    pub fn transformed(&self, transform: &Mat4) -> Self {
        let mut min = Vec3::splat(f32::INFINITY);
        let mut max = Vec3::splat(f32::NEG_INFINITY);
        for corner in self.corners() {
            let p = transform.transform_point3(corner);
            min = min.min(p);
            max = max.max(p);
        }
        Self { min, max }
    }
}

/// The six clip planes of a camera.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Frustum {
    /// Left, right, bottom, top, near, far.
    pub planes: [Plane; 6],
}

impl Frustum {
    /// Extract the planes of a projection x view matrix (Gribb-Hartmann).
    pub fn from_view_projection(vp: Mat4) -> Self {
        let (r0, r1, r2, r3) = (vp.row(0), vp.row(1), vp.row(2), vp.row(3));
        Self {
            planes: [
                Plane::from_coefficients(r3 + r0),
                Plane::from_coefficients(r3 - r0),
                Plane::from_coefficients(r3 + r1),
                Plane::from_coefficients(r3 - r1),
                Plane::from_coefficients(r2),
                Plane::from_coefficients(r3 - r2),
            ],
        }
    }

    /// Whether any part of `aabb` may be inside.
    ///
    /// A box is rejected only when it lies outside one plane by more than
    /// [`PLANE_TOLERANCE`], so boxes touching or straddling a plane count
    /// as visible.
    pub fn intersects_aabb(&self, aabb: &Aabb) -> bool {
        self.planes.iter().all(|plane| {
            let n = plane.normal;
            let p = Vec3::new(
                if n.x >= 0.0 { aabb.max.x } else { aabb.min.x },
                if n.y >= 0.0 { aabb.max.y } else { aabb.min.y },
                if n.z >= 0.0 { aabb.max.z } else { aabb.min.z },
            );
            !behind(n, plane.d, p)
        })
    }

    /// Planes packed for a constant block.
    pub fn to_arrays(&self) -> [[f32; 4]; 6] {
        self.planes.map(Plane::to_array)
    }

    /// Same test as [`intersects_aabb`](Self::intersects_aabb) over packed planes.
    pub fn packed_intersects(planes: &[[f32; 4]; 6], min: Vec3, max: Vec3) -> bool {
        planes.iter().all(|p| {
            let n = Vec3::new(p[0], p[1], p[2]);
            let v = Vec3::new(
                if n.x >= 0.0 { max.x } else { min.x },
                if n.y >= 0.0 { max.y } else { min.y },
                if n.z >= 0.0 { max.z } else { min.z },
            );
            !behind(n, p[3], v)
        })
    }
}

/// Whether a cluster's normal cone faces entirely away from `eye`.
///
/// `cutoff` is the cosine bound of the cone; values `>= 1` disable the test.
/// Only ever rejects: a `false` result says nothing about visibility.
pub fn cone_backfacing(apex: Vec3, axis: Vec3, cutoff: f32, eye: Vec3) -> bool {
    if cutoff >= 1.0 {
        return false;
    }
    let to_apex = apex - eye;
    let len = to_apex.length();
    if len <= f32::EPSILON {
        return false;
    }
    to_apex.dot(axis) >= cutoff * len
}


#[cfg(all(test, not(miri)))]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn boxes_touching_a_plane_are_never_culled(
            y in -20.0f32..20.0,
            half in 0.01f32..2.0,
            eps in 1e-3f32..1e-2,
        ) {
            // Box whose +x face reaches just past the left plane of an ortho camera.
            let proj = Mat4::orthographic_rh(-50.0, 50.0, -50.0, 50.0, 0.1, 500.0);
            let frustum = Frustum::from_view_projection(proj);
            let left = -50.0;
            let on_plane = Aabb::new(
                Vec3::new(left - 2.0 * half, y - half, -10.0 - half),
                Vec3::new(left + eps, y + half, -10.0 + half),
            );
            prop_assert!(frustum.intersects_aabb(&on_plane));

            let straddling = Aabb::from_center_extents(Vec3::new(left, y, -10.0), Vec3::splat(half));
            prop_assert!(frustum.intersects_aabb(&straddling));

            let outside = Aabb::new(
                Vec3::new(left - 2.0 * half - 1.0, y - half, -10.0 - half),
                Vec3::new(left - 1.0, y + half, -10.0 + half),
            );
            prop_assert!(!frustum.intersects_aabb(&outside));
        }

        #[test]
        fn perspective_boxes_on_a_side_plane_are_never_culled(
            fov_deg in 10.0f32..150.0,
            z in 0.2f32..90.0,
            along in -0.9f32..0.9,
            size in 0.001f32..2.0,
        ) {
            let fov = fov_deg.to_radians();
            let proj = Mat4::perspective_rh(fov, 1.0, 0.1, 100.0);
            let frustum = Frustum::from_view_projection(proj);
            let packed = frustum.to_arrays();
            let edge = (fov * 0.5).tan() * z;

            // Boxes extend toward the eye from depth `z`, so the corner the
            // test picks lies exactly on the plane.
            let left = Aabb::new(
                Vec3::new(-edge - size, along * edge, -z),
                Vec3::new(-edge, along * edge + size.min(0.1), -z + size),
            );
            prop_assert!(frustum.intersects_aabb(&left));
            prop_assert!(Frustum::packed_intersects(&packed, left.min, left.max));

            let top = Aabb::new(
                Vec3::new(along * edge, edge, -z),
                Vec3::new(along * edge + size.min(0.1), edge + size, -z + size),
            );
            prop_assert!(frustum.intersects_aabb(&top));
            prop_assert!(Frustum::packed_intersects(&packed, top.min, top.max));

            let gap = 1e-2 * (1.0 + z);
            let outside = Aabb::new(
                Vec3::new(-edge - gap - size, along * edge, -z),
                Vec3::new(-edge - gap, along * edge + size.min(0.1), -z + size),
            );
            prop_assert!(!frustum.intersects_aabb(&outside));
        }
    }
}
