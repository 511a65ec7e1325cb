//! Shared fixtures for the culling integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use glam::{Mat4, Vec3};
use strata_core::{CommandList, Device, DEFAULT_FENCE_TIMEOUT};
use strata_cull::{
    BoundingBox, ClusterCone, ClusterDataLine, CountBuffer, CullCamera, InstanceLod, MaterialClass, SceneData,
};
use strata_test_utils::{read_pod, SoftDevice};

/// A software device running the reference kernels.
pub fn device() -> (Arc<SoftDevice>, Arc<dyn Device>) {
    let soft = SoftDevice::new();
    for (program, kernel) in strata_cull::reference::kernels() {
        soft.register_kernel(program, kernel);
    }
    let device = soft.as_device();
    (soft, device)
}

/// Submit `cmd` and wait for it.
pub fn run(device: &Arc<dyn Device>, cmd: CommandList) {
    device.submit_blocking(cmd, DEFAULT_FENCE_TIMEOUT).unwrap();
}

/// Counter 0 of `count`.
pub fn counter(device: &Arc<dyn Device>, count: &CountBuffer) -> u32 {
    read_pod(&**device, &count.srv(), 0).unwrap()
}

/// Orthographic camera at `z = 10` looking down `-z`, seeing
/// `x, y` within `half_extent` of `center`.
pub fn overhead(center: Vec3, half_extent: f32) -> CullCamera {
    CullCamera::orthographic(
        center + Vec3::Z * 10.0,
        center,
        Vec3::Y,
        half_extent,
        0.1,
        100.0,
    )
}

/// Cluster indexes used by every fixture cluster: two triangles.
pub const QUAD: [u32; 6] = [0, 1, 2, 2, 1, 3];

/// Push `clusters` half-unit clusters, each with [`QUAD`] indexes and the
/// given `cone`. Returns the lod covering them.
pub fn push_mesh(data: &mut SceneData, clusters: u32, cone: ClusterCone) -> InstanceLod {
    let bounds = BoundingBox::from_center_extents(Vec3::ZERO, Vec3::splat(0.25));
    let first = data.cluster_bounds.len() as u32;
    for c in 0..clusters {
        data.push_cluster(bounds, cone, &QUAD, c * 4);
    }
    InstanceLod {
        cluster_pointer: first,
        cluster_count: clusters,
    }
}

/// Instances of `lod` placed at `positions`.
pub fn place(data: &mut SceneData, lod: InstanceLod, material: MaterialClass, positions: &[Vec3]) {
    let bounds = BoundingBox::from_center_extents(Vec3::ZERO, Vec3::splat(0.25));
    for &p in positions {
        data.push_instance(bounds, Mat4::from_translation(p).into(), lod, material);
    }
}

/// `n` instance positions two units apart along `+x`.
pub fn row(n: u32) -> Vec<Vec3> {
    (0..n).map(|i| Vec3::new(2.0 * i as f32, 0.0, 0.0)).collect()
}

/// An owning append line of `capacity` records and an empty draw line.
pub fn pair(device: &Arc<dyn Device>, name: &str, capacity: u64) -> (ClusterDataLine, ClusterDataLine) {
    (
        ClusterDataLine::new(device, name, capacity).unwrap(),
        ClusterDataLine::new(device, &format!("{name}-draw"), 0).unwrap(),
    )
}
