//! Per-cluster visibility hashes in the cluster pass.

mod common;

use std::sync::Arc;

use glam::{Mat4, Vec3};
use strata_core::Device;
use strata_cull::{
    ClusterCone, ClusterPartitions, ClusterTracking, CullerConfig, FrustumCuller, InstanceTransform, LinePair,
    MaterialClass, SceneBuffers, SceneData,
};
use strata_test_utils::SoftDevice;

use common::{counter, pair};

const CLUSTERS: u32 = 2;

fn cull(device: &Arc<dyn Device>, culler: &FrustumCuller, buffers: &SceneBuffers, tracking: &ClusterTracking) -> u32 {
    let scene = buffers.bindings();
    let camera = common::overhead(Vec3::ZERO, 8.0);
    let (input, mut input_draw) = pair(device, "input", 16);
    let (opaque, mut opaque_draw) = pair(device, "opaque", 16);
    let (alpha, mut alpha_draw) = pair(device, "alpha", 16);
    let (transparent, mut transparent_draw) = pair(device, "transparent", 16);
    let (terrain, mut terrain_draw) = pair(device, "terrain", 16);

    let mut cmd = device.create_command_list("tracked");
    culler
        .instance_cull_no_depth(&mut cmd, &camera, &scene, LinePair::new(&input, &mut input_draw))
        .unwrap();
    culler.expand_clusters(&mut cmd, &input).unwrap();
    culler
        .cluster_cull(
            &mut cmd,
            &camera,
            &scene,
            &input_draw,
            ClusterPartitions {
                opaque: LinePair::new(&opaque, &mut opaque_draw),
                alpha_clipped: LinePair::new(&alpha, &mut alpha_draw),
                transparent: LinePair::new(&transparent, &mut transparent_draw),
                terrain: LinePair::new(&terrain, &mut terrain_draw),
            },
            Some(tracking),
        )
        .unwrap();
    common::run(device, cmd);
    counter(device, tracking.changed())
}

fn setup(soft: &Arc<SoftDevice>, device: &Arc<dyn Device>) -> (FrustumCuller, SceneBuffers, ClusterTracking) {
    let mut data = SceneData::default();
    let lod = common::push_mesh(&mut data, CLUSTERS, ClusterCone::DISABLED);
    common::place(
        &mut data,
        lod,
        MaterialClass::Opaque,
        &[Vec3::new(-2.0, 0.0, 0.0), Vec3::new(2.0, 0.0, 0.0)],
    );
    let buffers = SceneBuffers::upload(device, &data).unwrap();
    let tracking = ClusterTracking::new(device, 2, 2 * u64::from(CLUSTERS)).unwrap();
    // Instance 0 tracks slots 0..2, instance 1 slots 2..4.
    let slots = [0u32, CLUSTERS];
    soft.poke(&tracking.instance_slots(), 0, bytemuck::cast_slice(&slots))
        .unwrap();
    let culler = FrustumCuller::new(device, CullerConfig::new(4)).unwrap();
    (culler, buffers, tracking)
}

#[test]
fn first_sight_changes_every_cluster_then_settles() {
    let (soft, device) = common::device();
    let (culler, buffers, tracking) = setup(&soft, &device);
    assert_eq!(cull(&device, &culler, &buffers, &tracking), 2 * CLUSTERS);
    assert_eq!(cull(&device, &culler, &buffers, &tracking), 0);
}

#[test]
fn moving_an_instance_changes_only_its_clusters() {
    let (soft, device) = common::device();
    let (culler, buffers, tracking) = setup(&soft, &device);
    cull(&device, &culler, &buffers, &tracking);

    let moved = InstanceTransform::from(Mat4::from_translation(Vec3::new(2.5, 0.0, 0.0)));
    let stride = std::mem::size_of::<InstanceTransform>() as u64;
    device
        .write_buffer(&buffers.transforms(), stride, bytemuck::bytes_of(&moved))
        .unwrap();
    assert_eq!(cull(&device, &culler, &buffers, &tracking), CLUSTERS);

    let hashes: Vec<u32> = strata_test_utils::read_pods(&*device, &tracking.hashes(), 4).unwrap();
    assert!(hashes.iter().all(|&h| h != 0));
    assert_eq!(hashes[0], hashes[1], "same visibility and transform");
}
