//! Full camera frames on the software device: instance culling through
//! indirect draws, with every count staying on the GPU.

mod common;

use std::sync::Arc;

use glam::Vec3;
use strata_core::{Bindings, Device, GraphicsPipeline, ProgramId};
use strata_cull::{
    ClusterCone, ClusterDataLine, ClusterPartitions, CullerConfig, DataLine, DrawDataLine, FrustumCuller,
    IndexDataLine, IndexExpansion, LinePair, MaterialClass, OcclusionCuller, OcclusionOutputs, SceneBuffers,
    SceneData, ShadowPartition,
};
use strata_test_utils::read_pods;

use common::{counter, pair};

const MESH: ProgramId = ProgramId::new("test.mesh");

/// Every line a camera frame writes.
struct Frame {
    instances: (ClusterDataLine, ClusterDataLine),
    opaque: (ClusterDataLine, ClusterDataLine),
    alpha_clipped: (ClusterDataLine, ClusterDataLine),
    transparent: (ClusterDataLine, ClusterDataLine),
    terrain: (ClusterDataLine, ClusterDataLine),
    visible: (ClusterDataLine, ClusterDataLine),
    not_yet_tested: (ClusterDataLine, ClusterDataLine),
    late_alpha_clipped: (ClusterDataLine, ClusterDataLine),
    late_transparent: (ClusterDataLine, ClusterDataLine),
    late_terrain: (ClusterDataLine, ClusterDataLine),
    indexes: (IndexDataLine, IndexDataLine),
    draws: DrawDataLine,
}

impl Frame {
    fn new(device: &Arc<dyn Device>, clusters: u64, draws: u64) -> Self {
        Self {
            instances: pair(device, "instances", clusters),
            opaque: pair(device, "opaque", clusters),
            alpha_clipped: pair(device, "alpha-clipped", clusters),
            transparent: pair(device, "transparent", clusters),
            terrain: pair(device, "terrain", clusters),
            visible: pair(device, "visible", clusters),
            not_yet_tested: pair(device, "not-yet-tested", clusters),
            late_alpha_clipped: pair(device, "late-alpha-clipped", clusters),
            late_transparent: pair(device, "late-transparent", clusters),
            late_terrain: pair(device, "late-terrain", clusters),
            indexes: (
                IndexDataLine::new(device, "indexes", clusters * 6).unwrap(),
                IndexDataLine::new(device, "indexes-draw", 0).unwrap(),
            ),
            draws: DrawDataLine::new(device, "draws", draws).unwrap(),
        }
    }

    fn record(
        &mut self,
        device: &Arc<dyn Device>,
        culler: &FrustumCuller,
        occlusion: &OcclusionCuller,
        expansion: &IndexExpansion,
        camera: &strata_cull::CullCamera,
        scene: &strata_cull::SceneBindings,
    ) {
        let mut cmd = device.create_command_list("frame");
        for line in [
            &self.instances.0,
            &self.opaque.0,
            &self.alpha_clipped.0,
            &self.transparent.0,
            &self.terrain.0,
            &self.visible.0,
            &self.not_yet_tested.0,
            &self.late_alpha_clipped.0,
            &self.late_transparent.0,
            &self.late_terrain.0,
        ] {
            line.reset(&mut cmd);
        }
        self.indexes.0.reset(&mut cmd);

        culler
            .instance_cull_no_depth(
                &mut cmd,
                camera,
                scene,
                LinePair::new(&self.instances.0, &mut self.instances.1),
            )
            .unwrap();
        culler.expand_clusters(&mut cmd, &self.instances.0).unwrap();
        culler
            .cluster_cull(
                &mut cmd,
                camera,
                scene,
                &self.instances.1,
                ClusterPartitions {
                    opaque: LinePair::new(&self.opaque.0, &mut self.opaque.1),
                    alpha_clipped: LinePair::new(&self.alpha_clipped.0, &mut self.alpha_clipped.1),
                    transparent: LinePair::new(&self.transparent.0, &mut self.transparent.1),
                    terrain: LinePair::new(&self.terrain.0, &mut self.terrain.1),
                },
                None,
            )
            .unwrap();
        occlusion
            .occlusion_cull(
                &mut cmd,
                camera,
                scene,
                &self.opaque.1,
                None,
                OcclusionOutputs {
                    visible: LinePair::new(&self.visible.0, &mut self.visible.1),
                    not_yet_tested: LinePair::new(&self.not_yet_tested.0, &mut self.not_yet_tested.1),
                    alpha_clipped: LinePair::new(&self.late_alpha_clipped.0, &mut self.late_alpha_clipped.1),
                    transparent: LinePair::new(&self.late_transparent.0, &mut self.late_transparent.1),
                    terrain: LinePair::new(&self.late_terrain.0, &mut self.late_terrain.1),
                },
                None,
            )
            .unwrap();
        expansion
            .expand_indexes(
                &mut cmd,
                scene,
                &self.visible.1,
                &self.indexes.0,
                &mut self.indexes.1,
                &self.draws,
                culler.config().cluster_size,
            )
            .unwrap();
        let index_buffer = self.indexes.0.index_view().unwrap();
        self.draws
            .draw_indexed_indirect(&mut cmd, GraphicsPipeline::new(MESH, Bindings::new()), &index_buffer)
            .unwrap();
        common::run(device, cmd);
    }
}

/// 1000 instances of a four-cluster mesh in a row, 300 of them under an
/// orthographic camera.
fn row_scene(device: &Arc<dyn Device>) -> SceneBuffers {
    let mut data = SceneData::default();
    let lod = common::push_mesh(&mut data, 4, ClusterCone::DISABLED);
    common::place(&mut data, lod, MaterialClass::Opaque, &common::row(1000));
    SceneBuffers::upload(device, &data).unwrap()
}

fn row_camera() -> strata_cull::CullCamera {
    // Sees x in [-1, 599]: instances 0..300.
    common::overhead(Vec3::new(299.0, 0.0, 0.0), 300.0)
}

#[test]
fn visible_clusters_become_indirect_draws() {
    let (soft, device) = common::device();
    let buffers = row_scene(&device);
    let scene = buffers.bindings();
    let culler = FrustumCuller::new(&device, CullerConfig::new(1000)).unwrap();
    let occlusion = OcclusionCuller::new(&device).unwrap();
    let expansion = IndexExpansion::new(&device).unwrap();

    let mut frame = Frame::new(&device, 4096, DrawDataLine::DEFAULT_ARGS);
    frame.draws.resize(&device, 1200, false).unwrap();
    assert_eq!(frame.draws.capacity(), 1200);
    frame.record(&device, &culler, &occlusion, &expansion, &row_camera(), &scene);

    assert_eq!(counter(&device, culler.instance_count(ShadowPartition::Opaque)), 300);
    assert_eq!(counter(&device, frame.instances.1.count()), 1200);
    assert_eq!(counter(&device, frame.opaque.1.count()), 1200);
    assert_eq!(counter(&device, frame.alpha_clipped.1.count()), 0);
    assert_eq!(counter(&device, frame.visible.1.count()), 1200);
    assert_eq!(counter(&device, frame.not_yet_tested.1.count()), 0);
    assert_eq!(counter(&device, frame.indexes.1.count()), 1200 * 6);
    assert_eq!(counter(&device, frame.draws.count()), 1200);

    let stats = soft.stats();
    let draw = stats.draws.last().unwrap();
    assert_eq!(draw.program, MESH);
    assert_eq!(draw.draws, 1200);
    assert_eq!(draw.indexes, 1200 * 6);
    assert_eq!(draw.args.len(), 1200);
    let mut first_indexes: Vec<u32> = draw.args.iter().map(|a| a.first_index).collect();
    first_indexes.sort_unstable();
    first_indexes.dedup();
    assert_eq!(first_indexes.len(), 1200, "every draw owns its own index range");
    assert!(draw.args.iter().all(|a| a.index_count == 6 && a.instance_count == 1));
}

#[test]
fn expanded_indexes_copy_the_cluster_data() {
    let (_soft, device) = common::device();
    let mut data = SceneData::default();
    let lod = common::push_mesh(&mut data, 1, ClusterCone::DISABLED);
    common::place(&mut data, lod, MaterialClass::Opaque, &[Vec3::ZERO]);
    let buffers = SceneBuffers::upload(&device, &data).unwrap();
    let culler = FrustumCuller::new(&device, CullerConfig::new(4)).unwrap();
    let occlusion = OcclusionCuller::new(&device).unwrap();
    let expansion = IndexExpansion::new(&device).unwrap();

    let mut frame = Frame::new(&device, 16, 4);
    frame.record(
        &device,
        &culler,
        &occlusion,
        &expansion,
        &common::overhead(Vec3::ZERO, 4.0),
        &buffers.bindings(),
    );

    let indexes: Vec<u32> = read_pods(&*device, &frame.indexes.0.index_view().unwrap(), 6).unwrap();
    assert_eq!(indexes, common::QUAD.to_vec());
    let args: Vec<strata_core::DrawIndexedIndirectArgs> =
        read_pods(&*device, &frame.draws.args().unwrap(), 1).unwrap();
    assert_eq!(args[0].first_index, 0);
    assert_eq!(args[0].base_vertex, 0);
    // The draw points back at its record in the visible line.
    let visible = frame.visible.0.clusters_srv().unwrap();
    let record: Vec<strata_cull::ClusterInstanceData> = read_pods(&*device, &visible, 1).unwrap();
    assert_eq!(args[0].first_instance, 0);
    assert_eq!(record[0].instance_pointer, 0);
    assert_eq!(record[0].cluster_pointer, lod.cluster_pointer);
}

#[test]
fn draws_beyond_the_line_capacity_are_dropped() {
    let (soft, device) = common::device();
    let buffers = row_scene(&device);
    let culler = FrustumCuller::new(&device, CullerConfig::new(1000)).unwrap();
    let occlusion = OcclusionCuller::new(&device).unwrap();
    let expansion = IndexExpansion::new(&device).unwrap();

    let mut frame = Frame::new(&device, 4096, DrawDataLine::DEFAULT_ARGS);
    frame.record(&device, &culler, &occlusion, &expansion, &row_camera(), &buffers.bindings());

    // The counter still sees every cluster; execution stops at capacity.
    assert_eq!(counter(&device, frame.draws.count()), 1200);
    let stats = soft.stats();
    assert_eq!(stats.draws.last().unwrap().draws, 100);
}

#[test]
fn undersized_lines_stay_in_bounds_and_recover_after_resize() {
    let (_soft, device) = common::device();
    let buffers = row_scene(&device);
    let scene = buffers.bindings();
    let culler = FrustumCuller::new(&device, CullerConfig::new(1000)).unwrap();
    let occlusion = OcclusionCuller::new(&device).unwrap();
    let expansion = IndexExpansion::new(&device).unwrap();

    // Room for 8 clusters while 1200 are reserved.
    let mut frame = Frame::new(&device, 8, 2048);
    frame.record(&device, &culler, &occlusion, &expansion, &row_camera(), &scene);
    assert_eq!(counter(&device, frame.instances.1.count()), 1200);
    assert_eq!(counter(&device, frame.opaque.1.count()), 8);
    assert!(counter(&device, frame.draws.count()) <= 8);

    for line in [
        &mut frame.instances.0,
        &mut frame.opaque.0,
        &mut frame.alpha_clipped.0,
        &mut frame.transparent.0,
        &mut frame.terrain.0,
        &mut frame.visible.0,
        &mut frame.not_yet_tested.0,
        &mut frame.late_alpha_clipped.0,
        &mut frame.late_transparent.0,
        &mut frame.late_terrain.0,
    ] {
        line.resize(&device, 1200, false).unwrap();
    }
    frame.indexes.0.resize(&device, 1200 * 6, false).unwrap();
    frame.record(&device, &culler, &occlusion, &expansion, &row_camera(), &scene);
    assert_eq!(counter(&device, frame.visible.1.count()), 1200);
    assert_eq!(counter(&device, frame.draws.count()), 1200);
}

#[test]
fn cones_facing_away_from_the_camera_are_rejected() {
    let (_soft, device) = common::device();
    let mut data = SceneData::default();
    let away = common::push_mesh(&mut data, 2, ClusterCone::new(Vec3::ZERO, Vec3::NEG_Z, 0.5));
    let toward = common::push_mesh(&mut data, 2, ClusterCone::new(Vec3::ZERO, Vec3::Z, 0.5));
    let near_center: Vec<Vec3> = (0..4).map(|i| Vec3::new(i as f32 - 1.5, 0.0, 0.0)).collect();
    common::place(&mut data, away, MaterialClass::Opaque, &near_center);
    common::place(&mut data, toward, MaterialClass::Opaque, &near_center);
    let buffers = SceneBuffers::upload(&device, &data).unwrap();
    let culler = FrustumCuller::new(&device, CullerConfig::new(8)).unwrap();
    let occlusion = OcclusionCuller::new(&device).unwrap();
    let expansion = IndexExpansion::new(&device).unwrap();

    let mut frame = Frame::new(&device, 64, 64);
    frame.record(
        &device,
        &culler,
        &occlusion,
        &expansion,
        &common::overhead(Vec3::ZERO, 8.0),
        &buffers.bindings(),
    );
    assert_eq!(counter(&device, frame.instances.1.count()), 16);
    assert_eq!(counter(&device, frame.opaque.1.count()), 8);

    let survivors: Vec<strata_cull::ClusterInstanceData> =
        read_pods(&*device, &frame.opaque.0.clusters_srv().unwrap(), 8).unwrap();
    assert!(survivors
        .iter()
        .all(|r| r.cluster_pointer >= toward.cluster_pointer));
}

#[test]
fn clusters_split_by_material_class() {
    let (_soft, device) = common::device();
    let mut data = SceneData::default();
    let lod = common::push_mesh(&mut data, 3, ClusterCone::DISABLED);
    let spots = [Vec3::new(-1.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0)];
    for material in MaterialClass::ALL {
        common::place(&mut data, lod, material, &spots);
    }
    let buffers = SceneBuffers::upload(&device, &data).unwrap();
    let culler = FrustumCuller::new(&device, CullerConfig::new(8)).unwrap();
    let occlusion = OcclusionCuller::new(&device).unwrap();
    let expansion = IndexExpansion::new(&device).unwrap();

    let mut frame = Frame::new(&device, 64, 64);
    frame.record(
        &device,
        &culler,
        &occlusion,
        &expansion,
        &common::overhead(Vec3::ZERO, 4.0),
        &buffers.bindings(),
    );
    for line in [&frame.opaque.1, &frame.alpha_clipped.1, &frame.transparent.1, &frame.terrain.1] {
        assert_eq!(counter(&device, line.count()), 6, "{}", line.name());
    }
    // Only the opaque partition feeds the rest of this frame.
    assert_eq!(counter(&device, frame.draws.count()), 6);
}
