//! Shadow caster culling: partitions by material and per-caster change
//! tracking across frames.

mod common;

use std::sync::Arc;

use glam::{Mat4, Vec3};
use strata_core::Device;
use strata_cull::{
    ClusterCone, ClusterDataLine, ClusterInstanceData, ClusterPartitions, CullCamera, CullerConfig, DataLine,
    FrustumCuller, InstanceTransform, LinePair, MaterialClass, SceneBuffers, SceneData, ShadowOutputs,
    ShadowPartition, ShadowTracking,
};

use common::{counter, pair};

const CLUSTERS: u32 = 3;

/// Append lines of the three caster partitions and their draw aliases.
struct ShadowLines {
    opaque: (ClusterDataLine, ClusterDataLine),
    alpha_clipped: (ClusterDataLine, ClusterDataLine),
    terrain: (ClusterDataLine, ClusterDataLine),
}

impl ShadowLines {
    fn new(device: &Arc<dyn Device>) -> Self {
        Self {
            opaque: pair(device, "shadow-opaque", 64),
            alpha_clipped: pair(device, "shadow-alpha", 64),
            terrain: pair(device, "shadow-terrain", 64),
        }
    }

    fn outputs(&mut self) -> ShadowOutputs<'_> {
        ShadowOutputs {
            opaque: LinePair::new(&self.opaque.0, &mut self.opaque.1),
            alpha_clipped: LinePair::new(&self.alpha_clipped.0, &mut self.alpha_clipped.1),
            terrain: LinePair::new(&self.terrain.0, &mut self.terrain.1),
        }
    }

    fn reset(&self, device: &Arc<dyn Device>) {
        let mut cmd = device.create_command_list("shadow-reset");
        for (line, _) in [&self.opaque, &self.alpha_clipped, &self.terrain] {
            line.reset(&mut cmd);
        }
        common::run(device, cmd);
    }
}

struct Casters {
    buffers: SceneBuffers,
    culler: FrustumCuller,
    tracking: ShadowTracking,
    lines: ShadowLines,
}

impl Casters {
    /// Three opaque, two alpha-clipped, one terrain and one transparent
    /// instance, all under the light.
    fn new(device: &Arc<dyn Device>) -> Self {
        let mut data = SceneData::default();
        let lod = common::push_mesh(&mut data, CLUSTERS, ClusterCone::DISABLED);
        common::place(&mut data, lod, MaterialClass::Opaque, &common::row(3));
        common::place(&mut data, lod, MaterialClass::AlphaClipped, &[Vec3::Y * 2.0, Vec3::Y * 4.0]);
        common::place(&mut data, lod, MaterialClass::Terrain, &[Vec3::NEG_Y * 2.0]);
        common::place(&mut data, lod, MaterialClass::Transparent, &[Vec3::NEG_Y * 4.0]);
        Self {
            buffers: SceneBuffers::upload(device, &data).unwrap(),
            culler: FrustumCuller::new(device, CullerConfig::new(16)).unwrap(),
            tracking: ShadowTracking::new(device, 16).unwrap(),
            lines: ShadowLines::new(device),
        }
    }

    /// One shadow pass on fresh lines.
    fn frame(&mut self, device: &Arc<dyn Device>, light: &CullCamera, force: bool) -> (u32, u32) {
        self.lines.reset(device);
        self.pass(device, light, force)
    }

    /// One shadow pass appending to whatever the lines already hold.
    fn pass(&mut self, device: &Arc<dyn Device>, light: &CullCamera, force: bool) -> (u32, u32) {
        let mut cmd = device.create_command_list("shadow");
        self.culler
            .instance_shadow_cull(
                &mut cmd,
                light,
                &self.buffers.bindings(),
                self.lines.outputs(),
                &self.tracking,
                force,
            )
            .unwrap();
        common::run(device, cmd);
        (
            counter(device, self.tracking.change_count()),
            counter(device, self.tracking.match_count()),
        )
    }
}

fn light() -> CullCamera {
    common::overhead(Vec3::new(2.0, 0.0, 0.0), 8.0)
}

#[test]
fn casters_split_into_three_partitions() {
    let (_soft, device) = common::device();
    let mut casters = Casters::new(&device);
    casters.frame(&device, &light(), false);

    let culler = &casters.culler;
    assert_eq!(counter(&device, culler.instance_count(ShadowPartition::Opaque)), 3);
    assert_eq!(counter(&device, culler.instance_count(ShadowPartition::AlphaClipped)), 2);
    assert_eq!(counter(&device, culler.instance_count(ShadowPartition::Terrain)), 1);
    let lines = &casters.lines;
    assert_eq!(counter(&device, lines.opaque.0.count()), 3 * CLUSTERS);
    assert_eq!(counter(&device, lines.alpha_clipped.0.count()), 2 * CLUSTERS);
    assert_eq!(counter(&device, lines.terrain.0.count()), CLUSTERS);
    // A lone pass on reset lines: each draw alias covers the whole line.
    assert_eq!(counter(&device, lines.opaque.1.count()), 3 * CLUSTERS);
    assert_eq!(counter(&device, lines.terrain.1.index()), 0);
}

#[test]
fn partitions_expand_into_their_own_lines() {
    let (_soft, device) = common::device();
    let mut casters = Casters::new(&device);
    casters.frame(&device, &light(), false);

    let target = ClusterDataLine::new(&device, "alpha-clusters", 64).unwrap();
    let mut cmd = device.create_command_list("expand");
    casters
        .culler
        .expand_clusters_shadow(&mut cmd, ShadowPartition::AlphaClipped, &casters.lines.alpha_clipped.0)
        .unwrap();
    casters
        .culler
        .expand_clusters_shadow(&mut cmd, ShadowPartition::Terrain, &target)
        .unwrap();
    common::run(&device, cmd);

    let records: Vec<ClusterInstanceData> =
        strata_test_utils::read_pods(&*device, &casters.lines.alpha_clipped.0.clusters_srv().unwrap(), 6).unwrap();
    // Alpha-clipped instances are pointers 3 and 4.
    assert!(records.iter().all(|r| r.instance_pointer == 3 || r.instance_pointer == 4));
    let terrain: Vec<ClusterInstanceData> =
        strata_test_utils::read_pods(&*device, &target.clusters_srv().unwrap(), 3).unwrap();
    assert!(terrain.iter().all(|r| r.instance_pointer == 5));
}

#[test]
fn unchanged_casters_match_on_the_next_frame() {
    let (_soft, device) = common::device();
    let mut casters = Casters::new(&device);
    assert_eq!(casters.frame(&device, &light(), false), (6, 0));
    assert_eq!(casters.frame(&device, &light(), false), (0, 6));
}

#[test]
fn moving_one_caster_changes_only_that_caster() {
    let (_soft, device) = common::device();
    let mut casters = Casters::new(&device);
    casters.frame(&device, &light(), false);

    let moved = InstanceTransform::from(Mat4::from_translation(Vec3::new(0.5, 0.0, 0.0)));
    device
        .write_buffer(&casters.buffers.transforms(), 0, bytemuck::bytes_of(&moved))
        .unwrap();
    assert_eq!(casters.frame(&device, &light(), false), (1, 5));
}

#[test]
fn a_moving_light_changes_every_caster() {
    let (_soft, device) = common::device();
    let mut casters = Casters::new(&device);
    casters.frame(&device, &light(), false);
    let shifted = common::overhead(Vec3::new(2.5, 0.0, 0.0), 8.0);
    assert_eq!(casters.frame(&device, &shifted, false), (6, 0));
}

#[test]
fn forcing_reports_every_caster_as_changed() {
    let (_soft, device) = common::device();
    let mut casters = Casters::new(&device);
    casters.frame(&device, &light(), false);
    assert_eq!(casters.frame(&device, &light(), true), (6, 0));
    assert_eq!(casters.frame(&device, &light(), false), (0, 6));
}

#[test]
fn invalidating_the_hashes_restarts_tracking() {
    let (_soft, device) = common::device();
    let mut casters = Casters::new(&device);
    casters.frame(&device, &light(), false);
    let mut cmd = device.create_command_list("invalidate");
    casters.tracking.invalidate(&mut cmd);
    common::run(&device, cmd);
    assert_eq!(casters.frame(&device, &light(), false), (6, 0));
}

#[test]
fn undersized_tracking_is_rejected() {
    let (_soft, device) = common::device();
    let mut casters = Casters::new(&device);
    let small = ShadowTracking::new(&device, 2).unwrap();
    let mut cmd = device.create_command_list("shadow");
    let result = casters.culler.instance_shadow_cull(
        &mut cmd,
        &light(),
        &casters.buffers.bindings(),
        casters.lines.outputs(),
        &small,
        false,
    );
    assert!(matches!(result, Err(strata_cull::CullError::InvalidConfig { .. })));
}

/// Expand the opaque casters of the last pass and cluster-cull them for
/// `light`. Returns the opaque survivors.
fn cull_opaque_casters(device: &Arc<dyn Device>, casters: &Casters, light: &CullCamera) -> Vec<ClusterInstanceData> {
    let (opaque, mut opaque_draw) = pair(device, "casters-opaque", 64);
    let (alpha, mut alpha_draw) = pair(device, "casters-alpha", 64);
    let (transparent, mut transparent_draw) = pair(device, "casters-transparent", 64);
    let (terrain, mut terrain_draw) = pair(device, "casters-terrain", 64);

    let mut cmd = device.create_command_list("shadow-clusters");
    casters
        .culler
        .expand_clusters_shadow(&mut cmd, ShadowPartition::Opaque, &casters.lines.opaque.0)
        .unwrap();
    casters
        .culler
        .cluster_cull(
            &mut cmd,
            light,
            &casters.buffers.bindings(),
            &casters.lines.opaque.1,
            ClusterPartitions {
                opaque: LinePair::new(&opaque, &mut opaque_draw),
                alpha_clipped: LinePair::new(&alpha, &mut alpha_draw),
                transparent: LinePair::new(&transparent, &mut transparent_draw),
                terrain: LinePair::new(&terrain, &mut terrain_draw),
            },
            None,
        )
        .unwrap();
    common::run(device, cmd);

    let kept = counter(device, opaque_draw.count());
    strata_test_utils::read_pods(&**device, &opaque.clusters_srv().unwrap(), u64::from(kept)).unwrap()
}

#[test]
fn a_second_light_culls_only_its_own_casters() {
    let (_soft, device) = common::device();
    let mut casters = Casters::new(&device);

    casters.frame(&device, &light(), false);
    let first = cull_opaque_casters(&device, &casters, &light());
    assert_eq!(first.len(), 3 * CLUSTERS as usize);

    // Sees x in [-4.5, 0.5]: the first opaque caster only. Same lines,
    // no reset in between.
    let narrow = common::overhead(Vec3::new(-2.0, 0.0, 0.0), 2.5);
    casters.pass(&device, &narrow, false);
    let lines = &casters.lines;
    assert_eq!(counter(&device, lines.opaque.0.count()), 4 * CLUSTERS);
    assert_eq!(counter(&device, lines.opaque.1.index()), 3 * CLUSTERS);
    assert_eq!(counter(&device, lines.opaque.1.count()), CLUSTERS);

    let second = cull_opaque_casters(&device, &casters, &narrow);
    assert_eq!(second.len(), CLUSTERS as usize);
    assert!(second.iter().all(|r| r.instance_pointer == 0));
}

#[test]
fn casterless_passes_leave_an_empty_draw_range() {
    let (_soft, device) = common::device();
    let mut casters = Casters::new(&device);
    casters.frame(&device, &light(), false);

    let nowhere = common::overhead(Vec3::new(500.0, 0.0, 0.0), 2.0);
    assert_eq!(casters.pass(&device, &nowhere, false), (0, 0));
    let lines = &casters.lines;
    assert_eq!(counter(&device, lines.opaque.0.count()), 3 * CLUSTERS);
    assert_eq!(counter(&device, lines.opaque.1.count()), 0);
    assert_eq!(counter(&device, lines.alpha_clipped.1.count()), 0);
}
