//! Instance and cluster frustum culling.
//!
//! The instance pass tests every instance's world box against the camera
//! planes (and, with a pyramid, against earlier depth). Each survivor
//! reserves its whole cluster range in the target line's append counter
//! and lands in an instance list; [`FrustumCuller::expand_clusters`] then
//! fills those ranges. The cluster pass re-tests each cluster on its own
//! and splits the survivors by material class.

use std::sync::Arc;

use strata_core::{
    create_buffer, Bindings, Buffer, BufferDesc, BufferLayout, BufferView, CommandList,
    ComputePipeline, Device, SamplerDesc,
};

use crate::camera::{CullCamera, CullConstants};
use crate::config::CullerConfig;
use crate::count::CountBuffer;
use crate::error::CullError;
use crate::expansion::ClusterExpansion;
use crate::job::GpuSizedJob;
use crate::line::{require_records, ClusterDataLine, DataLine, LinePair};
use crate::program::{
    binding, CLUSTER_CULL, GROUP_SIZE, INSTANCE_CULL, INSTANCE_CULL_NO_DEPTH, INSTANCE_SHADOW_CULL,
};
use crate::pyramid::DepthPyramid;
use crate::record::FrustumCullingOutput;
use crate::scene::SceneBindings;
use crate::tracking::{ClusterTracking, ShadowTracking};

// ── Instance lists ──────────────────────────────────────────────

#[derive(Debug)]
struct InstanceList {
    output: Buffer,
    count: CountBuffer,
}

impl InstanceList {
    fn new(device: &Arc<dyn Device>, name: &str, capacity: u32) -> Result<Self, CullError> {
        Ok(Self {
            output: create_buffer(
                device,
                BufferDesc::new(
                    format!("{name}/instances"),
                    BufferLayout::of::<FrustumCullingOutput>(),
                    u64::from(capacity),
                ),
            )?,
            count: CountBuffer::new(device, &format!("{name}/instance-count"), 1)?,
        })
    }
}

/// Caster partitions of a shadow pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShadowPartition {
    /// Opaque casters.
    Opaque,
    /// Alpha-clipped casters.
    AlphaClipped,
    /// Terrain casters.
    Terrain,
}

impl ShadowPartition {
    /// Every partition.
    pub const ALL: [Self; 3] = [Self::Opaque, Self::AlphaClipped, Self::Terrain];

    fn index(self) -> usize {
        match self {
            Self::Opaque => 0,
            Self::AlphaClipped => 1,
            Self::Terrain => 2,
        }
    }
}

/// Lines receiving the cluster reservations of a shadow pass.
///
/// Each draw line ends up describing only the range this pass reserved,
/// so several lights or cascades can share the append lines of a frame.
#[derive(Debug)]
pub struct ShadowOutputs<'a> {
    /// Opaque casters.
    pub opaque: LinePair<'a, ClusterDataLine>,
    /// Alpha-clipped casters.
    pub alpha_clipped: LinePair<'a, ClusterDataLine>,
    /// Terrain casters.
    pub terrain: LinePair<'a, ClusterDataLine>,
}

impl ShadowOutputs<'_> {
    fn begin(&mut self, cmd: &mut CommandList) {
        self.opaque.begin(cmd);
        self.alpha_clipped.begin(cmd);
        self.terrain.begin(cmd);
    }

    fn end(&self, cmd: &mut CommandList) {
        self.opaque.end(cmd);
        self.alpha_clipped.end(cmd);
        self.terrain.end(cmd);
    }
}

/// Material partitions of a cluster pass.
#[derive(Debug)]
pub struct ClusterPartitions<'a> {
    /// Opaque clusters.
    pub opaque: LinePair<'a, ClusterDataLine>,
    /// Alpha-clipped clusters.
    pub alpha_clipped: LinePair<'a, ClusterDataLine>,
    /// Transparent clusters.
    pub transparent: LinePair<'a, ClusterDataLine>,
    /// Terrain clusters.
    pub terrain: LinePair<'a, ClusterDataLine>,
}

impl ClusterPartitions<'_> {
    fn begin(&mut self, cmd: &mut CommandList) {
        self.opaque.begin(cmd);
        self.alpha_clipped.begin(cmd);
        self.transparent.begin(cmd);
        self.terrain.begin(cmd);
    }

    fn end(&self, cmd: &mut CommandList) {
        self.opaque.end(cmd);
        self.alpha_clipped.end(cmd);
        self.transparent.end(cmd);
        self.terrain.end(cmd);
    }
}

// ── Culler ──────────────────────────────────────────────────────

/// Frustum culling at instance and cluster granularity.
#[derive(Debug)]
pub struct FrustumCuller {
    config: CullerConfig,
    instance_lists: [InstanceList; 3],
    expansion: ClusterExpansion,
    cluster_job: GpuSizedJob,
}

impl FrustumCuller {
    /// A culler for scenes of up to `config.max_instances` instances.
    pub fn new(device: &Arc<dyn Device>, config: CullerConfig) -> Result<Self, CullError> {
        config.validate()?;
        let instance_lists = [
            InstanceList::new(device, "frustum/opaque", config.max_instances)?,
            InstanceList::new(device, "frustum/alpha-clipped", config.max_instances)?,
            InstanceList::new(device, "frustum/terrain", config.max_instances)?,
        ];
        log::debug!(
            "frustum culler for {} instances, cluster size {}",
            config.max_instances,
            config.cluster_size
        );
        Ok(Self {
            config,
            instance_lists,
            expansion: ClusterExpansion::new(device)?,
            cluster_job: GpuSizedJob::new(device, "frustum/cluster-args", GROUP_SIZE)?,
        })
    }

    /// The configuration the culler was built with.
    pub fn config(&self) -> &CullerConfig {
        &self.config
    }

    /// Surviving instances of `partition`'s last pass.
    pub fn instance_list(&self, partition: ShadowPartition) -> BufferView {
        self.instance_lists[partition.index()].output.srv()
    }

    /// Survivor count of `partition`'s last pass.
    pub fn instance_count(&self, partition: ShadowPartition) -> &CountBuffer {
        &self.instance_lists[partition.index()].count
    }

    fn check_scene(&self, scene: &SceneBindings) -> Result<(), CullError> {
        if scene.instance_count > self.config.max_instances {
            return Err(CullError::TooManyInstances {
                count: scene.instance_count,
                max: self.config.max_instances,
            });
        }
        if !scene.is_alive() {
            return Err(CullError::ReleasedResource {
                what: "scene bindings",
            });
        }
        Ok(())
    }

    fn constants(&self, camera: &CullCamera, scene: &SceneBindings, pyramid: Option<&DepthPyramid>) -> CullConstants {
        camera
            .constants()
            .with_depth(pyramid)
            .with_instance_count(scene.instance_count)
            .with_cluster_size(self.config.cluster_size)
    }

    /// Record instance culling with early occlusion against `pyramid`.
    ///
    /// `output.draw` ends up describing the cluster range reserved by this
    /// pass; the records are filled by [`expand_clusters`](Self::expand_clusters).
    pub fn instance_cull(
        &self,
        cmd: &mut CommandList,
        camera: &CullCamera,
        scene: &SceneBindings,
        pyramid: Option<&DepthPyramid>,
        output: LinePair<'_, ClusterDataLine>,
    ) -> Result<(), CullError> {
        self.record_instance_cull(cmd, camera, scene, pyramid, output)
    }

    /// Record instance culling without depth.
    pub fn instance_cull_no_depth(
        &self,
        cmd: &mut CommandList,
        camera: &CullCamera,
        scene: &SceneBindings,
        output: LinePair<'_, ClusterDataLine>,
    ) -> Result<(), CullError> {
        self.record_instance_cull(cmd, camera, scene, None, output)
    }

    fn record_instance_cull(
        &self,
        cmd: &mut CommandList,
        camera: &CullCamera,
        scene: &SceneBindings,
        pyramid: Option<&DepthPyramid>,
        mut output: LinePair<'_, ClusterDataLine>,
    ) -> Result<(), CullError> {
        self.check_scene(scene)?;
        let list = &self.instance_lists[0];
        output.begin(cmd);
        list.count.clear(cmd);

        if scene.instance_count > 0 {
            let constants = self.constants(camera, scene, pyramid);
            let mut bindings = scene
                .apply(Bindings::new())
                .constants(binding::CONSTANTS, &constants)
                .buffer(binding::INSTANCE_LIST, list.output.uav())
                .buffer(binding::INSTANCE_COUNT, list.count.uav())
                .buffer(binding::OUTPUT_COUNT, output.append.count().uav());
            let program = match pyramid {
                Some(pyramid) => {
                    bindings = bindings
                        .texture(binding::DEPTH_PYRAMID, pyramid.srv())
                        .sampler(binding::DEPTH_SAMPLER, SamplerDesc::POINT_CLAMP);
                    INSTANCE_CULL
                }
                None => INSTANCE_CULL_NO_DEPTH,
            };
            cmd.dispatch(
                ComputePipeline::new(program, bindings),
                scene.instance_count.div_ceil(GROUP_SIZE),
                1,
                1,
            );
        }

        output.end(cmd);
        Ok(())
    }

    /// Record the shadow caster pass for `light`.
    ///
    /// Casters are split into three instance lists and reserve their
    /// clusters in the matching append line of `outputs`, whose draw line
    /// then describes this pass only. Transparent instances never cast.
    /// Every visible caster's hash of the light and its
    /// transform is compared with `tracking`: differences (or every caster
    /// when `force` is set) count as changes, the rest as matches.
    pub fn instance_shadow_cull(
        &self,
        cmd: &mut CommandList,
        light: &CullCamera,
        scene: &SceneBindings,
        mut outputs: ShadowOutputs<'_>,
        tracking: &ShadowTracking,
        force: bool,
    ) -> Result<(), CullError> {
        self.check_scene(scene)?;
        if tracking.capacity() < u64::from(scene.instance_count) {
            return Err(CullError::InvalidConfig {
                reason: format!(
                    "shadow tracking covers {} instances, scene has {}",
                    tracking.capacity(),
                    scene.instance_count
                ),
            });
        }
        for list in &self.instance_lists {
            list.count.clear(cmd);
        }
        tracking.reset_counts(cmd);
        outputs.begin(cmd);
        if scene.instance_count == 0 {
            outputs.end(cmd);
            return Ok(());
        }

        let mut constants = self.constants(light, scene, None);
        constants.force = u32::from(force);
        let [opaque, alpha_clipped, terrain] = &self.instance_lists;
        let bindings = scene
            .apply(Bindings::new())
            .constants(binding::CONSTANTS, &constants)
            .buffer(binding::INSTANCE_LIST, opaque.output.uav())
            .buffer(binding::INSTANCE_COUNT, opaque.count.uav())
            .buffer(binding::INSTANCE_LIST_ALPHA_CLIPPED, alpha_clipped.output.uav())
            .buffer(binding::INSTANCE_COUNT_ALPHA_CLIPPED, alpha_clipped.count.uav())
            .buffer(binding::INSTANCE_LIST_TERRAIN, terrain.output.uav())
            .buffer(binding::INSTANCE_COUNT_TERRAIN, terrain.count.uav())
            .buffer(binding::OUTPUT_COUNT, outputs.opaque.append.count().uav())
            .buffer(
                binding::SHADOW_CLUSTER_COUNT_ALPHA_CLIPPED,
                outputs.alpha_clipped.append.count().uav(),
            )
            .buffer(
                binding::SHADOW_CLUSTER_COUNT_TERRAIN,
                outputs.terrain.append.count().uav(),
            )
            .buffer(binding::SHADOW_HASHES, tracking.hashes())
            .buffer(binding::CHANGE_COUNT, tracking.change_count().uav())
            .buffer(binding::MATCH_COUNT, tracking.match_count().uav());
        cmd.dispatch(
            ComputePipeline::new(INSTANCE_SHADOW_CULL, bindings),
            scene.instance_count.div_ceil(GROUP_SIZE),
            1,
            1,
        );
        outputs.end(cmd);
        Ok(())
    }

    /// Record the cluster expansion of the last camera pass into `target`.
    pub fn expand_clusters(&self, cmd: &mut CommandList, target: &ClusterDataLine) -> Result<(), CullError> {
        self.expand_clusters_shadow(cmd, ShadowPartition::Opaque, target)
    }

    /// Record the cluster expansion of one shadow partition into `target`.
    pub fn expand_clusters_shadow(
        &self,
        cmd: &mut CommandList,
        partition: ShadowPartition,
        target: &ClusterDataLine,
    ) -> Result<(), CullError> {
        let list = &self.instance_lists[partition.index()];
        self.expansion
            .expand_clusters(cmd, &list.output.srv(), &list.count.srv(), target)
    }

    /// Record the cluster pass over the records `input` describes.
    ///
    /// Each cluster is tested against the planes and, when its cone is
    /// enabled, rejected if it faces away from the camera. Survivors go to
    /// the partition of their instance's material. With `tracking`, every
    /// tested cluster's visibility hash is refreshed and changes counted.
    pub fn cluster_cull(
        &self,
        cmd: &mut CommandList,
        camera: &CullCamera,
        scene: &SceneBindings,
        input: &ClusterDataLine,
        mut outputs: ClusterPartitions<'_>,
        tracking: Option<&ClusterTracking>,
    ) -> Result<(), CullError> {
        self.check_scene(scene)?;
        let input_records = require_records(input)?;
        let (opaque, opaque_count) = outputs.opaque.output()?;
        let (alpha_clipped, alpha_clipped_count) = outputs.alpha_clipped.output()?;
        let (transparent, transparent_count) = outputs.transparent.output()?;
        let (terrain, terrain_count) = outputs.terrain.output()?;

        self.cluster_job.create_args(cmd, &input.count().srv());
        outputs.begin(cmd);

        let mut constants = self.constants(camera, scene, None);
        constants.tracking = u32::from(tracking.is_some());
        let mut bindings = scene
            .apply(Bindings::new())
            .constants(binding::CONSTANTS, &constants)
            .buffer(binding::INPUT_CLUSTERS, input_records)
            .buffer(binding::INPUT_COUNT, input.count().srv())
            .buffer(binding::INPUT_INDEX, input.index().srv())
            .buffer(binding::OUTPUT_CLUSTERS, opaque)
            .buffer(binding::OUTPUT_COUNT, opaque_count)
            .buffer(binding::ALPHA_CLIPPED_CLUSTERS, alpha_clipped)
            .buffer(binding::ALPHA_CLIPPED_COUNT, alpha_clipped_count)
            .buffer(binding::TRANSPARENT_CLUSTERS, transparent)
            .buffer(binding::TRANSPARENT_COUNT, transparent_count)
            .buffer(binding::TERRAIN_CLUSTERS, terrain)
            .buffer(binding::TERRAIN_COUNT, terrain_count);
        if let Some(tracking) = tracking {
            tracking.changed().clear(cmd);
            bindings = bindings
                .buffer(binding::TRACKING_INSTANCE_SLOTS, tracking.instance_slots())
                .buffer(binding::TRACKING_HASHES, tracking.hashes())
                .buffer(binding::TRACKING_CHANGED, tracking.changed().uav());
        }
        self.cluster_job
            .dispatch(cmd, ComputePipeline::new(CLUSTER_CULL, bindings));

        outputs.end(cmd);
        Ok(())
    }
}

const _: () = {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<FrustumCuller>();
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{BoundingBox, InstanceLod, InstanceTransform, MaterialClass};
    use crate::scene::{SceneBuffers, SceneData};
    use strata_core::Command;
    use strata_test_utils::SoftDevice;

    #[test]
    fn construction_validates_the_config() {
        let soft = SoftDevice::new();
        let device = soft.as_device();
        assert!(matches!(
            FrustumCuller::new(&device, CullerConfig::new(0)),
            Err(CullError::InvalidConfig { .. })
        ));
        let culler = FrustumCuller::new(&device, CullerConfig::new(128)).unwrap();
        assert_eq!(culler.config().max_instances, 128);
    }

    #[test]
    fn empty_scenes_record_no_dispatch() {
        let soft = SoftDevice::new();
        let device = soft.as_device();
        let culler = FrustumCuller::new(&device, CullerConfig::new(16)).unwrap();
        let buffers = scene(&device, 0);
        let scene = buffers.bindings();
        let append = ClusterDataLine::new(&device, "append", 8).unwrap();
        let mut draw = ClusterDataLine::new(&device, "draw", 0).unwrap();
        let camera = CullCamera::look_at(
            glam::Vec3::Z,
            glam::Vec3::ZERO,
            glam::Vec3::Y,
            1.0,
            1.0,
            0.1,
            10.0,
        );

        let mut cmd = device.create_command_list("cull");
        culler
            .instance_cull_no_depth(&mut cmd, &camera, &scene, LinePair::new(&append, &mut draw))
            .unwrap();
        assert!(!cmd
            .commands()
            .iter()
            .any(|c| matches!(c, Command::Dispatch { pipeline, .. } if pipeline.program() == INSTANCE_CULL_NO_DEPTH)));
        // The delta is still computed so the draw line reads zero.
        assert!(cmd
            .commands()
            .iter()
            .any(|c| matches!(c, Command::Dispatch { pipeline, .. } if pipeline.program() == crate::program::MATH_OPERATION)));
    }

    #[test]
    fn oversized_scenes_are_rejected() {
        let soft = SoftDevice::new();
        let device = soft.as_device();
        let culler = FrustumCuller::new(&device, CullerConfig::new(4)).unwrap();
        let buffers = scene(&device, 5);
        let scene = buffers.bindings();
        let append = ClusterDataLine::new(&device, "append", 8).unwrap();
        let mut draw = ClusterDataLine::new(&device, "draw", 0).unwrap();
        let camera = CullCamera::new(glam::Mat4::IDENTITY, glam::Mat4::IDENTITY, 0.1, 10.0);
        let mut cmd = device.create_command_list("cull");
        assert_eq!(
            culler.instance_cull_no_depth(&mut cmd, &camera, &scene, LinePair::new(&append, &mut draw)),
            Err(CullError::TooManyInstances { count: 5, max: 4 })
        );
        assert!(cmd.is_empty());
    }

    fn scene(device: &Arc<dyn Device>, instances: u32) -> SceneBuffers {
        let mut data = SceneData::default();
        for _ in 0..instances {
            data.push_instance(
                BoundingBox::default(),
                InstanceTransform::IDENTITY,
                InstanceLod::default(),
                MaterialClass::Opaque,
            );
        }
        SceneBuffers::upload(device, &data).unwrap()
    }
}
