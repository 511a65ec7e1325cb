//! Cluster occlusion against the depth pyramid.

use std::sync::Arc;

use strata_core::{Bindings, CommandList, ComputePipeline, Device, SamplerDesc};

use crate::camera::CullCamera;
use crate::error::CullError;
use crate::job::GpuSizedJob;
use crate::line::{require_records, ClusterDataLine, DataLine, LinePair};
use crate::program::{binding, GROUP_SIZE, OCCLUSION_CULL};
use crate::pyramid::DepthPyramid;
use crate::scene::SceneBindings;
use crate::tracking::ClusterTracking;

/// Partitions written by [`OcclusionCuller::occlusion_cull`].
///
/// Only opaque clusters are deferred for a second depth test. Hidden
/// alpha-clipped, transparent and terrain clusters are dropped and never
/// re-tested.
#[derive(Debug)]
pub struct OcclusionOutputs<'a> {
    /// Opaque clusters that passed the depth test.
    pub visible: LinePair<'a, ClusterDataLine>,
    /// Opaque clusters the current pyramid rejected, kept for a re-test
    /// against the pyramid rebuilt from this frame's depth.
    pub not_yet_tested: LinePair<'a, ClusterDataLine>,
    /// Alpha-clipped clusters that passed.
    pub alpha_clipped: LinePair<'a, ClusterDataLine>,
    /// Transparent clusters that passed.
    pub transparent: LinePair<'a, ClusterDataLine>,
    /// Terrain clusters that passed.
    pub terrain: LinePair<'a, ClusterDataLine>,
}

impl<'a> OcclusionOutputs<'a> {
    fn pairs(&mut self) -> [&mut LinePair<'a, ClusterDataLine>; 5] {
        [
            &mut self.visible,
            &mut self.not_yet_tested,
            &mut self.alpha_clipped,
            &mut self.transparent,
            &mut self.terrain,
        ]
    }
}

/// Tests clusters against the farthest depth already drawn over their
/// screen footprint.
///
/// A cluster is occluded only when its nearest depth lies beyond the
/// pyramid's farthest depth over every texel it covers. Clusters crossing
/// the near plane are always visible, and without a pyramid nothing is
/// occluded.
#[derive(Debug)]
pub struct OcclusionCuller {
    job: GpuSizedJob,
}

impl OcclusionCuller {
    /// An occlusion stage with its own argument record.
    pub fn new(device: &Arc<dyn Device>) -> Result<Self, CullError> {
        Ok(Self {
            job: GpuSizedJob::new(device, "occlusion/args", GROUP_SIZE)?,
        })
    }

    /// Record the occlusion pass over the records `input` describes.
    #[allow(clippy::too_many_arguments)]
    pub fn occlusion_cull(
        &self,
        cmd: &mut CommandList,
        camera: &CullCamera,
        scene: &SceneBindings,
        input: &ClusterDataLine,
        pyramid: Option<&DepthPyramid>,
        mut outputs: OcclusionOutputs<'_>,
        tracking: Option<&ClusterTracking>,
    ) -> Result<(), CullError> {
        if !scene.is_alive() {
            return Err(CullError::ReleasedResource {
                what: "scene bindings",
            });
        }
        let input_records = require_records(input)?;
        let (visible, visible_count) = outputs.visible.output()?;
        let (deferred, deferred_count) = outputs.not_yet_tested.output()?;
        let (alpha_clipped, alpha_clipped_count) = outputs.alpha_clipped.output()?;
        let (transparent, transparent_count) = outputs.transparent.output()?;
        let (terrain, terrain_count) = outputs.terrain.output()?;

        self.job.create_args(cmd, &input.count().srv());
        for pair in outputs.pairs() {
            pair.begin(cmd);
        }

        let mut constants = camera
            .constants()
            .with_depth(pyramid)
            .with_instance_count(scene.instance_count);
        constants.tracking = u32::from(tracking.is_some());
        let mut bindings = scene
            .apply(Bindings::new())
            .constants(binding::CONSTANTS, &constants)
            .buffer(binding::INPUT_CLUSTERS, input_records)
            .buffer(binding::INPUT_COUNT, input.count().srv())
            .buffer(binding::INPUT_INDEX, input.index().srv())
            .buffer(binding::OUTPUT_CLUSTERS, visible)
            .buffer(binding::OUTPUT_COUNT, visible_count)
            .buffer(binding::NOT_YET_TESTED_CLUSTERS, deferred)
            .buffer(binding::NOT_YET_TESTED_COUNT, deferred_count)
            .buffer(binding::ALPHA_CLIPPED_CLUSTERS, alpha_clipped)
            .buffer(binding::ALPHA_CLIPPED_COUNT, alpha_clipped_count)
            .buffer(binding::TRANSPARENT_CLUSTERS, transparent)
            .buffer(binding::TRANSPARENT_COUNT, transparent_count)
            .buffer(binding::TERRAIN_CLUSTERS, terrain)
            .buffer(binding::TERRAIN_COUNT, terrain_count);
        if let Some(pyramid) = pyramid {
            bindings = bindings
                .texture(binding::DEPTH_PYRAMID, pyramid.srv())
                .sampler(binding::DEPTH_SAMPLER, SamplerDesc::POINT_CLAMP);
        }
        if let Some(tracking) = tracking {
            tracking.changed().clear(cmd);
            bindings = bindings
                .buffer(binding::TRACKING_INSTANCE_SLOTS, tracking.instance_slots())
                .buffer(binding::TRACKING_HASHES, tracking.hashes())
                .buffer(binding::TRACKING_CHANGED, tracking.changed().uav());
        }
        self.job.dispatch(cmd, ComputePipeline::new(OCCLUSION_CULL, bindings));

        for pair in outputs.pairs() {
            pair.end(cmd);
        }
        Ok(())
    }
}
