//! Surviving clusters to index ranges and indirect draws.

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use strata_core::{Bindings, CommandList, ComputePipeline, Device};

use crate::buffer_math::BufferMath;
use crate::error::CullError;
use crate::job::GpuSizedJob;
use crate::line::{begin_delta, end_delta, require_records, ClusterDataLine, DataLine, DrawDataLine, IndexDataLine};
use crate::program::{binding, GROUP_SIZE, INDEX_EXPAND};
use crate::scene::SceneBindings;

/// Parameter block of the index expansion program.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct IndexExpandParams {
    /// Largest index count one cluster may contribute.
    pub cluster_size: u32,
    _pad: [u32; 3],
}

impl IndexExpandParams {
    /// Parameters for clusters of up to `cluster_size` indexes.
    pub fn new(cluster_size: u32) -> Self {
        Self {
            cluster_size,
            _pad: [0; 3],
        }
    }
}

/// Copies the indexes of every surviving cluster into an index line and
/// emits one indirect draw per cluster.
///
/// Each draw's `first_instance` is the cluster's slot in the input line,
/// which lets a vertex program find its [`ClusterInstanceData`](crate::ClusterInstanceData).
#[derive(Debug)]
pub struct IndexExpansion {
    job: GpuSizedJob,
}

impl IndexExpansion {
    /// An expansion stage with its own argument record.
    pub fn new(device: &Arc<dyn Device>) -> Result<Self, CullError> {
        Ok(Self {
            job: GpuSizedJob::new(device, "index-expansion/args", GROUP_SIZE)?,
        })
    }

    /// Record the expansion of the clusters `input` describes.
    ///
    /// Afterwards `index_draw` describes the indexes appended by this pass,
    /// `draw_output` holds one argument record per cluster that fit, and
    /// `index_append.index` has advanced to the new end of the line.
    #[allow(clippy::too_many_arguments)]
    pub fn expand_indexes(
        &self,
        cmd: &mut CommandList,
        scene: &SceneBindings,
        input: &ClusterDataLine,
        index_append: &IndexDataLine,
        index_draw: &mut IndexDataLine,
        draw_output: &DrawDataLine,
        cluster_size: u32,
    ) -> Result<(), CullError> {
        let input_records = require_records(input)?;
        let output_indexes = require_records(index_append)?;
        let draw_args = draw_output.args().ok_or_else(|| CullError::MissingStorage {
            line: "draw arguments".to_string(),
        })?;

        self.job.create_args(cmd, &input.count().srv());
        begin_delta(cmd, index_append, index_draw);
        draw_output.reset(cmd);

        let params = IndexExpandParams::new(cluster_size);
        let bindings = Bindings::new()
            .constants(binding::PARAMS, &params)
            .buffer(binding::CLUSTER_BINDING, scene.cluster_binding.clone())
            .buffer(binding::INDEX_DATA, scene.index_data.clone())
            .buffer(binding::INPUT_CLUSTERS, input_records)
            .buffer(binding::INPUT_COUNT, input.count().srv())
            .buffer(binding::INPUT_INDEX, input.index().srv())
            .buffer(binding::OUTPUT_INDEXES, output_indexes)
            .buffer(binding::OUTPUT_INDEX_COUNT, index_append.count().uav())
            .buffer(binding::DRAW_ARGS, draw_args)
            .buffer(binding::DRAW_COUNT, draw_output.count().uav());
        self.job.dispatch(cmd, ComputePipeline::new(INDEX_EXPAND, bindings));

        end_delta(cmd, index_append, index_draw);
        BufferMath::copy_count(cmd, &index_append.count().raw(), &index_append.index().raw());
        Ok(())
    }
}
