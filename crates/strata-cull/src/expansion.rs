//! Surviving instances to per-cluster records.

use std::sync::Arc;

use strata_core::{Bindings, BufferView, CommandList, ComputePipeline, Device};

use crate::error::CullError;
use crate::job::GpuSizedJob;
use crate::line::{require_records, ClusterDataLine};
use crate::program::{binding, CLUSTER_EXPAND, GROUP_SIZE};

/// Expands a [`FrustumCullingOutput`](crate::FrustumCullingOutput) list
/// into one [`ClusterInstanceData`](crate::ClusterInstanceData) per
/// cluster.
///
/// The instance pass already reserved every instance's cluster range in
/// the target line (`cluster_base`), so expansion only fills the records
/// and never touches the target's count.
#[derive(Debug)]
pub struct ClusterExpansion {
    job: GpuSizedJob,
}

impl ClusterExpansion {
    /// An expansion stage with its own argument record.
    pub fn new(device: &Arc<dyn Device>) -> Result<Self, CullError> {
        Ok(Self {
            job: GpuSizedJob::new(device, "cluster-expansion/args", GROUP_SIZE)?,
        })
    }

    /// Record the expansion of the first `instance_count[0]` entries of
    /// `instance_list` into `target`.
    pub fn expand_clusters(
        &self,
        cmd: &mut CommandList,
        instance_list: &BufferView,
        instance_count: &BufferView,
        target: &ClusterDataLine,
    ) -> Result<(), CullError> {
        let output = require_records(target)?;
        self.job.create_args(cmd, instance_count);
        let bindings = Bindings::new()
            .buffer(binding::INSTANCE_LIST, instance_list.clone())
            .buffer(binding::INSTANCE_COUNT, instance_count.clone())
            .buffer(binding::OUTPUT_CLUSTERS, output);
        self.job.dispatch(cmd, ComputePipeline::new(CLUSTER_EXPAND, bindings));
        Ok(())
    }
}
