//! CPU reference implementations of every culling program.
//!
//! Each program is a [`FnKernel`] run one thread at a time by a software
//! device. They define what the programs compute; a GPU backend is
//! expected to match their results, not their structure.
//!
//! ```ignore
//! for (program, kernel) in strata_cull::reference::kernels() {
//!     soft_device.register_kernel(program, kernel);
//! }
//! ```

mod cluster;
mod depth;
mod instance;
mod tools;

use std::sync::Arc;

use bytemuck::Pod;
use strata_core::{ComputeKernel, DispatchThread, FnKernel, KernelError, ProgramId, ThreadContext};

use crate::program::{self, binding, GROUP_SIZE};
use crate::record::ClusterInstanceData;

/// Every program paired with its reference kernel.
pub fn kernels() -> Vec<(ProgramId, Arc<dyn ComputeKernel>)> {
    let table: [(ProgramId, FnKernel); 10] = [
        (program::INSTANCE_CULL, FnKernel::new(GROUP_SIZE, instance::instance_cull)),
        (program::INSTANCE_CULL_NO_DEPTH, FnKernel::new(GROUP_SIZE, instance::instance_cull)),
        (program::INSTANCE_SHADOW_CULL, FnKernel::new(GROUP_SIZE, instance::instance_shadow_cull)),
        (program::CLUSTER_EXPAND, FnKernel::new(GROUP_SIZE, instance::expand_clusters)),
        (program::CLUSTER_CULL, FnKernel::new(GROUP_SIZE, cluster::cluster_cull)),
        (program::OCCLUSION_CULL, FnKernel::new(GROUP_SIZE, cluster::occlusion_cull)),
        (program::INDEX_EXPAND, FnKernel::new(GROUP_SIZE, cluster::expand_indexes)),
        (program::CREATE_DISPATCH_ARGS, FnKernel::new(1, tools::create_dispatch_args)),
        (program::MATH_OPERATION, FnKernel::new(GROUP_SIZE, tools::math_operation)),
        (program::MATH_OPERATION_CONSTANT, FnKernel::new(GROUP_SIZE, tools::math_operation_constant)),
    ];
    table
        .into_iter()
        .map(|(program, kernel)| (program, Arc::new(kernel) as Arc<dyn ComputeKernel>))
        .collect()
}

// ── Shared helpers ──────────────────────────────────────────────

fn load<T: Pod>(ctx: &dyn ThreadContext, binding: &str, index: u64) -> Result<T, KernelError> {
    ctx.load(binding, index)
}

/// The input record this thread handles: slot `index[0] + global` when
/// `global < count[0]` and the slot exists.
fn input_record(
    ctx: &dyn ThreadContext,
    thread: DispatchThread,
) -> Result<Option<(u64, ClusterInstanceData)>, KernelError> {
    let count: u32 = load(ctx, binding::INPUT_COUNT, 0)?;
    if thread.global >= count {
        return Ok(None);
    }
    let first: u32 = load(ctx, binding::INPUT_INDEX, 0)?;
    let slot = u64::from(first) + u64::from(thread.global);
    if slot >= ctx.element_count(binding::INPUT_CLUSTERS)? {
        return Ok(None);
    }
    Ok(Some((slot, load(ctx, binding::INPUT_CLUSTERS, slot)?)))
}

/// Reserve a slot through `count` and store `record` there if it fits.
fn append<T: Pod>(ctx: &mut dyn ThreadContext, records: &str, count: &str, record: &T) -> Result<(), KernelError> {
    let slot = u64::from(ctx.atomic_add(count, 0, 1)?);
    if slot < ctx.element_count(records)? {
        ctx.store(records, slot, record)?;
    }
    Ok(())
}
