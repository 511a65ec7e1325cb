//! Dispatches sized by a count that only the GPU knows.
//!
//! A [`GpuSizedJob`] owns one [`DispatchArgs`] record. Each frame it
//! records a one-thread pass that turns a GPU counter into group counts,
//! then the real pass dispatched indirectly from that record. The CPU
//! never learns how many elements the pass covered.

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use strata_core::{
    create_buffer, Bindings, Buffer, BufferDesc, BufferLayout, BufferUsage, BufferView,
    CommandList, ComputePipeline, Device, DeviceError, DispatchArgs,
};

use crate::program::{binding, CREATE_DISPATCH_ARGS};

/// Parameter block of the argument builder.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct CreateArgsParams {
    /// Threads per group of the pass being sized.
    pub group_size: u32,
    /// Counter element to read.
    pub count_offset: u32,
    _pad: [u32; 2],
}

/// Indirect dispatch arguments sized from a GPU count.
#[derive(Debug)]
pub struct GpuSizedJob {
    args: Buffer,
    group_size: u32,
}

impl GpuSizedJob {
    /// A job for a pass with `group_size` threads per group.
    pub fn new(device: &Arc<dyn Device>, name: &str, group_size: u32) -> Result<Self, DeviceError> {
        let args = create_buffer(
            device,
            BufferDesc::new(name, BufferLayout::of::<DispatchArgs>(), 1).usage(
                BufferUsage::GPU_READ_WRITE | BufferUsage::INDIRECT_ARGS | BufferUsage::COPY_SRC,
            ),
        )?;
        Ok(Self {
            args,
            group_size: group_size.max(1),
        })
    }

    /// Threads per group of the sized pass.
    pub fn group_size(&self) -> u32 {
        self.group_size
    }

    /// The argument record.
    pub fn args(&self) -> BufferView {
        self.args.raw()
    }

    /// Record the pass that writes `ceil(count[0] / group_size)` groups.
    pub fn create_args(&self, cmd: &mut CommandList, count: &BufferView) {
        let params = CreateArgsParams {
            group_size: self.group_size,
            ..CreateArgsParams::default()
        };
        let bindings = Bindings::new()
            .buffer(binding::COUNT, count.clone())
            .buffer(binding::ARGS, self.args.uav())
            .constants(binding::PARAMS, &params);
        cmd.dispatch(ComputePipeline::new(CREATE_DISPATCH_ARGS, bindings), 1, 1, 1);
    }

    /// Record `pipeline` dispatched from the argument record.
    pub fn dispatch(&self, cmd: &mut CommandList, pipeline: ComputePipeline) {
        cmd.dispatch_indirect(pipeline, &self.args.raw(), 0);
    }
}
