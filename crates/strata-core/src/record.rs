//! Fixed-layout records read by indirect commands.

use bytemuck::{Pod, Zeroable};

/// Workgroup counts consumed by
/// [`CommandList::dispatch_indirect`](crate::CommandList::dispatch_indirect).
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct DispatchArgs {
    /// Groups on x.
    pub x: u32,
    /// Groups on y.
    pub y: u32,
    /// Groups on z.
    pub z: u32,
}

impl DispatchArgs {
    /// Enough groups of `group_size` threads to cover `threads` threads.
    ///
    /// Zero threads yields zero groups, which devices treat as a no-op.
    pub fn for_threads(threads: u32, group_size: u32) -> Self {
        Self {
            x: threads.div_ceil(group_size.max(1)),
            y: 1,
            z: 1,
        }
    }

    /// Total number of workgroups.
    pub fn group_count(&self) -> u64 {
        u64::from(self.x) * u64::from(self.y) * u64::from(self.z)
    }
}

/// Arguments of one indexed, instanced draw.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct DrawIndexedIndirectArgs {
    /// Indexes per instance.
    pub index_count: u32,
    /// Number of instances.
    pub instance_count: u32,
    /// First index in the bound index buffer.
    pub first_index: u32,
    /// Value added to every index before vertex fetch.
    pub base_vertex: i32,
    /// First instance id.
    pub first_instance: u32,
}
