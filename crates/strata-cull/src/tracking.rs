//! Change tracking buffers for incremental passes.
//!
//! Shadow maps and other cached views only need redrawing where something
//! changed. The culling programs fold each visible instance (or cluster)
//! into an FNV-1a hash, compare it with the hash from the previous frame
//! and count the differences, all on the GPU.

use std::sync::Arc;

use strata_core::{create_buffer, Buffer, BufferDesc, BufferLayout, BufferView, CommandList, Device, Format};

use crate::count::CountBuffer;
use crate::error::CullError;

fn hash_buffer(device: &Arc<dyn Device>, name: &str, elements: u64) -> Result<Buffer, CullError> {
    Ok(create_buffer(
        device,
        BufferDesc::new(name, BufferLayout::Format(Format::R32Uint), elements.max(1)),
    )?)
}

/// Per-instance hashes and change counters of a shadow caster pass.
#[derive(Debug)]
pub struct ShadowTracking {
    hashes: Buffer,
    change_count: CountBuffer,
    match_count: CountBuffer,
}

impl ShadowTracking {
    /// Tracking for up to `instances` instances.
    pub fn new(device: &Arc<dyn Device>, instances: u64) -> Result<Self, CullError> {
        Ok(Self {
            hashes: hash_buffer(device, "shadow-tracking/hashes", instances)?,
            change_count: CountBuffer::new(device, "shadow-tracking/changes", 1)?,
            match_count: CountBuffer::new(device, "shadow-tracking/matches", 1)?,
        })
    }

    /// Instances the hash buffer covers.
    pub fn capacity(&self) -> u64 {
        self.hashes.element_count()
    }

    /// Hash of each instance from its last visible frame.
    pub fn hashes(&self) -> BufferView {
        self.hashes.uav()
    }

    /// Visible casters whose hash changed (or all of them when forced).
    pub fn change_count(&self) -> &CountBuffer {
        &self.change_count
    }

    /// Visible casters whose hash matched.
    pub fn match_count(&self) -> &CountBuffer {
        &self.match_count
    }

    /// Record a reset of both counters. Hashes persist.
    pub fn reset_counts(&self, cmd: &mut CommandList) {
        self.change_count.clear(cmd);
        self.match_count.clear(cmd);
    }

    /// Record a reset of every hash, so the next pass reports every visible
    /// caster as changed unless its hash happens to be zero.
    pub fn invalidate(&self, cmd: &mut CommandList) {
        cmd.clear_buffer(&self.hashes.uav(), 0);
    }
}

/// Per-cluster visibility hashes.
///
/// Clusters are addressed through `instance_slots`: the tracking slot of
/// cluster `c` of instance `i` is
/// `instance_slots[i] + (c - instance_lod[i].cluster_pointer)`.
#[derive(Debug)]
pub struct ClusterTracking {
    instance_slots: Buffer,
    hashes: Buffer,
    changed: CountBuffer,
}

impl ClusterTracking {
    /// Tracking for `instances` instances and `clusters` tracked clusters.
    pub fn new(device: &Arc<dyn Device>, instances: u64, clusters: u64) -> Result<Self, CullError> {
        Ok(Self {
            instance_slots: hash_buffer(device, "cluster-tracking/instance-slots", instances)?,
            hashes: hash_buffer(device, "cluster-tracking/hashes", clusters)?,
            changed: CountBuffer::new(device, "cluster-tracking/changed", 1)?,
        })
    }

    /// First tracking slot of each instance. Fill before culling.
    pub fn instance_slots(&self) -> BufferView {
        self.instance_slots.uav()
    }

    /// Hash of each tracked cluster.
    pub fn hashes(&self) -> BufferView {
        self.hashes.uav()
    }

    /// Clusters whose hash changed in the last pass.
    pub fn changed(&self) -> &CountBuffer {
        &self.changed
    }
}
