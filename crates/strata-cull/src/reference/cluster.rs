use strata_core::math::cone_backfacing;
use strata_core::{Aabb, DispatchThread, DrawIndexedIndirectArgs, Frustum, KernelError, ThreadContext};

use super::depth::occluded;
use super::{append, input_record, load};
use crate::camera::{fnv1a, CullConstants};
use crate::index::IndexExpandParams;
use crate::program::binding;
use crate::record::{
    BoundingBox, ClusterBinding, ClusterCone, ClusterInstanceData, InstanceLod, InstanceTransform, MaterialClass,
};

/// A cluster record with everything the tests need.
struct Cluster {
    record: ClusterInstanceData,
    transform: InstanceTransform,
    world: Aabb,
    material: MaterialClass,
}

fn fetch(ctx: &dyn ThreadContext, record: ClusterInstanceData) -> Result<Cluster, KernelError> {
    let instance = u64::from(record.instance_pointer);
    let transform: InstanceTransform = load(ctx, binding::INSTANCE_TRANSFORM, instance)?;
    let bounds: BoundingBox = load(ctx, binding::CLUSTER_BOUNDS, u64::from(record.cluster_pointer))?;
    let material: u32 = load(ctx, binding::INSTANCE_MATERIAL, instance)?;
    Ok(Cluster {
        record,
        transform,
        world: bounds.to_aabb().transformed(&transform.to_mat4()),
        material: MaterialClass::from_raw(material),
    })
}

fn partition(material: MaterialClass) -> (&'static str, &'static str) {
    match material {
        MaterialClass::Opaque => (binding::OUTPUT_CLUSTERS, binding::OUTPUT_COUNT),
        MaterialClass::AlphaClipped => (binding::ALPHA_CLIPPED_CLUSTERS, binding::ALPHA_CLIPPED_COUNT),
        MaterialClass::Transparent => (binding::TRANSPARENT_CLUSTERS, binding::TRANSPARENT_COUNT),
        MaterialClass::Terrain => (binding::TERRAIN_CLUSTERS, binding::TERRAIN_COUNT),
    }
}

/// Fold the visibility of `cluster` into its tracking slot and count a
/// change when the hash differs from the cached one.
fn track(ctx: &mut dyn ThreadContext, c: &CullConstants, cluster: &Cluster, visible: bool) -> Result<(), KernelError> {
    if c.tracking == 0 {
        return Ok(());
    }
    let instance = u64::from(cluster.record.instance_pointer);
    let first: u32 = load(ctx, binding::TRACKING_INSTANCE_SLOTS, instance)?;
    let lod: InstanceLod = load(ctx, binding::INSTANCE_LOD, instance)?;
    let offset = cluster.record.cluster_pointer.wrapping_sub(lod.cluster_pointer);
    let slot = u64::from(first) + u64::from(offset);
    if slot >= ctx.element_count(binding::TRACKING_HASHES)? {
        return Ok(());
    }
    let hash = fnv1a(
        fnv1a(c.fnv_offset_basis, &u32::from(visible).to_ne_bytes()),
        bytemuck::bytes_of(&cluster.transform),
    );
    let cached: u32 = load(ctx, binding::TRACKING_HASHES, slot)?;
    if cached != hash {
        ctx.store(binding::TRACKING_HASHES, slot, &hash)?;
        ctx.atomic_add(binding::TRACKING_CHANGED, 0, 1)?;
    }
    Ok(())
}

fn facing_away(ctx: &dyn ThreadContext, c: &CullConstants, cluster: &Cluster) -> Result<bool, KernelError> {
    let cone: ClusterCone = load(ctx, binding::CLUSTER_CONE, u64::from(cluster.record.cluster_pointer))?;
    if cone.cutoff >= 1.0 {
        return Ok(false);
    }
    let m = cluster.transform.to_mat4();
    let apex = m.transform_point3(cone.apex.into());
    let axis = m.transform_vector3(cone.axis.into()).normalize_or_zero();
    Ok(cone_backfacing(apex, axis, cone.cutoff, c.position()))
}

pub(super) fn cluster_cull(ctx: &mut dyn ThreadContext, thread: DispatchThread) -> Result<(), KernelError> {
    let c: CullConstants = ctx.constants(binding::CONSTANTS)?;
    let Some((_, record)) = input_record(ctx, thread)? else {
        return Ok(());
    };
    let cluster = fetch(ctx, record)?;
    let visible = Frustum::packed_intersects(&c.planes, cluster.world.min, cluster.world.max)
        && !facing_away(ctx, &c, &cluster)?;
    track(ctx, &c, &cluster, visible)?;
    if !visible {
        return Ok(());
    }
    let (records, count) = partition(cluster.material);
    append(ctx, records, count, &cluster.record)
}

pub(super) fn occlusion_cull(ctx: &mut dyn ThreadContext, thread: DispatchThread) -> Result<(), KernelError> {
    let c: CullConstants = ctx.constants(binding::CONSTANTS)?;
    let Some((_, record)) = input_record(ctx, thread)? else {
        return Ok(());
    };
    let cluster = fetch(ctx, record)?;
    let hidden = occluded(ctx, &c, &cluster.world)?;
    track(ctx, &c, &cluster, !hidden)?;
    let (records, count) = match (cluster.material, hidden) {
        (MaterialClass::Opaque, true) => (binding::NOT_YET_TESTED_CLUSTERS, binding::NOT_YET_TESTED_COUNT),
        (_, true) => return Ok(()),
        (material, false) => partition(material),
    };
    append(ctx, records, count, &cluster.record)
}

pub(super) fn expand_indexes(ctx: &mut dyn ThreadContext, thread: DispatchThread) -> Result<(), KernelError> {
    let params: IndexExpandParams = ctx.constants(binding::PARAMS)?;
    let Some((slot, record)) = input_record(ctx, thread)? else {
        return Ok(());
    };
    let cluster: ClusterBinding = load(ctx, binding::CLUSTER_BINDING, u64::from(record.cluster_pointer))?;
    let n = cluster.index_count.min(params.cluster_size);
    if n == 0 {
        return Ok(());
    }

    let base = ctx.atomic_add(binding::OUTPUT_INDEX_COUNT, 0, n)?;
    if u64::from(base) + u64::from(n) > ctx.element_count(binding::OUTPUT_INDEXES)? {
        return Ok(());
    }
    for k in 0..u64::from(n) {
        let index: u32 = load(ctx, binding::INDEX_DATA, u64::from(cluster.index_pointer) + k)?;
        ctx.store(binding::OUTPUT_INDEXES, u64::from(base) + k, &index)?;
    }

    let draw = u64::from(ctx.atomic_add(binding::DRAW_COUNT, 0, 1)?);
    if draw < ctx.element_count(binding::DRAW_ARGS)? {
        let args = DrawIndexedIndirectArgs {
            index_count: n,
            instance_count: 1,
            first_index: base,
            base_vertex: cluster.vertex_pointer as i32,
            first_instance: slot as u32,
        };
        ctx.store(binding::DRAW_ARGS, draw, &args)?;
    }
    Ok(())
}
