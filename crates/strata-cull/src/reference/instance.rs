use strata_core::{Aabb, DispatchThread, Frustum, KernelError, ThreadContext};

use super::depth::occluded;
use super::load;
use crate::camera::{fnv1a, CullConstants};
use crate::program::binding;
use crate::record::{
    BoundingBox, ClusterInstanceData, FrustumCullingOutput, InstanceLod, InstanceTransform, MaterialClass,
};

/// World box of instance `i`, with its transform.
fn world_bounds(ctx: &dyn ThreadContext, i: u64) -> Result<(Aabb, InstanceTransform), KernelError> {
    let bounds: BoundingBox = load(ctx, binding::INSTANCE_BOUNDS, i)?;
    let transform: InstanceTransform = load(ctx, binding::INSTANCE_TRANSFORM, i)?;
    Ok((bounds.to_aabb().transformed(&transform.to_mat4()), transform))
}

fn in_frustum(c: &CullConstants, world: &Aabb) -> bool {
    Frustum::packed_intersects(&c.planes, world.min, world.max)
}

/// Reserve `lod`'s clusters in `cluster_count` and list the instance.
fn reserve(
    ctx: &mut dyn ThreadContext,
    list: &str,
    list_count: &str,
    cluster_count: &str,
    instance: u32,
    lod: InstanceLod,
) -> Result<(), KernelError> {
    let cluster_base = ctx.atomic_add(cluster_count, 0, lod.cluster_count)?;
    let slot = u64::from(ctx.atomic_add(list_count, 0, 1)?);
    if slot >= ctx.element_count(list)? {
        return Ok(());
    }
    let record = FrustumCullingOutput {
        instance_pointer: instance,
        cluster_pointer: lod.cluster_pointer,
        cluster_count: lod.cluster_count,
        cluster_base,
    };
    ctx.store(list, slot, &record)
}

pub(super) fn instance_cull(ctx: &mut dyn ThreadContext, thread: DispatchThread) -> Result<(), KernelError> {
    let c: CullConstants = ctx.constants(binding::CONSTANTS)?;
    if thread.global >= c.instance_count {
        return Ok(());
    }
    let i = u64::from(thread.global);
    let (world, _) = world_bounds(ctx, i)?;
    if !in_frustum(&c, &world) || occluded(ctx, &c, &world)? {
        return Ok(());
    }
    let lod: InstanceLod = load(ctx, binding::INSTANCE_LOD, i)?;
    if lod.cluster_count == 0 {
        return Ok(());
    }
    reserve(
        ctx,
        binding::INSTANCE_LIST,
        binding::INSTANCE_COUNT,
        binding::OUTPUT_COUNT,
        thread.global,
        lod,
    )
}

pub(super) fn instance_shadow_cull(ctx: &mut dyn ThreadContext, thread: DispatchThread) -> Result<(), KernelError> {
    let c: CullConstants = ctx.constants(binding::CONSTANTS)?;
    if thread.global >= c.instance_count {
        return Ok(());
    }
    let i = u64::from(thread.global);
    let material: u32 = load(ctx, binding::INSTANCE_MATERIAL, i)?;
    let (list, list_count, cluster_count) = match MaterialClass::from_raw(material) {
        MaterialClass::Opaque => (binding::INSTANCE_LIST, binding::INSTANCE_COUNT, binding::OUTPUT_COUNT),
        MaterialClass::AlphaClipped => (
            binding::INSTANCE_LIST_ALPHA_CLIPPED,
            binding::INSTANCE_COUNT_ALPHA_CLIPPED,
            binding::SHADOW_CLUSTER_COUNT_ALPHA_CLIPPED,
        ),
        MaterialClass::Terrain => (
            binding::INSTANCE_LIST_TERRAIN,
            binding::INSTANCE_COUNT_TERRAIN,
            binding::SHADOW_CLUSTER_COUNT_TERRAIN,
        ),
        MaterialClass::Transparent => return Ok(()),
    };
    let (world, transform) = world_bounds(ctx, i)?;
    if !in_frustum(&c, &world) {
        return Ok(());
    }

    let hash = fnv1a(
        fnv1a(c.fnv_offset_basis, bytemuck::bytes_of(&c.view_projection)),
        bytemuck::bytes_of(&transform),
    );
    let cached: u32 = load(ctx, binding::SHADOW_HASHES, i)?;
    if c.force != 0 || cached != hash {
        ctx.store(binding::SHADOW_HASHES, i, &hash)?;
        ctx.atomic_add(binding::CHANGE_COUNT, 0, 1)?;
    } else {
        ctx.atomic_add(binding::MATCH_COUNT, 0, 1)?;
    }

    let lod: InstanceLod = load(ctx, binding::INSTANCE_LOD, i)?;
    if lod.cluster_count == 0 {
        return Ok(());
    }
    reserve(ctx, list, list_count, cluster_count, thread.global, lod)
}

pub(super) fn expand_clusters(ctx: &mut dyn ThreadContext, thread: DispatchThread) -> Result<(), KernelError> {
    let count: u32 = load(ctx, binding::INSTANCE_COUNT, 0)?;
    let listed = ctx.element_count(binding::INSTANCE_LIST)?;
    let i = u64::from(thread.global);
    if thread.global >= count || i >= listed {
        return Ok(());
    }
    let entry: FrustumCullingOutput = load(ctx, binding::INSTANCE_LIST, i)?;
    let capacity = ctx.element_count(binding::OUTPUT_CLUSTERS)?;
    for c in 0..entry.cluster_count {
        let slot = u64::from(entry.cluster_base) + u64::from(c);
        if slot >= capacity {
            break;
        }
        let record = ClusterInstanceData {
            instance_pointer: entry.instance_pointer,
            cluster_pointer: entry.cluster_pointer + c,
        };
        ctx.store(binding::OUTPUT_CLUSTERS, slot, &record)?;
    }
    Ok(())
}
