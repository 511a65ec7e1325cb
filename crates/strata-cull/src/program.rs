//! Program ids and binding names of the culling stages.
//!
//! These names are the contract between the stages that record dispatches
//! and whatever executes them: a shader compiler on a real backend, or the
//! kernels in [`reference`](crate::reference) on a software device.

use strata_core::ProgramId;

/// Threads per workgroup of every per-element culling program.
pub const GROUP_SIZE: u32 = 64;

/// Instance frustum test with early depth-pyramid rejection.
pub const INSTANCE_CULL: ProgramId = ProgramId::new("cull.instance");
/// Instance frustum test without a depth pyramid.
pub const INSTANCE_CULL_NO_DEPTH: ProgramId = ProgramId::new("cull.instance_no_depth");
/// Light-frustum instance test with three partitions and change tracking.
pub const INSTANCE_SHADOW_CULL: ProgramId = ProgramId::new("cull.instance_shadow");
/// Surviving instances to their clusters.
pub const CLUSTER_EXPAND: ProgramId = ProgramId::new("cull.cluster_expand");
/// Cluster frustum and cone test with four partitions.
pub const CLUSTER_CULL: ProgramId = ProgramId::new("cull.cluster");
/// Cluster depth-pyramid test with five partitions.
pub const OCCLUSION_CULL: ProgramId = ProgramId::new("cull.occlusion");
/// Surviving clusters to index ranges and draw arguments.
pub const INDEX_EXPAND: ProgramId = ProgramId::new("cull.index_expand");
/// A GPU count to indirect dispatch arguments.
pub const CREATE_DISPATCH_ARGS: ProgramId = ProgramId::new("tools.create_dispatch_args");
/// Element-wise arithmetic between two `u32` buffers.
pub const MATH_OPERATION: ProgramId = ProgramId::new("tools.math");
/// Element-wise arithmetic between a `u32` buffer and a constant.
pub const MATH_OPERATION_CONSTANT: ProgramId = ProgramId::new("tools.math_constant");

/// Every program a backend must provide.
pub const ALL: [ProgramId; 10] = [
    INSTANCE_CULL,
    INSTANCE_CULL_NO_DEPTH,
    INSTANCE_SHADOW_CULL,
    CLUSTER_EXPAND,
    CLUSTER_CULL,
    OCCLUSION_CULL,
    INDEX_EXPAND,
    CREATE_DISPATCH_ARGS,
    MATH_OPERATION,
    MATH_OPERATION_CONSTANT,
];

/// Binding names shared by the stages and the programs.
pub mod binding {
    // ── Constants ───────────────────────────────────────────────

    /// [`CullConstants`](crate::CullConstants) block.
    pub const CONSTANTS: &str = "constants";
    /// Small per-program parameter block.
    pub const PARAMS: &str = "params";

    // ── Scene ───────────────────────────────────────────────────

    /// Local-space [`BoundingBox`](crate::BoundingBox) per instance.
    pub const INSTANCE_BOUNDS: &str = "instance_bounds";
    /// [`InstanceTransform`](crate::InstanceTransform) per instance.
    pub const INSTANCE_TRANSFORM: &str = "instance_transform";
    /// [`InstanceLod`](crate::InstanceLod) per instance.
    pub const INSTANCE_LOD: &str = "instance_lod";
    /// Raw [`MaterialClass`](crate::MaterialClass) per instance.
    pub const INSTANCE_MATERIAL: &str = "instance_material";
    /// Local-space [`BoundingBox`](crate::BoundingBox) per cluster.
    pub const CLUSTER_BOUNDS: &str = "cluster_bounds";
    /// [`ClusterCone`](crate::ClusterCone) per cluster.
    pub const CLUSTER_CONE: &str = "cluster_cone";
    /// [`ClusterBinding`](crate::ClusterBinding) per cluster.
    pub const CLUSTER_BINDING: &str = "cluster_binding";
    /// Scene index buffer.
    pub const INDEX_DATA: &str = "index_data";

    // ── Depth ───────────────────────────────────────────────────

    /// Depth pyramid texture.
    pub const DEPTH_PYRAMID: &str = "depth_pyramid";
    /// Point / clamp sampler for the pyramid.
    pub const DEPTH_SAMPLER: &str = "depth_sampler";

    // ── Instance lists ──────────────────────────────────────────

    /// Surviving instances.
    pub const INSTANCE_LIST: &str = "instance_list";
    /// Number of surviving instances.
    pub const INSTANCE_COUNT: &str = "instance_count";
    /// Alpha-clipped shadow casters.
    pub const INSTANCE_LIST_ALPHA_CLIPPED: &str = "instance_list_alpha_clipped";
    /// Number of alpha-clipped shadow casters.
    pub const INSTANCE_COUNT_ALPHA_CLIPPED: &str = "instance_count_alpha_clipped";
    /// Terrain shadow casters.
    pub const INSTANCE_LIST_TERRAIN: &str = "instance_list_terrain";
    /// Number of terrain shadow casters.
    pub const INSTANCE_COUNT_TERRAIN: &str = "instance_count_terrain";

    // ── Cluster lines ───────────────────────────────────────────

    /// Input cluster records.
    pub const INPUT_CLUSTERS: &str = "input_clusters";
    /// Number of input records.
    pub const INPUT_COUNT: &str = "input_count";
    /// First input record.
    pub const INPUT_INDEX: &str = "input_index";
    /// Output cluster records.
    pub const OUTPUT_CLUSTERS: &str = "output_clusters";
    /// Output append counter.
    pub const OUTPUT_COUNT: &str = "output_count";
    /// Alpha-clipped output records.
    pub const ALPHA_CLIPPED_CLUSTERS: &str = "alpha_clipped_clusters";
    /// Alpha-clipped append counter.
    pub const ALPHA_CLIPPED_COUNT: &str = "alpha_clipped_count";
    /// Transparent output records.
    pub const TRANSPARENT_CLUSTERS: &str = "transparent_clusters";
    /// Transparent append counter.
    pub const TRANSPARENT_COUNT: &str = "transparent_count";
    /// Terrain output records.
    pub const TERRAIN_CLUSTERS: &str = "terrain_clusters";
    /// Terrain append counter.
    pub const TERRAIN_COUNT: &str = "terrain_count";
    /// Opaque clusters the current pyramid rejected.
    pub const NOT_YET_TESTED_CLUSTERS: &str = "not_yet_tested_clusters";
    /// Append counter of the deferred opaque clusters.
    pub const NOT_YET_TESTED_COUNT: &str = "not_yet_tested_count";
    /// Cluster append counter of the alpha-clipped shadow line.
    pub const SHADOW_CLUSTER_COUNT_ALPHA_CLIPPED: &str = "shadow_cluster_count_alpha_clipped";
    /// Cluster append counter of the terrain shadow line.
    pub const SHADOW_CLUSTER_COUNT_TERRAIN: &str = "shadow_cluster_count_terrain";

    // ── Index expansion ─────────────────────────────────────────

    /// Output index records.
    pub const OUTPUT_INDEXES: &str = "output_indexes";
    /// Output index append counter.
    pub const OUTPUT_INDEX_COUNT: &str = "output_index_count";
    /// Draw argument records.
    pub const DRAW_ARGS: &str = "draw_args";
    /// Draw argument counter.
    pub const DRAW_COUNT: &str = "draw_count";

    // ── Change tracking ─────────────────────────────────────────

    /// Cached hash per shadow caster.
    pub const SHADOW_HASHES: &str = "shadow_hashes";
    /// Casters whose hash changed.
    pub const CHANGE_COUNT: &str = "change_count";
    /// Casters whose hash matched.
    pub const MATCH_COUNT: &str = "match_count";
    /// First tracking slot per instance.
    pub const TRACKING_INSTANCE_SLOTS: &str = "tracking_instance_slots";
    /// Cached visibility hash per tracked cluster.
    pub const TRACKING_HASHES: &str = "tracking_hashes";
    /// Tracked clusters whose hash changed.
    pub const TRACKING_CHANGED: &str = "tracking_changed";

    // ── Tools ───────────────────────────────────────────────────

    /// Count read by the argument builder.
    pub const COUNT: &str = "count";
    /// Dispatch arguments written by the argument builder.
    pub const ARGS: &str = "args";
    /// First math operand.
    pub const SRC_A: &str = "src_a";
    /// Second math operand.
    pub const SRC_B: &str = "src_b";
    /// Math result.
    pub const OUTPUT: &str = "output";
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn program_names_are_unique() {
        let names: HashSet<_> = ALL.iter().map(|p| p.name()).collect();
        assert_eq!(names.len(), ALL.len());
    }
}
