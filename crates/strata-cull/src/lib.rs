//! GPU-driven instance and cluster culling for Strata.
//!
//! Every stage records compute work into a [`CommandList`](strata_core::CommandList);
//! nothing is read back to the CPU between stages. Stages communicate
//! through *data lines*: a record buffer plus GPU counters saying how
//! many records are valid and where the current pass began.
//!
//! # Pipeline
//!
//! A typical camera frame runs:
//!
//! 1. [`FrustumCuller::instance_cull`]: instances against the frustum and
//!    last frame's [`DepthPyramid`], reserving cluster ranges.
//! 2. [`FrustumCuller::expand_clusters`]: surviving instances to
//!    [`ClusterInstanceData`] records.
//! 3. [`FrustumCuller::cluster_cull`]: clusters against the frustum and
//!    their normal cones, split by [`MaterialClass`].
//! 4. [`OcclusionCuller::occlusion_cull`]: clusters against the pyramid,
//!    deferring rejected opaque clusters for a second test.
//! 5. [`IndexExpansion::expand_indexes`]: clusters to index ranges and
//!    indirect draw arguments in a [`DrawDataLine`].
//!
//! Shadow passes replace step 1 with
//! [`FrustumCuller::instance_shadow_cull`], which tracks per-caster
//! changes in a [`ShadowTracking`].
//!
//! # Data lines
//!
//! An *append* line owns its records and accumulates across sub-stages;
//! a *draw* line aliases the same records and describes only what the
//! latest sub-stage appended. [`begin_delta`] and [`end_delta`] maintain
//! that relationship with [`BufferMath`] passes.
//!
//! # Module overview
//!
//! - [`record`]: GPU record layouts.
//! - [`line`]: data lines and the delta protocol.
//! - [`frustum`], [`occlusion`], [`index`], [`expansion`]: the stages.
//! - [`job`], [`buffer_math`], [`count`]: GPU-sized dispatch and counter tools.
//! - [`reference`]: CPU kernels defining every program.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod buffer_math;
pub mod camera;
pub mod config;
pub mod count;
pub mod error;
pub mod expansion;
pub mod frustum;
pub mod index;
pub mod job;
pub mod line;
pub mod occlusion;
pub mod program;
pub mod pyramid;
pub mod record;
pub mod reference;
pub mod scene;
pub mod tracking;

pub use buffer_math::{BufferMath, BufferMathOperation, MathRange};
pub use camera::{fnv1a, CullCamera, CullConstants};
pub use config::CullerConfig;
pub use count::CountBuffer;
pub use error::CullError;
pub use expansion::ClusterExpansion;
pub use frustum::{ClusterPartitions, FrustumCuller, ShadowOutputs, ShadowPartition};
pub use index::IndexExpansion;
pub use job::GpuSizedJob;
pub use line::{
    begin_delta, end_delta, ClusterDataLine, DataLine, DrawDataLine, IndexDataLine, LineContent,
    LinePair, LineSizes, ModelDataLine,
};
pub use occlusion::{OcclusionCuller, OcclusionOutputs};
pub use pyramid::DepthPyramid;
pub use record::{
    BoundingBox, ClusterBinding, ClusterCone, ClusterInstanceData, FrustumCullingOutput, InstanceLod,
    InstanceTransform, MaterialClass,
};
pub use scene::{SceneBindings, SceneBuffers, SceneData};
pub use tracking::{ClusterTracking, ShadowTracking};
