//! Strata: GPU resource arenas, streaming uploads and GPU-driven culling.
//!
//! This is the top-level facade crate that re-exports the public API of
//! the Strata sub-crates. Most users only need `strata` as a dependency.
//!
//! # Quick start
//!
//! ```rust
//! use std::sync::Arc;
//! use strata::prelude::*;
//! use strata_test_utils::SoftDevice;
//!
//! let soft = SoftDevice::new();
//! let device = soft.as_device();
//!
//! // Parallel per-vertex buffers sharing one capacity.
//! let mut mesh = ModelResourceAllocator::with_strides(
//!     Arc::clone(&device),
//!     "mesh",
//!     &[12, 8],
//!     ArenaConfig::new(256),
//! )
//! .unwrap();
//! let quad = mesh.allocate(4).unwrap();
//!
//! // Stream positions into the arena on the residency worker.
//! let residency = ResidencyManager::new(Arc::clone(&device), ResidencyConfig::default()).unwrap();
//! let positions = [0u8; 4 * 12];
//! residency
//!     .upload_temp(mesh.buffer(0), quad.gpu_index() * 12, &positions)
//!     .unwrap()
//!     .block_until_uploaded()
//!     .unwrap();
//! assert_eq!(mesh.used_elements(), 4);
//! ```
//!
//! # Modules
//!
//! Each module corresponds to a sub-crate. Use them for types not in the prelude:
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `strata-core` | Device trait, resources, views, commands, kernels |
//! | [`arena`] | `strata-arena` | Growable parallel buffer arenas |
//! | [`residency`] | `strata-residency` | Asynchronous upload worker and ring |
//! | [`cull`] | `strata-cull` | Instance and cluster culling stages, data lines |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Device abstraction and shared types (`strata-core`).
///
/// Contains the [`types::Device`] trait, buffers, textures and their
/// views, command lists and the [`types::ComputeKernel`] contract.
pub use strata_core as types;

/// Growable parallel GPU buffer arenas (`strata-arena`).
///
/// [`arena::ModelResourceAllocator`] hands out element ranges valid in
/// every buffer of the arena at once and grows in place.
pub use strata_arena as arena;

/// Asynchronous streaming uploads (`strata-residency`).
///
/// [`residency::ResidencyManager`] stages bytes through a fence-tagged
/// ring and returns a [`residency::ResidencyFuture`] per upload.
pub use strata_residency as residency;

/// GPU-driven culling (`strata-cull`).
///
/// The stages ([`cull::FrustumCuller`], [`cull::OcclusionCuller`],
/// [`cull::IndexExpansion`]) record compute work over data lines; the
/// [`cull::reference`] kernels define what each program computes.
pub use strata_cull as cull;

/// Common imports for typical Strata usage.
///
/// ```rust
/// use strata::prelude::*;
/// ```
pub mod prelude {
    // Device and resources
    pub use strata_core::{
        create_buffer, create_texture, Buffer, BufferDesc, BufferLayout, BufferUsage, BufferView,
        CommandList, Device, DeviceError, Format, Texture, TextureDesc, TextureView,
    };

    // Arenas
    pub use strata_arena::{
        Allocation, ArenaBufferDesc, ArenaConfig, ArenaError, ExtraView, ModelResourceAllocator,
        OwnedAllocation,
    };

    // Residency
    pub use strata_residency::{
        ResidencyConfig, ResidencyError, ResidencyFuture, ResidencyManager, TextureUpload,
    };

    // Culling
    pub use strata_cull::{
        ClusterDataLine, ClusterPartitions, CullCamera, CullError, CullerConfig, DataLine, DepthPyramid,
        DrawDataLine, FrustumCuller, IndexDataLine, IndexExpansion, LinePair, MaterialClass,
        OcclusionCuller, OcclusionOutputs, SceneBindings,
    };
}
