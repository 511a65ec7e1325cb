//! Growable parallel GPU buffer arenas.
//!
//! A [`ModelResourceAllocator`] owns one or more GPU buffers that share a
//! single element capacity: element `i` of every buffer belongs to the same
//! logical record (a vertex's position, normal and uv, or a cluster's
//! binding and bounds). Allocations hand out ranges of element indices
//! that are valid in every buffer at once.
//!
//! # Growth
//!
//! When no free range fits a request the arena grows in place: it sizes a
//! new capacity with [`gpu_allocation_strategy`], creates replacement
//! buffers, copies the old contents on the GPU and blocks on that copy,
//! then swaps the buffers and retries exactly once. Only a request that
//! cannot fit under [`ArenaConfig::max_elements`] fails, with
//! [`ArenaError::OutOfGpuMemory`].
//!
//! # Module overview
//!
//! - [`config`]: sizing and timeout configuration.
//! - [`error`]: [`ArenaError`].
//! - [`growth`]: the growth policy.
//! - [`ranges`]: first-fit free-range tracking with coalescing.
//! - [`allocation`]: allocation handles, including the RAII [`OwnedAllocation`].
//! - [`allocator`]: [`ModelResourceAllocator`].
//! - [`linear`]: [`ModelResourceLinearAllocator`], a single-element stack.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod allocation;
pub mod allocator;
pub mod config;
pub mod error;
pub mod growth;
pub mod linear;
pub mod ranges;

pub use allocation::{Allocation, OwnedAllocation, SharedAllocator};
pub use allocator::{ArenaBufferDesc, ExtraView, ModelResourceAllocator};
pub use config::ArenaConfig;
pub use error::ArenaError;
pub use growth::gpu_allocation_strategy;
pub use linear::ModelResourceLinearAllocator;
pub use ranges::FreeRanges;
