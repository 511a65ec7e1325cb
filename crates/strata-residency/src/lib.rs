//! Asynchronous streaming of resource data into GPU memory.
//!
//! A [`ResidencyManager`] accepts uploads from any number of threads and
//! hands them to one worker over a bounded channel. The worker stages the
//! bytes through a fence-tagged ring of CPU-visible memory
//! ([`UploadRing`]), records the copies and submits them; ring space is
//! reused only after the fence of the copy that read it has signaled.
//!
//! ```text
//! Submitters                 strata-residency worker            Device
//!     |--upload_*()----------->| recv_timeout(poll)              |
//!     |  [bounded queue]       | stage chunk in ring             |
//!     |<--ResidencyFuture      | write_buffer + copy + submit--->|
//!     |                        | ring.tag(fence)                 |
//!     |                        | retire(): reclaim, complete <---| fence
//!     |--block_until_uploaded()-------------------------------->| wait_fence
//! ```
//!
//! When the ring is full the worker blocks on the oldest in-flight fence
//! (bounded by [`ResidencyConfig::fence_timeout`]) and counts a stall in
//! [`ResidencyStats::stalls`].

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod future;
pub mod manager;
pub mod metrics;
pub mod ring;
pub mod task;
mod worker;

pub use config::{ConfigError, ResidencyConfig};
pub use error::ResidencyError;
pub use future::ResidencyFuture;
pub use manager::{ResidencyManager, ShutdownReport};
pub use metrics::{ResidencyMetrics, ResidencyStats};
pub use ring::{RingAllocation, UploadRing};
pub use task::{TaskState, TextureUpload};
pub use worker::{BUFFER_PLACEMENT_ALIGNMENT, TEXTURE_PITCH_ALIGNMENT, TEXTURE_PLACEMENT_ALIGNMENT};
