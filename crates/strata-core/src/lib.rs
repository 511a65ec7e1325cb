//! Core types and traits for the Strata culling and streaming core.
//!
//! This is the leaf crate with zero internal dependencies. It defines the
//! contract between the culling/streaming machinery and whatever executes
//! GPU work:
//!
//! - [`Device`] and [`CommandList`]: resource creation, command recording,
//!   submission and fence waits.
//! - [`Buffer`] / [`Texture`]: owning resource handles that release their
//!   device resource on drop, plus the non-owning [`BufferView`] and
//!   [`TextureView`] back-references.
//! - [`Bindings`] / [`ComputePipeline`]: name-to-resource binding maps used
//!   in place of reflected shader types.
//! - [`ComputeKernel`] / [`ThreadContext`]: the execution contract a
//!   software device uses to run a program one thread at a time.
//! - GPU record types ([`DispatchArgs`], [`DrawIndexedIndirectArgs`]) and
//!   frustum math ([`Frustum`], [`Aabb`], [`Plane`]).

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod command;
pub mod device;
pub mod error;
pub mod format;
pub mod id;
pub mod kernel;
pub mod math;
pub mod pipeline;
pub mod record;
pub mod resource;
pub mod view;

pub use command::{Command, CommandList};
pub use device::{Device, DEFAULT_FENCE_TIMEOUT};
pub use error::{DeviceError, KernelError};
pub use format::Format;
pub use id::{ArenaId, BufferId, FenceValue, ProgramId, TextureId};
pub use kernel::{ComputeKernel, DispatchThread, FnKernel, ThreadContext};
pub use math::{Aabb, Frustum, Plane};
pub use pipeline::{Binding, Bindings, ComputePipeline, GraphicsPipeline};
pub use record::{DispatchArgs, DrawIndexedIndirectArgs};
pub use resource::{
    create_buffer, create_texture, Buffer, BufferDesc, BufferLayout, BufferUsage, Texture,
    TextureDesc,
};
pub use view::{AddressMode, BufferView, Filter, SamplerDesc, TextureView, ViewKind};
