//! The device contract consumed by the culling and streaming core.

use std::time::Duration;

use crate::command::CommandList;
use crate::error::DeviceError;
use crate::id::{BufferId, FenceValue, TextureId};
use crate::resource::{BufferDesc, TextureDesc};
use crate::view::{BufferView, TextureView};

/// Fence wait bound used where callers do not choose one.
///
/// Waits exist to detect a hung device, not to pace work; ten seconds is
/// far beyond any legitimate copy or culling pass.
pub const DEFAULT_FENCE_TIMEOUT: Duration = Duration::from_secs(10);

/// A GPU (or an emulation of one).
///
/// Resource creation goes through the raw `*_resource` methods, which
/// only [`create_buffer`](crate::create_buffer) and
/// [`create_texture`](crate::create_texture) should call: they wrap the
/// returned id in an owner whose drop calls the matching release.
///
/// Submission is asynchronous. Every submitted list gets the next value
/// on the device's fence timeline, and [`completed_fence`] reports how
/// far execution has progressed.
///
/// [`completed_fence`]: Device::completed_fence
pub trait Device: Send + Sync {
    /// Create a buffer resource.
    fn create_buffer_resource(&self, desc: &BufferDesc) -> Result<BufferId, DeviceError>;

    /// Release a buffer resource. Called by the owner's drop.
    fn release_buffer_resource(&self, id: BufferId);

    /// Create a texture resource.
    fn create_texture_resource(&self, desc: &TextureDesc) -> Result<TextureId, DeviceError>;

    /// Release a texture resource. Called by the owner's drop.
    fn release_texture_resource(&self, id: TextureId);

    /// Start a new command list.
    fn create_command_list(&self, name: &str) -> CommandList {
        CommandList::new(name)
    }

    /// Queue `list` for execution and return the fence value that signals
    /// its completion.
    fn submit(&self, list: CommandList) -> Result<FenceValue, DeviceError>;

    /// Highest fence value whose work has completed.
    fn completed_fence(&self) -> FenceValue;

    /// Block until `value` completes, at most `timeout`.
    ///
    /// Returns [`DeviceError::Timeout`] if the bound elapses and
    /// [`DeviceError::Lost`] if the device stopped executing work.
    fn wait_fence(&self, value: FenceValue, timeout: Duration) -> Result<(), DeviceError>;

    /// Write bytes into a CPU-mappable (`UPLOAD`) buffer.
    ///
    /// `byte_offset` is relative to the view.
    fn write_buffer(&self, view: &BufferView, byte_offset: u64, data: &[u8])
        -> Result<(), DeviceError>;

    /// Read back `len` bytes of a buffer. Offsets are relative to the view.
    ///
    /// Readback stalls the timeline; it is meant for diagnostics and
    /// tests, never the per-frame path.
    fn read_buffer(&self, view: &BufferView, byte_offset: u64, len: u64)
        -> Result<Vec<u8>, DeviceError>;

    /// Read back one texture subresource, tightly packed.
    fn read_texture(&self, view: &TextureView, mip: u32, slice: u32)
        -> Result<Vec<u8>, DeviceError>;

    /// Whether `value` has completed.
    fn is_complete(&self, value: FenceValue) -> bool {
        self.completed_fence() >= value
    }

    /// Submit `list` and wait for it.
    fn submit_blocking(&self, list: CommandList, timeout: Duration) -> Result<FenceValue, DeviceError> {
        let fence = self.submit(list)?;
        self.wait_fence(fence, timeout)?;
        Ok(fence)
    }
}
