//! Upload tasks and their shared completion cells.

use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::Duration;

use strata_core::{BufferView, FenceValue, Texture, TextureView};

use crate::error::ResidencyError;

/// Where a task is in its lifetime.
#[derive(Clone, Debug, PartialEq)]
pub enum TaskState {
    /// Waiting in the queue.
    Queued,
    /// Picked up by the worker and being staged through the ring.
    Staged,
    /// Every chunk is submitted; the last one signals `fence`.
    Dispatched {
        /// Fence of the final chunk.
        fence: FenceValue,
    },
    /// The data is resident.
    Complete,
    /// The task could not be carried out.
    Failed(ResidencyError),
}

impl TaskState {
    /// Whether no further transition can happen.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Failed(_))
    }
}

// ── Completion ──────────────────────────────────────────────────

/// The one piece of state a task shares with its future.
#[derive(Debug)]
pub(crate) struct Completion {
    state: Mutex<TaskState>,
    changed: Condvar,
}

impl Completion {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(TaskState::Queued),
            changed: Condvar::new(),
        })
    }

    pub(crate) fn state(&self) -> TaskState {
        self.lock().clone()
    }

    /// Move to `next` unless the task has already finished.
    pub(crate) fn set(&self, next: TaskState) {
        let mut state = self.lock();
        if state.is_terminal() {
            return;
        }
        *state = next;
        self.changed.notify_all();
    }

    /// Wait up to `timeout` for the state to leave `Queued`/`Staged`.
    pub(crate) fn wait_submitted(&self, timeout: Duration) -> TaskState {
        let guard = self.lock();
        let result = self.changed.wait_timeout_while(guard, timeout, |state| {
            matches!(state, TaskState::Queued | TaskState::Staged)
        });
        match result {
            Ok((state, _)) => state.clone(),
            Err(poisoned) => poisoned.into_inner().0.clone(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, TaskState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

// ── Tasks ───────────────────────────────────────────────────────

/// Bytes to upload.
#[derive(Debug)]
pub(crate) enum UploadSource {
    /// Copied out of the caller's slice at submission.
    Copied(Vec<u8>),
    /// Shared with the caller without a copy.
    Shared(Arc<[u8]>),
}

impl UploadSource {
    pub(crate) fn bytes(&self) -> &[u8] {
        match self {
            Self::Copied(bytes) => bytes,
            Self::Shared(bytes) => bytes,
        }
    }
}

/// A region of one texture subresource.
#[derive(Debug)]
pub(crate) struct TextureRegion {
    pub(crate) view: TextureView,
    pub(crate) x: u32,
    pub(crate) y: u32,
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) mip: u32,
    pub(crate) slice: u32,
}

#[derive(Debug)]
pub(crate) enum Destination {
    Buffer { view: BufferView, byte_offset: u64 },
    Texture(TextureRegion),
}

/// A queued upload. Consumed exactly once by the worker.
#[derive(Debug)]
pub(crate) struct UploadTask {
    pub(crate) source: UploadSource,
    pub(crate) destination: Destination,
    pub(crate) completion: Arc<Completion>,
}

/// A texture upload request.
///
/// `source` holds `src_height` tightly packed rows of `src_width` texels
/// in the texture's format. They land at `(x, y)` of subresource
/// `(mip, slice)`.
#[derive(Clone, Debug)]
pub struct TextureUpload<'a> {
    /// Texel rows.
    pub source: Arc<[u8]>,
    /// Region width in texels.
    pub src_width: u32,
    /// Region height in texels.
    pub src_height: u32,
    /// Destination texture.
    pub texture: &'a Texture,
    /// Left edge of the region.
    pub x: u32,
    /// Top edge of the region.
    pub y: u32,
    /// Mip level.
    pub mip: u32,
    /// Array slice.
    pub slice: u32,
    /// Copy `source` into a private buffer at submission, so the caller's
    /// allocation is released as soon as the call returns.
    pub copy_on_upload: bool,
}

impl<'a> TextureUpload<'a> {
    /// Upload the whole of mip 0, slice 0.
    pub fn full(texture: &'a Texture, source: Arc<[u8]>) -> Self {
        let desc = texture.desc();
        Self {
            source,
            src_width: desc.width,
            src_height: desc.height,
            texture,
            x: 0,
            y: 0,
            mip: 0,
            slice: 0,
            copy_on_upload: false,
        }
    }

    /// Target `(mip, slice)` instead.
    pub fn subresource(mut self, mip: u32, slice: u32) -> Self {
        self.mip = mip;
        self.slice = slice;
        self
    }

    /// Place the region at `(x, y)` with a `width` x `height` extent.
    pub fn region(mut self, x: u32, y: u32, width: u32, height: u32) -> Self {
        self.x = x;
        self.y = y;
        self.src_width = width;
        self.src_height = height;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn terminal_states_are_sticky() {
        let completion = Completion::new();
        completion.set(TaskState::Complete);
        completion.set(TaskState::Dispatched {
            fence: FenceValue(9),
        });
        assert_eq!(completion.state(), TaskState::Complete);
    }

    #[test]
    fn waiters_wake_on_dispatch() {
        let completion = Completion::new();
        let setter = Arc::clone(&completion);
        let handle = thread::spawn(move || {
            setter.set(TaskState::Staged);
            setter.set(TaskState::Dispatched {
                fence: FenceValue(4),
            });
        });
        let state = completion.wait_submitted(Duration::from_secs(5));
        handle.join().unwrap();
        assert_eq!(
            state,
            TaskState::Dispatched {
                fence: FenceValue(4)
            }
        );
    }

    #[test]
    fn queued_wait_times_out() {
        let completion = Completion::new();
        let state = completion.wait_submitted(Duration::from_millis(10));
        assert_eq!(state, TaskState::Queued);
    }
}
