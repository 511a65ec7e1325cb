//! Caller-side handle on a queued upload.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use strata_core::Device;

use crate::error::ResidencyError;
use crate::task::{Completion, TaskState};

/// Completion handle returned by every upload call.
///
/// Dropping the future does not cancel or wait for the upload.
#[must_use = "an upload is only known to be resident once its future completes"]
pub struct ResidencyFuture {
    completion: Arc<Completion>,
    device: Arc<dyn Device>,
    timeout: Duration,
}

impl ResidencyFuture {
    pub(crate) fn new(completion: Arc<Completion>, device: Arc<dyn Device>, timeout: Duration) -> Self {
        Self {
            completion,
            device,
            timeout,
        }
    }

    /// Current task state.
    pub fn state(&self) -> TaskState {
        self.completion.state()
    }

    /// Whether the data is resident. Checks the fence without blocking.
    pub fn is_complete(&self) -> bool {
        match self.completion.state() {
            TaskState::Complete => true,
            TaskState::Dispatched { fence } if self.device.is_complete(fence) => {
                self.completion.set(TaskState::Complete);
                true
            }
            _ => false,
        }
    }

    /// Block until the data is resident, bounded by the configured
    /// fence timeout.
    pub fn block_until_uploaded(&self) -> Result<(), ResidencyError> {
        self.block_until_uploaded_timeout(self.timeout)
    }

    /// Block until the data is resident, at most `timeout`.
    ///
    /// A task still queued when the bound elapses yields
    /// [`ResidencyError::Timeout`]; a submitted task whose fence does not
    /// signal yields [`ResidencyError::Lost`].
    pub fn block_until_uploaded_timeout(&self, timeout: Duration) -> Result<(), ResidencyError> {
        let start = Instant::now();
        match self.completion.wait_submitted(timeout) {
            TaskState::Complete => Ok(()),
            TaskState::Failed(err) => Err(err),
            TaskState::Dispatched { fence } => {
                let remaining = timeout.saturating_sub(start.elapsed());
                self.device.wait_fence(fence, remaining)?;
                self.completion.set(TaskState::Complete);
                Ok(())
            }
            TaskState::Queued | TaskState::Staged => Err(ResidencyError::Timeout {
                waited: start.elapsed(),
            }),
        }
    }
}

impl fmt::Debug for ResidencyFuture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResidencyFuture")
            .field("state", &self.completion.state())
            .field("timeout", &self.timeout)
            .finish()
    }
}
