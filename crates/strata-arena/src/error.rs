//! Arena-specific error types.

use std::error::Error;
use std::fmt;

use strata_core::{ArenaId, DeviceError};

/// Errors that can occur during arena operations.
#[derive(Clone, Debug, PartialEq)]
pub enum ArenaError {
    /// The working set does not fit: growth would pass the architectural
    /// maximum, or the device refused the larger buffers.
    OutOfGpuMemory {
        /// Elements requested by the failing allocation.
        requested: u64,
        /// Capacity when the request failed.
        capacity: u64,
        /// Configured architectural maximum.
        max_elements: u64,
    },
    /// An allocation was returned to an arena that did not create it.
    ForeignAllocation {
        /// The arena asked to free.
        arena: ArenaId,
        /// The arena that created the allocation.
        origin: ArenaId,
    },
    /// An allocation does not match any live range (double free).
    NotLive {
        /// First element of the offending allocation.
        gpu_index: u64,
        /// Length of the offending allocation.
        element_count: u64,
    },
    /// A stack-ordered allocator was asked to free anything but its top.
    NotAtEnd {
        /// First element of the offending allocation.
        gpu_index: u64,
        /// Current top of the stack.
        end: u64,
    },
    /// The request itself is malformed (zero elements, wrong count).
    InvalidRequest {
        /// What is wrong with it.
        reason: String,
    },
    /// Construction parameters are inconsistent.
    InvalidConfig {
        /// What is wrong with them.
        reason: String,
    },
    /// The device failed while creating or copying arena buffers.
    Device(DeviceError),
}

impl fmt::Display for ArenaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfGpuMemory {
                requested,
                capacity,
                max_elements,
            } => write!(
                f,
                "out of GPU memory: requested {requested} elements at capacity {capacity} (max {max_elements})"
            ),
            Self::ForeignAllocation { arena, origin } => {
                write!(f, "allocation from {origin} freed into {arena}")
            }
            Self::NotLive {
                gpu_index,
                element_count,
            } => write!(
                f,
                "allocation [{gpu_index}, +{element_count}) is not live"
            ),
            Self::NotAtEnd { gpu_index, end } => {
                write!(f, "linear free of element {gpu_index} but top is {end}")
            }
            Self::InvalidRequest { reason } => write!(f, "invalid allocation request: {reason}"),
            Self::InvalidConfig { reason } => write!(f, "invalid arena config: {reason}"),
            Self::Device(err) => write!(f, "device error: {err}"),
        }
    }
}

impl Error for ArenaError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Device(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DeviceError> for ArenaError {
    fn from(err: DeviceError) -> Self {
        Self::Device(err)
    }
}
