//! Culling error types.
//!
//! The stages only record commands, so every error here is a record-time
//! failure: a resource could not be created, or a caller handed a stage
//! something it cannot bind. Nothing fails while the GPU runs the passes.

use std::error::Error;
use std::fmt;

use strata_core::DeviceError;

/// Errors raised while building or recording culling work.
#[derive(Clone, Debug, PartialEq)]
pub enum CullError {
    /// A data line a stage writes to or reads from has no record storage.
    MissingStorage {
        /// Debug name of the line.
        line: String,
    },
    /// The scene has more instances than the instance lists can hold.
    TooManyInstances {
        /// Instances in the scene.
        count: u32,
        /// Configured capacity.
        max: u32,
    },
    /// A view handed to a stage refers to a released resource.
    ReleasedResource {
        /// Which input.
        what: &'static str,
    },
    /// Depth data does not cover the pyramid's base level.
    DepthExtent {
        /// Texels in mip 0.
        expected: u64,
        /// Values supplied.
        actual: u64,
    },
    /// Construction parameters are inconsistent.
    InvalidConfig {
        /// What is wrong with them.
        reason: String,
    },
    /// The device failed to create or copy a resource.
    Device(DeviceError),
}

impl fmt::Display for CullError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingStorage { line } => write!(f, "data line '{line}' has no record storage"),
            Self::TooManyInstances { count, max } => {
                write!(f, "{count} instances exceed the culler capacity of {max}")
            }
            Self::ReleasedResource { what } => write!(f, "{what} refers to a released resource"),
            Self::DepthExtent { expected, actual } => {
                write!(f, "depth data has {actual} values, pyramid base has {expected} texels")
            }
            Self::InvalidConfig { reason } => write!(f, "invalid culler config: {reason}"),
            Self::Device(err) => write!(f, "device error: {err}"),
        }
    }
}

impl Error for CullError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Device(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DeviceError> for CullError {
    fn from(err: DeviceError) -> Self {
        Self::Device(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_errors_are_the_source() {
        let err = CullError::from(DeviceError::ResourceReleased);
        assert!(err.source().is_some());
        assert!(err.to_string().contains("released"));
        let err = CullError::TooManyInstances { count: 9, max: 8 };
        assert!(err.source().is_none());
        assert_eq!(err.to_string(), "9 instances exceed the culler capacity of 8");
    }
}
