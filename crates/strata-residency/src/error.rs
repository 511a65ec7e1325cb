//! Residency error types.

use std::error::Error;
use std::fmt;
use std::time::Duration;

use strata_core::DeviceError;

use crate::config::ConfigError;

/// Errors from submitting or awaiting an upload.
#[derive(Clone, Debug, PartialEq)]
pub enum ResidencyError {
    /// The manager is shutting down and accepts no new work.
    ShuttingDown,
    /// The upload's fence never signaled: the device timed out or was lost.
    Lost(DeviceError),
    /// The task had not reached the device when the wait gave up.
    Timeout {
        /// How long the caller waited.
        waited: Duration,
    },
    /// The destination resource was released before the upload ran.
    DestinationReleased,
    /// The upload does not fit inside its destination.
    OutOfBounds {
        /// Destination byte offset.
        offset: u64,
        /// Bytes to upload.
        len: u64,
        /// Destination size in bytes.
        size: u64,
    },
    /// The upload request is malformed.
    InvalidUpload {
        /// What is wrong with it.
        reason: String,
    },
    /// The worker thread could not be started.
    WorkerSpawn {
        /// The OS error.
        reason: String,
    },
    /// Construction parameters are inconsistent.
    Config(ConfigError),
    /// Any other device failure.
    Device(DeviceError),
}

impl fmt::Display for ResidencyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ShuttingDown => write!(f, "residency manager is shutting down"),
            Self::Lost(err) => write!(f, "upload lost: {err}"),
            Self::Timeout { waited } => write!(f, "upload still queued after {waited:?}"),
            Self::DestinationReleased => write!(f, "upload destination was released"),
            Self::OutOfBounds { offset, len, size } => write!(
                f,
                "upload of {len} bytes at offset {offset} exceeds destination of {size} bytes"
            ),
            Self::InvalidUpload { reason } => write!(f, "invalid upload: {reason}"),
            Self::WorkerSpawn { reason } => write!(f, "failed to spawn residency worker: {reason}"),
            Self::Config(err) => write!(f, "invalid residency config: {err}"),
            Self::Device(err) => write!(f, "device error: {err}"),
        }
    }
}

impl Error for ResidencyError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Lost(err) | Self::Device(err) => Some(err),
            Self::Config(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DeviceError> for ResidencyError {
    fn from(err: DeviceError) -> Self {
        match err {
            DeviceError::Timeout { .. } | DeviceError::Lost { .. } => Self::Lost(err),
            DeviceError::ResourceReleased => Self::DestinationReleased,
            other => Self::Device(other),
        }
    }
}

impl From<ConfigError> for ResidencyError {
    fn from(err: ConfigError) -> Self {
        Self::Config(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::FenceValue;

    #[test]
    fn fence_failures_become_lost() {
        let timeout = DeviceError::Timeout {
            fence: FenceValue(3),
            waited: Duration::from_millis(5),
        };
        assert!(matches!(
            ResidencyError::from(timeout),
            ResidencyError::Lost(DeviceError::Timeout { .. })
        ));
        let lost = ResidencyError::from(DeviceError::Lost {
            reason: "reset".into(),
        });
        assert!(lost.source().is_some());
    }

    #[test]
    fn released_resources_map_to_destination_released() {
        assert_eq!(
            ResidencyError::from(DeviceError::ResourceReleased),
            ResidencyError::DestinationReleased
        );
    }
}
