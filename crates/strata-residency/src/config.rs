//! Residency engine configuration and its validation errors.

use std::error::Error;
use std::fmt;
use std::time::Duration;

// ── ConfigError ─────────────────────────────────────────────────

/// A [`ResidencyConfig`] that cannot be used.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// The upload ring is too small to stage anything useful.
    RingTooSmall {
        /// Configured size in bytes.
        bytes: u64,
        /// Smallest accepted size.
        min: u64,
    },
    /// The task queue must hold at least one task.
    ZeroQueueCapacity,
    /// A duration that must be positive is zero.
    ZeroDuration {
        /// Name of the offending field.
        field: &'static str,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RingTooSmall { bytes, min } => {
                write!(f, "upload ring of {bytes} bytes is below the minimum of {min}")
            }
            Self::ZeroQueueCapacity => write!(f, "queue_capacity must be at least 1"),
            Self::ZeroDuration { field } => write!(f, "{field} must be non-zero"),
        }
    }
}

impl Error for ConfigError {}

// ── ResidencyConfig ─────────────────────────────────────────────

/// Configuration for a [`ResidencyManager`](crate::ResidencyManager).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResidencyConfig {
    /// Size of the CPU-visible upload ring in bytes. Default: 5 MiB.
    pub upload_buffer_bytes: u64,
    /// Tasks that may wait in the queue before submitters block.
    /// Default: 1024.
    pub queue_capacity: usize,
    /// How often the idle worker wakes to retire completed uploads.
    /// Default: 1 ms.
    pub poll_interval: Duration,
    /// Bound on every fence wait: worker stalls, shutdown drain, and
    /// [`ResidencyFuture::block_until_uploaded`](crate::ResidencyFuture::block_until_uploaded).
    /// Default: [`strata_core::DEFAULT_FENCE_TIMEOUT`].
    pub fence_timeout: Duration,
}

impl ResidencyConfig {
    /// Default upload ring size.
    pub const DEFAULT_UPLOAD_BUFFER_BYTES: u64 = 5 * 1024 * 1024;
    /// Default queue capacity.
    pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;
    /// Default idle poll interval.
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1);
    /// Smallest accepted upload ring.
    pub const MIN_UPLOAD_BUFFER_BYTES: u64 = 1024;

    /// A config with a `upload_buffer_bytes` ring and default limits.
    pub fn new(upload_buffer_bytes: u64) -> Self {
        Self {
            upload_buffer_bytes,
            queue_capacity: Self::DEFAULT_QUEUE_CAPACITY,
            poll_interval: Self::DEFAULT_POLL_INTERVAL,
            fence_timeout: strata_core::DEFAULT_FENCE_TIMEOUT,
        }
    }

    /// Replace the fence timeout.
    pub fn fence_timeout(mut self, timeout: Duration) -> Self {
        self.fence_timeout = timeout;
        self
    }

    /// Check every field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.upload_buffer_bytes < Self::MIN_UPLOAD_BUFFER_BYTES {
            return Err(ConfigError::RingTooSmall {
                bytes: self.upload_buffer_bytes,
                min: Self::MIN_UPLOAD_BUFFER_BYTES,
            });
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::ZeroQueueCapacity);
        }
        if self.poll_interval.is_zero() {
            return Err(ConfigError::ZeroDuration {
                field: "poll_interval",
            });
        }
        if self.fence_timeout.is_zero() {
            return Err(ConfigError::ZeroDuration {
                field: "fence_timeout",
            });
        }
        Ok(())
    }
}

impl Default for ResidencyConfig {
    fn default() -> Self {
        Self::new(Self::DEFAULT_UPLOAD_BUFFER_BYTES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = ResidencyConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.upload_buffer_bytes, 5 * 1024 * 1024);
    }

    #[test]
    fn tiny_ring_is_rejected() {
        assert_eq!(
            ResidencyConfig::new(100).validate(),
            Err(ConfigError::RingTooSmall {
                bytes: 100,
                min: 1024
            })
        );
    }

    #[test]
    fn zero_durations_are_rejected() {
        let config = ResidencyConfig::default().fence_timeout(Duration::ZERO);
        assert_eq!(
            config.validate(),
            Err(ConfigError::ZeroDuration {
                field: "fence_timeout"
            })
        );
        let mut config = ResidencyConfig::default();
        config.queue_capacity = 0;
        assert_eq!(config.validate(), Err(ConfigError::ZeroQueueCapacity));
    }
}
