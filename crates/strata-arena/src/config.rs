//! Arena configuration parameters.

use std::time::Duration;

use crate::error::ArenaError;

/// Configuration for a [`ModelResourceAllocator`](crate::ModelResourceAllocator).
///
/// Validated at construction; immutable afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArenaConfig {
    /// Element capacity the arena starts with.
    ///
    /// Default: 1024.
    pub initial_elements: u64,

    /// Architectural maximum capacity in elements.
    ///
    /// Growth never exceeds this; a request that cannot fit under it fails
    /// with [`ArenaError::OutOfGpuMemory`]. Default: `u32::MAX`, the
    /// largest index a shader can address.
    pub max_elements: u64,

    /// Bound on the blocking wait for a growth copy.
    ///
    /// Default: [`strata_core::DEFAULT_FENCE_TIMEOUT`].
    pub fence_timeout: Duration,
}

impl ArenaConfig {
    /// Default initial capacity.
    pub const DEFAULT_INITIAL_ELEMENTS: u64 = 1024;

    /// Default architectural maximum.
    pub const DEFAULT_MAX_ELEMENTS: u64 = u32::MAX as u64;

    /// A config starting at `initial_elements` with default limits.
    pub fn new(initial_elements: u64) -> Self {
        Self {
            initial_elements,
            max_elements: Self::DEFAULT_MAX_ELEMENTS,
            fence_timeout: strata_core::DEFAULT_FENCE_TIMEOUT,
        }
    }

    /// Replace the architectural maximum.
    pub fn max_elements(mut self, max_elements: u64) -> Self {
        self.max_elements = max_elements;
        self
    }

    /// Check the config for internal consistency.
    pub fn validate(&self) -> Result<(), ArenaError> {
        if self.max_elements == 0 {
            return Err(ArenaError::InvalidConfig {
                reason: "max_elements must be at least 1".into(),
            });
        }
        if self.initial_elements > self.max_elements {
            return Err(ArenaError::InvalidConfig {
                reason: format!(
                    "initial_elements ({}) exceeds max_elements ({})",
                    self.initial_elements, self.max_elements
                ),
            });
        }
        if self.fence_timeout.is_zero() {
            return Err(ArenaError::InvalidConfig {
                reason: "fence_timeout must be non-zero".into(),
            });
        }
        Ok(())
    }
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self::new(Self::DEFAULT_INITIAL_ELEMENTS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(ArenaConfig::default().validate().is_ok());
        assert_eq!(ArenaConfig::default().max_elements, u64::from(u32::MAX));
    }

    #[test]
    fn initial_above_max_is_rejected() {
        let config = ArenaConfig::new(100).max_elements(10);
        assert!(matches!(
            config.validate(),
            Err(ArenaError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let mut config = ArenaConfig::new(0);
        config.fence_timeout = Duration::ZERO;
        assert!(config.validate().is_err());
    }
}
