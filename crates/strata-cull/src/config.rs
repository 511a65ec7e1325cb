//! Culler configuration parameters.

use std::time::Duration;

use crate::error::CullError;

/// Sizing shared by the culling stages.
///
/// Validated when a [`FrustumCuller`](crate::FrustumCuller) is built.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CullerConfig {
    /// Capacity of the surviving-instance lists.
    ///
    /// Scenes with more instances are rejected at record time with
    /// [`CullError::TooManyInstances`]. Default: 65 536.
    pub max_instances: u32,

    /// Largest index count a single cluster may contribute.
    ///
    /// Default: 192 (64 triangles).
    pub cluster_size: u32,

    /// Bound on the blocking copies of line resizes and pyramid uploads.
    ///
    /// Default: [`strata_core::DEFAULT_FENCE_TIMEOUT`].
    pub fence_timeout: Duration,
}

impl CullerConfig {
    /// Default instance list capacity.
    pub const DEFAULT_MAX_INSTANCES: u32 = 65_536;

    /// Default indexes per cluster.
    pub const DEFAULT_CLUSTER_SIZE: u32 = 192;

    /// A config for up to `max_instances` instances.
    pub fn new(max_instances: u32) -> Self {
        Self {
            max_instances,
            cluster_size: Self::DEFAULT_CLUSTER_SIZE,
            fence_timeout: strata_core::DEFAULT_FENCE_TIMEOUT,
        }
    }

    /// Replace the per-cluster index bound.
    pub fn cluster_size(mut self, cluster_size: u32) -> Self {
        self.cluster_size = cluster_size;
        self
    }

    /// Replace the blocking-copy timeout.
    pub fn fence_timeout(mut self, timeout: Duration) -> Self {
        self.fence_timeout = timeout;
        self
    }

    /// Check the config for internal consistency.
    pub fn validate(&self) -> Result<(), CullError> {
        if self.max_instances == 0 {
            return Err(CullError::InvalidConfig {
                reason: "max_instances must be at least 1".into(),
            });
        }
        if self.cluster_size == 0 {
            return Err(CullError::InvalidConfig {
                reason: "cluster_size must be at least 1".into(),
            });
        }
        if self.fence_timeout.is_zero() {
            return Err(CullError::InvalidConfig {
                reason: "fence_timeout must be non-zero".into(),
            });
        }
        Ok(())
    }
}

impl Default for CullerConfig {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_INSTANCES)
    }
}
