use std::time::Duration;

use crate::{PoolError, Result};

/// Sizing and lifetime configuration for a pool.
///
/// Immutable after construction. Validated when the pool is built:
/// `0 < core_pool_size <= max_pool_size` and `queue_capacity > 0`.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Number of workers kept alive regardless of idleness.
    pub core_pool_size: usize,
    /// Upper bound on live workers.
    pub max_pool_size: usize,
    /// How long a worker above the core allotment waits for a task
    /// before retiring.
    pub keep_alive: Duration,
    /// Capacity of each worker's task queue. Fixed at worker creation,
    /// never resized.
    pub queue_capacity: usize,
    /// Idle workers to hold in reserve to absorb sudden load.
    pub min_spare_threads: usize,
}

impl PoolConfig {
    /// Creates a configuration from the five pool parameters.
    pub fn new(
        core_pool_size: usize,
        max_pool_size: usize,
        keep_alive: Duration,
        queue_capacity: usize,
        min_spare_threads: usize,
    ) -> Self {
        PoolConfig {
            core_pool_size,
            max_pool_size,
            keep_alive,
            queue_capacity,
            min_spare_threads,
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.core_pool_size == 0 {
            return Err(PoolError::InvalidConfig(
                "core_pool_size must be at least 1".to_owned(),
            ));
        }
        if self.max_pool_size < self.core_pool_size {
            return Err(PoolError::InvalidConfig(format!(
                "max_pool_size ({}) is below core_pool_size ({})",
                self.max_pool_size, self.core_pool_size
            )));
        }
        if self.queue_capacity == 0 {
            return Err(PoolError::InvalidConfig(
                "queue_capacity must be at least 1".to_owned(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(core: usize, max: usize, capacity: usize) -> PoolConfig {
        PoolConfig::new(core, max, Duration::from_secs(5), capacity, 1)
    }

    #[test]
    fn accepts_valid_configuration() {
        assert!(config(2, 4, 5).validate().is_ok());
        assert!(config(1, 1, 1).validate().is_ok());
    }

    #[test]
    fn rejects_zero_core_size() {
        assert!(config(0, 4, 5).validate().is_err());
    }

    #[test]
    fn rejects_max_below_core() {
        assert!(config(4, 2, 5).validate().is_err());
    }

    #[test]
    fn rejects_zero_queue_capacity() {
        assert!(config(2, 4, 0).validate().is_err());
    }
}
