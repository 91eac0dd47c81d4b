use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::classifier::ClassifierError;

/// Thread settings for CPU-bound training work.
#[derive(Debug, Clone, Default)]
pub struct RuntimeConfig {
    /// Worker threads; 0 lets rayon decide (one per logical core)
    pub num_threads: usize,
}

impl RuntimeConfig {
    pub fn with_threads(num_threads: usize) -> Self {
        Self { num_threads }
    }
}

/// Builds the rayon pool training runs are installed into.
pub fn create_thread_pool(config: &RuntimeConfig) -> Result<ThreadPool, ClassifierError> {
    let mut builder = ThreadPoolBuilder::new().thread_name(|i| format!("txcat-train-{}", i));

    // Configure threading
    if config.num_threads > 0 {
        builder = builder.num_threads(config.num_threads);
    }

    builder
        .build()
        .map_err(|e| ClassifierError::Training(format!("Failed to build thread pool: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thread_pool_config() {
        let pool = create_thread_pool(&RuntimeConfig::with_threads(2)).unwrap();
        assert_eq!(pool.current_num_threads(), 2);
    }

    #[test]
    fn test_default_thread_pool() {
        let pool = create_thread_pool(&RuntimeConfig::default()).unwrap();
        assert!(pool.current_num_threads() >= 1);
    }
}
