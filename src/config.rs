//! Registry configuration.

/// Execution settings of a [`BankRegistry`](crate::BankRegistry).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize), serde(default))]
pub struct RegistryConfig {
    /// Size of a dedicated worker pool. `None` uses rayon's global pool.
    pub worker_threads: Option<usize>,
    /// Run loads, diffs and merges in parallel. When false everything runs
    /// on the caller's thread.
    pub parallel: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            worker_threads: None,
            parallel: true,
        }
    }
}

impl RegistryConfig {
    /// Use a dedicated pool of `threads` workers.
    #[must_use]
    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = Some(threads);
        self
    }

    /// Enable or disable parallel execution.
    #[must_use]
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Run everything on the caller's thread.
    #[must_use]
    pub fn sequential() -> Self {
        Self::default().with_parallel(false)
    }

    /// Build the dedicated pool, if one is configured and execution is parallel.
    ///
    /// A pool that fails to start falls back to the global one.
    pub(crate) fn build_pool(&self) -> Option<rayon::ThreadPool> {
        let threads = self.worker_threads.filter(|_| self.parallel)?;
        match rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|index| format!("param-diff-{index}"))
            .build()
        {
            Ok(pool) => Some(pool),
            Err(err) => {
                tracing::warn!(threads, error = %err, "worker pool unavailable, using the global pool");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RegistryConfig::default();
        assert!(config.parallel);
        assert_eq!(config.worker_threads, None);
        assert!(config.build_pool().is_none());
    }

    #[test]
    fn test_builders() {
        let config = RegistryConfig::default().with_worker_threads(2);
        assert_eq!(config.worker_threads, Some(2));
        assert_eq!(config.build_pool().map(|pool| pool.current_num_threads()), Some(2));
        assert!(RegistryConfig::sequential().with_worker_threads(2).build_pool().is_none());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_serde_fills_defaults() {
        let config: RegistryConfig = serde_json::from_str(r#"{"worker_threads": 3}"#).unwrap();
        assert_eq!(config, RegistryConfig::default().with_worker_threads(3));
    }
}
