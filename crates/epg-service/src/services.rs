//! Wires the cache store, the worker pool and the coordinator together.
//!
//! [`EpgServices::new`] creates all of these according to the provided [`Config`], and is the
//! main entry point for embedding the service. The [`Fetcher`] is supplied by the embedder, as
//! retrieving schedules from their remote sources is outside the scope of this crate.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::runtime::Handle;

use crate::caching::{CacheStore, FsCacheStore, MemoryCacheStore};
use crate::config::Config;
use crate::coordinator::{ResolveError, TaskCoordinator};
use crate::fetch::Fetcher;
use crate::metrics;
use crate::pool::WorkerPool;
use crate::types::{Schedule, TaskKey};

/// The assembled service.
#[derive(Clone, Debug)]
pub struct EpgServices {
    config: Arc<Config>,
    coordinator: TaskCoordinator,
    pool: WorkerPool,
}

impl EpgServices {
    /// Creates the service, running fetches on `runtime`.
    ///
    /// Schedules are persisted to `cache_dir` if one is configured, and kept in memory otherwise.
    /// Metrics are reported to statsd if a statsd host is configured.
    pub fn new(config: Config, fetcher: Arc<dyn Fetcher>, runtime: Handle) -> Result<Self> {
        if let Some(statsd) = &config.metrics.statsd {
            metrics::configure_statsd(
                &config.metrics.prefix,
                statsd.as_str(),
                config.metrics.custom_tags.clone(),
            )?;
        }

        let store: Arc<dyn CacheStore> = match &config.cache_dir {
            Some(cache_dir) => {
                let store = FsCacheStore::open(cache_dir).with_context(|| {
                    format!("failed to open cache store at {}", cache_dir.display())
                })?;
                Arc::new(store)
            }
            None => Arc::new(MemoryCacheStore::new(config.in_memory_capacity)),
        };

        let pool = WorkerPool::new(config.worker_pool.effective_size(), runtime);
        tracing::info!(
            workers = pool.size(),
            persistent = config.cache_dir.is_some(),
            "Starting EPG services",
        );

        let coordinator = TaskCoordinator::new(store, fetcher, pool.clone(), config.fetch_timeout);

        Ok(Self {
            config: Arc::new(config),
            coordinator,
            pool,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn coordinator(&self) -> &TaskCoordinator {
        &self.coordinator
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Shorthand for [`TaskCoordinator::resolve`].
    pub async fn resolve(&self, key: TaskKey) -> Result<Schedule, ResolveError> {
        self.coordinator.resolve(key).await
    }
}
