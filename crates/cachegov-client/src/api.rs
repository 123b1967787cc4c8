//! Remote API seam for cache config operations
//!
//! `CacheConfigService` talks to the server through this trait so that
//! tests can substitute an in-memory implementation.

use std::sync::Arc;

use async_trait::async_trait;

use cachegov_api::{CacheConfig, ConfigKey, Model};

use crate::error::Result;

/// Client-side view of the cache config API. All durable storage belongs to
/// the server; every operation here is idempotent on the server side.
#[async_trait]
pub trait CacheConfigApi: Send + Sync {
    /// Fetch all configurations for a model tag.
    async fn list(&self, model: Model) -> Result<Vec<CacheConfig>>;

    /// Create or replace a configuration.
    async fn upsert(&self, config: &CacheConfig) -> Result<()>;

    /// Remove a configuration. Removing an absent key succeeds.
    async fn delete(&self, key: ConfigKey) -> Result<()>;
}

#[async_trait]
impl<T: CacheConfigApi + ?Sized> CacheConfigApi for Arc<T> {
    async fn list(&self, model: Model) -> Result<Vec<CacheConfig>> {
        (**self).list(model).await
    }

    async fn upsert(&self, config: &CacheConfig) -> Result<()> {
        (**self).upsert(config).await
    }

    async fn delete(&self, key: ConfigKey) -> Result<()> {
        (**self).delete(key).await
    }
}
