//! Cache config service
//!
//! `CacheConfigService` is the entry point of the SDK: it owns the local
//! [`ConfigStore`], the [`RequestSequencer`], and the remote API handle, and
//! runs the edit pipeline: validate, apply optimistically, sequence the
//! remote write, confirm or roll back on settle.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use cachegov_api::{CacheConfig, ConfigKey, Model, Strategy, validate_candidate, validate_strategy};

use crate::api::CacheConfigApi;
use crate::error::{ClientError, Result};
use crate::sequencer::RequestSequencer;
use crate::store::ConfigStore;

/// Notified when a sequenced remote write fails and the local state has been
/// rolled back. Implementations surface a transient, user-visible error.
pub trait WriteErrorListener: Send + Sync {
    fn on_write_error(&self, key: ConfigKey, error: &ClientError);
}

/// Service binding the local config store to the remote cache config API.
pub struct CacheConfigService<A: CacheConfigApi + 'static> {
    api: Arc<A>,
    store: Arc<ConfigStore>,
    sequencer: RequestSequencer,
    debounce_window: Duration,
    error_listeners: Arc<RwLock<Vec<Arc<dyn WriteErrorListener>>>>,
}

impl<A: CacheConfigApi + 'static> CacheConfigService<A> {
    /// Create a service with no write debouncing.
    pub fn new(api: A) -> Self {
        Self::with_debounce(api, Duration::ZERO)
    }

    /// Create a service that coalesces rapid edits to the same target within
    /// `window` before sending. Debouncing is an optimization only; ordering
    /// guarantees hold for any window.
    pub fn with_debounce(api: A, window: Duration) -> Self {
        Self {
            api: Arc::new(api),
            store: Arc::new(ConfigStore::new()),
            sequencer: RequestSequencer::new(),
            debounce_window: window,
            error_listeners: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Register a listener for failed remote writes.
    pub fn add_error_listener(&self, listener: Arc<dyn WriteErrorListener>) {
        self.error_listeners.write().push(listener);
    }

    /// Fetch the root and per-database configurations and populate the
    /// store. A read failure is a blocking error: nothing is kept.
    pub async fn load(&self) -> Result<()> {
        let mut configs = self.api.list(Model::Root).await?;
        configs.extend(self.api.list(Model::Database).await?);

        for config in configs {
            self.store.upsert(config);
        }
        info!("Loaded {} cache configurations", self.store.len());
        Ok(())
    }

    /// Get the stored configuration for a target, if any.
    pub fn get(&self, model: Model, model_id: i64) -> Option<CacheConfig> {
        self.store.get(ConfigKey::new(model, model_id))
    }

    /// Resolve the effective strategy for a target.
    pub fn resolve(&self, model: Model, model_id: i64) -> Strategy {
        self.store.resolve(ConfigKey::new(model, model_id))
    }

    /// Copy of all currently visible configurations.
    pub fn snapshot(&self) -> Vec<CacheConfig> {
        self.store.snapshot()
    }

    /// Set or clear a target's strategy.
    ///
    /// `None` (or `Some(Inherit)` for a non-root target) removes the
    /// override so the target inherits the root default. Validation failures
    /// are returned synchronously and nothing is sent; remote failures
    /// arrive through the registered error listeners after rollback.
    pub fn set_strategy(
        &self,
        model: Model,
        model_id: i64,
        strategy: Option<Strategy>,
    ) -> Result<()> {
        let key = ConfigKey::new(model, model_id);

        match strategy {
            Some(strategy) => {
                validate_strategy(&strategy, model)?;
                if strategy == Strategy::Inherit {
                    // Selecting inherit removes the override.
                    self.submit_remove(key)
                } else {
                    self.submit_upsert(CacheConfig::new(model, model_id, strategy))
                }
            }
            None if key.is_root() => Err(ClientError::RootDeleteForbidden),
            None => self.submit_remove(key),
        }
    }

    /// Validate an untyped candidate (as produced by a form) and apply it.
    pub fn set_candidate(
        &self,
        model: Model,
        model_id: i64,
        candidate: &serde_json::Value,
    ) -> Result<()> {
        let strategy = validate_candidate(candidate, model)?;
        self.set_strategy(model, model_id, Some(strategy))
    }

    /// Replace the root default strategy.
    pub fn set_root_strategy(&self, strategy: Strategy) -> Result<()> {
        self.set_strategy(Model::Root, 0, Some(strategy))
    }

    fn submit_upsert(&self, config: CacheConfig) -> Result<()> {
        let key = config.key();
        let generation = self.store.begin_upsert(config.clone());
        debug!("Optimistic upsert for {} (generation {})", key, generation);

        let api = self.api.clone();
        self.sequencer.enqueue_debounced(
            key,
            self.debounce_window,
            move || async move { api.upsert(&config).await },
            self.settle_callback(key, generation),
        );
        Ok(())
    }

    fn submit_remove(&self, key: ConfigKey) -> Result<()> {
        let generation = self.store.begin_remove(key);
        debug!("Optimistic remove for {} (generation {})", key, generation);

        let api = self.api.clone();
        self.sequencer.enqueue_debounced(
            key,
            self.debounce_window,
            move || async move { api.delete(key).await },
            self.settle_callback(key, generation),
        );
        Ok(())
    }

    fn settle_callback(
        &self,
        key: ConfigKey,
        generation: u64,
    ) -> Box<dyn FnOnce(Result<()>) + Send> {
        let store = self.store.clone();
        let listeners = self.error_listeners.clone();
        Box::new(move |result| match result {
            Ok(()) => {
                store.confirm(key, generation);
            }
            Err(error) => {
                warn!("Remote write for {} failed: {}", key, error);
                store.rollback(key, generation);
                for listener in listeners.read().iter() {
                    listener.on_write_error(key, &error);
                }
            }
        })
    }
}
