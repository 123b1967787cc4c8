//! In-memory config store with inheritance and optimistic mutations
//!
//! The store mirrors the server's cache configurations, keyed by
//! `(model, model_id)`. Entities without an explicit entry inherit the root
//! default; the synthetic root itself falls back to `nocache` when absent.
//!
//! Optimistic edits are explicit two-state values: a mutation starts
//! `Pending` holding its rollback target, then settles to `Confirmed` or is
//! rolled back. Every mutation bumps a per-key generation, and settling is
//! generation-guarded so the rollback of a superseded edit never clobbers a
//! newer one.

use dashmap::DashMap;
use tracing::debug;

use cachegov_api::{CacheConfig, ConfigKey, Strategy};

/// State of a stored configuration entry.
///
/// `Pending { config: None, .. }` is an optimistic removal: the override is
/// gone locally but the server has not confirmed yet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigState {
    Confirmed(CacheConfig),
    Pending {
        config: Option<CacheConfig>,
        rollback_to: Option<CacheConfig>,
    },
}

impl ConfigState {
    /// The value a reader currently sees, pending or not.
    fn current(&self) -> Option<&CacheConfig> {
        match self {
            ConfigState::Confirmed(config) => Some(config),
            ConfigState::Pending { config, .. } => config.as_ref(),
        }
    }

    /// The last confirmed value, used as the rollback target of the next
    /// optimistic edit layered on top of this one.
    fn last_confirmed(&self) -> Option<CacheConfig> {
        match self {
            ConfigState::Confirmed(config) => Some(config.clone()),
            ConfigState::Pending { rollback_to, .. } => rollback_to.clone(),
        }
    }
}

/// In-memory collection of cache configurations.
///
/// Mutations are designed for a single logical writer (UI event handlers);
/// the map itself serializes individual operations when shared.
#[derive(Default)]
pub struct ConfigStore {
    entries: DashMap<ConfigKey, ConfigState>,
    generations: DashMap<ConfigKey, u64>,
}

impl ConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the stored configuration for a key, if any.
    pub fn get(&self, key: ConfigKey) -> Option<CacheConfig> {
        self.entries
            .get(&key)
            .and_then(|state| state.current().cloned())
    }

    /// Resolve the effective strategy for a key. Never fails.
    ///
    /// A non-root entity with no entry, or whose entry is `inherit`, uses
    /// the root's resolved strategy. Root falls back to `nocache` when
    /// absent and never resolves to `inherit`.
    pub fn resolve(&self, key: ConfigKey) -> Strategy {
        if key.is_root() {
            return self.root_strategy();
        }
        match self.get(key).map(|config| config.strategy) {
            Some(Strategy::Inherit) | None => self.root_strategy(),
            Some(strategy) => strategy,
        }
    }

    fn root_strategy(&self) -> Strategy {
        match self.get(ConfigKey::root()).map(|config| config.strategy) {
            // Validation rejects inherit at root; an entry that slipped past
            // it must still never resolve to inherit.
            Some(Strategy::Inherit) | None => Strategy::Nocache,
            Some(strategy) => strategy,
        }
    }

    /// Insert or replace a configuration as confirmed state.
    pub fn upsert(&self, config: CacheConfig) {
        self.entries
            .insert(config.key(), ConfigState::Confirmed(config));
    }

    /// Remove a configuration. No-op when absent.
    pub fn remove(&self, key: ConfigKey) {
        self.entries.remove(&key);
    }

    /// Immutable copy of all currently visible configurations.
    pub fn snapshot(&self) -> Vec<CacheConfig> {
        self.entries
            .iter()
            .filter_map(|entry| entry.value().current().cloned())
            .collect()
    }

    /// Current edit generation for a key (0 if never edited).
    pub fn generation(&self, key: ConfigKey) -> u64 {
        self.generations.get(&key).map(|g| *g).unwrap_or(0)
    }

    fn bump_generation(&self, key: ConfigKey) -> u64 {
        let mut entry = self.generations.entry(key).or_insert(0);
        *entry += 1;
        *entry
    }

    /// Apply an upsert optimistically. Returns the edit's generation, to be
    /// passed back to [`ConfigStore::confirm`] or [`ConfigStore::rollback`].
    pub fn begin_upsert(&self, config: CacheConfig) -> u64 {
        let key = config.key();
        let rollback_to = self
            .entries
            .get(&key)
            .and_then(|state| state.last_confirmed());
        self.entries.insert(
            key,
            ConfigState::Pending {
                config: Some(config),
                rollback_to,
            },
        );
        self.bump_generation(key)
    }

    /// Apply a removal optimistically. Returns the edit's generation.
    pub fn begin_remove(&self, key: ConfigKey) -> u64 {
        let rollback_to = self
            .entries
            .get(&key)
            .and_then(|state| state.last_confirmed());
        self.entries.insert(
            key,
            ConfigState::Pending {
                config: None,
                rollback_to,
            },
        );
        self.bump_generation(key)
    }

    /// Settle a pending edit as confirmed. Ignored (returns `false`) when a
    /// newer edit has since been applied to the key.
    pub fn confirm(&self, key: ConfigKey, generation: u64) -> bool {
        if self.generation(key) != generation {
            debug!("Skipping confirm for superseded edit on {}", key);
            return false;
        }
        let Some((_, state)) = self.entries.remove(&key) else {
            return false;
        };
        match state {
            ConfigState::Pending {
                config: Some(config),
                ..
            } => {
                self.entries.insert(key, ConfigState::Confirmed(config));
            }
            // Confirmed removal: the entry stays gone.
            ConfigState::Pending { config: None, .. } => {}
            confirmed @ ConfigState::Confirmed(_) => {
                self.entries.insert(key, confirmed);
            }
        }
        true
    }

    /// Roll a pending edit back to its pre-edit value. Ignored (returns
    /// `false`) when a newer edit has since been applied to the key, so a
    /// stale failure cannot clobber the newer state.
    pub fn rollback(&self, key: ConfigKey, generation: u64) -> bool {
        if self.generation(key) != generation {
            debug!("Skipping rollback for superseded edit on {}", key);
            return false;
        }
        let Some((_, state)) = self.entries.remove(&key) else {
            return false;
        };
        match state {
            ConfigState::Pending {
                rollback_to: Some(previous),
                ..
            } => {
                self.entries.insert(key, ConfigState::Confirmed(previous));
            }
            // No pre-edit value: the key had no confirmed entry.
            ConfigState::Pending {
                rollback_to: None, ..
            } => {}
            confirmed @ ConfigState::Confirmed(_) => {
                self.entries.insert(key, confirmed);
            }
        }
        true
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cachegov_api::{Model, UnitOfTime};

    fn ttl(multiplier: u64, min_duration: u64) -> Strategy {
        Strategy::Ttl {
            multiplier,
            min_duration,
        }
    }

    fn db_config(id: i64, strategy: Strategy) -> CacheConfig {
        CacheConfig::new(Model::Database, id, strategy)
    }

    fn root_config(strategy: Strategy) -> CacheConfig {
        CacheConfig::new(Model::Root, 0, strategy)
    }

    #[test]
    fn test_upsert_then_resolve() {
        let store = ConfigStore::new();
        let config = db_config(1, ttl(3, 60));
        store.upsert(config.clone());

        assert_eq!(store.get(config.key()), Some(config.clone()));
        assert_eq!(store.resolve(config.key()), ttl(3, 60));
    }

    #[test]
    fn test_resolve_falls_back_to_root() {
        let store = ConfigStore::new();
        store.upsert(root_config(Strategy::Duration {
            duration: 12,
            unit: UnitOfTime::Hours,
        }));

        // No entry for this database: inherits root.
        let key = ConfigKey::new(Model::Database, 5);
        assert_eq!(
            store.resolve(key),
            Strategy::Duration {
                duration: 12,
                unit: UnitOfTime::Hours
            }
        );

        // Explicit inherit entry: also resolves to root.
        store.upsert(db_config(5, Strategy::Inherit));
        assert_eq!(
            store.resolve(key),
            Strategy::Duration {
                duration: 12,
                unit: UnitOfTime::Hours
            }
        );
    }

    #[test]
    fn test_resolve_without_root_is_nocache() {
        let store = ConfigStore::new();
        assert_eq!(store.resolve(ConfigKey::root()), Strategy::Nocache);
        assert_eq!(
            store.resolve(ConfigKey::new(Model::Dashboard, 9)),
            Strategy::Nocache
        );
    }

    #[test]
    fn test_root_never_resolves_to_inherit() {
        let store = ConfigStore::new();
        // Bypasses validation on purpose: the store must still not surface it.
        store.upsert(root_config(Strategy::Inherit));
        assert_eq!(store.resolve(ConfigKey::root()), Strategy::Nocache);
    }

    #[test]
    fn test_remove_absent_key_is_noop() {
        let store = ConfigStore::new();
        store.remove(ConfigKey::new(Model::Question, 42));
        assert!(store.is_empty());
    }

    #[test]
    fn test_upsert_replaces_existing() {
        let store = ConfigStore::new();
        store.upsert(db_config(1, Strategy::Nocache));
        store.upsert(db_config(1, ttl(2, 30)));
        assert_eq!(store.len(), 1);
        assert_eq!(store.resolve(ConfigKey::new(Model::Database, 1)), ttl(2, 30));
    }

    #[test]
    fn test_snapshot_is_detached() {
        let store = ConfigStore::new();
        store.upsert(db_config(1, Strategy::Nocache));
        let snapshot = store.snapshot();
        store.upsert(db_config(2, ttl(1, 1)));
        assert_eq!(snapshot.len(), 1);
    }

    #[test]
    fn test_optimistic_upsert_confirm() {
        let store = ConfigStore::new();
        let key = ConfigKey::new(Model::Database, 1);
        let generation = store.begin_upsert(db_config(1, ttl(3, 60)));

        // Pending value is already visible.
        assert_eq!(store.resolve(key), ttl(3, 60));

        assert!(store.confirm(key, generation));
        assert_eq!(store.resolve(key), ttl(3, 60));
    }

    #[test]
    fn test_optimistic_upsert_rollback() {
        let store = ConfigStore::new();
        let key = ConfigKey::new(Model::Database, 1);
        store.upsert(db_config(1, Strategy::Nocache));

        let generation = store.begin_upsert(db_config(1, ttl(3, 60)));
        assert_eq!(store.resolve(key), ttl(3, 60));

        assert!(store.rollback(key, generation));
        assert_eq!(store.resolve(key), Strategy::Nocache);
    }

    #[test]
    fn test_rollback_with_no_prior_entry_removes() {
        let store = ConfigStore::new();
        let key = ConfigKey::new(Model::Database, 1);
        let generation = store.begin_upsert(db_config(1, ttl(3, 60)));
        assert!(store.rollback(key, generation));
        assert_eq!(store.get(key), None);
    }

    #[test]
    fn test_optimistic_remove() {
        let store = ConfigStore::new();
        let key = ConfigKey::new(Model::Database, 1);
        store.upsert(db_config(1, ttl(3, 60)));

        let generation = store.begin_remove(key);
        assert_eq!(store.get(key), None);

        assert!(store.rollback(key, generation));
        assert_eq!(store.resolve(key), ttl(3, 60));

        let generation = store.begin_remove(key);
        assert!(store.confirm(key, generation));
        assert_eq!(store.get(key), None);
    }

    #[test]
    fn test_stale_rollback_does_not_clobber_newer_edit() {
        // The legacy reference behavior reverted blindly here, losing the
        // newer edit; the generation guard must not.
        let store = ConfigStore::new();
        let key = ConfigKey::new(Model::Database, 1);
        store.upsert(db_config(1, Strategy::Nocache));

        let first = store.begin_upsert(db_config(1, ttl(3, 60)));
        let second = store.begin_upsert(db_config(1, ttl(5, 10)));

        // The first write fails remotely after the second was enqueued.
        assert!(!store.rollback(key, first));
        assert_eq!(store.resolve(key), ttl(5, 10));

        // The second write succeeds.
        assert!(store.confirm(key, second));
        assert_eq!(store.resolve(key), ttl(5, 10));
    }

    #[test]
    fn test_stale_confirm_is_ignored() {
        let store = ConfigStore::new();
        let key = ConfigKey::new(Model::Database, 1);

        let first = store.begin_upsert(db_config(1, ttl(3, 60)));
        let second = store.begin_remove(key);

        assert!(!store.confirm(key, first));
        assert_eq!(store.get(key), None);

        assert!(store.confirm(key, second));
        assert_eq!(store.get(key), None);
    }
}
