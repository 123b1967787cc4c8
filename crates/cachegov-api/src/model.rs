//! Cache configuration models
//!
//! Defines the governed entity kinds, the cache invalidation strategies, and
//! the configuration records exchanged with the server.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The kind of cacheable object a configuration concerns.
///
/// `Root` is the synthetic entity holding the default strategy that every
/// other entity inherits unless it carries an explicit override.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Model {
    Root,
    Database,
    Collection,
    Dashboard,
    Question,
}

impl Model {
    /// The wire tag used in query strings and JSON payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            Model::Root => "root",
            Model::Database => "database",
            Model::Collection => "collection",
            Model::Dashboard => "dashboard",
            Model::Question => "question",
        }
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Model {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "root" => Ok(Model::Root),
            "database" => Ok(Model::Database),
            "collection" => Ok(Model::Collection),
            "dashboard" => Ok(Model::Dashboard),
            "question" => Ok(Model::Question),
            other => Err(format!("unknown model: {other}")),
        }
    }
}

/// Units accepted by the `duration` strategy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitOfTime {
    Hours,
    Minutes,
    Seconds,
    Days,
}

impl UnitOfTime {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitOfTime::Hours => "hours",
            UnitOfTime::Minutes => "minutes",
            UnitOfTime::Seconds => "seconds",
            UnitOfTime::Days => "days",
        }
    }
}

impl fmt::Display for UnitOfTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A cache invalidation strategy.
///
/// Serialized as a tagged object, e.g.
/// `{"type": "ttl", "multiplier": 10, "min_duration": 60}`. Numeric fields
/// are unsigned: "positive integer" means nonzero, and negative values are
/// rejected at the candidate boundary (see [`crate::validation`]).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Strategy {
    /// Do not cache results.
    Nocache,
    /// Invalidate when the time-to-live expires. The TTL of a cached result
    /// is its average query duration times `multiplier`; only queries slower
    /// than `min_duration` seconds are cached at all.
    Ttl { multiplier: u64, min_duration: u64 },
    /// Invalidate after a fixed duration.
    Duration { duration: u64, unit: UnitOfTime },
    /// Use the resolved strategy of the root default. Only meaningful for
    /// non-root entities; selecting it deletes the entity's override.
    Inherit,
}

/// Discriminant-only view of [`Strategy`], used for editor defaults and
/// labels where no field values exist yet.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Nocache,
    Ttl,
    Duration,
    Inherit,
}

impl Strategy {
    pub fn kind(&self) -> StrategyKind {
        match self {
            Strategy::Nocache => StrategyKind::Nocache,
            Strategy::Ttl { .. } => StrategyKind::Ttl,
            Strategy::Duration { .. } => StrategyKind::Duration,
            Strategy::Inherit => StrategyKind::Inherit,
        }
    }

    /// Pre-filled field values shown when an editor switches to a strategy
    /// kind before the user has typed anything.
    pub fn default_for(kind: StrategyKind) -> Strategy {
        match kind {
            StrategyKind::Nocache => Strategy::Nocache,
            StrategyKind::Ttl => Strategy::Ttl {
                multiplier: 10,
                min_duration: 60,
            },
            StrategyKind::Duration => Strategy::Duration {
                duration: 24,
                unit: UnitOfTime::Hours,
            },
            StrategyKind::Inherit => Strategy::Inherit,
        }
    }

    /// Human-readable description of the strategy.
    pub fn label(&self) -> &'static str {
        match self {
            Strategy::Nocache => "Don't cache results",
            Strategy::Ttl { .. } => "When the time-to-live (TTL) expires",
            Strategy::Duration { .. } => "After a specific number of hours",
            Strategy::Inherit => "Inherit",
        }
    }

    /// Compact label for list rows; falls back to [`Strategy::label`].
    pub fn short_label(&self) -> &'static str {
        match self {
            Strategy::Ttl { .. } => "TTL expiration",
            other => other.label(),
        }
    }
}

/// Label shown next to the root configuration in editors.
pub const ROOT_CONFIG_LABEL: &str = "Default for all databases";

/// Identifies the configuration a write applies to: the target key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConfigKey {
    pub model: Model,
    pub model_id: i64,
}

impl ConfigKey {
    pub fn new(model: Model, model_id: i64) -> Self {
        Self { model, model_id }
    }

    /// The synthetic root entry's key. `model_id` is meaningless for root
    /// and fixed at 0 by convention.
    pub fn root() -> Self {
        Self {
            model: Model::Root,
            model_id: 0,
        }
    }

    pub fn is_root(&self) -> bool {
        self.model == Model::Root
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.model, self.model_id)
    }
}

/// A stored cache configuration: one governed entity and its policy.
///
/// At most one configuration exists per key. A root configuration always
/// conceptually exists; when the server has none, the effective root
/// strategy is [`Strategy::Nocache`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    pub model: Model,
    pub model_id: i64,
    pub strategy: Strategy,
}

impl CacheConfig {
    pub fn new(model: Model, model_id: i64, strategy: Strategy) -> Self {
        Self {
            model,
            model_id,
            strategy,
        }
    }

    pub fn key(&self) -> ConfigKey {
        ConfigKey::new(self.model, self.model_id)
    }
}

/// Response body of the LIST endpoint.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ListConfigsResponse {
    pub items: Vec<CacheConfig>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_model_round_trip() {
        for model in [
            Model::Root,
            Model::Database,
            Model::Collection,
            Model::Dashboard,
            Model::Question,
        ] {
            assert_eq!(model.as_str().parse::<Model>().unwrap(), model);
        }
        assert!("table".parse::<Model>().is_err());
    }

    #[test]
    fn test_strategy_serialization() {
        let strategy = Strategy::Ttl {
            multiplier: 3,
            min_duration: 60,
        };
        let value = serde_json::to_value(&strategy).unwrap();
        assert_eq!(
            value,
            json!({"type": "ttl", "multiplier": 3, "min_duration": 60})
        );

        let strategy = Strategy::Duration {
            duration: 5,
            unit: UnitOfTime::Hours,
        };
        let value = serde_json::to_value(&strategy).unwrap();
        assert_eq!(
            value,
            json!({"type": "duration", "duration": 5, "unit": "hours"})
        );

        let value = serde_json::to_value(Strategy::Nocache).unwrap();
        assert_eq!(value, json!({"type": "nocache"}));
    }

    #[test]
    fn test_strategy_deserialization() {
        let strategy: Strategy =
            serde_json::from_value(json!({"type": "ttl", "multiplier": 10, "min_duration": 1}))
                .unwrap();
        assert_eq!(
            strategy,
            Strategy::Ttl {
                multiplier: 10,
                min_duration: 1
            }
        );

        let strategy: Strategy = serde_json::from_value(json!({"type": "inherit"})).unwrap();
        assert_eq!(strategy, Strategy::Inherit);
    }

    #[test]
    fn test_config_key() {
        let config = CacheConfig::new(Model::Database, 7, Strategy::Nocache);
        assert_eq!(config.key(), ConfigKey::new(Model::Database, 7));
        assert_eq!(config.key().to_string(), "database:7");
        assert!(ConfigKey::root().is_root());
        assert_eq!(ConfigKey::root().model_id, 0);
    }

    #[test]
    fn test_strategy_labels() {
        let ttl = Strategy::default_for(StrategyKind::Ttl);
        assert_eq!(ttl.short_label(), "TTL expiration");
        assert_eq!(Strategy::Nocache.short_label(), Strategy::Nocache.label());
    }

    #[test]
    fn test_list_response_shape() {
        let resp: ListConfigsResponse = serde_json::from_value(json!({
            "items": [
                {"model": "root", "model_id": 0, "strategy": {"type": "nocache"}},
                {"model": "database", "model_id": 3,
                 "strategy": {"type": "duration", "duration": 12, "unit": "hours"}},
            ]
        }))
        .unwrap();
        assert_eq!(resp.items.len(), 2);
        assert_eq!(resp.items[0].model, Model::Root);
    }
}
