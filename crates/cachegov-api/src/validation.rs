//! Strategy validation
//!
//! Validates cache invalidation strategies before anything reaches the
//! network. Two entry points exist: [`validate_strategy`] for typed values
//! and [`validate_candidate`] for untyped JSON coming from forms.
//!
//! Validation is pure and reports the first failure found, which is enough
//! for the simple single-field forms this model backs.

use serde_json::Value;
use thiserror::Error;

use crate::model::{Model, Strategy, UnitOfTime};

/// A strategy that failed local validation. These never trigger remote
/// calls and are never retried; the caller must resubmit corrected input.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("'{0}' is not a valid strategy type")]
    UnknownStrategyType(String),

    #[error("required field for '{strategy}' strategy: {field}")]
    MissingField {
        strategy: &'static str,
        field: &'static str,
    },

    #[error("{field} must be a positive integer")]
    NotAPositiveInteger { field: &'static str },

    #[error("'{0}' is not a valid unit of time")]
    InvalidUnit(String),

    #[error("the root configuration cannot inherit")]
    InheritNotAllowedForRoot,

    #[error("strategy candidate must be a JSON object")]
    NotAnObject,
}

/// Validate a typed strategy for the given entity kind.
///
/// The match is exhaustive on purpose: adding a strategy kind forces this
/// function (and every other dispatch site) to be updated at compile time.
pub fn validate_strategy(strategy: &Strategy, model: Model) -> Result<(), ValidationError> {
    match strategy {
        Strategy::Nocache => Ok(()),
        Strategy::Ttl {
            multiplier,
            min_duration,
        } => {
            if *multiplier == 0 {
                return Err(ValidationError::NotAPositiveInteger {
                    field: "multiplier",
                });
            }
            if *min_duration == 0 {
                return Err(ValidationError::NotAPositiveInteger {
                    field: "min_duration",
                });
            }
            Ok(())
        }
        Strategy::Duration { duration, unit: _ } => {
            if *duration == 0 {
                return Err(ValidationError::NotAPositiveInteger { field: "duration" });
            }
            Ok(())
        }
        Strategy::Inherit => {
            if model == Model::Root {
                Err(ValidationError::InheritNotAllowedForRoot)
            } else {
                Ok(())
            }
        }
    }
}

/// Validate an untyped candidate and convert it to a [`Strategy`].
///
/// Field checks happen on the raw JSON so that negative, fractional, or
/// missing numbers produce a field-level error instead of an opaque
/// deserialization failure. Extra fields on `nocache`/`inherit` are
/// tolerated.
pub fn validate_candidate(candidate: &Value, model: Model) -> Result<Strategy, ValidationError> {
    let obj = candidate.as_object().ok_or(ValidationError::NotAnObject)?;

    let tag = obj
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| ValidationError::UnknownStrategyType(String::new()))?;

    let strategy = match tag {
        "nocache" => Strategy::Nocache,
        "inherit" => Strategy::Inherit,
        "ttl" => Strategy::Ttl {
            multiplier: positive_integer(obj, "ttl", "multiplier")?,
            min_duration: positive_integer(obj, "ttl", "min_duration")?,
        },
        "duration" => {
            let duration = positive_integer(obj, "duration", "duration")?;
            let unit = obj
                .get("unit")
                .ok_or(ValidationError::MissingField {
                    strategy: "duration",
                    field: "unit",
                })
                .and_then(parse_unit)?;
            Strategy::Duration { duration, unit }
        }
        other => return Err(ValidationError::UnknownStrategyType(other.to_string())),
    };

    validate_strategy(&strategy, model)?;
    Ok(strategy)
}

fn positive_integer(
    obj: &serde_json::Map<String, Value>,
    strategy: &'static str,
    field: &'static str,
) -> Result<u64, ValidationError> {
    let value = obj
        .get(field)
        .ok_or(ValidationError::MissingField { strategy, field })?;
    match value.as_u64() {
        Some(n) if n > 0 => Ok(n),
        _ => Err(ValidationError::NotAPositiveInteger { field }),
    }
}

fn parse_unit(value: &Value) -> Result<UnitOfTime, ValidationError> {
    let raw = value.as_str().unwrap_or_default();
    serde_json::from_value::<UnitOfTime>(Value::String(raw.to_string()))
        .map_err(|_| ValidationError::InvalidUnit(raw.to_string()))
}
