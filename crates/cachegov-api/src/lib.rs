//! Cachegov API - model and validation for cache invalidation policies
//!
//! This crate provides:
//! - The cache configuration model: governed entity kinds, invalidation
//!   strategies, and the `(model, model_id)` keys that identify overrides
//! - Strategy validation for both typed strategies and untyped candidates
//!   coming from forms or JSON payloads

pub mod model;
pub mod validation;

// Re-export commonly used types
pub use model::*;
pub use validation::*;
