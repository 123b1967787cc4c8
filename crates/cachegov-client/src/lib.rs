//! Cachegov Client - Rust SDK for cache invalidation policy management
//!
//! This crate provides:
//! - HTTP client with failover and retry for the cache config API
//! - In-memory config store with root-default inheritance and
//!   optimistic update/rollback
//! - Per-target request sequencer guaranteeing in-order remote writes
//! - `CacheConfigService` tying validation, store, and sequencer together

pub mod api;
pub mod error;
pub mod http;
pub mod sequencer;
pub mod service;
pub mod store;

pub use api::CacheConfigApi;
pub use error::{ClientError, Result};
pub use http::{CacheHttpClient, HttpClientConfig};
pub use sequencer::RequestSequencer;
pub use service::{CacheConfigService, WriteErrorListener};
pub use store::{ConfigState, ConfigStore};
