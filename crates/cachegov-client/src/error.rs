//! Client error types for the cachegov SDK

use cachegov_api::ValidationError;

/// Error type for cache config client operations
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// A strategy failed local validation. Never causes network traffic and
    /// is never retried; the caller must resubmit corrected input.
    #[error("invalid strategy: {0}")]
    Validation(#[from] ValidationError),

    /// The initial LIST call failed. Surfaced as a blocking load error; no
    /// partial state is kept.
    #[error("remote read failed: status={status}, message={message}")]
    RemoteRead { status: u16, message: String },

    /// An UPSERT or DELETE failed on the server. Triggers rollback of the
    /// optimistic local change.
    #[error("remote write failed: status={status}, message={message}")]
    RemoteWrite { status: u16, message: String },

    /// The root configuration can only be replaced, never removed.
    #[error("the root configuration cannot be deleted")]
    RootDeleteForbidden,

    #[error("transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("auth failed: {0}")]
    AuthFailed(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl ClientError {
    /// Whether this error is local-only (the request never left the client).
    pub fn is_local(&self) -> bool {
        matches!(self, ClientError::Validation(_))
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
