//! HTTP client with retries and failover
//!
//! Reqwest-based client for the cache config endpoints. Transport-level
//! failures rotate through the configured servers; HTTP error statuses are
//! mapped to the read/write error taxonomy by the calling operation.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde_json::json;
use std::{sync::RwLock, time::Duration};
use tracing::{debug, warn};

use cachegov_api::{CacheConfig, ConfigKey, ListConfigsResponse, Model};

use crate::api::CacheConfigApi;
use crate::error::{ClientError, Result};

/// Configuration for the HTTP client
#[derive(Clone, Debug)]
pub struct HttpClientConfig {
    /// List of server addresses to connect to
    pub server_addrs: Vec<String>,
    /// Session token sent with every request, if any
    pub session_token: Option<String>,
    /// Connection timeout in milliseconds
    pub connect_timeout_ms: u64,
    /// Read timeout in milliseconds
    pub read_timeout_ms: u64,
    /// Context path (e.g. "/metabase")
    pub context_path: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            server_addrs: vec!["http://127.0.0.1:3000".to_string()],
            session_token: None,
            connect_timeout_ms: 5000,
            read_timeout_ms: 30000,
            context_path: String::new(),
        }
    }
}

impl HttpClientConfig {
    /// Create a new config with a single server address
    pub fn new(server_addr: &str) -> Self {
        Self {
            server_addrs: vec![server_addr.to_string()],
            ..Default::default()
        }
    }

    /// Create a config with multiple server addresses
    pub fn with_servers(server_addrs: Vec<String>) -> Self {
        Self {
            server_addrs,
            ..Default::default()
        }
    }

    /// Set the session token
    pub fn with_session_token(mut self, token: &str) -> Self {
        self.session_token = Some(token.to_string());
        self
    }

    /// Set timeouts
    pub fn with_timeouts(mut self, connect_ms: u64, read_ms: u64) -> Self {
        self.connect_timeout_ms = connect_ms;
        self.read_timeout_ms = read_ms;
        self
    }

    /// Set context path
    pub fn with_context_path(mut self, path: &str) -> Self {
        self.context_path = path.to_string();
        self
    }
}

/// HTTP client for the cache config API with failover support
pub struct CacheHttpClient {
    client: Client,
    config: HttpClientConfig,
    current_server_index: RwLock<usize>,
}

impl CacheHttpClient {
    /// Create a new HTTP client
    pub fn new(config: HttpClientConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .timeout(Duration::from_millis(config.read_timeout_ms))
            .build()?;

        Ok(Self {
            client,
            config,
            current_server_index: RwLock::new(0),
        })
    }

    /// Get the current server URL
    fn current_server(&self) -> String {
        let index = *self
            .current_server_index
            .read()
            .unwrap_or_else(|e| e.into_inner());
        self.config.server_addrs[index].clone()
    }

    /// Switch to the next server (for failover)
    fn switch_to_next_server(&self) {
        let mut index = self
            .current_server_index
            .write()
            .unwrap_or_else(|e| e.into_inner());
        *index = (*index + 1) % self.config.server_addrs.len();
        debug!("Switched to server index: {}", *index);
    }

    /// Build full URL with context path
    fn build_url(&self, path: &str) -> String {
        let base_url = self.current_server();
        let context_path = &self.config.context_path;

        if context_path.is_empty() {
            format!("{}{}", base_url, path)
        } else {
            format!(
                "{}/{}{}",
                base_url,
                context_path.trim_start_matches('/'),
                path
            )
        }
    }

    /// Attach the session token header, if configured
    fn with_session(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.config.session_token {
            Some(token) => builder.header("X-Session-Token", token),
            None => builder,
        }
    }

    /// Execute a request, rotating through servers on transport failure.
    /// HTTP error statuses are returned to the caller for taxonomy mapping.
    async fn execute_with_failover<F>(&self, request_fn: F) -> Result<Response>
    where
        F: Fn(&Client, String) -> RequestBuilder,
    {
        let max_retries = self.config.server_addrs.len();
        let mut last_error = None;

        for _ in 0..max_retries {
            let url = self.build_url("/api/cache");
            debug!("Requesting {}", url);

            let builder = self.with_session(request_fn(&self.client, url));
            match builder.send().await {
                Ok(response) => {
                    if response.status() == StatusCode::UNAUTHORIZED {
                        return Err(ClientError::AuthFailed(
                            "session token rejected".to_string(),
                        ));
                    }
                    return Ok(response);
                }
                Err(e) => {
                    warn!("Request failed: {}, switching to next server", e);
                    self.switch_to_next_server();
                    last_error = Some(e.into());
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| ClientError::Other(anyhow::anyhow!("all servers failed"))))
    }

    async fn status_message(response: Response) -> (u16, String) {
        let status = response.status().as_u16();
        let message = response.text().await.unwrap_or_default();
        (status, message)
    }
}

#[async_trait]
impl CacheConfigApi for CacheHttpClient {
    async fn list(&self, model: Model) -> Result<Vec<CacheConfig>> {
        let response = self
            .execute_with_failover(|client, url| client.get(url).query(&[("model", model.as_str())]))
            .await?;

        if response.status().is_success() {
            let parsed: ListConfigsResponse = response.json().await?;
            Ok(parsed.items)
        } else {
            let (status, message) = Self::status_message(response).await;
            Err(ClientError::RemoteRead { status, message })
        }
    }

    async fn upsert(&self, config: &CacheConfig) -> Result<()> {
        let response = self
            .execute_with_failover(|client, url| client.put(url).json(config))
            .await?;

        if response.status().is_success() {
            Ok(())
        } else {
            let (status, message) = Self::status_message(response).await;
            Err(ClientError::RemoteWrite { status, message })
        }
    }

    async fn delete(&self, key: ConfigKey) -> Result<()> {
        // The delete endpoint takes its identifiers in a JSON body.
        let body = json!({"model": key.model, "model_id": key.model_id});
        let response = self
            .execute_with_failover(|client, url| client.delete(url).json(&body))
            .await?;

        if response.status().is_success() {
            Ok(())
        } else {
            let (status, message) = Self::status_message(response).await;
            Err(ClientError::RemoteWrite { status, message })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = HttpClientConfig::default();
        assert_eq!(config.server_addrs.len(), 1);
        assert!(config.session_token.is_none());
        assert_eq!(config.connect_timeout_ms, 5000);
        assert_eq!(config.read_timeout_ms, 30000);
    }

    #[test]
    fn test_config_builder() {
        let config = HttpClientConfig::new("http://localhost:3000")
            .with_session_token("abc123")
            .with_timeouts(3000, 15000)
            .with_context_path("/metabase");

        assert_eq!(config.server_addrs[0], "http://localhost:3000");
        assert_eq!(config.session_token.as_deref(), Some("abc123"));
        assert_eq!(config.connect_timeout_ms, 3000);
        assert_eq!(config.read_timeout_ms, 15000);
        assert_eq!(config.context_path, "/metabase");
    }

    #[test]
    fn test_config_with_servers() {
        let config = HttpClientConfig::with_servers(vec![
            "http://server1:3000".to_string(),
            "http://server2:3000".to_string(),
        ]);

        assert_eq!(config.server_addrs.len(), 2);
    }

    #[test]
    fn test_build_url_no_context() {
        let config = HttpClientConfig::new("http://localhost:3000");
        let client = CacheHttpClient::new(config).unwrap();

        assert_eq!(
            client.build_url("/api/cache"),
            "http://localhost:3000/api/cache"
        );
    }

    #[test]
    fn test_build_url_with_context() {
        let config = HttpClientConfig::new("http://localhost:3000").with_context_path("/metabase");
        let client = CacheHttpClient::new(config).unwrap();

        assert_eq!(
            client.build_url("/api/cache"),
            "http://localhost:3000/metabase/api/cache"
        );
    }

    #[test]
    fn test_failover_rotation() {
        let config = HttpClientConfig::with_servers(vec![
            "http://server1:3000".to_string(),
            "http://server2:3000".to_string(),
        ]);
        let client = CacheHttpClient::new(config).unwrap();

        assert_eq!(client.current_server(), "http://server1:3000");
        client.switch_to_next_server();
        assert_eq!(client.current_server(), "http://server2:3000");
        client.switch_to_next_server();
        assert_eq!(client.current_server(), "http://server1:3000");
    }
}
