//! HTTP JSON-RPC client backed by `reqwest`.
//!
//! Features:
//! - One pooled `reqwest::Client` per endpoint
//! - Optional HTTP basic auth
//! - True HTTP batching (one POST carrying a JSON array)
//! - Idempotent close; later calls fail with `TransportError::Closed`
//!
//! Requests are never retried here. Deadlines are enforced by the caller's
//! `RpcClient`; `request_timeout` is only a backstop on the socket.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chaingate_core::error::TransportError;
use chaingate_core::request::{JsonRpcRequest, JsonRpcResponse};
use chaingate_core::transport::{HealthStatus, RpcTransport};

/// Configuration for `HttpRpcClient`.
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub request_timeout: Duration,
    /// `(user, password)` sent with every request.
    pub basic_auth: Option<(String, String)>,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            basic_auth: None,
        }
    }
}

/// HTTP JSON-RPC client.
pub struct HttpRpcClient {
    url: String,
    http: reqwest::Client,
    basic_auth: Option<(String, String)>,
    closed: AtomicBool,
}

impl HttpRpcClient {
    /// Create a new client for the given JSON-RPC endpoint URL.
    pub fn new(url: impl Into<String>, config: HttpClientConfig) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| TransportError::Http(format!("failed to build http client: {e}")))?;

        Ok(Self {
            url: url.into(),
            http,
            basic_auth: config.basic_auth,
            closed: AtomicBool::new(false),
        })
    }

    /// Create with default configuration.
    pub fn default_for(url: impl Into<String>) -> Result<Self, TransportError> {
        Self::new(url, HttpClientConfig::default())
    }

    fn ensure_open(&self) -> Result<(), TransportError> {
        if self.closed.load(Ordering::Acquire) {
            Err(TransportError::Closed)
        } else {
            Ok(())
        }
    }

    async fn post<B, R>(&self, body: &B) -> Result<R, TransportError>
    where
        B: serde::Serialize + ?Sized,
        R: serde::de::DeserializeOwned,
    {
        self.ensure_open()?;

        let mut builder = self.http.post(&self.url).json(body);
        if let Some((user, pass)) = &self.basic_auth {
            builder = builder.basic_auth(user, Some(pass));
        }

        let resp = builder
            .send()
            .await
            .map_err(|e| TransportError::Http(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(TransportError::Http(format!("HTTP {status}: {body}")));
        }

        resp.json::<R>()
            .await
            .map_err(|e| TransportError::Http(e.to_string()))
    }
}

#[async_trait]
impl RpcTransport for HttpRpcClient {
    async fn send(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, TransportError> {
        tracing::trace!(url = %self.url, method = %req.method, id = %req.id, "http request");
        self.post(&req).await
    }

    /// True HTTP batch: send all requests as a JSON array in one HTTP call.
    async fn send_batch(
        &self,
        reqs: Vec<JsonRpcRequest>,
    ) -> Result<Vec<JsonRpcResponse>, TransportError> {
        if reqs.is_empty() {
            return Ok(vec![]);
        }
        tracing::trace!(url = %self.url, units = reqs.len(), "http batch request");
        self.post(&reqs).await
    }

    fn health(&self) -> HealthStatus {
        if self.closed.load(Ordering::Acquire) {
            HealthStatus::Unhealthy
        } else {
            HealthStatus::Healthy
        }
    }

    fn url(&self) -> &str {
        &self.url
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            tracing::debug!(url = %self.url, "http transport closed");
        }
    }
}

impl std::fmt::Debug for HttpRpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpRpcClient")
            .field("url", &self.url)
            .field("basic_auth", &self.basic_auth.as_ref().map(|(user, _)| user))
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn closed_client_rejects_calls() {
        let client = HttpRpcClient::default_for("http://127.0.0.1:1").unwrap();
        assert_eq!(client.health(), HealthStatus::Healthy);
        client.close();
        client.close();
        assert_eq!(client.health(), HealthStatus::Unhealthy);

        let err = client
            .send(JsonRpcRequest::new(1, "eth_chainId", vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Closed));
    }

    #[test]
    fn debug_hides_password() {
        let client = HttpRpcClient::new(
            "http://node:8545",
            HttpClientConfig {
                basic_auth: Some(("alice".into(), "secret".into())),
                ..Default::default()
            },
        )
        .unwrap();
        let dbg = format!("{client:?}");
        assert!(dbg.contains("alice"));
        assert!(!dbg.contains("secret"));
    }
}
