//! Deadline-bounded JSON-RPC client on top of an [`RpcTransport`].
//!
//! Every call runs under a deadline: the per-call budget by default, or an
//! explicit instant when several calls share one budget (grouped range
//! fetches, log filtering). Batches are matched back to their units by
//! JSON-RPC id, so out-of-order batch responses are handled.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::time::Instant;

use crate::error::TransportError;
use crate::request::{BatchUnit, JsonRpcRequest, RpcParam};
use crate::transport::{HealthStatus, RpcTransport};

/// Default per-call deadline.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

struct ClientInner {
    transport: Arc<dyn RpcTransport>,
    request_timeout: Duration,
    next_id: AtomicU64,
}

/// Cheaply cloneable handle to one connection.
///
/// Clones share the same transport and id counter, so a clone can be moved
/// into a spawned task without opening another connection.
#[derive(Clone)]
pub struct RpcClient {
    inner: Arc<ClientInner>,
}

impl RpcClient {
    pub fn new(transport: Arc<dyn RpcTransport>, request_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                transport,
                request_timeout,
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// The per-call budget.
    pub fn request_timeout(&self) -> Duration {
        self.inner.request_timeout
    }

    /// Deadline for a call starting now.
    pub fn deadline(&self) -> Instant {
        Instant::now() + self.inner.request_timeout
    }

    /// Deadline for an expensive call starting now, `factor` times the budget.
    pub fn extended_deadline(&self, factor: u32) -> Instant {
        Instant::now() + self.inner.request_timeout * factor
    }

    pub fn url(&self) -> &str {
        self.inner.transport.url()
    }

    pub fn health(&self) -> HealthStatus {
        self.inner.transport.health()
    }

    /// Release the connection. Idempotent.
    pub fn close(&self) {
        self.inner.transport.close();
    }

    /// Call `method` under the default deadline and decode the result.
    pub async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<RpcParam>,
    ) -> Result<T, TransportError> {
        self.call_until(self.deadline(), method, params).await
    }

    /// Call `method`, giving up at `deadline`.
    pub async fn call_until<T: DeserializeOwned>(
        &self,
        deadline: Instant,
        method: &str,
        params: Vec<RpcParam>,
    ) -> Result<T, TransportError> {
        let value = self.call_raw(deadline, method, params).await?;
        serde_json::from_value(value).map_err(TransportError::Deserialization)
    }

    async fn call_raw(
        &self,
        deadline: Instant,
        method: &str,
        params: Vec<RpcParam>,
    ) -> Result<Value, TransportError> {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let req = JsonRpcRequest::new(id, method, params);
        let started = Instant::now();
        let resp = tokio::time::timeout_at(deadline, self.inner.transport.send(req))
            .await
            .map_err(|_| self.timeout_error(method, started, deadline))??;
        resp.into_result().map_err(TransportError::Rpc)
    }

    /// Issue `units` as one batch under the default deadline.
    pub async fn batch_call(&self, units: &mut [BatchUnit]) -> Result<(), TransportError> {
        self.batch_call_until(self.deadline(), units).await
    }

    /// Issue `units` as one batch, giving up at `deadline`.
    ///
    /// The returned error only reports transport failure: the batch was not
    /// sent or its reply was not received. Each unit's own outcome is written
    /// into that unit.
    pub async fn batch_call_until(
        &self,
        deadline: Instant,
        units: &mut [BatchUnit],
    ) -> Result<(), TransportError> {
        if units.is_empty() {
            return Ok(());
        }
        let first_id = self
            .inner
            .next_id
            .fetch_add(units.len() as u64, Ordering::Relaxed);
        let reqs: Vec<JsonRpcRequest> = units
            .iter()
            .enumerate()
            .map(|(i, unit)| {
                JsonRpcRequest::new(first_id + i as u64, unit.method.clone(), unit.params.clone())
            })
            .collect();

        let started = Instant::now();
        let responses = tokio::time::timeout_at(deadline, self.inner.transport.send_batch(reqs))
            .await
            .map_err(|_| self.timeout_error("batch", started, deadline))??;

        let mut by_id: HashMap<u64, _> = responses
            .into_iter()
            .filter_map(|resp| resp.id.as_u64().map(|id| (id, resp)))
            .collect();

        for (i, unit) in units.iter_mut().enumerate() {
            let id = first_id + i as u64;
            match by_id.remove(&id) {
                Some(resp) => unit.resolve(resp.into_result().map_err(TransportError::Rpc)),
                None => unit.resolve(Err(TransportError::Other(format!(
                    "no response for batch unit {id} ({})",
                    unit.method
                )))),
            }
        }
        Ok(())
    }

    fn timeout_error(&self, method: &str, started: Instant, deadline: Instant) -> TransportError {
        let ms = deadline.saturating_duration_since(started).as_millis() as u64;
        tracing::warn!(url = %self.url(), method, timeout_ms = ms, "rpc deadline elapsed");
        TransportError::Timeout { ms }
    }
}

impl std::fmt::Debug for RpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcClient")
            .field("url", &self.url())
            .field("request_timeout", &self.inner.request_timeout)
            .finish()
    }
}
