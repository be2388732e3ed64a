//! Connection establishment: liveness probe, dial, exponential backoff.
//!
//! Each attempt first opens (and immediately drops) a raw TCP connection to
//! the endpoint. A dead endpoint fails the attempt right away instead of
//! paying the dial's own timeout. The whole dial phase runs under one outer
//! deadline, independent of the per-attempt timeouts.

use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use tokio::net::TcpStream;
use tokio_retry::Retry;
use url::{Host, Url};

use crate::error::TransportError;
use crate::policy::{RetryConfig, RetryPolicy};

/// Dial-phase settings for one endpoint.
#[derive(Debug, Clone)]
pub struct DialConfig {
    /// Attempt count and backoff schedule.
    pub retry: RetryConfig,
    /// Budget for each liveness probe.
    pub probe_timeout: Duration,
    /// Outer deadline for the whole dial phase.
    pub connect_timeout: Duration,
}

impl Default for DialConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            probe_timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(5),
        }
    }
}

/// Probe whether a TCP connection to `endpoint` can be opened.
///
/// The port defaults to 80 for `http`/`ws` and 443 for `https`/`wss`. An
/// endpoint without a port whose scheme is none of those is reported as
/// available: startup is not blocked on an endpoint we cannot classify.
pub async fn is_endpoint_available(endpoint: &str, timeout: Duration) -> bool {
    let url = match Url::parse(endpoint) {
        Ok(url) => url,
        Err(e) => {
            tracing::debug!(url = endpoint, error = %e, "endpoint is not a valid URL");
            return false;
        }
    };

    let port = match url.port() {
        Some(port) => port,
        None => match url.scheme() {
            "http" | "ws" => 80,
            "https" | "wss" => 443,
            scheme => {
                tracing::debug!(url = endpoint, scheme, "unknown scheme, assuming reachable");
                return true;
            }
        },
    };

    let host = match url.host() {
        Some(Host::Domain(domain)) => domain.to_string(),
        Some(Host::Ipv4(addr)) => addr.to_string(),
        Some(Host::Ipv6(addr)) => addr.to_string(),
        None => return false,
    };

    match tokio::time::timeout(timeout, TcpStream::connect((host.as_str(), port))).await {
        Ok(Ok(_stream)) => true,
        Ok(Err(e)) => {
            tracing::debug!(url = endpoint, error = %e, "liveness probe failed");
            false
        }
        Err(_) => {
            tracing::debug!(url = endpoint, timeout_ms = timeout.as_millis() as u64, "liveness probe timed out");
            false
        }
    }
}

/// Dial `endpoint` with `dial`, probing before every attempt and retrying per
/// `config.retry` until an attempt succeeds, the attempts run out, or
/// `config.connect_timeout` elapses.
///
/// On failure the error names the endpoint, the number of attempts made and
/// the last underlying cause.
pub async fn establish<T, F, Fut>(
    endpoint: &str,
    config: &DialConfig,
    dial: F,
) -> Result<T, TransportError>
where
    F: Fn(&str) -> Fut,
    Fut: Future<Output = Result<T, TransportError>>,
{
    let policy = RetryPolicy::new(config.retry.clone());
    let attempts = AtomicU32::new(0);

    let dial = &dial;
    let counter = &attempts;
    let action = move || async move {
        let attempt = counter.fetch_add(1, Ordering::Relaxed) + 1;
        if !is_endpoint_available(endpoint, config.probe_timeout).await {
            tracing::warn!(url = endpoint, attempt, "endpoint unavailable, skipping dial");
            return Err(TransportError::Unavailable {
                endpoint: endpoint.to_string(),
            });
        }
        dial(endpoint).await.map_err(|e| {
            tracing::warn!(url = endpoint, attempt, error = %e, "dial attempt failed");
            e
        })
    };

    let outcome = tokio::time::timeout(config.connect_timeout, Retry::spawn(policy.delays(), action)).await;
    let attempts = attempts.load(Ordering::Relaxed);

    match outcome {
        Ok(Ok(conn)) => {
            tracing::info!(url = endpoint, attempts, "connected to node");
            Ok(conn)
        }
        Ok(Err(last)) => {
            tracing::error!(url = endpoint, attempts, error = %last, "dial attempts exhausted");
            Err(TransportError::Dial {
                endpoint: endpoint.to_string(),
                attempts,
                source: Box::new(last),
            })
        }
        Err(_) => {
            let ms = config.connect_timeout.as_millis() as u64;
            tracing::error!(url = endpoint, attempts, timeout_ms = ms, "dial deadline elapsed");
            Err(TransportError::Dial {
                endpoint: endpoint.to_string(),
                attempts,
                source: Box::new(TransportError::Timeout { ms }),
            })
        }
    }
}
