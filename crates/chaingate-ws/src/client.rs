//! WebSocket JSON-RPC client multiplexed over a single connection.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::time;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use chaingate_core::error::TransportError;
use chaingate_core::request::{JsonRpcRequest, JsonRpcResponse, RpcId};
use chaingate_core::transport::{HealthStatus, RpcTransport};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type SingleReply = oneshot::Sender<Result<JsonRpcResponse, TransportError>>;
type BatchReply = oneshot::Sender<Result<Vec<JsonRpcResponse>, TransportError>>;

/// Configuration for the WebSocket client.
#[derive(Debug, Clone)]
pub struct WsClientConfig {
    /// Budget for the TCP connect plus WebSocket handshake.
    pub handshake_timeout: Duration,
}

impl Default for WsClientConfig {
    fn default() -> Self {
        Self {
            handshake_timeout: Duration::from_secs(5),
        }
    }
}

/// Command sent from callers to the background WS task.
enum WsCommand {
    Send { req: JsonRpcRequest, tx: SingleReply },
    Batch { reqs: Vec<JsonRpcRequest>, tx: BatchReply },
    Close,
}

/// WebSocket JSON-RPC client.
///
/// A background task owns the socket. Callers hand it requests over a
/// channel and wait on a oneshot that the task completes when the response
/// with the matching id arrives. The connection is not re-established once
/// it drops; pending and later calls fail.
pub struct WsRpcClient {
    url: String,
    cmd_tx: mpsc::UnboundedSender<WsCommand>,
    closed: AtomicBool,
}

impl WsRpcClient {
    /// Connect to `url` and start the background task.
    pub async fn connect(
        url: impl Into<String>,
        config: WsClientConfig,
    ) -> Result<Self, TransportError> {
        let url = url.into();
        tracing::info!(url = %url, "connecting via WebSocket");

        let (ws_stream, _) =
            time::timeout(config.handshake_timeout, tokio_tungstenite::connect_async(&url))
                .await
                .map_err(|_| TransportError::Timeout {
                    ms: config.handshake_timeout.as_millis() as u64,
                })?
                .map_err(|e| TransportError::WebSocket(e.to_string()))?;

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<WsCommand>();
        let url_clone = url.clone();
        tokio::spawn(async move {
            ws_task(url_clone, ws_stream, cmd_rx).await;
        });

        Ok(Self {
            url,
            cmd_tx,
            closed: AtomicBool::new(false),
        })
    }

    fn submit(&self, cmd: WsCommand) -> Result<(), TransportError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }
        self.cmd_tx
            .send(cmd)
            .map_err(|_| TransportError::WebSocket("WS task closed".into()))
    }
}

impl Drop for WsRpcClient {
    fn drop(&mut self) {
        let _ = self.cmd_tx.send(WsCommand::Close);
    }
}

#[async_trait]
impl RpcTransport for WsRpcClient {
    async fn send(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, TransportError> {
        let (tx, rx) = oneshot::channel();
        self.submit(WsCommand::Send { req, tx })?;
        rx.await
            .map_err(|_| TransportError::WebSocket("WS response dropped".into()))?
    }

    /// One text frame carrying the whole array; the node answers with one array.
    async fn send_batch(
        &self,
        reqs: Vec<JsonRpcRequest>,
    ) -> Result<Vec<JsonRpcResponse>, TransportError> {
        if reqs.is_empty() {
            return Ok(vec![]);
        }
        let (tx, rx) = oneshot::channel();
        self.submit(WsCommand::Batch { reqs, tx })?;
        rx.await
            .map_err(|_| TransportError::WebSocket("WS response dropped".into()))?
    }

    fn health(&self) -> HealthStatus {
        if self.closed.load(Ordering::Acquire) || self.cmd_tx.is_closed() {
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
            let _ = self.cmd_tx.send(WsCommand::Close);
        }
    }
}

/// Requests awaiting a response, keyed by JSON-RPC id.
#[derive(Default)]
struct Pending {
    singles: HashMap<u64, SingleReply>,
    /// Batch key (first id of the batch) → reply channel. Ids only grow, so
    /// the first entry is the oldest batch in flight.
    batches: BTreeMap<u64, BatchReply>,
    /// Every id of an in-flight batch → its batch key.
    batch_ids: HashMap<u64, u64>,
}

impl Pending {
    /// Forget requests whose caller stopped waiting (deadline elapsed or
    /// future dropped). A late reply for them is then ignored.
    fn prune(&mut self) {
        let before = self.len();
        self.singles.retain(|_, tx| !tx.is_closed());
        self.batches.retain(|_, tx| !tx.is_closed());
        let batches = &self.batches;
        self.batch_ids.retain(|_, key| batches.contains_key(key));
        if self.len() < before {
            tracing::debug!(dropped = before - self.len(), "pruned abandoned WS requests");
        }
    }

    /// Fail the oldest batch in flight with `err`.
    fn fail_oldest_batch(&mut self, err: TransportError) -> bool {
        let Some((key, tx)) = self.batches.pop_first() else {
            return false;
        };
        self.batch_ids.retain(|_, k| *k != key);
        let _ = tx.send(Err(err));
        true
    }

    fn len(&self) -> usize {
        self.singles.len() + self.batches.len()
    }

    fn fail_all(&mut self, err: impl Fn() -> TransportError) {
        for (_, tx) in self.singles.drain() {
            let _ = tx.send(Err(err()));
        }
        for (_, tx) in std::mem::take(&mut self.batches) {
            let _ = tx.send(Err(err()));
        }
        self.batch_ids.clear();
    }
}

/// Background task that owns the WebSocket connection.
async fn ws_task(url: String, ws_stream: WsStream, mut cmd_rx: mpsc::UnboundedReceiver<WsCommand>) {
    let (mut sink, mut stream) = ws_stream.split();
    let mut pending = Pending::default();

    loop {
        tokio::select! {
            // Incoming commands from callers
            cmd = cmd_rx.recv() => {
                pending.prune();
                match cmd {
                    None | Some(WsCommand::Close) => {
                        let _ = sink.send(Message::Close(None)).await;
                        pending.fail_all(|| TransportError::Closed);
                        tracing::debug!(url = %url, "WS transport closed");
                        return;
                    }
                    Some(WsCommand::Send { req, tx }) => {
                        let Some(id) = req.id.as_u64() else {
                            let _ = tx.send(Err(TransportError::Other("WS requests need a numeric id".into())));
                            continue;
                        };
                        let msg = match serde_json::to_string(&req) {
                            Ok(msg) => msg,
                            Err(e) => {
                                let _ = tx.send(Err(e.into()));
                                continue;
                            }
                        };
                        pending.singles.insert(id, tx);
                        if sink.send(Message::Text(msg.into())).await.is_err() {
                            break;
                        }
                    }
                    Some(WsCommand::Batch { reqs, tx }) => {
                        let ids: Vec<u64> = reqs.iter().filter_map(|r| r.id.as_u64()).collect();
                        let Some(&key) = ids.first() else {
                            let _ = tx.send(Err(TransportError::Other("WS requests need a numeric id".into())));
                            continue;
                        };
                        let msg = match serde_json::to_string(&reqs) {
                            Ok(msg) => msg,
                            Err(e) => {
                                let _ = tx.send(Err(e.into()));
                                continue;
                            }
                        };
                        for id in ids {
                            pending.batch_ids.insert(id, key);
                        }
                        pending.batches.insert(key, tx);
                        if sink.send(Message::Text(msg.into())).await.is_err() {
                            break;
                        }
                    }
                }
            }
            // Incoming messages from node
            msg = stream.next() => {
                match msg {
                    None => break, // stream closed
                    Some(Err(e)) => {
                        tracing::warn!(url = %url, error = %e, "WS receive error");
                        break;
                    }
                    Some(Ok(Message::Text(text))) => handle_message(text.as_str(), &mut pending),
                    Some(Ok(Message::Close(_))) => break,
                    _ => {}
                }
            }
        }
    }

    tracing::warn!(url = %url, "WS disconnected");
    pending.fail_all(|| TransportError::WebSocket("connection lost".into()));
}

fn handle_message(text: &str, pending: &mut Pending) {
    let Ok(val) = serde_json::from_str::<Value>(text) else {
        tracing::debug!("failed to parse WS message as JSON");
        return;
    };

    match val {
        Value::Array(items) => {
            let responses: Vec<JsonRpcResponse> = items
                .into_iter()
                .filter_map(|item| serde_json::from_value(item).ok())
                .collect();
            let key = responses
                .iter()
                .filter_map(|r| r.id.as_u64())
                .find_map(|id| pending.batch_ids.get(&id).copied());
            let Some(key) = key else {
                tracing::debug!(units = responses.len(), "unmatched WS batch response");
                return;
            };
            pending.batch_ids.retain(|_, k| *k != key);
            if let Some(tx) = pending.batches.remove(&key) {
                let _ = tx.send(Ok(responses));
            }
        }
        other => {
            // Notifications (no numeric id) are ignored.
            let Ok(resp) = serde_json::from_value::<JsonRpcResponse>(other) else {
                return;
            };
            let Some(id) = resp.id.as_u64() else {
                // A node that rejects a whole batch answers with one error
                // object carrying a null id.
                if let (RpcId::Null, Some(err)) = (&resp.id, resp.error) {
                    if pending.fail_oldest_batch(TransportError::Rpc(err.clone())) {
                        tracing::warn!(error = %err, "WS batch rejected by node");
                    }
                }
                return;
            };
            if let Some(tx) = pending.singles.remove(&id) {
                let _ = tx.send(Ok(resp));
            }
        }
    }
}
