//! EVM JSON-RPC client: typed reads, range fetches, log filtering and fees.

use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{Address, Bytes, B256, U256, U64};
use serde_json::json;
use tokio::task::JoinSet;
use tokio::time::Instant;

use chaingate_core::{
    establish, BatchUnit, ChainError, NodeConfig, RpcClient, RpcTransport, TransportError,
};
use chaingate_http::{HttpClientConfig, HttpRpcClient};
use chaingate_ws::{WsClientConfig, WsRpcClient};

use crate::types::{
    AccountProof, Block, BlockNumberOrTag, FilterQuery, Header, Log, LogsResult, Receipt,
    Transaction,
};

/// Log queries run under this many per-call budgets.
pub const FILTER_LOGS_TIMEOUT_FACTOR: u32 = 10;

const HEADER_PART: &str = "the `toBlock` header";
const LOGS_PART: &str = "logs";

/// Open a transport to `url`: WebSocket for `ws`/`wss`, HTTP otherwise.
pub async fn connect_transport(
    url: &str,
    basic_auth: Option<(String, String)>,
    request_timeout: Duration,
    handshake_timeout: Duration,
) -> Result<Arc<dyn RpcTransport>, TransportError> {
    if url.starts_with("ws://") || url.starts_with("wss://") {
        if basic_auth.is_some() {
            tracing::warn!(url, "basic auth is ignored for WebSocket endpoints");
        }
        let client = WsRpcClient::connect(url, WsClientConfig { handshake_timeout }).await?;
        Ok(Arc::new(client))
    } else {
        let client = HttpRpcClient::new(
            url,
            HttpClientConfig {
                request_timeout,
                basic_auth,
            },
        )?;
        Ok(Arc::new(client))
    }
}

/// Typed EVM client over one connection.
#[derive(Debug, Clone)]
pub struct EthClient {
    rpc: RpcClient,
    supports_batch: bool,
    range_group_size: usize,
    max_range: u64,
}

impl EthClient {
    /// Wrap an existing connection with the settings of `node`.
    pub fn new(transport: Arc<dyn RpcTransport>, node: &NodeConfig) -> Self {
        Self {
            rpc: RpcClient::new(transport, node.request_timeout()),
            supports_batch: node.supports_batch,
            range_group_size: node.range_group_size.max(1),
            max_range: node.max_range.max(1),
        }
    }

    /// Dial the first endpoint of `node`, probing and retrying per its dial
    /// settings.
    pub async fn dial(node: &NodeConfig) -> Result<Self, ChainError> {
        let endpoint = node
            .primary_rpc()
            .ok_or_else(|| ChainError::InvalidArgument("no rpc endpoint configured".into()))?;
        let dial_config = node.dial.to_dial_config();
        let basic_auth = endpoint.basic_auth();
        let request_timeout = node.request_timeout();
        let handshake_timeout = dial_config.probe_timeout;

        let transport = establish(&endpoint.rpc_url, &dial_config, |url: &str| {
            let url = url.to_string();
            let basic_auth = basic_auth.clone();
            async move {
                connect_transport(&url, basic_auth, request_timeout, handshake_timeout).await
            }
        })
        .await?;

        Ok(Self::new(transport, node))
    }

    pub fn rpc(&self) -> &RpcClient {
        &self.rpc
    }

    pub fn url(&self) -> &str {
        self.rpc.url()
    }

    pub fn supports_batch(&self) -> bool {
        self.supports_batch
    }

    /// Release the connection. Idempotent.
    pub fn close(&self) {
        self.rpc.close();
    }

    // ─── Blocks and headers ──────────────────────────────────────────────────

    pub async fn block_by_number(&self, number: BlockNumberOrTag) -> Result<Block, ChainError> {
        let block: Option<Block> = self
            .rpc
            .call("eth_getBlockByNumber", vec![json!(number.to_arg()), json!(true)])
            .await?;
        block.ok_or_else(|| ChainError::NotFound(format!("block {number}")))
    }

    pub async fn block_by_hash(&self, hash: B256) -> Result<Block, ChainError> {
        let block: Option<Block> = self
            .rpc
            .call("eth_getBlockByHash", vec![json!(hash), json!(true)])
            .await?;
        block.ok_or_else(|| ChainError::NotFound(format!("block {hash}")))
    }

    pub async fn header_by_number(&self, number: BlockNumberOrTag) -> Result<Header, ChainError> {
        let header: Option<Header> = self
            .rpc
            .call("eth_getBlockByNumber", vec![json!(number.to_arg()), json!(false)])
            .await?;
        header.ok_or_else(|| ChainError::NotFound(format!("header {number}")))
    }

    /// Fetch a header and check that it hashes to `hash`.
    pub async fn header_by_hash(&self, hash: B256) -> Result<Header, ChainError> {
        let header: Option<Header> = self
            .rpc
            .call("eth_getBlockByHash", vec![json!(hash), json!(false)])
            .await?;
        let header = header.ok_or_else(|| ChainError::NotFound(format!("header {hash}")))?;

        let computed = header.hash_slow();
        if computed != hash {
            tracing::warn!(url = %self.url(), requested = %hash, computed = %computed, "header hash mismatch");
            return Err(ChainError::HashMismatch {
                expected: hash.to_string(),
                actual: computed.to_string(),
            });
        }
        Ok(header)
    }

    pub async fn latest_safe_header(&self) -> Result<Header, ChainError> {
        self.header_by_number(BlockNumberOrTag::Safe).await
    }

    pub async fn latest_finalized_header(&self) -> Result<Header, ChainError> {
        self.header_by_number(BlockNumberOrTag::Finalized).await
    }

    /// Headers for `start..=end`, ascending.
    ///
    /// Units the node could not answer are dropped, so the result may be
    /// shorter than the range; callers compare against the requested count.
    /// Ranges longer than the configured `max_range` are rejected before any
    /// call.
    pub async fn headers_by_range(&self, start: u64, end: u64) -> Result<Vec<Header>, ChainError> {
        if start > end {
            return Err(ChainError::InvalidArgument(format!(
                "range start {start} is after end {end}"
            )));
        }
        let requested = end
            .checked_sub(start)
            .and_then(|span| span.checked_add(1))
            .filter(|count| *count <= self.max_range)
            .ok_or_else(|| {
                ChainError::InvalidArgument(format!(
                    "range {start}..={end} exceeds the limit of {} heights",
                    self.max_range
                ))
            })?;
        if start == end {
            return Ok(vec![self.header_by_number(start.into()).await?]);
        }

        let headers = if self.supports_batch {
            self.headers_batched(start, end).await?
        } else {
            self.headers_grouped(start, end).await?
        };

        if headers.len() as u64 != requested {
            tracing::warn!(
                url = %self.url(),
                start,
                end,
                requested,
                returned = headers.len(),
                "range returned fewer headers than requested"
            );
        }
        Ok(headers)
    }

    /// One batch carrying a unit per height.
    async fn headers_batched(&self, start: u64, end: u64) -> Result<Vec<Header>, ChainError> {
        let mut units: Vec<BatchUnit> = (start..=end)
            .map(|height| header_unit(BlockNumberOrTag::Number(height)))
            .collect();
        self.rpc.batch_call(&mut units).await?;

        let mut headers = Vec::with_capacity(units.len());
        for (height, unit) in (start..=end).zip(units) {
            match unit.into_result::<Option<Header>>() {
                Ok(Some(header)) => headers.push(header),
                Ok(None) => tracing::debug!(height, "dropping missing header from batch"),
                Err(e) => tracing::warn!(height, error = %e, "dropping failed header unit"),
            }
        }
        Ok(headers)
    }

    /// Fixed-size groups fetched in parallel, one task per group, each doing
    /// sequential single calls against one shared deadline.
    async fn headers_grouped(&self, start: u64, end: u64) -> Result<Vec<Header>, ChainError> {
        let deadline = self.rpc.deadline();
        let group_size = self.range_group_size as u64;

        // Dropping the set aborts every task still running.
        let mut tasks = JoinSet::new();
        let mut groups = 0usize;
        let mut first = start;
        loop {
            let last = first.saturating_add(group_size - 1).min(end);
            tasks.spawn(fetch_group(self.rpc.clone(), deadline, groups, first, last));
            groups += 1;
            if last == end {
                break;
            }
            first = last + 1;
        }
        tracing::debug!(url = %self.url(), start, end, groups, "fetching range in parallel groups");

        let mut slots: Vec<Vec<Header>> = (0..groups).map(|_| Vec::new()).collect();
        while let Some(joined) = tasks.join_next().await {
            let (index, headers) = joined.map_err(|e| {
                ChainError::Transport(TransportError::Other(format!("range worker failed: {e}")))
            })??;
            slots[index] = headers;
        }
        Ok(slots.into_iter().flatten().collect())
    }

    // ─── Logs ────────────────────────────────────────────────────────────────

    /// Logs matching `query` together with the header of its `toBlock`.
    ///
    /// Both halves run under one extended deadline, as a single batch when
    /// the node supports it. Either half failing fails the call, naming the
    /// half.
    pub async fn filter_logs(&self, query: &FilterQuery) -> Result<LogsResult, ChainError> {
        let arg = query.to_filter_arg()?;
        let to_block = query.to_block.unwrap_or_default();
        let deadline = self.rpc.extended_deadline(FILTER_LOGS_TIMEOUT_FACTOR);

        let (header, logs) = if self.supports_batch {
            let mut units = [header_unit(to_block), BatchUnit::new("eth_getLogs", vec![arg])];
            self.rpc.batch_call_until(deadline, &mut units).await?;
            let [header_slot, logs_slot] = units;
            (
                header_slot.into_result::<Option<Header>>(),
                logs_slot.into_result::<Vec<Log>>(),
            )
        } else {
            let header = self
                .rpc
                .call_until::<Option<Header>>(
                    deadline,
                    "eth_getBlockByNumber",
                    vec![json!(to_block.to_arg()), json!(false)],
                )
                .await;
            let logs = self
                .rpc
                .call_until::<Vec<Log>>(deadline, "eth_getLogs", vec![arg])
                .await;
            (header, logs)
        };

        let header = header
            .map_err(|e| ChainError::part(HEADER_PART, e))?
            .ok_or_else(|| {
                ChainError::part(HEADER_PART, ChainError::NotFound(format!("header {to_block}")))
            })?;
        let logs = logs.map_err(|e| ChainError::part(LOGS_PART, e))?;

        tracing::debug!(url = %self.url(), to_block = %to_block, logs = logs.len(), "filtered logs");
        Ok(LogsResult {
            logs,
            to_block_header: header,
        })
    }

    // ─── Fees, accounts, transactions ────────────────────────────────────────

    pub async fn suggest_gas_price(&self) -> Result<U256, ChainError> {
        Ok(self.rpc.call("eth_gasPrice", vec![]).await?)
    }

    pub async fn suggest_gas_tip_cap(&self) -> Result<U256, ChainError> {
        Ok(self.rpc.call("eth_maxPriorityFeePerGas", vec![]).await?)
    }

    /// Account nonce at `block` (`latest` or `pending` in practice).
    pub async fn tx_count_by_address(
        &self,
        address: Address,
        block: BlockNumberOrTag,
    ) -> Result<u64, ChainError> {
        let nonce: U64 = self
            .rpc
            .call("eth_getTransactionCount", vec![json!(address), json!(block.to_arg())])
            .await?;
        Ok(nonce.to::<u64>())
    }

    pub async fn balance_at(
        &self,
        address: Address,
        block: BlockNumberOrTag,
    ) -> Result<U256, ChainError> {
        Ok(self
            .rpc
            .call("eth_getBalance", vec![json!(address), json!(block.to_arg())])
            .await?)
    }

    /// ERC-20 `balanceOf(holder)` on `token`.
    pub async fn token_balance_at(
        &self,
        token: Address,
        holder: Address,
        block: BlockNumberOrTag,
    ) -> Result<U256, ChainError> {
        // balanceOf(address)
        let mut calldata = Vec::with_capacity(36);
        calldata.extend_from_slice(&[0x70, 0xa0, 0x82, 0x31]);
        calldata.extend_from_slice(holder.into_word().as_slice());

        let output: Bytes = self
            .rpc
            .call(
                "eth_call",
                vec![
                    json!({ "to": token, "data": Bytes::from(calldata) }),
                    json!(block.to_arg()),
                ],
            )
            .await?;
        if output.len() < 32 {
            return Err(ChainError::InvalidArgument(format!(
                "{token} returned {} bytes for balanceOf",
                output.len()
            )));
        }
        Ok(U256::from_be_slice(&output[..32]))
    }

    /// Submit a signed transaction; returns the hash the node reports.
    pub async fn send_raw_transaction(&self, raw_tx: &str) -> Result<B256, ChainError> {
        let hash: B256 = self
            .rpc
            .call("eth_sendRawTransaction", vec![json!(raw_tx)])
            .await?;
        tracing::info!(url = %self.url(), tx = %hash, "raw transaction accepted");
        Ok(hash)
    }

    pub async fn tx_by_hash(&self, hash: B256) -> Result<Transaction, ChainError> {
        let tx: Option<Transaction> = self
            .rpc
            .call("eth_getTransactionByHash", vec![json!(hash)])
            .await?;
        tx.ok_or_else(|| ChainError::NotFound(format!("transaction {hash}")))
    }

    pub async fn tx_receipt_by_hash(&self, hash: B256) -> Result<Receipt, ChainError> {
        let receipt: Option<Receipt> = self
            .rpc
            .call("eth_getTransactionReceipt", vec![json!(hash)])
            .await?;
        receipt.ok_or_else(|| ChainError::NotFound(format!("receipt {hash}")))
    }

    /// Storage root of `address` at `block`, from `eth_getProof`.
    pub async fn storage_hash(
        &self,
        address: Address,
        block: BlockNumberOrTag,
    ) -> Result<B256, ChainError> {
        let proof: AccountProof = self
            .rpc
            .call(
                "eth_getProof",
                vec![json!(address), json!([]), json!(block.to_arg())],
            )
            .await?;
        Ok(proof.storage_hash)
    }
}

fn header_unit(number: BlockNumberOrTag) -> BatchUnit {
    BatchUnit::new("eth_getBlockByNumber", vec![json!(number.to_arg()), json!(false)])
}

/// Fetch `first..=last` one call at a time. Returns the group index with the
/// headers it could read.
async fn fetch_group(
    rpc: RpcClient,
    deadline: Instant,
    index: usize,
    first: u64,
    last: u64,
) -> Result<(usize, Vec<Header>), ChainError> {
    let mut headers = Vec::with_capacity((last - first + 1) as usize);
    for height in first..=last {
        let params = vec![json!(BlockNumberOrTag::Number(height).to_arg()), json!(false)];
        match rpc
            .call_until::<Option<Header>>(deadline, "eth_getBlockByNumber", params)
            .await
        {
            Ok(Some(header)) => headers.push(header),
            Ok(None) => tracing::debug!(height, "dropping missing header from group"),
            Err(e @ (TransportError::Rpc(_) | TransportError::Deserialization(_))) => {
                tracing::warn!(height, error = %e, "dropping failed header unit");
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok((index, headers))
}
