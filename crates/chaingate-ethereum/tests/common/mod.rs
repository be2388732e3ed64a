//! Scripted in-process node shared by the integration tests.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use chaingate_core::{
    JsonRpcError, JsonRpcRequest, JsonRpcResponse, NodeConfig, RpcTransport, TransportError,
};
use chaingate_ethereum::{EthClient, Header};

pub const TX_HASH: &str = "0x8b1f5b3a1e0b3c1d3e5f7a9b2c4d6e8f0a1b3c5d7e9f1a2b4c6d8e0f1a3b5c7d";
pub const SENDER: &str = "0x00000000000000000000000000000000000000aa";
pub const RECIPIENT: &str = "0x00000000000000000000000000000000000000bb";
pub const TOKEN: &str = "0x00000000000000000000000000000000000000cc";
pub const STORAGE_ROOT: &str = "0x56e81f171bcc55a6ff8345e692c0f86e5b48e01b996cadc001622fb5e363b421";

fn word(n: u64) -> String {
    format!("0x{n:064x}")
}

/// A post-London header for `height` whose `hash` is its real hash.
pub fn header_json(height: u64) -> Value {
    let mut header = json!({
        "parentHash": word(height.wrapping_sub(1)),
        "sha3Uncles": "0x1dcc4de8dec75d7aab85b567b6ccd41ad312451b948a7413f0a142fd40d49347",
        "miner": RECIPIENT,
        "stateRoot": word(height + 7),
        "transactionsRoot": word(height + 8),
        "receiptsRoot": word(height + 9),
        "logsBloom": format!("0x{}", "0".repeat(512)),
        "difficulty": "0x0",
        "number": format!("{height:#x}"),
        "gasLimit": "0x1c9c380",
        "gasUsed": "0x5208",
        "timestamp": format!("{:#x}", 1_700_000_000 + height * 12),
        "extraData": "0x",
        "mixHash": word(height + 10),
        "nonce": "0x0000000000000000",
        "baseFeePerGas": "0x7",
        "withdrawalsRoot": word(height + 11),
    });
    let decoded: Header = serde_json::from_value(header.clone()).unwrap();
    header["hash"] = json!(decoded.hash_slow());
    header
}

pub fn hash_of(height: u64) -> String {
    header_json(height)["hash"].as_str().unwrap().to_string()
}

fn tx_summary(height: u64) -> Value {
    json!({
        "hash": word(height + 1_000_000),
        "from": SENDER,
        "to": RECIPIENT,
        "value": "0xde0b6b3a7640000",
        "nonce": "0x1",
    })
}

pub fn tx_json(block_number: Option<u64>) -> Value {
    json!({
        "hash": TX_HASH,
        "nonce": "0x6",
        "blockHash": block_number.map(hash_of),
        "blockNumber": block_number.map(|n| format!("{n:#x}")),
        "transactionIndex": block_number.map(|_| "0x2"),
        "from": SENDER,
        "to": RECIPIENT,
        "value": "0x1bc16d674ec80000",
        "gas": "0x5208",
        "gasPrice": "0x3b9aca00",
        "input": "0x",
        "type": "0x2",
    })
}

pub fn receipt_json(block_number: u64) -> Value {
    json!({
        "transactionHash": TX_HASH,
        "transactionIndex": "0x2",
        "blockHash": hash_of(block_number),
        "blockNumber": format!("{block_number:#x}"),
        "from": SENDER,
        "to": RECIPIENT,
        "cumulativeGasUsed": "0xa410",
        "gasUsed": "0x5208",
        "effectiveGasPrice": "0x3b9aca00",
        "contractAddress": null,
        "logs": [],
        "status": "0x1",
    })
}

pub fn log_json(address: &str, height: u64) -> Value {
    json!({
        "address": address,
        "topics": [word(1)],
        "data": "0x",
        "blockNumber": format!("{height:#x}"),
        "blockHash": hash_of(height),
        "transactionHash": TX_HASH,
        "transactionIndex": "0x0",
        "logIndex": "0x0",
        "removed": false,
    })
}

/// In-process node answering from a fixed chain.
///
/// Records every single call and every batch it receives; answers batches in
/// reverse order so callers must match by id.
#[derive(Default)]
pub struct MockNode {
    headers: BTreeMap<u64, Value>,
    logs: Vec<Value>,
    failing_methods: HashSet<String>,
    failing_heights: HashSet<u64>,
    /// Tx mined at this height; pending when `None`.
    tx_height: Option<u64>,
    has_tx: bool,
    delay: Option<Duration>,
    pub singles: Mutex<Vec<String>>,
    pub batches: Mutex<Vec<Vec<String>>>,
}

impl MockNode {
    pub fn with_heights(heights: impl IntoIterator<Item = u64>) -> Self {
        Self {
            headers: heights.into_iter().map(|h| (h, header_json(h))).collect(),
            ..Default::default()
        }
    }

    pub fn fail_method(mut self, method: &str) -> Self {
        self.failing_methods.insert(method.to_string());
        self
    }

    pub fn fail_height(mut self, height: u64) -> Self {
        self.failing_heights.insert(height);
        self
    }

    pub fn with_logs(mut self, logs: Vec<Value>) -> Self {
        self.logs = logs;
        self
    }

    pub fn with_tx(mut self, height: Option<u64>) -> Self {
        self.has_tx = true;
        self.tx_height = height;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Alter the stored header so it no longer hashes to its reported hash.
    pub fn tamper(mut self, height: u64) -> Self {
        if let Some(header) = self.headers.get_mut(&height) {
            header["gasUsed"] = json!("0x1");
        }
        self
    }

    pub fn single_calls(&self) -> Vec<String> {
        self.singles.lock().unwrap().clone()
    }

    pub fn batch_calls(&self) -> Vec<Vec<String>> {
        self.batches.lock().unwrap().clone()
    }

    pub fn total_calls(&self) -> usize {
        self.single_calls().len() + self.batch_calls().len()
    }

    fn tip(&self) -> u64 {
        self.headers.keys().next_back().copied().unwrap_or(0)
    }

    fn block(&self, height: u64, full: bool) -> Value {
        let Some(header) = self.headers.get(&height) else {
            return Value::Null;
        };
        let mut block = header.clone();
        block["transactions"] = if full {
            json!([tx_summary(height)])
        } else {
            json!([word(height + 1_000_000)])
        };
        block
    }

    fn answer(&self, req: &JsonRpcRequest) -> JsonRpcResponse {
        let id = req.id.clone();
        let fail = |code: i64, message: &str| {
            JsonRpcResponse::failure(
                id.clone(),
                JsonRpcError {
                    code,
                    message: message.to_string(),
                    data: None,
                },
            )
        };
        if self.failing_methods.contains(&req.method) {
            return fail(-32000, "internal error");
        }

        let param = |i: usize| req.params.get(i).cloned().unwrap_or(Value::Null);
        let result = match req.method.as_str() {
            "eth_getBlockByNumber" => {
                let height = match param(0).as_str().unwrap_or_default() {
                    "latest" | "pending" => self.tip(),
                    "safe" => self.tip().saturating_sub(32),
                    "finalized" => self.tip().saturating_sub(64),
                    "earliest" => 0,
                    hex => u64::from_str_radix(hex.trim_start_matches("0x"), 16).unwrap(),
                };
                if self.failing_heights.contains(&height) {
                    return fail(-32000, "header not found");
                }
                self.block(height, param(1).as_bool().unwrap_or(false))
            }
            "eth_getBlockByHash" => {
                let wanted = param(0);
                self.headers
                    .iter()
                    .find(|(_, header)| header["hash"] == wanted)
                    .map(|(height, _)| self.block(*height, param(1).as_bool().unwrap_or(false)))
                    .unwrap_or(Value::Null)
            }
            "eth_getLogs" => {
                let filter = param(0);
                let addresses: Vec<String> = filter["address"]
                    .as_array()
                    .map(|list| {
                        list.iter()
                            .filter_map(Value::as_str)
                            .map(str::to_lowercase)
                            .collect()
                    })
                    .unwrap_or_default();
                let matches = |log: &Value| {
                    let address = log["address"].as_str().unwrap_or_default().to_lowercase();
                    addresses.is_empty() || addresses.contains(&address)
                };
                Value::Array(
                    self.logs
                        .iter()
                        .filter(|log| matches(log))
                        .cloned()
                        .collect(),
                )
            }
            "eth_gasPrice" => json!("0x3b9aca00"),
            "eth_maxPriorityFeePerGas" => json!("0x77359400"),
            "eth_getTransactionCount" => json!("0x7"),
            "eth_getBalance" => json!("0xde0b6b3a7640000"),
            "eth_call" => json!(word(500)),
            "eth_sendRawTransaction" => json!(TX_HASH),
            "eth_getTransactionByHash" if self.has_tx && param(0) == json!(TX_HASH) => {
                tx_json(self.tx_height)
            }
            "eth_getTransactionReceipt" if param(0) == json!(TX_HASH) => match self.tx_height {
                Some(height) if self.has_tx => receipt_json(height),
                _ => Value::Null,
            },
            "eth_getTransactionByHash" | "eth_getTransactionReceipt" => Value::Null,
            "eth_getProof" => json!({ "address": param(0), "storageHash": STORAGE_ROOT }),
            _ => return fail(-32601, "method not found"),
        };
        JsonRpcResponse::success(id, result)
    }
}

#[async_trait]
impl RpcTransport for MockNode {
    async fn send(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, TransportError> {
        self.singles.lock().unwrap().push(req.method.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.answer(&req))
    }

    async fn send_batch(
        &self,
        reqs: Vec<JsonRpcRequest>,
    ) -> Result<Vec<JsonRpcResponse>, TransportError> {
        self.batches
            .lock()
            .unwrap()
            .push(reqs.iter().map(|r| r.method.clone()).collect());
        Ok(reqs.iter().rev().map(|r| self.answer(r)).collect())
    }

    fn url(&self) -> &str {
        "mock://node"
    }
}

pub fn node_config(supports_batch: bool) -> NodeConfig {
    NodeConfig {
        supports_batch,
        ..NodeConfig::single("mock://node")
    }
}

pub fn client(node: &Arc<MockNode>, supports_batch: bool) -> EthClient {
    EthClient::new(node.clone(), &node_config(supports_batch))
}
