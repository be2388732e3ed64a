//! EVM domain types decoded from node JSON.

use std::fmt;
use std::str::FromStr;

use alloy_primitives::{keccak256, Address, Bloom, Bytes, B256, B64, U256};
use alloy_rlp::Encodable;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use chaingate_core::ChainError;

/// Serde helpers for hex quantities (`"0x1a"`) held as `u64`.
pub mod quantity {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn parse(s: &str) -> Option<u64> {
        let digits = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X"))?;
        if digits.is_empty() {
            return None;
        }
        u64::from_str_radix(digits, 16).ok()
    }

    pub fn serialize<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("{value:#x}"))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        let s = String::deserialize(deserializer)?;
        parse(&s).ok_or_else(|| D::Error::custom(format!("invalid hex quantity: {s}")))
    }

    pub mod opt {
        use super::*;

        pub fn serialize<S: Serializer>(value: &Option<u64>, serializer: S) -> Result<S::Ok, S::Error> {
            match value {
                Some(v) => super::serialize(v, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
            match Option::<String>::deserialize(deserializer)? {
                Some(s) => parse(&s)
                    .map(Some)
                    .ok_or_else(|| D::Error::custom(format!("invalid hex quantity: {s}"))),
                None => Ok(None),
            }
        }
    }
}

// ─── Block height selector ────────────────────────────────────────────────────

/// A block height or one of the symbolic tags a node understands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BlockNumberOrTag {
    Number(u64),
    #[default]
    Latest,
    Safe,
    Finalized,
    Earliest,
    Pending,
}

impl BlockNumberOrTag {
    /// The JSON-RPC argument: a hex quantity or the tag name.
    pub fn to_arg(&self) -> String {
        match self {
            Self::Number(n) => format!("{n:#x}"),
            Self::Latest => "latest".into(),
            Self::Safe => "safe".into(),
            Self::Finalized => "finalized".into(),
            Self::Earliest => "earliest".into(),
            Self::Pending => "pending".into(),
        }
    }
}

impl From<u64> for BlockNumberOrTag {
    fn from(n: u64) -> Self {
        Self::Number(n)
    }
}

impl fmt::Display for BlockNumberOrTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            tag => f.write_str(&tag.to_arg()),
        }
    }
}

impl FromStr for BlockNumberOrTag {
    type Err = ChainError;

    /// Accepts a tag name, a decimal height or a `0x` hex quantity.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.to_ascii_lowercase().as_str() {
            "latest" => return Ok(Self::Latest),
            "safe" => return Ok(Self::Safe),
            "finalized" => return Ok(Self::Finalized),
            "earliest" => return Ok(Self::Earliest),
            "pending" => return Ok(Self::Pending),
            _ => {}
        }
        let number = if s.starts_with("0x") || s.starts_with("0X") {
            quantity::parse(s)
        } else {
            s.parse::<u64>().ok()
        };
        number
            .map(Self::Number)
            .ok_or_else(|| ChainError::InvalidArgument(format!("invalid block number: {s:?}")))
    }
}

// ─── Header ───────────────────────────────────────────────────────────────────

/// Block header as returned by `eth_getBlockBy*` with bodies omitted.
///
/// Carries every field of the consensus encoding so the hash can be
/// recomputed locally. Fork-specific trailing fields are `None` on blocks
/// that predate the fork.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Header {
    /// Hash reported by the node; not part of the encoding.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<B256>,
    pub parent_hash: B256,
    #[serde(rename = "sha3Uncles")]
    pub ommers_hash: B256,
    #[serde(rename = "miner")]
    pub beneficiary: Address,
    pub state_root: B256,
    pub transactions_root: B256,
    pub receipts_root: B256,
    pub logs_bloom: Bloom,
    pub difficulty: U256,
    #[serde(with = "quantity")]
    pub number: u64,
    #[serde(with = "quantity")]
    pub gas_limit: u64,
    #[serde(with = "quantity")]
    pub gas_used: u64,
    #[serde(with = "quantity")]
    pub timestamp: u64,
    pub extra_data: Bytes,
    pub mix_hash: B256,
    pub nonce: B64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_fee_per_gas: Option<U256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub withdrawals_root: Option<B256>,
    #[serde(default, with = "quantity::opt", skip_serializing_if = "Option::is_none")]
    pub blob_gas_used: Option<u64>,
    #[serde(default, with = "quantity::opt", skip_serializing_if = "Option::is_none")]
    pub excess_blob_gas: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_beacon_block_root: Option<B256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requests_hash: Option<B256>,
}

impl Header {
    /// RLP encoding of the header, the preimage of its hash.
    pub fn rlp_bytes(&self) -> Vec<u8> {
        let mut fields: Vec<&dyn Encodable> = vec![
            &self.parent_hash,
            &self.ommers_hash,
            &self.beneficiary,
            &self.state_root,
            &self.transactions_root,
            &self.receipts_root,
            &self.logs_bloom,
            &self.difficulty,
            &self.number,
            &self.gas_limit,
            &self.gas_used,
            &self.timestamp,
            &self.extra_data,
            &self.mix_hash,
            &self.nonce,
        ];
        // Trailing fields are appended in fork order and only when present.
        if let Some(base_fee) = &self.base_fee_per_gas {
            fields.push(base_fee);
        }
        if let Some(root) = &self.withdrawals_root {
            fields.push(root);
        }
        if let Some(used) = &self.blob_gas_used {
            fields.push(used);
        }
        if let Some(excess) = &self.excess_blob_gas {
            fields.push(excess);
        }
        if let Some(root) = &self.parent_beacon_block_root {
            fields.push(root);
        }
        if let Some(hash) = &self.requests_hash {
            fields.push(hash);
        }

        let payload_length = fields.iter().map(|field| field.length()).sum();
        let mut out = Vec::with_capacity(payload_length + 4);
        alloy_rlp::Header {
            list: true,
            payload_length,
        }
        .encode(&mut out);
        for field in fields {
            field.encode(&mut out);
        }
        out
    }

    /// keccak256 of the RLP encoding.
    pub fn hash_slow(&self) -> B256 {
        keccak256(self.rlp_bytes())
    }

    /// The node-reported hash, or the computed one when the node sent none.
    pub fn block_hash(&self) -> B256 {
        self.hash.unwrap_or_else(|| self.hash_slow())
    }
}

// ─── Blocks and transactions ──────────────────────────────────────────────────

/// The parts of a transaction a block listing needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionSummary {
    pub hash: B256,
    pub from: Address,
    /// `None` for contract creation.
    #[serde(default)]
    pub to: Option<Address>,
    pub value: U256,
}

/// A block with full transaction bodies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    #[serde(flatten)]
    pub header: Header,
    #[serde(default)]
    pub transactions: Vec<TransactionSummary>,
}

/// Full transaction object from `eth_getTransactionByHash`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub hash: B256,
    #[serde(with = "quantity")]
    pub nonce: u64,
    /// `None` while pending.
    #[serde(default)]
    pub block_hash: Option<B256>,
    #[serde(default, with = "quantity::opt")]
    pub block_number: Option<u64>,
    #[serde(default, with = "quantity::opt")]
    pub transaction_index: Option<u64>,
    pub from: Address,
    #[serde(default)]
    pub to: Option<Address>,
    pub value: U256,
    #[serde(with = "quantity")]
    pub gas: u64,
    #[serde(default)]
    pub gas_price: Option<U256>,
    #[serde(default)]
    pub max_fee_per_gas: Option<U256>,
    #[serde(default)]
    pub max_priority_fee_per_gas: Option<U256>,
    pub input: Bytes,
    #[serde(rename = "type", default, with = "quantity::opt")]
    pub tx_type: Option<u64>,
}

/// One event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Log {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
    #[serde(default, with = "quantity::opt")]
    pub block_number: Option<u64>,
    #[serde(default)]
    pub block_hash: Option<B256>,
    #[serde(default)]
    pub transaction_hash: Option<B256>,
    #[serde(default, with = "quantity::opt")]
    pub transaction_index: Option<u64>,
    #[serde(default, with = "quantity::opt")]
    pub log_index: Option<u64>,
    #[serde(default)]
    pub removed: bool,
}

/// Transaction receipt from `eth_getTransactionReceipt`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    pub transaction_hash: B256,
    #[serde(with = "quantity")]
    pub transaction_index: u64,
    pub block_hash: B256,
    #[serde(with = "quantity")]
    pub block_number: u64,
    pub from: Address,
    #[serde(default)]
    pub to: Option<Address>,
    #[serde(with = "quantity")]
    pub cumulative_gas_used: u64,
    #[serde(with = "quantity")]
    pub gas_used: u64,
    #[serde(default)]
    pub effective_gas_price: Option<U256>,
    #[serde(default)]
    pub contract_address: Option<Address>,
    #[serde(default)]
    pub logs: Vec<Log>,
    /// 1 success, 0 failure. Absent on pre-Byzantium receipts.
    #[serde(default, with = "quantity::opt")]
    pub status: Option<u64>,
}

impl Receipt {
    /// Fee actually paid, when the node reports the effective gas price.
    pub fn fee(&self) -> Option<U256> {
        self.effective_gas_price
            .map(|price| price.saturating_mul(U256::from(self.gas_used)))
    }
}

/// The subset of an `eth_getProof` answer this gateway reads.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountProof {
    pub storage_hash: B256,
}

// ─── Log filtering ────────────────────────────────────────────────────────────

/// Log filter: addresses, per-position topic alternatives, and either a
/// block-hash pin or a height range.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterQuery {
    pub addresses: Vec<Address>,
    /// Position `i` matches any of `topics[i]`; an empty position matches anything.
    pub topics: Vec<Vec<B256>>,
    pub block_hash: Option<B256>,
    pub from_block: Option<BlockNumberOrTag>,
    pub to_block: Option<BlockNumberOrTag>,
}

impl FilterQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn address(mut self, address: Address) -> Self {
        self.addresses.push(address);
        self
    }

    pub fn topic(mut self, position: usize, topic: B256) -> Self {
        if self.topics.len() <= position {
            self.topics.resize(position + 1, Vec::new());
        }
        self.topics[position].push(topic);
        self
    }

    pub fn from_block(mut self, block: impl Into<BlockNumberOrTag>) -> Self {
        self.from_block = Some(block.into());
        self
    }

    pub fn to_block(mut self, block: impl Into<BlockNumberOrTag>) -> Self {
        self.to_block = Some(block.into());
        self
    }

    pub fn block_hash(mut self, hash: B256) -> Self {
        self.block_hash = Some(hash);
        self
    }

    /// Build the `eth_getLogs` argument object.
    ///
    /// A block-hash pin excludes a range. Without a pin the range defaults to
    /// `0x0..latest`.
    pub fn to_filter_arg(&self) -> Result<Value, ChainError> {
        let topics: Vec<Value> = self
            .topics
            .iter()
            .map(|alternatives| match alternatives.as_slice() {
                [] => Value::Null,
                [single] => json!(single),
                many => json!(many),
            })
            .collect();
        let mut arg = json!({ "address": self.addresses, "topics": topics });

        match self.block_hash {
            Some(hash) => {
                if self.from_block.is_some() || self.to_block.is_some() {
                    return Err(ChainError::InvalidArgument(
                        "cannot specify both blockHash and fromBlock/toBlock".into(),
                    ));
                }
                arg["blockHash"] = json!(hash);
            }
            None => {
                arg["fromBlock"] = match self.from_block {
                    Some(from) => json!(from.to_arg()),
                    None => json!("0x0"),
                };
                arg["toBlock"] = json!(self.to_block.unwrap_or_default().to_arg());
            }
        }
        Ok(arg)
    }
}

/// Matched logs plus the header of the block the query ended at.
#[derive(Debug, Clone, PartialEq)]
pub struct LogsResult {
    pub logs: Vec<Log>,
    pub to_block_header: Header,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn genesis_json() -> Value {
        let zero32 = format!("0x{}", "0".repeat(64));
        json!({
            "hash": "0xd4e56740f876aef8c010b86a40d5f56745a118d0906a34e69aec8c0db1cb8fa3",
            "parentHash": zero32,
            "sha3Uncles": "0x1dcc4de8dec75d7aab85b567b6ccd41ad312451b948a7413f0a142fd40d49347",
            "miner": "0x0000000000000000000000000000000000000000",
            "stateRoot": "0xd7f8974fb5ac78d9ac099b9ad5018bedc2ce0a72dad1827a1709da30580f0544",
            "transactionsRoot": "0x56e81f171bcc55a6ff8345e692c0f86e5b48e01b996cadc001622fb5e363b421",
            "receiptsRoot": "0x56e81f171bcc55a6ff8345e692c0f86e5b48e01b996cadc001622fb5e363b421",
            "logsBloom": format!("0x{}", "0".repeat(512)),
            "difficulty": "0x400000000",
            "number": "0x0",
            "gasLimit": "0x1388",
            "gasUsed": "0x0",
            "timestamp": "0x0",
            "extraData": "0x11bbe8db4e347b4e8c937c1c8370e4b5ed33adb3db69cbdb7a38e1e50b1b82fa",
            "mixHash": zero32,
            "nonce": "0x0000000000000042",
            "size": "0x21c",
            "totalDifficulty": "0x400000000",
            "uncles": [],
            "transactions": []
        })
    }

    #[test]
    fn mainnet_genesis_hash_recomputes() {
        let header: Header = serde_json::from_value(genesis_json()).unwrap();
        assert_eq!(header.number, 0);
        assert_eq!(header.gas_limit, 5000);
        assert!(header.base_fee_per_gas.is_none());
        assert_eq!(Some(header.hash_slow()), header.hash);
    }

    #[test]
    fn tampered_field_changes_hash() {
        let mut header: Header = serde_json::from_value(genesis_json()).unwrap();
        header.gas_used = 1;
        assert_ne!(Some(header.hash_slow()), header.hash);
    }

    #[test]
    fn trailing_fields_extend_encoding() {
        let mut header: Header = serde_json::from_value(genesis_json()).unwrap();
        let legacy = header.rlp_bytes().len();
        header.base_fee_per_gas = Some(U256::from(7u64));
        assert_eq!(header.rlp_bytes().len(), legacy + 1);
    }

    #[test]
    fn block_decodes_flattened_header_and_bodies() {
        let mut raw = genesis_json();
        raw["transactions"] = json!([{
            "hash": format!("0x{}", "ab".repeat(32)),
            "from": "0x00000000000000000000000000000000000000aa",
            "to": null,
            "value": "0xde0b6b3a7640000",
            "nonce": "0x0"
        }]);
        let block: Block = serde_json::from_value(raw).unwrap();
        assert_eq!(block.header.number, 0);
        assert_eq!(block.transactions.len(), 1);
        assert!(block.transactions[0].to.is_none());
        assert_eq!(block.transactions[0].value.to_string(), "1000000000000000000");
    }

    #[test]
    fn block_number_args() {
        assert_eq!(BlockNumberOrTag::Number(1000).to_arg(), "0x3e8");
        assert_eq!(BlockNumberOrTag::Number(0).to_arg(), "0x0");
        assert_eq!(BlockNumberOrTag::default().to_arg(), "latest");
        assert_eq!(BlockNumberOrTag::Finalized.to_arg(), "finalized");
        assert_eq!("0x3e8".parse::<BlockNumberOrTag>().unwrap(), BlockNumberOrTag::Number(1000));
        assert_eq!("1000".parse::<BlockNumberOrTag>().unwrap(), BlockNumberOrTag::Number(1000));
        assert_eq!("Safe".parse::<BlockNumberOrTag>().unwrap(), BlockNumberOrTag::Safe);
        assert!("0x".parse::<BlockNumberOrTag>().is_err());
        assert!("tip".parse::<BlockNumberOrTag>().is_err());
    }

    #[test]
    fn filter_arg_defaults_range() {
        let address = Address::repeat_byte(0xaa);
        let arg = FilterQuery::new().address(address).to_filter_arg().unwrap();
        assert_eq!(arg["fromBlock"], "0x0");
        assert_eq!(arg["toBlock"], "latest");
        assert!(arg.get("blockHash").is_none());
        assert_eq!(arg["address"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn filter_arg_topics_positions() {
        let t1 = B256::repeat_byte(1);
        let t2 = B256::repeat_byte(2);
        let arg = FilterQuery::new()
            .topic(0, t1)
            .topic(2, t1)
            .topic(2, t2)
            .from_block(100)
            .to_block(200)
            .to_filter_arg()
            .unwrap();
        let topics = arg["topics"].as_array().unwrap();
        assert_eq!(topics.len(), 3);
        assert_eq!(topics[0], json!(t1));
        assert!(topics[1].is_null());
        assert_eq!(topics[2].as_array().unwrap().len(), 2);
        assert_eq!(arg["fromBlock"], "0x64");
        assert_eq!(arg["toBlock"], "0xc8");
    }

    #[test]
    fn filter_arg_rejects_hash_with_range() {
        let err = FilterQuery::new()
            .block_hash(B256::repeat_byte(9))
            .to_block(200)
            .to_filter_arg()
            .unwrap_err();
        assert!(matches!(err, ChainError::InvalidArgument(_)));

        let arg = FilterQuery::new()
            .block_hash(B256::repeat_byte(9))
            .to_filter_arg()
            .unwrap();
        assert!(arg.get("fromBlock").is_none());
        assert!(arg.get("toBlock").is_none());
    }

    #[test]
    fn receipt_fee_is_gas_used_times_price() {
        let receipt: Receipt = serde_json::from_value(json!({
            "transactionHash": format!("0x{}", "11".repeat(32)),
            "transactionIndex": "0x0",
            "blockHash": format!("0x{}", "22".repeat(32)),
            "blockNumber": "0x10",
            "from": "0x00000000000000000000000000000000000000aa",
            "to": null,
            "cumulativeGasUsed": "0x5208",
            "gasUsed": "0x5208",
            "effectiveGasPrice": "0x3b9aca00",
            "contractAddress": "0x00000000000000000000000000000000000000cc",
            "logs": [],
            "status": "0x1"
        }))
        .unwrap();
        assert_eq!(receipt.fee(), Some(U256::from(21_000u64 * 1_000_000_000)));
        assert_eq!(receipt.status, Some(1));
    }
}
