//! Canonical request and response records of the adaptor contract.
//!
//! Every response carries a [`ReturnCode`] and a human-readable message, so a
//! caller always receives a well-formed record even when the node call behind
//! it failed.

use serde::{Deserialize, Serialize};

/// Outcome of an adaptor operation.
///
/// Defaults to `Error`: a record only reports success once
/// [`Response::success`] has been applied to it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReturnCode {
    Success,
    #[default]
    Error,
}

/// Implemented by every response record.
pub trait Response: Default {
    fn set_status(&mut self, code: ReturnCode, msg: String);

    /// An empty response carrying only an error status.
    fn error(msg: impl Into<String>) -> Self {
        let mut resp = Self::default();
        resp.set_status(ReturnCode::Error, msg.into());
        resp
    }

    /// Attach a success status to a filled-in response.
    fn success(mut self, msg: impl Into<String>) -> Self {
        self.set_status(ReturnCode::Success, msg.into());
        self
    }
}

macro_rules! response {
    ($(#[$meta:meta])* $name:ident { $($(#[$fmeta:meta])* $field:ident : $ty:ty),* $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
        pub struct $name {
            pub code: ReturnCode,
            pub msg: String,
            $($(#[$fmeta])* pub $field: $ty,)*
        }

        impl Response for $name {
            fn set_status(&mut self, code: ReturnCode, msg: String) {
                self.code = code;
                self.msg = msg;
            }
        }
    };
}

// ─── Requests ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SupportChainsRequest {
    pub chain: String,
    pub network: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConvertAddressRequest {
    pub chain: String,
    pub network: String,
    /// Hex-encoded public key.
    pub public_key: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidAddressRequest {
    pub chain: String,
    pub network: String,
    pub address: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BlockNumberRequest {
    pub chain: String,
    /// Block number, or -1 pending, -2 latest, -3 finalized, -4 safe.
    pub height: i64,
    pub view_tx: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BlockHashRequest {
    pub chain: String,
    pub hash: String,
    pub view_tx: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BlockHeaderNumberRequest {
    pub chain: String,
    pub network: String,
    /// Block number, or -1 pending, -2 latest, -3 finalized, -4 safe.
    pub height: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BlockHeaderHashRequest {
    pub chain: String,
    pub network: String,
    pub hash: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountRequest {
    pub chain: String,
    pub network: String,
    pub address: String,
    pub contract_address: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeeRequest {
    pub chain: String,
    pub network: String,
    pub raw_tx: String,
    pub address: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SendTxRequest {
    pub chain: String,
    pub network: String,
    pub raw_tx: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TxAddressRequest {
    pub chain: String,
    pub network: String,
    pub address: String,
    pub contract_address: String,
    pub page: u32,
    pub pagesize: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TxHashRequest {
    pub chain: String,
    pub network: String,
    pub hash: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BlockByRangeRequest {
    pub chain: String,
    pub network: String,
    pub start: String,
    pub end: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UnSignTransactionRequest {
    pub chain: String,
    pub network: String,
    pub base64_tx: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SignedTransactionRequest {
    pub chain: String,
    pub network: String,
    pub base64_tx: String,
    pub signature: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DecodeTransactionRequest {
    pub chain: String,
    pub network: String,
    pub raw_data: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerifySignedTxRequest {
    pub chain: String,
    pub network: String,
    pub public_key: String,
    pub signature: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtraDataRequest {
    pub chain: String,
    pub network: String,
    pub address: String,
}

// ─── Shared records ───────────────────────────────────────────────────────────

/// One transaction inside a block response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlockInfoTransaction {
    pub from: String,
    pub to: String,
    pub hash: String,
    pub amount: String,
}

/// Canonical block header. Quantities are decimal strings, hashes hex.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub hash: String,
    pub parent_hash: String,
    pub uncle_hash: String,
    pub coin_base: String,
    pub root: String,
    pub tx_hash: String,
    pub receipt_hash: String,
    pub parent_beacon_root: String,
    pub difficulty: String,
    pub number: String,
    pub gas_limit: u64,
    pub gas_used: u64,
    pub time: u64,
    pub extra: String,
    pub mix_digest: String,
    pub nonce: String,
    pub base_fee: String,
    pub withdrawals_hash: String,
    pub blob_gas_used: u64,
    pub excess_blob_gas: u64,
}

/// Canonical transaction record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TxMessage {
    pub hash: String,
    pub index: u64,
    pub froms: Vec<String>,
    pub tos: Vec<String>,
    pub values: Vec<String>,
    pub fee: String,
    /// 1 for success, 0 for failure, absent while pending.
    pub status: Option<u64>,
    pub height: String,
    pub contract_address: String,
    pub datetime: String,
}

// ─── Responses ────────────────────────────────────────────────────────────────

response!(SupportChainsResponse { support: bool });
response!(ConvertAddressResponse { address: String });
response!(ValidAddressResponse { valid: bool });
response!(BlockResponse {
    height: i64,
    hash: String,
    base_fee: String,
    transactions: Vec<BlockInfoTransaction>,
});
response!(BlockHeaderResponse { block_header: Option<BlockHeader> });
response!(AccountResponse {
    network: String,
    account_number: String,
    /// Transaction count (nonce) of the account.
    sequence: String,
    balance: String,
});
response!(FeeResponse {
    slow_fee: String,
    normal_fee: String,
    fast_fee: String,
});
response!(SendTxResponse { tx_hash: String });
response!(TxAddressResponse { tx: Vec<TxMessage> });
response!(TxHashResponse { tx: Option<TxMessage> });
response!(BlockByRangeResponse { block_header: Vec<BlockHeader> });
response!(UnSignTransactionResponse { un_sign_tx: String });
response!(SignedTransactionResponse { signed_tx: String });
response!(DecodeTransactionResponse { base64_tx: String });
response!(VerifySignedTxResponse { verify: bool });
response!(ExtraDataResponse { value: String });

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_response_has_error_code_and_empty_payload() {
        let resp = BlockResponse::error("block by number error: not found: block 100");
        assert_eq!(resp.code, ReturnCode::Error);
        assert!(resp.msg.contains("not found"));
        assert!(resp.transactions.is_empty());
        assert_eq!(resp.height, 0);
    }

    #[test]
    fn success_response_serializes_code() {
        let resp = SendTxResponse {
            tx_hash: "0xabc".into(),
            ..Default::default()
        }
        .success("send tx success");
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["code"], "SUCCESS");
        assert_eq!(json["tx_hash"], "0xabc");
    }

    #[test]
    fn unfinished_response_is_not_a_success() {
        let resp = BlockResponse::default();
        assert_eq!(resp.code, ReturnCode::Error);
        assert!(resp.msg.is_empty());

        let resp = BlockResponse {
            height: 7,
            ..Default::default()
        }
        .success("block by number success");
        assert_eq!(resp.code, ReturnCode::Success);
        assert_eq!(resp.height, 7);
    }
}
