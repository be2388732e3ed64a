//! EVM implementation of the adaptor contract.

use std::str::FromStr;

use alloy_primitives::{hex, keccak256, Address, B256, U256};
use async_trait::async_trait;

use chaingate_core::account::*;
use chaingate_core::{AdaptorResult, ChainAdaptor, ChainError, NodeConfig};

use crate::client::EthClient;
use crate::types::{BlockNumberOrTag, Header};

/// Default registry name of the Ethereum adaptor.
pub const CHAIN_NAME: &str = "ethereum";

/// Adaptor for one EVM network, owning its node connection.
///
/// The connection is closed when the adaptor is dropped.
pub struct EthereumAdaptor {
    chain_name: String,
    network: String,
    confirmations: u64,
    client: EthClient,
}

impl EthereumAdaptor {
    /// Dial the node configured for this network. Fails if every dial
    /// attempt fails.
    pub async fn connect(
        chain_name: impl Into<String>,
        network: impl Into<String>,
        node: &NodeConfig,
    ) -> Result<Self, ChainError> {
        let chain_name = chain_name.into();
        let client = EthClient::dial(node).await.map_err(|e| {
            tracing::error!(chain = %chain_name, error = %e, "failed to connect chain adaptor");
            e
        })?;
        Ok(Self {
            chain_name,
            network: network.into(),
            confirmations: node.confirmations,
            client,
        })
    }

    /// Build an adaptor around an already connected client.
    pub fn with_client(
        chain_name: impl Into<String>,
        network: impl Into<String>,
        client: EthClient,
    ) -> Self {
        Self {
            chain_name: chain_name.into(),
            network: network.into(),
            confirmations: 0,
            client,
        }
    }

    pub fn client(&self) -> &EthClient {
        &self.client
    }

    /// Blocks a block needs on top of it before it counts as final.
    pub fn confirmations(&self) -> u64 {
        self.confirmations
    }

    fn block_response(block: crate::types::Block) -> BlockResponse {
        let transactions = block
            .transactions
            .into_iter()
            .map(|tx| BlockInfoTransaction {
                from: tx.from.to_checksum(None),
                to: tx.to.map(|to| to.to_checksum(None)).unwrap_or_default(),
                hash: tx.hash.to_string(),
                amount: tx.value.to_string(),
            })
            .collect();
        BlockResponse {
            height: block.header.number as i64,
            hash: block.header.block_hash().to_string(),
            base_fee: block
                .header
                .base_fee_per_gas
                .map(|fee| fee.to_string())
                .unwrap_or_default(),
            transactions,
            ..Default::default()
        }
    }
}

impl Drop for EthereumAdaptor {
    fn drop(&mut self) {
        self.client.close();
    }
}

impl std::fmt::Debug for EthereumAdaptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EthereumAdaptor")
            .field("chain_name", &self.chain_name)
            .field("network", &self.network)
            .field("url", &self.client.url())
            .finish()
    }
}

/// Canonical header record: quantities in decimal, hashes in hex.
pub fn canonical_header(header: &Header) -> BlockHeader {
    BlockHeader {
        hash: header.block_hash().to_string(),
        parent_hash: header.parent_hash.to_string(),
        uncle_hash: header.ommers_hash.to_string(),
        coin_base: header.beneficiary.to_checksum(None),
        root: header.state_root.to_string(),
        tx_hash: header.transactions_root.to_string(),
        receipt_hash: header.receipts_root.to_string(),
        parent_beacon_root: header
            .parent_beacon_block_root
            .map(|root| root.to_string())
            .unwrap_or_default(),
        difficulty: header.difficulty.to_string(),
        number: header.number.to_string(),
        gas_limit: header.gas_limit,
        gas_used: header.gas_used,
        time: header.timestamp,
        extra: hex::encode_prefixed(&header.extra_data),
        mix_digest: header.mix_hash.to_string(),
        nonce: header.nonce.to_string(),
        base_fee: header
            .base_fee_per_gas
            .map(|fee| fee.to_string())
            .unwrap_or_default(),
        withdrawals_hash: header
            .withdrawals_root
            .map(|root| root.to_string())
            .unwrap_or_default(),
        blob_gas_used: header.blob_gas_used.unwrap_or_default(),
        excess_blob_gas: header.excess_blob_gas.unwrap_or_default(),
    }
}

/// Address derived from an uncompressed secp256k1 public key, given as hex
/// with or without the `04` prefix.
pub fn address_from_public_key(public_key: &str) -> Result<Address, ChainError> {
    let bytes = hex::decode(public_key.trim())
        .map_err(|e| ChainError::InvalidArgument(format!("public key is not hex: {e}")))?;
    let raw = match bytes.len() {
        65 if bytes[0] == 0x04 => &bytes[1..],
        64 => &bytes[..],
        33 => {
            return Err(ChainError::InvalidArgument(
                "compressed public keys are not supported".into(),
            ))
        }
        n => {
            return Err(ChainError::InvalidArgument(format!(
                "public key has {n} bytes, expected 64 or 65"
            )))
        }
    };
    Ok(Address::from_word(keccak256(raw)))
}

/// `0x` + 40 hex digits; mixed-case input must carry a valid checksum.
pub fn is_valid_address(address: &str) -> bool {
    let Some(digits) = address.strip_prefix("0x") else {
        return false;
    };
    if digits.len() != 40 {
        return false;
    }
    let Ok(parsed) = Address::from_str(address) else {
        return false;
    };
    let has_upper = digits.chars().any(|c| c.is_ascii_uppercase());
    let has_lower = digits.chars().any(|c| c.is_ascii_lowercase());
    if has_upper && has_lower {
        parsed.to_checksum(None) == address
    } else {
        true
    }
}

/// Non-negative heights are block numbers. -1 pending, -2 latest,
/// -3 finalized, -4 safe.
fn height_selector(height: i64) -> Result<BlockNumberOrTag, ChainError> {
    match height {
        h if h >= 0 => Ok(BlockNumberOrTag::Number(h as u64)),
        -1 => Ok(BlockNumberOrTag::Pending),
        -2 => Ok(BlockNumberOrTag::Latest),
        -3 => Ok(BlockNumberOrTag::Finalized),
        -4 => Ok(BlockNumberOrTag::Safe),
        h => Err(ChainError::InvalidArgument(format!(
            "unsupported block height {h}"
        ))),
    }
}

fn parse_hash(hash: &str) -> Result<B256, ChainError> {
    B256::from_str(hash.trim())
        .map_err(|e| ChainError::InvalidArgument(format!("invalid hash {hash:?}: {e}")))
}

fn parse_address(address: &str) -> Result<Address, ChainError> {
    Address::from_str(address.trim())
        .map_err(|e| ChainError::InvalidArgument(format!("invalid address {address:?}: {e}")))
}

fn parse_height(height: &str) -> Result<u64, ChainError> {
    match height.parse::<BlockNumberOrTag>()? {
        BlockNumberOrTag::Number(n) => Ok(n),
        tag => Err(ChainError::InvalidArgument(format!(
            "range bounds must be heights, got {tag}"
        ))),
    }
}

/// Log the failure and fold it into an error response.
fn failed<R: Response>(operation: &str, err: ChainError) -> R {
    tracing::warn!(operation, error = %err, "adaptor operation failed");
    R::error(format!("{operation} error: {err}"))
}

#[async_trait]
impl ChainAdaptor for EthereumAdaptor {
    fn chain_name(&self) -> &str {
        &self.chain_name
    }

    async fn get_support_chains(
        &self,
        req: SupportChainsRequest,
    ) -> AdaptorResult<SupportChainsResponse> {
        let support = req.chain.eq_ignore_ascii_case(&self.chain_name);
        let msg = if support {
            "support this chain"
        } else {
            "not support this chain"
        };
        Ok(SupportChainsResponse {
            support,
            ..Default::default()
        }
        .success(msg))
    }

    async fn convert_address(
        &self,
        req: ConvertAddressRequest,
    ) -> AdaptorResult<ConvertAddressResponse> {
        Ok(match address_from_public_key(&req.public_key) {
            Ok(address) => ConvertAddressResponse {
                address: address.to_checksum(None),
                ..Default::default()
            }
            .success("convert address success"),
            Err(e) => failed("convert address", e),
        })
    }

    async fn valid_address(&self, req: ValidAddressRequest) -> AdaptorResult<ValidAddressResponse> {
        let valid = is_valid_address(req.address.trim());
        Ok(ValidAddressResponse {
            valid,
            ..Default::default()
        }
        .success(if valid { "valid address" } else { "invalid address" }))
    }

    async fn get_block_by_number(&self, req: BlockNumberRequest) -> AdaptorResult<BlockResponse> {
        let result = match height_selector(req.height) {
            Ok(selector) => self.client.block_by_number(selector).await,
            Err(e) => Err(e),
        };
        Ok(match result {
            Ok(block) => Self::block_response(block).success("block by number success"),
            Err(e) => failed("block by number", e),
        })
    }

    async fn get_block_by_hash(&self, req: BlockHashRequest) -> AdaptorResult<BlockResponse> {
        let result = match parse_hash(&req.hash) {
            Ok(hash) => self.client.block_by_hash(hash).await,
            Err(e) => Err(e),
        };
        Ok(match result {
            Ok(block) => Self::block_response(block).success("block by hash success"),
            Err(e) => failed("block by hash", e),
        })
    }

    async fn get_block_header_by_number(
        &self,
        req: BlockHeaderNumberRequest,
    ) -> AdaptorResult<BlockHeaderResponse> {
        let result = match height_selector(req.height) {
            Ok(selector) => self.client.header_by_number(selector).await,
            Err(e) => Err(e),
        };
        Ok(match result {
            Ok(header) => BlockHeaderResponse {
                block_header: Some(canonical_header(&header)),
                ..Default::default()
            }
            .success("get block header by number success"),
            Err(e) => failed("get block header by number", e),
        })
    }

    async fn get_block_header_by_hash(
        &self,
        req: BlockHeaderHashRequest,
    ) -> AdaptorResult<BlockHeaderResponse> {
        let result = match parse_hash(&req.hash) {
            Ok(hash) => self.client.header_by_hash(hash).await,
            Err(e) => Err(e),
        };
        Ok(match result {
            Ok(header) => BlockHeaderResponse {
                block_header: Some(canonical_header(&header)),
                ..Default::default()
            }
            .success("get block header by hash success"),
            Err(e) => failed("get block header by hash", e),
        })
    }

    async fn get_account(&self, req: AccountRequest) -> AdaptorResult<AccountResponse> {
        let result = async {
            let address = parse_address(&req.address)?;
            let nonce = self
                .client
                .tx_count_by_address(address, BlockNumberOrTag::Latest)
                .await?;
            let balance = if req.contract_address.trim().is_empty() {
                self.client.balance_at(address, BlockNumberOrTag::Latest).await?
            } else {
                let token = parse_address(&req.contract_address)?;
                self.client
                    .token_balance_at(token, address, BlockNumberOrTag::Latest)
                    .await?
            };
            Ok::<_, ChainError>((nonce, balance))
        }
        .await;

        Ok(match result {
            Ok((nonce, balance)) => AccountResponse {
                network: self.network.clone(),
                account_number: "0".into(),
                sequence: nonce.to_string(),
                balance: balance.to_string(),
                ..Default::default()
            }
            .success("get account response success"),
            Err(e) => failed("get account", e),
        })
    }

    async fn get_fee(&self, _req: FeeRequest) -> AdaptorResult<FeeResponse> {
        let result = async {
            let gas_price = self.client.suggest_gas_price().await?;
            let tip = self.client.suggest_gas_tip_cap().await?;
            Ok::<_, ChainError>((gas_price, tip))
        }
        .await;

        Ok(match result {
            Ok((gas_price, tip)) => FeeResponse {
                slow_fee: gas_price.to_string(),
                normal_fee: gas_price.saturating_add(tip).to_string(),
                fast_fee: gas_price
                    .saturating_add(tip.saturating_mul(U256::from(2u64)))
                    .to_string(),
                ..Default::default()
            }
            .success("get gas price success"),
            Err(e) => failed("get fee", e),
        })
    }

    async fn send_tx(&self, req: SendTxRequest) -> AdaptorResult<SendTxResponse> {
        let raw = req.raw_tx.trim();
        let raw_tx = if raw.starts_with("0x") {
            raw.to_string()
        } else {
            format!("0x{raw}")
        };
        Ok(match self.client.send_raw_transaction(&raw_tx).await {
            Ok(hash) => SendTxResponse {
                tx_hash: hash.to_string(),
                ..Default::default()
            }
            .success("send tx success"),
            Err(e) => failed("send tx", e),
        })
    }

    async fn get_tx_by_address(&self, _req: TxAddressRequest) -> AdaptorResult<TxAddressResponse> {
        Err(ChainError::not_implemented(&self.chain_name, "get_tx_by_address"))
    }

    async fn get_tx_by_hash(&self, req: TxHashRequest) -> AdaptorResult<TxHashResponse> {
        let result = async {
            let hash = parse_hash(&req.hash)?;
            let tx = self.client.tx_by_hash(hash).await?;
            let receipt = match self.client.tx_receipt_by_hash(hash).await {
                Ok(receipt) => Some(receipt),
                Err(e) if e.is_not_found() => None,
                Err(e) => return Err(e),
            };
            let datetime = match tx.block_number {
                Some(height) => self
                    .client
                    .header_by_number(height.into())
                    .await?
                    .timestamp
                    .to_string(),
                None => String::new(),
            };

            let contract_address = receipt
                .as_ref()
                .and_then(|r| r.contract_address)
                .map(|a| a.to_checksum(None))
                .unwrap_or_default();
            let to = tx
                .to
                .map(|to| to.to_checksum(None))
                .unwrap_or_else(|| contract_address.clone());
            let fee = match &receipt {
                Some(r) => r.fee(),
                None => tx
                    .gas_price
                    .or(tx.max_fee_per_gas)
                    .map(|price| price.saturating_mul(U256::from(tx.gas))),
            };

            Ok::<_, ChainError>(TxMessage {
                hash: tx.hash.to_string(),
                index: tx.transaction_index.unwrap_or_default(),
                froms: vec![tx.from.to_checksum(None)],
                tos: vec![to],
                values: vec![tx.value.to_string()],
                fee: fee.map(|f| f.to_string()).unwrap_or_default(),
                status: receipt.as_ref().and_then(|r| r.status),
                height: tx.block_number.map(|h| h.to_string()).unwrap_or_default(),
                contract_address,
                datetime,
            })
        }
        .await;

        Ok(match result {
            Ok(tx) => TxHashResponse {
                tx: Some(tx),
                ..Default::default()
            }
            .success("get transaction success"),
            Err(e) => failed("get transaction", e),
        })
    }

    async fn get_block_by_range(
        &self,
        req: BlockByRangeRequest,
    ) -> AdaptorResult<BlockByRangeResponse> {
        let result: Result<Vec<Header>, ChainError> = async {
            let start = parse_height(&req.start)?;
            let end = parse_height(&req.end)?;
            self.client.headers_by_range(start, end).await
        }
        .await;

        Ok(match result {
            Ok(headers) => BlockByRangeResponse {
                block_header: headers.iter().map(canonical_header).collect(),
                ..Default::default()
            }
            .success("get block range success"),
            Err(e) => failed("get block range", e),
        })
    }

    async fn create_unsign_transaction(
        &self,
        _req: UnSignTransactionRequest,
    ) -> AdaptorResult<UnSignTransactionResponse> {
        Err(ChainError::not_implemented(&self.chain_name, "create_unsign_transaction"))
    }

    async fn build_signed_transaction(
        &self,
        _req: SignedTransactionRequest,
    ) -> AdaptorResult<SignedTransactionResponse> {
        Err(ChainError::not_implemented(&self.chain_name, "build_signed_transaction"))
    }

    async fn decode_transaction(
        &self,
        _req: DecodeTransactionRequest,
    ) -> AdaptorResult<DecodeTransactionResponse> {
        Err(ChainError::not_implemented(&self.chain_name, "decode_transaction"))
    }

    async fn verify_signed_transaction(
        &self,
        _req: VerifySignedTxRequest,
    ) -> AdaptorResult<VerifySignedTxResponse> {
        Err(ChainError::not_implemented(&self.chain_name, "verify_signed_transaction"))
    }

    async fn get_extra_data(&self, _req: ExtraDataRequest) -> AdaptorResult<ExtraDataResponse> {
        Err(ChainError::not_implemented(&self.chain_name, "get_extra_data"))
    }
}
