//! The per-network adaptor contract.
//!
//! One implementation exists per chain family. Implemented operations always
//! return a response record: failures from the layers below are folded into
//! its `code` and `msg`. Operations a network does not back return
//! [`ChainError::NotImplemented`] straight away.

use async_trait::async_trait;

use crate::account::*;
use crate::error::ChainError;

/// Result type of every adaptor operation.
pub type AdaptorResult<T> = Result<T, ChainError>;

#[async_trait]
pub trait ChainAdaptor: Send + Sync + 'static {
    /// Identifier this adaptor is registered under (e.g. `"ethereum"`).
    fn chain_name(&self) -> &str;

    async fn get_support_chains(
        &self,
        req: SupportChainsRequest,
    ) -> AdaptorResult<SupportChainsResponse>;

    async fn convert_address(
        &self,
        req: ConvertAddressRequest,
    ) -> AdaptorResult<ConvertAddressResponse>;

    async fn valid_address(&self, req: ValidAddressRequest) -> AdaptorResult<ValidAddressResponse>;

    async fn get_block_by_number(&self, req: BlockNumberRequest) -> AdaptorResult<BlockResponse>;

    async fn get_block_by_hash(&self, req: BlockHashRequest) -> AdaptorResult<BlockResponse>;

    async fn get_block_header_by_number(
        &self,
        req: BlockHeaderNumberRequest,
    ) -> AdaptorResult<BlockHeaderResponse>;

    async fn get_block_header_by_hash(
        &self,
        req: BlockHeaderHashRequest,
    ) -> AdaptorResult<BlockHeaderResponse>;

    async fn get_account(&self, req: AccountRequest) -> AdaptorResult<AccountResponse>;

    async fn get_fee(&self, req: FeeRequest) -> AdaptorResult<FeeResponse>;

    async fn send_tx(&self, req: SendTxRequest) -> AdaptorResult<SendTxResponse>;

    async fn get_tx_by_address(&self, req: TxAddressRequest) -> AdaptorResult<TxAddressResponse>;

    async fn get_tx_by_hash(&self, req: TxHashRequest) -> AdaptorResult<TxHashResponse>;

    async fn get_block_by_range(
        &self,
        req: BlockByRangeRequest,
    ) -> AdaptorResult<BlockByRangeResponse>;

    async fn create_unsign_transaction(
        &self,
        req: UnSignTransactionRequest,
    ) -> AdaptorResult<UnSignTransactionResponse>;

    async fn build_signed_transaction(
        &self,
        req: SignedTransactionRequest,
    ) -> AdaptorResult<SignedTransactionResponse>;

    async fn decode_transaction(
        &self,
        req: DecodeTransactionRequest,
    ) -> AdaptorResult<DecodeTransactionResponse>;

    async fn verify_signed_transaction(
        &self,
        req: VerifySignedTxRequest,
    ) -> AdaptorResult<VerifySignedTxResponse>;

    async fn get_extra_data(&self, req: ExtraDataRequest) -> AdaptorResult<ExtraDataResponse>;
}
