//! chaingate-ethereum — EVM chain support for the gateway.
//!
//! - [`types`] — headers (with local hash recomputation), blocks,
//!   transactions, receipts, logs and filter queries
//! - [`EthClient`] — typed JSON-RPC reads, range fetches, log filtering,
//!   fee and nonce queries
//! - [`EthereumAdaptor`] — the adaptor contract for EVM networks

pub mod adaptor;
pub mod client;
pub mod types;

pub use adaptor::{EthereumAdaptor, CHAIN_NAME};
pub use client::{connect_transport, EthClient};
pub use types::{
    Block, BlockNumberOrTag, FilterQuery, Header, Log, LogsResult, Receipt, Transaction,
    TransactionSummary,
};
