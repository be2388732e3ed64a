//! chaingate-http — HTTP JSON-RPC transport.

pub mod client;

pub use client::{HttpClientConfig, HttpRpcClient};
