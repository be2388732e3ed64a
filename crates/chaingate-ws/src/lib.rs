//! chaingate-ws — WebSocket JSON-RPC transport.
//!
//! # Features
//! - Request multiplexing over a single connection, matched by id
//! - Batches sent as one array frame
//! - Handshake bounded by a timeout
//! - Idempotent close that fails every pending call

pub mod client;

pub use client::{WsClientConfig, WsRpcClient};
