//! chaingate-core — foundation traits and types for the chain gateway.
//!
//! # Overview
//!
//! The core crate defines everything that is independent of a particular
//! wire transport or chain family:
//!
//! - [`RpcTransport`] — the async trait every transport implements
//! - [`RpcClient`] — deadline-bounded single and batch calls over a transport
//! - [`JsonRpcRequest`] / [`JsonRpcResponse`] / [`BatchUnit`] — wire types
//! - [`TransportError`] / [`ChainError`] — structured error types
//! - [`connect`] — liveness probe and dial with exponential backoff
//! - [`config`] — YAML gateway configuration
//! - [`ChainAdaptor`] / [`ChainDispatcher`] — per-network contract and routing

pub mod account;
pub mod adaptor;
pub mod client;
pub mod config;
pub mod connect;
pub mod dispatcher;
pub mod error;
pub mod policy;
pub mod request;
pub mod transport;

pub use adaptor::{AdaptorResult, ChainAdaptor};
pub use client::{RpcClient, DEFAULT_REQUEST_TIMEOUT};
pub use config::{ConfigError, GatewayConfig, LogConfig, NodeConfig, RpcEndpoint};
pub use connect::{establish, is_endpoint_available, DialConfig};
pub use dispatcher::ChainDispatcher;
pub use error::{ChainError, TransportError};
pub use request::{BatchUnit, JsonRpcError, JsonRpcRequest, JsonRpcResponse, RpcId, RpcParam};
pub use transport::{HealthStatus, RpcTransport};
