//! Transport-level and chain-level error types.

use thiserror::Error;

use crate::request::JsonRpcError;

/// Errors that can occur during an RPC transport operation.
#[derive(Debug, Error)]
pub enum TransportError {
    /// HTTP request failed (connection refused, bad status, etc.).
    #[error("HTTP error: {0}")]
    Http(String),

    /// WebSocket connection/send/receive error.
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// JSON-RPC protocol-level error returned by the node.
    #[error("RPC error {}: {}", .0.code, .0.message)]
    Rpc(JsonRpcError),

    /// Request did not complete before its deadline.
    #[error("Request timed out after {ms}ms")]
    Timeout { ms: u64 },

    /// The liveness probe could not open a TCP connection to the endpoint.
    #[error("address unavailable ({endpoint})")]
    Unavailable { endpoint: String },

    /// Every dial attempt failed; `source` is the last cause.
    #[error("failed to dial {endpoint} after {attempts} attempt(s): {source}")]
    Dial {
        endpoint: String,
        attempts: u32,
        #[source]
        source: Box<TransportError>,
    },

    /// The transport was closed and accepts no further calls.
    #[error("transport closed")]
    Closed,

    /// Response could not be deserialized.
    #[error("Deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),

    /// An unexpected error.
    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// Returns `true` if this error is transient and worth another dial attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Http(_) | Self::WebSocket(_) | Self::Timeout { .. } | Self::Unavailable { .. }
        )
    }

    /// Returns `true` if this is a node-side execution error.
    pub fn is_execution_error(&self) -> bool {
        matches!(self, Self::Rpc(_))
    }
}

/// Errors surfaced by chain clients and adaptors.
#[derive(Debug, Error)]
pub enum ChainError {
    /// The call, batch or dial could not complete.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The node answered, but the requested entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A header fetched by hash hashed to something else.
    #[error("hash mismatch: requested {expected}, computed {actual}")]
    HashMismatch { expected: String, actual: String },

    /// The caller supplied a self-contradictory or malformed argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The operation has no implementation for this network.
    #[error("{operation} is not implemented for {chain}")]
    NotImplemented {
        chain: String,
        operation: &'static str,
    },

    /// No adaptor is registered under this network identifier.
    #[error("unsupported chain: {0}")]
    UnsupportedChain(String),

    /// One half of a composite request failed.
    #[error("unable to query {part}: {source}")]
    Part {
        part: &'static str,
        #[source]
        source: Box<ChainError>,
    },
}

impl ChainError {
    pub fn not_implemented(chain: impl Into<String>, operation: &'static str) -> Self {
        Self::NotImplemented {
            chain: chain.into(),
            operation,
        }
    }

    /// Wrap `source` as the failure of the named half of a composite call.
    pub fn part(part: &'static str, source: impl Into<ChainError>) -> Self {
        Self::Part {
            part,
            source: Box::new(source.into()),
        }
    }

    /// Returns `true` if the node reported that the entity does not exist.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound(_) => true,
            Self::Part { source, .. } => source.is_not_found(),
            _ => false,
        }
    }
}
