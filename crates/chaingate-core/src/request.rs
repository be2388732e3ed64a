//! JSON-RPC 2.0 wire types and batch units.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::TransportError;

/// JSON-RPC request ID — string, number, or null.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RpcId {
    Number(u64),
    String(String),
    Null,
}

impl RpcId {
    pub fn number(n: u64) -> Self {
        Self::Number(n)
    }

    /// The numeric id, if this id is numeric.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }
}

impl std::fmt::Display for RpcId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "{s}"),
            Self::Null => write!(f, "null"),
        }
    }
}

/// A single JSON-RPC parameter value.
pub type RpcParam = Value;

/// A JSON-RPC 2.0 request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    pub params: Vec<RpcParam>,
    pub id: RpcId,
}

impl JsonRpcRequest {
    /// Create a new JSON-RPC 2.0 request.
    pub fn new(id: u64, method: impl Into<String>, params: Vec<RpcParam>) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            method: method.into(),
            params,
            id: RpcId::Number(id),
        }
    }
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl std::fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "JSON-RPC error {}: {}", self.code, self.message)
    }
}

/// A JSON-RPC 2.0 response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: RpcId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// Build a successful response.
    pub fn success(id: RpcId, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Build an error response.
    pub fn failure(id: RpcId, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            id,
            result: None,
            error: Some(error),
        }
    }

    /// Returns `true` if this is a successful response (has result, no error).
    pub fn is_ok(&self) -> bool {
        self.error.is_none() && self.result.is_some()
    }

    /// Unwrap the result value or return an error.
    ///
    /// An absent `result` is treated as JSON `null`.
    pub fn into_result(self) -> Result<Value, JsonRpcError> {
        if let Some(err) = self.error {
            Err(err)
        } else {
            Ok(self.result.unwrap_or(Value::Null))
        }
    }
}

/// One pending call inside a batch.
///
/// The batch as a whole may partially succeed: each unit carries its own
/// result slot and its own error, independent of its siblings.
#[derive(Debug)]
pub struct BatchUnit {
    pub method: String,
    pub params: Vec<RpcParam>,
    pub result: Option<Value>,
    pub error: Option<TransportError>,
}

impl BatchUnit {
    pub fn new(method: impl Into<String>, params: Vec<RpcParam>) -> Self {
        Self {
            method: method.into(),
            params,
            result: None,
            error: None,
        }
    }

    /// Record the outcome of this unit's call.
    pub fn resolve(&mut self, outcome: Result<Value, TransportError>) {
        match outcome {
            Ok(value) => {
                self.result = Some(value);
                self.error = None;
            }
            Err(e) => {
                self.result = None;
                self.error = Some(e);
            }
        }
    }

    /// Returns `true` once a result or an error has been recorded.
    pub fn is_resolved(&self) -> bool {
        self.result.is_some() || self.error.is_some()
    }

    /// Consume the unit, returning its own error or its decoded result.
    pub fn into_result<T: DeserializeOwned>(self) -> Result<T, TransportError> {
        if let Some(err) = self.error {
            return Err(err);
        }
        let value = self.result.unwrap_or(Value::Null);
        serde_json::from_value(value).map_err(TransportError::Deserialization)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serialization() {
        let req = JsonRpcRequest::new(1, "eth_blockNumber", vec![]);
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("\"jsonrpc\":\"2.0\""));
        assert!(json.contains("\"method\":\"eth_blockNumber\""));
    }

    #[test]
    fn response_into_result_ok() {
        let resp = JsonRpcResponse::success(RpcId::Number(1), Value::String("0x12345".into()));
        assert!(resp.is_ok());
        let val = resp.into_result().unwrap();
        assert_eq!(val, Value::String("0x12345".into()));
    }

    #[test]
    fn response_into_result_error() {
        let resp = JsonRpcResponse::failure(
            RpcId::Number(1),
            JsonRpcError {
                code: -32000,
                message: "execution reverted".into(),
                data: None,
            },
        );
        assert!(!resp.is_ok());
        let err = resp.into_result().unwrap_err();
        assert_eq!(err.code, -32000);
    }

    #[test]
    fn null_result_decodes_as_none() {
        let resp: JsonRpcResponse =
            serde_json::from_str(r#"{"jsonrpc":"2.0","id":7,"result":null}"#).unwrap();
        assert_eq!(resp.id.as_u64(), Some(7));
        let mut unit = BatchUnit::new("eth_getBlockByNumber", vec![]);
        unit.resolve(resp.into_result().map_err(TransportError::Rpc));
        let decoded: Option<u64> = unit.into_result().unwrap();
        assert!(decoded.is_none());
    }

    #[test]
    fn unit_error_is_returned_before_result() {
        let mut unit = BatchUnit::new("eth_getLogs", vec![]);
        assert!(!unit.is_resolved());
        unit.resolve(Err(TransportError::Other("boom".into())));
        assert!(unit.is_resolved());
        let err = unit.into_result::<Value>().unwrap_err();
        assert_eq!(err.to_string(), "boom");
    }
}
