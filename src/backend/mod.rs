//! Backend collaborator: the tool endpoint that owns the authoritative cart.

/// reqwest client for the tool endpoint.
pub mod http;
/// Simulated tool endpoint backed by process memory.
pub mod memory;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    item::CartSnapshot,
    op::ToolRequest,
    types::SessionId,
};

pub use http::HttpBackend;
pub use memory::{CatalogEntry, InMemoryBackend};

/// JSON-RPC style error code for invalid tool arguments.
pub const INVALID_PARAMS: i64 = -32602;
/// JSON-RPC style error code for unknown tools.
pub const METHOD_NOT_FOUND: i64 = -32601;

/// Failure of a backend tool call.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// Transport failure below HTTP status handling.
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Non-2xx response.
    #[error("backend returned status {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, as text.
        body: String,
    },
    /// No complete response within the configured timeout.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    /// The tool itself reported an error.
    #[error("tool error {code}: {message}")]
    Tool {
        /// Error code from the response.
        code: i64,
        /// Error message from the response.
        message: String,
    },
    /// Response body was not a tool response.
    #[error("malformed tool response: {0}")]
    Decode(#[from] serde_json::Error),
    /// Successful response without `data.cart`.
    #[error("tool response carried no cart snapshot")]
    MissingCart,
    /// Failure forced by [`InMemoryBackend::fail_next`].
    #[error("injected failure for {tool}")]
    Injected {
        /// Tool the failure was injected for.
        tool: String,
    },
}

/// Error object inside a tool response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolFault {
    /// Error code.
    #[serde(default)]
    pub code: i64,
    /// Human-readable message.
    #[serde(default)]
    pub message: String,
}

/// Envelope returned by the tool endpoint.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ToolResponse {
    /// Request id echoed by the server.
    #[serde(default)]
    pub id: Value,
    /// Tool result payload.
    #[serde(default)]
    pub result: Option<Value>,
    /// Tool failure, when present.
    #[serde(default)]
    pub error: Option<ToolFault>,
}

impl ToolResponse {
    /// Successful response carrying `result`.
    pub fn ok(result: Value) -> Self {
        Self {
            result: Some(result),
            ..Self::default()
        }
    }

    /// Failed response.
    pub fn fault(code: i64, message: impl Into<String>) -> Self {
        Self {
            error: Some(ToolFault {
                code,
                message: message.into(),
            }),
            ..Self::default()
        }
    }

    /// Turns an embedded tool error into [`BackendError::Tool`].
    pub fn into_result(self) -> Result<Value, BackendError> {
        match self.error {
            Some(fault) => Err(BackendError::Tool {
                code: fault.code,
                message: fault.message,
            }),
            None => Ok(self.result.unwrap_or(Value::Null)),
        }
    }

    /// Extracts `result.data.cart`.
    pub fn cart_snapshot(self) -> Result<CartSnapshot, BackendError> {
        let result = self.into_result()?;
        let cart = result
            .pointer("/data/cart")
            .cloned()
            .ok_or(BackendError::MissingCart)?;
        Ok(serde_json::from_value(cart)?)
    }
}

/// Tool endpoint consumed by the cart runtime.
#[async_trait]
pub trait CartBackend: Send + Sync {
    /// Sends one tool request and returns the raw envelope.
    async fn call_tool(&self, request: ToolRequest) -> Result<ToolResponse, BackendError>;

    /// Sends `request` and fails when the envelope carries a tool error.
    async fn invoke(&self, request: ToolRequest) -> Result<Value, BackendError> {
        self.call_tool(request).await?.into_result()
    }

    /// Fetches the authoritative cart for `session_id`.
    async fn fetch_cart(&self, session_id: &SessionId) -> Result<CartSnapshot, BackendError> {
        self.call_tool(ToolRequest::get_cart_state(session_id.clone()))
            .await?
            .cart_snapshot()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn snapshot_is_read_from_data_cart() {
        let resp: ToolResponse = serde_json::from_value(json!({
            "id": "x",
            "result": { "data": { "cart": {
                "items": [{
                    "product_id": "p", "variant_id": "v", "name": "P",
                    "variant": "V", "price": 3.0, "quantity": 2, "image_url": ""
                }],
                "total": 6.0
            }}}
        }))
        .expect("decode");
        let snap = resp.cart_snapshot().expect("snapshot");
        assert_eq!(snap.items.len(), 1);
        assert_eq!(snap.total, 6.0);
    }

    #[test]
    fn embedded_error_becomes_tool_error() {
        let err = ToolResponse::fault(INVALID_PARAMS, "Variant not found: x")
            .into_result()
            .unwrap_err();
        assert!(matches!(err, BackendError::Tool { code: INVALID_PARAMS, .. }));
    }

    #[test]
    fn missing_cart_is_reported() {
        let err = ToolResponse::ok(json!({ "data": {} }))
            .cart_snapshot()
            .unwrap_err();
        assert!(matches!(err, BackendError::MissingCart));
    }
}
