//! JSON-RPC 2.0 message types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The only JSON-RPC version we speak.
pub const JSONRPC_VERSION: &str = "2.0";

/// Standard and MCP-specific JSON-RPC error codes.
pub mod error_codes {
    pub const PARSE_ERROR: i32 = -32700;
    pub const INVALID_REQUEST: i32 = -32600;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL_ERROR: i32 = -32603;
    /// Transport-level rejection (bad or missing session, conflicts).
    pub const SERVER_ERROR: i32 = -32000;
    pub const SESSION_NOT_FOUND: i32 = -32001;
    pub const RESOURCE_NOT_FOUND: i32 = -32002;
}

/// JSON-RPC 2.0 Request. A request without an `id` is a notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    /// Build a request with the given id.
    pub fn new(id: impl Into<Value>, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: Some(id.into()),
            method: method.into(),
            params,
        }
    }

    /// True when the message carries no id and therefore expects no reply.
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// JSON-RPC 2.0 Response.
///
/// `id` is always serialized; it is `null` when the request id could not be determined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    #[serde(default)]
    pub id: Value,
}

impl JsonRpcResponse {
    /// Create a success response.
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    /// Create an error response.
    pub fn error(id: Value, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
                data: None,
            }),
            id,
        }
    }

    /// Create an error response with data.
    pub fn error_with_data(id: Value, code: i32, message: impl Into<String>, data: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
                data: Some(data),
            }),
            id,
        }
    }
}

/// JSON-RPC 2.0 Error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Server-initiated notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcNotification {
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
        }
    }
}

/// Any message a client may send: a request, a notification, or a response to a
/// server-initiated request.
#[derive(Debug, Clone, PartialEq)]
pub enum JsonRpcMessage {
    Request(JsonRpcRequest),
    Response(JsonRpcResponse),
}

impl JsonRpcMessage {
    /// Classify a single decoded JSON value.
    ///
    /// Messages with a `method` are requests (or notifications), messages with a `result`
    /// or `error` are responses. Everything else is an invalid request.
    pub fn from_value(value: Value) -> Result<Self, JsonRpcError> {
        let object = value.as_object().ok_or_else(|| invalid_request("expected an object"))?;

        if object.get("jsonrpc").and_then(Value::as_str) != Some(JSONRPC_VERSION) {
            return Err(invalid_request("jsonrpc must be \"2.0\""));
        }

        if object.contains_key("method") {
            serde_json::from_value(value)
                .map(JsonRpcMessage::Request)
                .map_err(|e| invalid_request(&e.to_string()))
        } else if object.contains_key("result") || object.contains_key("error") {
            serde_json::from_value(value)
                .map(JsonRpcMessage::Response)
                .map_err(|e| invalid_request(&e.to_string()))
        } else {
            Err(invalid_request("missing method, result or error"))
        }
    }

    /// Decode an HTTP or stdio payload that is either one message or a batch array.
    ///
    /// Returns the messages together with a flag telling whether the payload was a batch,
    /// so that replies can be shaped the same way.
    pub fn parse_payload(value: Value) -> Result<(Vec<Self>, bool), JsonRpcError> {
        match value {
            Value::Array(items) => {
                if items.is_empty() {
                    return Err(invalid_request("empty batch"));
                }
                let messages = items
                    .into_iter()
                    .map(Self::from_value)
                    .collect::<Result<Vec<_>, _>>()?;
                Ok((messages, true))
            }
            other => Ok((vec![Self::from_value(other)?], false)),
        }
    }

    /// The request, if this message is one.
    pub fn as_request(&self) -> Option<&JsonRpcRequest> {
        match self {
            JsonRpcMessage::Request(request) => Some(request),
            JsonRpcMessage::Response(_) => None,
        }
    }

    /// True for an `initialize` request.
    pub fn is_initialize(&self) -> bool {
        self.as_request()
            .is_some_and(|r| r.method == "initialize" && !r.is_notification())
    }
}

fn invalid_request(reason: &str) -> JsonRpcError {
    JsonRpcError {
        code: error_codes::INVALID_REQUEST,
        message: "Invalid Request".to_string(),
        data: Some(Value::String(reason.to_string())),
    }
}

/// Check whether a raw JSON body is a well-formed MCP `initialize` request.
///
/// The request must be a JSON-RPC 2.0 request with an id whose params carry a
/// `protocolVersion`, a `capabilities` object and a `clientInfo` object.
pub fn is_initialize_request(value: &Value) -> bool {
    let Some(object) = value.as_object() else {
        return false;
    };
    if object.get("jsonrpc").and_then(Value::as_str) != Some(JSONRPC_VERSION)
        || object.get("method").and_then(Value::as_str) != Some("initialize")
        || !object.get("id").is_some_and(|id| !id.is_null())
    {
        return false;
    }
    let Some(params) = object.get("params").and_then(Value::as_object) else {
        return false;
    };
    params.get("protocolVersion").is_some_and(Value::is_string)
        && params.get("capabilities").is_some_and(Value::is_object)
        && params.get("clientInfo").is_some_and(Value::is_object)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn initialize_body() -> Value {
        json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "initialize",
            "params": {
                "protocolVersion": "2025-03-26",
                "capabilities": {},
                "clientInfo": { "name": "test-client", "version": "0.0.1" }
            }
        })
    }

    #[test]
    fn test_is_initialize_request() {
        assert!(is_initialize_request(&initialize_body()));

        let mut missing_info = initialize_body();
        missing_info["params"]
            .as_object_mut()
            .unwrap()
            .remove("clientInfo");
        assert!(!is_initialize_request(&missing_info));

        let mut notification = initialize_body();
        notification.as_object_mut().unwrap().remove("id");
        assert!(!is_initialize_request(&notification));

        let ping = json!({"jsonrpc": "2.0", "id": 2, "method": "ping"});
        assert!(!is_initialize_request(&ping));

        assert!(!is_initialize_request(&json!([initialize_body()])));
    }

    #[test]
    fn test_error_response_serializes_null_id() {
        let response = JsonRpcResponse::error(
            Value::Null,
            error_codes::SERVER_ERROR,
            "Bad Request: No valid session ID provided",
        );
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(
            value,
            json!({
                "jsonrpc": "2.0",
                "error": {
                    "code": -32000,
                    "message": "Bad Request: No valid session ID provided"
                },
                "id": null
            })
        );
    }

    #[test]
    fn test_classify_messages() {
        let request = JsonRpcMessage::from_value(json!({
            "jsonrpc": "2.0", "id": "a", "method": "tools/list"
        }))
        .unwrap();
        assert!(request.as_request().is_some_and(|r| !r.is_notification()));
        assert!(!request.is_initialize());

        let notification = JsonRpcMessage::from_value(json!({
            "jsonrpc": "2.0", "method": "notifications/initialized"
        }))
        .unwrap();
        assert!(notification.as_request().is_some_and(|r| r.is_notification()));

        let response = JsonRpcMessage::from_value(json!({
            "jsonrpc": "2.0", "id": 7, "result": {}
        }))
        .unwrap();
        assert!(matches!(response, JsonRpcMessage::Response(_)));

        let err = JsonRpcMessage::from_value(json!({"jsonrpc": "1.0", "method": "x"}))
            .unwrap_err();
        assert_eq!(err.code, error_codes::INVALID_REQUEST);
    }

    #[test]
    fn test_parse_payload_batches() {
        let (messages, is_batch) = JsonRpcMessage::parse_payload(json!([
            {"jsonrpc": "2.0", "id": 1, "method": "ping"},
            {"jsonrpc": "2.0", "method": "notifications/initialized"}
        ]))
        .unwrap();
        assert!(is_batch);
        assert_eq!(messages.len(), 2);

        let (single, is_batch) =
            JsonRpcMessage::parse_payload(json!({"jsonrpc": "2.0", "id": 1, "method": "ping"}))
                .unwrap();
        assert!(!is_batch);
        assert_eq!(single.len(), 1);

        assert!(JsonRpcMessage::parse_payload(json!([])).is_err());
    }
}
