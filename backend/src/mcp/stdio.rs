//! Line-delimited JSON-RPC over a byte stream.
//!
//! Runs a single [`McpEngine`] against a reader/writer pair, one JSON message (or
//! batch) per line. Used by the `abacus-mcp-server` binary on stdin/stdout.

use crate::mcp::engine::McpEngine;
use abacus_types::{error_codes, JsonRpcMessage, JsonRpcResponse};
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{
    AnyDelimiterCodec, AnyDelimiterCodecError, FramedRead, FramedWrite, LinesCodec,
    LinesCodecError,
};
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum StdioError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Framing error: {0}")]
    Framing(#[from] AnyDelimiterCodecError),

    #[error("Write error: {0}")]
    Codec(#[from] LinesCodecError),

    #[error("Failed to serialize message: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Serve `engine` until `reader` reaches end of input.
///
/// Server notifications produced while handling a line are written before the
/// line's replies. Lines that are not JSON, including lines that are not valid
/// UTF-8, are answered with a parse error.
pub async fn serve<R, W>(mut engine: McpEngine, reader: R, writer: W) -> Result<(), StdioError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    // Framed on raw bytes so a line with invalid UTF-8 cannot end the stream
    let mut lines = FramedRead::new(
        reader,
        AnyDelimiterCodec::new(b"\n".to_vec(), b"\n".to_vec()),
    );
    let mut sink = FramedWrite::new(writer, LinesCodec::new());

    info!("MCP stdio transport started");

    while let Some(line) = lines.next().await {
        let bytes = line?;
        let line = String::from_utf8_lossy(&bytes);
        if line.trim().is_empty() {
            continue;
        }

        for outgoing in handle_line(&mut engine, &line)? {
            sink.send(outgoing).await?;
        }
    }

    info!("MCP stdio transport reached end of input");
    Ok(())
}

fn handle_line(engine: &mut McpEngine, line: &str) -> Result<Vec<String>, StdioError> {
    let payload: Value = match serde_json::from_str(line) {
        Ok(value) => value,
        Err(e) => {
            warn!("MCP: Failed to parse input line: {}", e);
            let error = JsonRpcResponse::error(Value::Null, error_codes::PARSE_ERROR, "Parse error");
            return Ok(vec![serde_json::to_string(&error)?]);
        }
    };

    let (messages, is_batch) = match JsonRpcMessage::parse_payload(payload) {
        Ok(parsed) => parsed,
        Err(error) => {
            let response = JsonRpcResponse::error_with_data(
                Value::Null,
                error.code,
                error.message,
                error.data.unwrap_or(Value::Null),
            );
            return Ok(vec![serde_json::to_string(&response)?]);
        }
    };

    let mut outgoing = Vec::new();
    let mut responses = Vec::new();
    for message in messages {
        let dispatch = engine.handle(message);
        for notification in &dispatch.notifications {
            outgoing.push(serde_json::to_string(notification)?);
        }
        responses.extend(dispatch.response);
    }

    match responses.as_slice() {
        [] => debug!("MCP: No replies for input line"),
        [single] if !is_batch => outgoing.push(serde_json::to_string(single)?),
        all => outgoing.push(serde_json::to_string(all)?),
    }
    Ok(outgoing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::CapabilityRegistry;
    use serde_json::json;
    use std::sync::Arc;

    async fn run(input: &str) -> Vec<Value> {
        run_bytes(input.as_bytes()).await
    }

    async fn run_bytes(input: &[u8]) -> Vec<Value> {
        let engine = McpEngine::new(Arc::new(CapabilityRegistry::builtin().unwrap()));
        let mut output: Vec<u8> = Vec::new();
        serve(engine, input, &mut output).await.unwrap();

        String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    fn init_line() -> String {
        json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "initialize",
            "params": {
                "protocolVersion": "2024-11-05",
                "capabilities": {},
                "clientInfo": { "name": "cli", "version": "1" }
            }
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_full_exchange() {
        let input = format!(
            "{}\n{}\n{}\n",
            init_line(),
            json!({"jsonrpc": "2.0", "method": "notifications/initialized"}),
            json!({"jsonrpc": "2.0", "id": 2, "method": "tools/call",
                   "params": {"name": "divide", "arguments": {"a": 1, "b": 0}}}),
        );
        let replies = run(&input).await;

        assert_eq!(replies.len(), 2);
        assert_eq!(replies[0]["result"]["protocolVersion"], "2024-11-05");
        assert_eq!(replies[1]["result"]["isError"], true);
    }

    #[tokio::test]
    async fn test_parse_error_keeps_serving() {
        let input = format!(
            "not json\n\n{}\n",
            json!({"jsonrpc": "2.0", "id": 5, "method": "ping"})
        );
        let replies = run(&input).await;

        assert_eq!(replies.len(), 2);
        assert_eq!(replies[0]["error"]["code"], error_codes::PARSE_ERROR);
        assert!(replies[0]["id"].is_null());
        assert_eq!(replies[1]["id"], 5);
    }

    #[tokio::test]
    async fn test_invalid_utf8_keeps_serving() {
        let mut input = b"\xff\xfe garbage\n".to_vec();
        let ping = json!({"jsonrpc": "2.0", "id": 7, "method": "ping"});
        input.extend_from_slice(format!("{}\n", ping).as_bytes());
        let replies = run_bytes(&input).await;

        assert_eq!(replies.len(), 2);
        assert_eq!(replies[0]["error"]["code"], error_codes::PARSE_ERROR);
        assert!(replies[0]["id"].is_null());
        assert_eq!(replies[1]["id"], 7);
        assert!(replies[1]["result"].is_object());
    }

    #[tokio::test]
    async fn test_crlf_line_endings() {
        let input = format!("{}\r\n", json!({"jsonrpc": "2.0", "id": 8, "method": "ping"}));
        let replies = run(&input).await;

        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0]["id"], 8);
    }

    #[tokio::test]
    async fn test_notifications_precede_reply() {
        let input = format!(
            "{}\n{}\n{}\n",
            init_line(),
            json!({"jsonrpc": "2.0", "id": 2, "method": "logging/setLevel",
                   "params": {"level": "debug"}}),
            json!([{"jsonrpc": "2.0", "id": 3, "method": "tools/call",
                    "params": {"name": "add", "arguments": {"a": 1, "b": 1}}}]),
        );
        let replies = run(&input).await;

        assert_eq!(replies.len(), 4);
        assert_eq!(replies[2]["method"], "notifications/message");
        assert_eq!(replies[2]["params"]["data"], "Called tool add");
        assert_eq!(replies[3][0]["result"]["content"][0]["text"], "2");
    }
}
