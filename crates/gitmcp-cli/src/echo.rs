//! JSON-RPC echo handler served by `gitmcp-serve`.
//!
//! A stand-in for a real application: `ping` answers with an empty result,
//! any other request echoes its method and params, notifications get no reply.

use gitmcp_transport_traits::{SharedHandler, TransportMessage, handler_fn};
use serde_json::{Value, json};
use tracing::debug;

const PARSE_ERROR: i64 = -32700;
const INVALID_REQUEST: i64 = -32600;

/// The echo handler as a shareable request handler.
pub fn echo_handler() -> SharedHandler {
    handler_fn(|message: TransportMessage| async move {
        Ok(respond(&message.payload).map(|reply| TransportMessage::new(reply.to_string())))
    })
}

/// Compute the reply for one raw message, or `None` for a notification.
pub fn respond(payload: &[u8]) -> Option<Value> {
    let request: Value = match serde_json::from_slice(payload) {
        Ok(value) => value,
        Err(e) => {
            debug!(error = %e, "unparseable message");
            return Some(error(Value::Null, PARSE_ERROR, "Parse error"));
        }
    };

    let Some(object) = request.as_object() else {
        return Some(error(Value::Null, INVALID_REQUEST, "Invalid Request"));
    };
    let id = object.get("id")?.clone();
    let Some(method) = object.get("method").and_then(Value::as_str) else {
        return Some(error(id, INVALID_REQUEST, "Invalid Request"));
    };

    let result = match method {
        "ping" => json!({}),
        _ => json!({
            "method": method,
            "params": object.get("params").cloned().unwrap_or(Value::Null),
        }),
    };
    Some(json!({ "jsonrpc": "2.0", "id": id, "result": result }))
}

fn error(id: Value, code: i64, message: &str) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": { "code": code, "message": message },
    })
}
