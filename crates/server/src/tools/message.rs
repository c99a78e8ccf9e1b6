//! worker_message tool implementation.
//!
//! Posts a `{ type, payload }` control message to the worker.

use nimbus_worker::Worker;
use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::HostError;

/// Parameters for the worker_message tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WorkerMessageParams {
    /// SKIP_WAITING, GET_VERSION, CLEAR_CACHE or UPDATE_CACHE.
    #[serde(rename = "type")]
    pub kind: String,

    /// Message payload; UPDATE_CACHE expects `{ "urls": [...] }`.
    #[serde(default)]
    pub payload: Option<Value>,
}

/// Output from the worker_message tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WorkerMessageOutput {
    /// The worker's reply, or null for messages that get none.
    pub reply: Option<Value>,
}

/// Implementation of the worker_message tool.
pub async fn message_impl(worker: &Worker, params: WorkerMessageParams) -> Result<CallToolResult, McpError> {
    let envelope = match params.payload {
        Some(payload) => json!({ "type": params.kind, "payload": payload }),
        None => json!({ "type": params.kind }),
    };

    let reply = match worker.on_message(&envelope).await {
        Some(reply) => Some(serde_json::to_value(reply).map_err(HostError::from)?),
        None => None,
    };

    let json = serde_json::to_string_pretty(&WorkerMessageOutput { reply }).map_err(HostError::from)?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}
