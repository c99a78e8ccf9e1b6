//! worker_push and notification_click tool implementations.

use nimbus_worker::Worker;
use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::HostError;

/// Parameters for the worker_push tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WorkerPushParams {
    /// Raw push data, normally JSON `{ "title"?, "body"? }`.
    #[serde(default)]
    pub data: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WorkerPushOutput {
    /// Notification to display, or null if the payload was rejected.
    pub notification: Option<Value>,
}

/// Parameters for the notification_click tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct NotificationClickParams {
    /// Clicked action (`view`, `dismiss`), or absent for a body click.
    #[serde(default)]
    pub action: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct NotificationClickOutput {
    /// URL to open in a new window, if any.
    pub open: Option<String>,
}

pub async fn push_impl(worker: &Worker, params: WorkerPushParams) -> Result<CallToolResult, McpError> {
    let notification = match worker.on_push(params.data.as_deref().map(str::as_bytes)) {
        Some(n) => Some(serde_json::to_value(n).map_err(HostError::from)?),
        None => None,
    };

    let json = serde_json::to_string_pretty(&WorkerPushOutput { notification }).map_err(HostError::from)?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

pub async fn click_impl(worker: &Worker, params: NotificationClickParams) -> Result<CallToolResult, McpError> {
    let open = worker
        .on_notification_click(params.action.as_deref())
        .map(|url| url.to_string());

    let json = serde_json::to_string_pretty(&NotificationClickOutput { open }).map_err(HostError::from)?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use nimbus_worker::testing::{ScriptedNetwork, fresh_worker};
    use std::sync::Arc;

    fn text(result: &CallToolResult) -> String {
        result.content[0].as_text().unwrap().text.clone()
    }

    #[tokio::test]
    async fn test_push_notification() {
        let worker = fresh_worker(Arc::new(ScriptedNetwork::new())).await;
        let params = WorkerPushParams { data: Some(r#"{"title":"Heatwave"}"#.into()) };
        let out: WorkerPushOutput = serde_json::from_str(&text(&push_impl(&worker, params).await.unwrap())).unwrap();

        let notification = out.notification.unwrap();
        assert_eq!(notification["title"], "Heatwave");
        assert_eq!(notification["actions"][0]["action"], "view");
    }

    #[tokio::test]
    async fn test_push_rejects_garbage() {
        let worker = fresh_worker(Arc::new(ScriptedNetwork::new())).await;
        let params = WorkerPushParams { data: Some("{oops".into()) };
        let out: WorkerPushOutput = serde_json::from_str(&text(&push_impl(&worker, params).await.unwrap())).unwrap();
        assert!(out.notification.is_none());
    }

    #[tokio::test]
    async fn test_click_view_opens_shell() {
        let worker = fresh_worker(Arc::new(ScriptedNetwork::new())).await;
        let params = NotificationClickParams { action: Some("view".into()) };
        let out: NotificationClickOutput =
            serde_json::from_str(&text(&click_impl(&worker, params).await.unwrap())).unwrap();
        assert_eq!(out.open.as_deref(), Some("http://localhost:8080/app.html"));
    }
}
