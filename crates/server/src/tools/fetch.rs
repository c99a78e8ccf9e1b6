//! worker_fetch tool implementation.
//!
//! Hands one request to the worker as an intercepted fetch. Requests the
//! worker does not intercept are fetched from the network directly, the way
//! a browser would for an uncontrolled page.

use std::collections::BTreeMap;

use chrono::Utc;
use nimbus_core::{Request, RequestMode, Response};
use nimbus_worker::{FetchDisposition, Worker};
use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::HostError;

/// Input parameters for the worker_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WorkerFetchParams {
    /// Absolute request URL.
    pub url: String,

    /// HTTP method (default: GET).
    #[serde(default = "default_method")]
    pub method: String,

    /// "navigate" for top-level page loads, anything else is a sub-resource.
    #[serde(default)]
    pub mode: RequestMode,

    /// Extra request headers.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

fn default_method() -> String {
    "GET".into()
}

/// Output structure for the worker_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WorkerFetchOutput {
    pub url: String,
    pub status: u16,
    pub status_text: String,
    pub headers: Vec<(String, String)>,
    /// Body decoded as UTF-8, lossy for binary content.
    pub body: String,
    pub body_bytes: usize,
    /// "cache", "network", "fallback" or "passthrough".
    pub provenance: String,
    /// Partition the response was read from or written to.
    pub partition: Option<String>,
    /// Why the worker did not intercept, for passthrough responses.
    pub bypass: Option<String>,
    /// ISO8601 timestamp of when the response was produced.
    pub served_at: String,
}

impl WorkerFetchOutput {
    fn new(url: String, response: Response, provenance: &str, partition: Option<String>, bypass: Option<&str>) -> Self {
        Self {
            url,
            status: response.status,
            status_text: response.status_text.clone(),
            body: response.text(),
            body_bytes: response.body.len(),
            headers: response.headers,
            provenance: provenance.to_string(),
            partition,
            bypass: bypass.map(str::to_string),
            served_at: Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        }
    }
}

fn build_request(params: &WorkerFetchParams) -> Result<Request, McpError> {
    if params.url.trim().is_empty() {
        return Err(HostError::InvalidInput("url cannot be empty".into()).into());
    }
    if params.method.trim().is_empty() {
        return Err(HostError::InvalidInput("method cannot be empty".into()).into());
    }

    let mut request = Request::parse(&params.method, &params.url, params.mode)?;
    for (name, value) in &params.headers {
        request = request.with_header(name, value);
    }
    Ok(request)
}

/// Implementation of the worker_fetch tool.
pub async fn fetch_impl(worker: &Worker, params: WorkerFetchParams) -> Result<CallToolResult, McpError> {
    let request = build_request(&params)?;
    let url = request.url.to_string();

    let output = match worker.handle_fetch(&request).await {
        FetchDisposition::Respond(outcome) => {
            WorkerFetchOutput::new(url, outcome.response, outcome.provenance.as_str(), outcome.partition, None)
        }
        FetchDisposition::Passthrough(reason) => {
            let response = worker.passthrough(&request).await?;
            WorkerFetchOutput::new(url, response, "passthrough", None, Some(reason.as_str()))
        }
    };

    let json = serde_json::to_string_pretty(&output).map_err(HostError::from)?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use nimbus_worker::testing::{ScriptedNetwork, active_worker, fresh_worker};
    use std::sync::Arc;

    fn params(url: &str, mode: RequestMode) -> WorkerFetchParams {
        WorkerFetchParams { url: url.into(), method: default_method(), mode, headers: BTreeMap::new() }
    }

    fn output(result: CallToolResult) -> WorkerFetchOutput {
        let text = result.content[0].as_text().unwrap().text.clone();
        serde_json::from_str(&text).unwrap()
    }

    async fn fetch(worker: &Worker, url: &str, mode: RequestMode) -> WorkerFetchOutput {
        output(fetch_impl(worker, params(url, mode)).await.unwrap())
    }

    #[tokio::test]
    async fn test_fetch_empty_url() {
        let worker = active_worker(Arc::new(ScriptedNetwork::new())).await;
        let result = fetch_impl(&worker, params("", RequestMode::Subresource)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_fetch_invalid_url() {
        let worker = active_worker(Arc::new(ScriptedNetwork::new())).await;
        let result = fetch_impl(&worker, params("not a url", RequestMode::Subresource)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_fetch_through_worker() {
        let net = Arc::new(ScriptedNetwork::new());
        net.ok("http://localhost:8080/styles.css", "text/css", "body{}");
        let worker = active_worker(net).await;

        let out = fetch(&worker, "http://localhost:8080/styles.css", RequestMode::Subresource).await;
        assert_eq!(out.status, 200);
        assert_eq!(out.provenance, "network");
        assert_eq!(out.partition.as_deref(), Some("weather-app-static-v1.2"));

        let out = fetch(&worker, "http://localhost:8080/styles.css", RequestMode::Subresource).await;
        assert_eq!(out.provenance, "cache");
        assert_eq!(out.body, "body{}");
    }

    #[tokio::test]
    async fn test_fetch_offline_fallback() {
        let worker = active_worker(Arc::new(ScriptedNetwork::new())).await;
        let out = fetch(&worker, "http://localhost:8080/weather/oslo", RequestMode::Navigate).await;
        assert_eq!(out.status, 503);
        assert_eq!(out.provenance, "fallback");
        assert!(out.body.contains("OFFLINE_UNAVAILABLE"));
    }

    #[tokio::test]
    async fn test_fetch_passthrough_before_activation() {
        let net = Arc::new(ScriptedNetwork::new());
        net.ok("http://localhost:8080/app.html", "text/html", "<html>");
        let worker = fresh_worker(net).await;

        let out = fetch(&worker, "http://localhost:8080/app.html", RequestMode::Navigate).await;
        assert_eq!(out.provenance, "passthrough");
        assert_eq!(out.bypass.as_deref(), Some("not_controlling"));
        assert!(worker.db().list_partitions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_passthrough_network_failure_is_error() {
        let worker = active_worker(Arc::new(ScriptedNetwork::new())).await;
        let result = fetch_impl(&worker, params("http://localhost:8080/api/tracking", RequestMode::Subresource)).await;
        assert!(result.is_err());
    }
}
