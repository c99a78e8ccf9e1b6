//! worker_status tool implementation.
//!
//! Reports lifecycle state and every partition in the cache store.

use nimbus_worker::Worker;
use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::HostError;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PartitionStatus {
    pub name: String,
    pub entries: u64,
    /// Owned by this application.
    pub owned: bool,
    /// One of the current version's partitions.
    pub current: bool,
}

/// Output from the worker_status tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WorkerStatusOutput {
    pub state: String,
    pub version: String,
    pub controlling: bool,
    /// Version of the install answering intercepted requests.
    pub serving: Option<String>,
    /// Background revalidations still running.
    pub pending_tasks: usize,
    pub partitions: Vec<PartitionStatus>,
}

/// Implementation of the worker_status tool.
pub async fn status_impl(worker: &Worker) -> Result<CallToolResult, McpError> {
    let names = &worker.settings().names;
    let current = names.current();

    let mut partitions = Vec::new();
    for name in worker.db().list_partitions().await? {
        let entries = worker.db().entry_count(&name).await?;
        partitions.push(PartitionStatus {
            owned: names.is_owned(&name),
            current: current.contains(&name),
            entries,
            name,
        });
    }

    let output = WorkerStatusOutput {
        state: worker.state().await.to_string(),
        version: names.version().to_string(),
        controlling: worker.is_controlling().await,
        serving: worker.serving_version().await,
        pending_tasks: worker.background().pending(),
        partitions,
    };

    let json = serde_json::to_string_pretty(&output).map_err(HostError::from)?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}
