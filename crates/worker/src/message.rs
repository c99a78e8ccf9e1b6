//! Control messages from the host page.
//!
//! Wire shape is `{ "type": "...", "payload": {...} }`. Unknown or malformed
//! messages are logged and get no reply.

use std::sync::Arc;

use nimbus_client::{Network, resolve};
use nimbus_core::{CacheDb, Error, Request};
use serde::Serialize;
use serde_json::Value;
use tokio::task::JoinSet;

use crate::worker::Worker;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlMessage {
    SkipWaiting,
    GetVersion,
    ClearCache,
    UpdateCache { urls: Vec<String> },
}

impl ControlMessage {
    /// Parse a message envelope.
    ///
    /// # Errors
    ///
    /// `Error::UnrecognizedMessage` for a missing or unknown `type`, or an
    /// `UPDATE_CACHE` without a `payload.urls` string array.
    pub fn from_value(value: &Value) -> Result<Self, Error> {
        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::UnrecognizedMessage("missing type".to_string()))?;

        match kind {
            "SKIP_WAITING" => Ok(ControlMessage::SkipWaiting),
            "GET_VERSION" => Ok(ControlMessage::GetVersion),
            "CLEAR_CACHE" => Ok(ControlMessage::ClearCache),
            "UPDATE_CACHE" => {
                let urls = value
                    .pointer("/payload/urls")
                    .and_then(Value::as_array)
                    .ok_or_else(|| Error::UnrecognizedMessage("UPDATE_CACHE without payload.urls".to_string()))?;
                let urls = urls
                    .iter()
                    .map(|u| u.as_str().map(str::to_string))
                    .collect::<Option<Vec<_>>>()
                    .ok_or_else(|| Error::UnrecognizedMessage("UPDATE_CACHE urls must be strings".to_string()))?;
                Ok(ControlMessage::UpdateCache { urls })
            }
            other => Err(Error::UnrecognizedMessage(other.to_string())),
        }
    }
}

/// Reply posted back to the sender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ControlReply {
    Version { version: String },
    Success { success: bool },
}

/// Per-URL results of a bulk refresh.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UpdateSummary {
    pub updated: Vec<String>,
    pub failed: Vec<String>,
}

async fn refresh(db: CacheDb, network: Arc<dyn Network>, partition: String, request: Request) -> Result<bool, Error> {
    let response = network.fetch(&request).await?;
    if !response.is_ok() {
        tracing::debug!(url = %request.url, status = response.status, "not refreshing with error status");
        return Ok(false);
    }
    db.put(&partition, &request, &response).await?;
    Ok(true)
}

impl Worker {
    /// Handle a raw message envelope.
    pub async fn on_message(&self, value: &Value) -> Option<ControlReply> {
        match ControlMessage::from_value(value) {
            Ok(message) => self.handle_message(message).await,
            Err(err) => {
                tracing::warn!(error = %err, "ignoring control message");
                None
            }
        }
    }

    pub async fn handle_message(&self, message: ControlMessage) -> Option<ControlReply> {
        tracing::debug!(message = ?message, "control message");
        match message {
            ControlMessage::SkipWaiting => {
                if let Err(err) = self.skip_waiting().await {
                    tracing::warn!(error = %err, "skip waiting failed");
                }
                None
            }
            ControlMessage::GetVersion => {
                Some(ControlReply::Version { version: self.settings.names.version().to_string() })
            }
            ControlMessage::ClearCache => {
                let success = match self.db.clear_owned(&self.settings.names).await {
                    Ok(_) => true,
                    Err(err) => {
                        tracing::error!(error = %err, "clearing caches failed");
                        false
                    }
                };
                Some(ControlReply::Success { success })
            }
            ControlMessage::UpdateCache { urls } => {
                let summary = self.update_urls(&urls).await;
                tracing::info!(updated = summary.updated.len(), failed = summary.failed.len(), "bulk refresh done");
                Some(ControlReply::Success { success: true })
            }
        }
    }

    /// Refresh each URL into the dynamic partition independently.
    pub async fn update_urls(&self, urls: &[String]) -> UpdateSummary {
        let partition = self.settings.names.dynamic_name();
        let mut summary = UpdateSummary::default();
        let mut set = JoinSet::new();

        for raw in urls {
            let url = match resolve(&self.settings.scope, raw) {
                Ok(url) => url,
                Err(err) => {
                    tracing::warn!(url = %raw, error = %err, "skipping unresolvable url");
                    summary.failed.push(raw.clone());
                    continue;
                }
            };
            let task = refresh(self.db.clone(), self.network.clone(), partition.clone(), Request::get(url));
            let raw = raw.clone();
            set.spawn(async move { (raw, task.await) });
        }

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((url, Ok(true))) => summary.updated.push(url),
                Ok((url, Ok(false))) => summary.failed.push(url),
                Ok((url, Err(err))) => {
                    tracing::warn!(url = %url, error = %err, "refresh failed");
                    summary.failed.push(url);
                }
                Err(err) => tracing::warn!(error = %err, "refresh task panicked"),
            }
        }

        summary.updated.sort();
        summary.failed.sort();
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedNetwork, active_worker, fresh_worker};
    use serde_json::json;

    #[test]
    fn test_parse_messages() {
        assert_eq!(ControlMessage::from_value(&json!({"type": "SKIP_WAITING"})).unwrap(), ControlMessage::SkipWaiting);
        assert_eq!(
            ControlMessage::from_value(&json!({"type": "UPDATE_CACHE", "payload": {"urls": ["/a", "/b"]}})).unwrap(),
            ControlMessage::UpdateCache { urls: vec!["/a".into(), "/b".into()] }
        );
    }

    #[test]
    fn test_parse_rejects_unknown_and_malformed() {
        assert!(matches!(
            ControlMessage::from_value(&json!({"type": "REBOOT"})),
            Err(Error::UnrecognizedMessage(_))
        ));
        assert!(ControlMessage::from_value(&json!({"payload": {}})).is_err());
        assert!(ControlMessage::from_value(&json!({"type": "UPDATE_CACHE"})).is_err());
        assert!(ControlMessage::from_value(&json!({"type": "UPDATE_CACHE", "payload": {"urls": [1]}})).is_err());
    }

    #[test]
    fn test_reply_wire_shape() {
        let version = serde_json::to_value(ControlReply::Version { version: "v1.2".into() }).unwrap();
        assert_eq!(version, json!({"version": "v1.2"}));
        let success = serde_json::to_value(ControlReply::Success { success: true }).unwrap();
        assert_eq!(success, json!({"success": true}));
    }

    #[tokio::test]
    async fn test_get_version() {
        let worker = fresh_worker(Arc::new(ScriptedNetwork::new())).await;
        let reply = worker.on_message(&json!({"type": "GET_VERSION"})).await;
        assert_eq!(reply, Some(ControlReply::Version { version: "v1.2".into() }));
    }

    #[tokio::test]
    async fn test_unrecognized_gets_no_reply() {
        let worker = fresh_worker(Arc::new(ScriptedNetwork::new())).await;
        assert_eq!(worker.on_message(&json!({"type": "PING"})).await, None);
        assert_eq!(worker.on_message(&json!({"type": "SKIP_WAITING"})).await, None);
    }

    #[tokio::test]
    async fn test_clear_cache_only_owned() {
        let worker = active_worker(Arc::new(ScriptedNetwork::new())).await;
        let db = worker.db();
        db.open_partition("weather-app-static-v1.2").await.unwrap();
        db.open_partition("weather-app-dynamic-v1.1").await.unwrap();
        db.open_partition("someone-else").await.unwrap();

        let reply = worker.on_message(&json!({"type": "CLEAR_CACHE"})).await;
        assert_eq!(reply, Some(ControlReply::Success { success: true }));
        assert_eq!(db.list_partitions().await.unwrap(), vec!["someone-else".to_string()]);
    }

    #[tokio::test]
    async fn test_clear_cache_reports_storage_failure() {
        let worker = active_worker(Arc::new(ScriptedNetwork::new())).await;
        worker.db().close().await.unwrap();

        let reply = worker.on_message(&json!({"type": "CLEAR_CACHE"})).await;
        assert_eq!(reply, Some(ControlReply::Success { success: false }));
    }

    #[tokio::test]
    async fn test_update_cache_survives_one_failure() {
        let net = Arc::new(ScriptedNetwork::new());
        net.ok("http://localhost:8080/api/weather?city=Paris", "application/json", r#"{"t":21}"#);
        net.ok("http://localhost:8080/api/weather?city=Lyon", "application/json", r#"{"t":19}"#);
        net.fail("http://localhost:8080/api/weather?city=Nice");
        let worker = active_worker(net.clone()).await;

        let urls: Vec<String> = ["Paris", "Lyon", "Nice"].iter().map(|c| format!("/api/weather?city={c}")).collect();
        let summary = worker.update_urls(&urls).await;
        assert_eq!(summary.updated.len(), 2);
        assert_eq!(summary.failed, vec!["/api/weather?city=Nice".to_string()]);

        let dynamic = worker.settings().names.dynamic_name();
        assert_eq!(worker.db().entry_count(&dynamic).await.unwrap(), 2);

        let reply = worker
            .on_message(&json!({"type": "UPDATE_CACHE", "payload": {"urls": urls}}))
            .await;
        assert_eq!(reply, Some(ControlReply::Success { success: true }));
        assert_eq!(net.calls_to("http://localhost:8080/api/weather?city=Nice"), 2);
    }
}
