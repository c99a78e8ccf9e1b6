//! Last-resort responses once a strategy has given up.

use nimbus_core::{Request, Response};
use serde_json::json;

use crate::strategy::{Outcome, Provenance};
use crate::worker::Worker;

/// Error code carried in the synthesized offline body.
pub const OFFLINE_ERROR_CODE: &str = "OFFLINE_UNAVAILABLE";

const OFFLINE_MESSAGE: &str = "This content is not available offline. Please check your connection and try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackTier {
    /// Exact match in any partition, owned or not.
    AnyPartition,
    /// Cached shell document, navigations only.
    Shell,
    /// Synthesized 503. Always succeeds.
    Offline,
}

/// Resolution order. The last tier is terminal.
pub const FALLBACK_TIERS: &[FallbackTier] = &[FallbackTier::AnyPartition, FallbackTier::Shell, FallbackTier::Offline];

/// The structured 503 returned when nothing else matches. Never cached.
pub fn offline_response() -> Response {
    let body = json!({ "error": OFFLINE_ERROR_CODE, "message": OFFLINE_MESSAGE });
    Response::new(503, "Service Unavailable", body.to_string()).with_header("Content-Type", "application/json")
}

impl Worker {
    /// Walk [`FALLBACK_TIERS`] and return the first response found.
    ///
    /// Total: the offline tier always produces a response.
    pub async fn resolve_fallback(&self, request: &Request) -> Outcome {
        for tier in FALLBACK_TIERS {
            if let Some(outcome) = self.run_fallback_tier(*tier, request).await {
                tracing::info!(url = %request.url, tier = ?tier, status = outcome.response.status, "served fallback");
                return outcome;
            }
        }
        Outcome::new(offline_response(), Provenance::Fallback, None)
    }

    async fn run_fallback_tier(&self, tier: FallbackTier, request: &Request) -> Option<Outcome> {
        match tier {
            FallbackTier::AnyPartition => match self.db.match_any(request).await {
                Ok(hit) => {
                    hit.map(|(partition, response)| Outcome::new(response, Provenance::Fallback, Some(partition)))
                }
                Err(err) => {
                    tracing::warn!(url = %request.url, error = %err, "cross-partition lookup failed");
                    None
                }
            },
            FallbackTier::Shell => {
                if !request.is_navigation() {
                    return None;
                }
                let partition = self.settings.names.static_name();
                self.shell()
                    .await
                    .map(|response| Outcome::new(response, Provenance::Fallback, Some(partition)))
            }
            FallbackTier::Offline => Some(Outcome::new(offline_response(), Provenance::Fallback, None)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedNetwork, active_worker};
    use nimbus_core::RequestMode;
    use std::sync::Arc;

    fn request(path: &str, mode: RequestMode) -> Request {
        Request::parse("GET", &format!("http://localhost:8080{path}"), mode).unwrap()
    }

    #[test]
    fn test_offline_response_shape() {
        let resp = offline_response();
        assert_eq!(resp.status, 503);
        assert_eq!(resp.content_type(), Some("application/json"));
        let body: serde_json::Value = serde_json::from_slice(&resp.body).unwrap();
        assert_eq!(body["error"], OFFLINE_ERROR_CODE);
        assert!(body["message"].as_str().is_some());
    }

    #[test]
    fn test_offline_is_terminal() {
        assert_eq!(FALLBACK_TIERS.last(), Some(&FallbackTier::Offline));
    }

    #[tokio::test]
    async fn test_any_partition_match_wins() {
        let worker = active_worker(Arc::new(ScriptedNetwork::new())).await;
        let req = request("/legacy/radar.png", RequestMode::Subresource);
        worker.db().put("third-party-cache", &req, &Response::ok("image/png", "radar")).await.unwrap();

        let outcome = worker.resolve_fallback(&req).await;
        assert_eq!(outcome.provenance, Provenance::Fallback);
        assert_eq!(outcome.partition.as_deref(), Some("third-party-cache"));
        assert_eq!(outcome.response.text(), "radar");
    }

    #[tokio::test]
    async fn test_shell_for_navigation_only() {
        let worker = active_worker(Arc::new(ScriptedNetwork::new())).await;
        let shell = Request::get(worker.settings().shell.clone());
        let static_name = worker.settings().names.static_name();
        worker.db().put(&static_name, &shell, &Response::ok("text/html", "shell")).await.unwrap();

        let nav = worker.resolve_fallback(&request("/somewhere", RequestMode::Navigate)).await;
        assert_eq!(nav.response.text(), "shell");

        let sub = worker.resolve_fallback(&request("/somewhere", RequestMode::Subresource)).await;
        assert_eq!(sub.response.status, 503);
        assert_eq!(sub.partition, None);
    }

    #[tokio::test]
    async fn test_offline_response_is_not_cached() {
        let worker = active_worker(Arc::new(ScriptedNetwork::new())).await;
        let req = request("/nothing", RequestMode::Subresource);
        let before = worker.db().list_partitions().await.unwrap();

        let outcome = worker.resolve_fallback(&req).await;
        assert_eq!(outcome.response.status, 503);
        assert_eq!(worker.db().list_partitions().await.unwrap(), before);
        assert!(worker.db().match_any(&req).await.unwrap().is_none());
    }
}
