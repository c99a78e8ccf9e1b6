//! Fetch strategies as ordered recovery tiers.
//!
//! A strategy is nothing more than the order in which tiers are tried. Each
//! tier either produces an outcome, passes (a miss, or not applicable), or
//! fails. The first outcome wins; if every tier passes or fails, the first
//! failure is raised to the caller.

use std::sync::Arc;

use nimbus_client::Network;
use nimbus_core::{CacheDb, Error, Request, Response, Role};
use serde::Serialize;

use crate::classify::ContentClass;
use crate::worker::Worker;

/// Where a returned response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    Cache,
    Network,
    Fallback,
}

impl Provenance {
    pub fn as_str(self) -> &'static str {
        match self {
            Provenance::Cache => "cache",
            Provenance::Network => "network",
            Provenance::Fallback => "fallback",
        }
    }
}

/// A response plus provenance. Never persisted.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub response: Response,
    pub provenance: Provenance,
    /// Partition the response was read from or written to, if any.
    pub partition: Option<String>,
}

impl Outcome {
    pub fn new(response: Response, provenance: Provenance, partition: Option<String>) -> Self {
        Self { response, provenance, partition }
    }
}

/// One step of a strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    /// Cache hit returns immediately and schedules a background refresh.
    CachedWithRevalidate(Role),
    /// Network response returns as-is; ok responses are stored first.
    Network(Role),
    /// Plain cache lookup.
    Cached(Role),
    /// Application shell from the static partition, navigations only.
    Shell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    CacheFirst,
    NetworkFirst,
    NetworkFirstWithShell,
}

impl Strategy {
    pub fn for_class(class: ContentClass) -> Self {
        match class {
            ContentClass::Static => Strategy::CacheFirst,
            ContentClass::Dynamic => Strategy::NetworkFirstWithShell,
            ContentClass::Default => Strategy::NetworkFirst,
        }
    }

    /// Fallthrough order.
    pub fn tiers(self) -> &'static [Tier] {
        match self {
            Strategy::CacheFirst => &[Tier::CachedWithRevalidate(Role::Static), Tier::Network(Role::Static)],
            Strategy::NetworkFirst => &[Tier::Network(Role::Dynamic), Tier::Cached(Role::Dynamic)],
            Strategy::NetworkFirstWithShell => {
                &[Tier::Network(Role::Dynamic), Tier::Cached(Role::Dynamic), Tier::Shell]
            }
        }
    }
}

/// Fetch a fresh copy and overwrite the cached one. Runs detached.
async fn revalidate(db: CacheDb, network: Arc<dyn Network>, partition: String, request: Request) -> Result<(), Error> {
    let response = network.fetch(&request).await?;
    if response.is_ok() {
        db.put(&partition, &request, &response).await?;
        tracing::debug!(url = %request.url, partition = %partition, "revalidated cached entry");
    }
    Ok(())
}

impl Worker {
    /// Run `strategy` for `request`.
    ///
    /// # Errors
    ///
    /// Returns the first tier failure (normally `Error::NetworkFailure`) when
    /// no tier produced a response, or `Error::CacheMiss` if no tier failed.
    pub async fn execute(&self, strategy: Strategy, request: &Request) -> Result<Outcome, Error> {
        let mut failure: Option<Error> = None;

        for tier in strategy.tiers() {
            match self.run_tier(*tier, request).await {
                Ok(Some(outcome)) => {
                    tracing::debug!(
                        url = %request.url,
                        strategy = ?strategy,
                        tier = ?tier,
                        provenance = ?outcome.provenance,
                        "strategy produced response"
                    );
                    return Ok(outcome);
                }
                Ok(None) => {}
                Err(err) => {
                    tracing::debug!(url = %request.url, tier = ?tier, error = %err, "tier failed");
                    failure.get_or_insert(err);
                }
            }
        }

        Err(failure.unwrap_or_else(|| Error::CacheMiss(request.url.to_string())))
    }

    async fn run_tier(&self, tier: Tier, request: &Request) -> Result<Option<Outcome>, Error> {
        match tier {
            Tier::CachedWithRevalidate(role) => {
                let partition = self.settings.names.name(role);
                let Some(response) = self.lookup(&partition, request).await else {
                    return Ok(None);
                };
                self.spawn_revalidation(&partition, request);
                Ok(Some(Outcome::new(response, Provenance::Cache, Some(partition))))
            }
            Tier::Network(role) => {
                let partition = self.settings.names.name(role);
                let response = self.network.fetch(request).await?;
                if response.is_ok() {
                    self.store(&partition, request, &response).await;
                }
                Ok(Some(Outcome::new(response, Provenance::Network, Some(partition))))
            }
            Tier::Cached(role) => {
                let partition = self.settings.names.name(role);
                Ok(self
                    .lookup(&partition, request)
                    .await
                    .map(|response| Outcome::new(response, Provenance::Cache, Some(partition))))
            }
            Tier::Shell => {
                if !request.is_navigation() {
                    return Ok(None);
                }
                let partition = self.settings.names.static_name();
                Ok(self
                    .shell()
                    .await
                    .map(|response| Outcome::new(response, Provenance::Fallback, Some(partition))))
            }
        }
    }

    /// Cache read where storage errors count as a miss.
    pub(crate) async fn lookup(&self, partition: &str, request: &Request) -> Option<Response> {
        match self.db.match_request(partition, request).await {
            Ok(hit) => hit,
            Err(err) => {
                tracing::warn!(url = %request.url, partition = %partition, error = %err, "cache read failed");
                None
            }
        }
    }

    /// Best-effort write: a failed store never fails the request it came from.
    pub(crate) async fn store(&self, partition: &str, request: &Request, response: &Response) {
        match self.db.put(partition, request, response).await {
            Ok(()) => tracing::debug!(url = %request.url, partition = %partition, "stored response"),
            Err(err) => {
                tracing::warn!(url = %request.url, partition = %partition, error = %err, "cache write failed")
            }
        }
    }

    /// The cached application shell, if the static partition holds it.
    pub(crate) async fn shell(&self) -> Option<Response> {
        let shell = Request::get(self.settings.shell.clone());
        self.lookup(&self.settings.names.static_name(), &shell).await
    }

    fn spawn_revalidation(&self, partition: &str, request: &Request) {
        self.background.spawn(
            "revalidate",
            request.url.to_string(),
            revalidate(self.db.clone(), self.network.clone(), partition.to_string(), request.clone()),
        );
    }
}
