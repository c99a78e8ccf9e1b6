//! The worker context and the fetch entry point.

use std::sync::Arc;

use nimbus_client::Network;
use nimbus_core::{CacheDb, Error, Request, Response};
use tokio::sync::RwLock;

use crate::background::Background;
use crate::classify::{Bypass, Classifier};
use crate::lifecycle::Lifecycle;
use crate::settings::WorkerSettings;
use crate::strategy::{Outcome, Strategy};

/// What the host should do with an intercepted fetch.
#[derive(Debug, Clone)]
pub enum FetchDisposition {
    /// Not intercepted; the host fetches from the network itself.
    Passthrough(Bypass),
    /// Answered by the worker.
    Respond(Outcome),
}

/// Process-wide worker state: cache store, network, lifecycle and the
/// background task sink. Create one per deployment and share it behind an `Arc`.
pub struct Worker {
    pub(crate) db: CacheDb,
    pub(crate) network: Arc<dyn Network>,
    pub(crate) settings: WorkerSettings,
    pub(crate) classifier: Classifier,
    pub(crate) lifecycle: RwLock<Lifecycle>,
    pub(crate) background: Background,
}

impl Worker {
    pub fn new(db: CacheDb, network: Arc<dyn Network>, settings: WorkerSettings) -> Self {
        let classifier = Classifier::new(&settings.scope, settings.never_cache.clone());
        Self {
            db,
            network,
            settings,
            classifier,
            lifecycle: RwLock::new(Lifecycle::default()),
            background: Background::new(),
        }
    }

    pub fn settings(&self) -> &WorkerSettings {
        &self.settings
    }

    pub fn db(&self) -> &CacheDb {
        &self.db
    }

    pub fn background(&self) -> &Background {
        &self.background
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// Intercept one fetch.
    ///
    /// Never fails: a request the strategies cannot answer goes to the
    /// fallback resolver, which always produces a response.
    pub async fn handle_fetch(&self, request: &Request) -> FetchDisposition {
        if let Some(reason) = self.classifier.bypass(request) {
            tracing::debug!(url = %request.url, reason = ?reason, "passthrough");
            return FetchDisposition::Passthrough(reason);
        }
        // Held until the response is chosen; activation waits on it.
        let lifecycle = self.lifecycle.read().await;
        if !lifecycle.controlling() {
            tracing::debug!(url = %request.url, "passthrough, not controlling");
            return FetchDisposition::Passthrough(Bypass::NotControlling);
        }

        let class = self.classifier.classify(request);
        let strategy = Strategy::for_class(class);
        tracing::debug!(url = %request.url, class = ?class, strategy = ?strategy, "intercepted");

        let disposition = match self.execute(strategy, request).await {
            Ok(outcome) => FetchDisposition::Respond(outcome),
            Err(err) => {
                tracing::info!(url = %request.url, error = %err, "strategy exhausted, resolving fallback");
                FetchDisposition::Respond(self.resolve_fallback(request).await)
            }
        };
        drop(lifecycle);
        disposition
    }

    /// Fetch straight from the network, untouched by any partition.
    pub async fn passthrough(&self, request: &Request) -> Result<Response, Error> {
        self.network.fetch(request).await
    }
}
