//! Test doubles: a scripted network and worker constructors.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use nimbus_client::Network;
use nimbus_core::{AppConfig, CacheDb, Error, Request, Response};

use crate::lifecycle::WorkerState;
use crate::settings::WorkerSettings;
use crate::worker::Worker;

#[derive(Debug, Clone)]
enum Script {
    Respond(Response),
    Fail(String),
}

/// A `Network` that answers from a per-URL script and records every request.
///
/// URLs with no script fail like an unreachable host.
#[derive(Debug, Default)]
pub struct ScriptedNetwork {
    routes: Mutex<HashMap<String, Script>>,
    calls: Mutex<Vec<Request>>,
}

impl ScriptedNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, url: &str, response: Response) {
        self.routes().insert(url.to_string(), Script::Respond(response));
    }

    pub fn ok(&self, url: &str, content_type: &str, body: impl Into<Vec<u8>>) {
        self.respond(url, Response::ok(content_type, body));
    }

    pub fn fail(&self, url: &str) {
        self.routes().insert(url.to_string(), Script::Fail(format!("connection refused: {url}")));
    }

    /// Forget every script; all URLs fail from now on.
    pub fn offline(&self) {
        self.routes().clear();
    }

    pub fn calls(&self) -> Vec<Request> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn calls_to(&self, url: &str) -> usize {
        self.calls().iter().filter(|r| r.url.as_str() == url).count()
    }

    fn routes(&self) -> std::sync::MutexGuard<'_, HashMap<String, Script>> {
        self.routes.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Network for ScriptedNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).push(request.clone());
        let script = self.routes().get(request.url.as_str()).cloned();
        match script {
            Some(Script::Respond(response)) => Ok(response),
            Some(Script::Fail(reason)) => Err(Error::NetworkFailure(reason)),
            None => Err(Error::NetworkFailure(format!("no route to {}", request.url))),
        }
    }
}

/// A parsed worker over an empty in-memory cache with default settings.
pub async fn fresh_worker(network: Arc<ScriptedNetwork>) -> Worker {
    let db = CacheDb::open_in_memory().await.expect("in-memory cache");
    worker_on(db, network, &AppConfig::default())
}

/// A parsed worker over an existing cache store.
pub fn worker_on(db: CacheDb, network: Arc<ScriptedNetwork>, config: &AppConfig) -> Worker {
    let settings = WorkerSettings::from_config(config).expect("valid settings");
    Worker::new(db, network, settings)
}

/// A controlling worker whose caches are still empty.
///
/// Skips the manifest fetch so tests start from a clean call log.
pub async fn active_worker(network: Arc<ScriptedNetwork>) -> Worker {
    let worker = fresh_worker(network).await;
    {
        let mut lifecycle = worker.lifecycle.write().await;
        lifecycle.transition(WorkerState::Installing).expect("parsed to installing");
        lifecycle.transition(WorkerState::Installed).expect("installing to installed");
    }
    worker.activate().await.expect("activation");
    worker
}
