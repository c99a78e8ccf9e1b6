//! Install and activation.
//!
//! The lifecycle is a small state machine guarded by the worker's lock:
//!
//! ```text
//! parsed ──> installing ──> installed ──> activating ──> activated
//!    ^            │                          │
//!    │            v                          v
//!    └──────  redundant                  installed (eviction failed)
//! ```
//!
//! Control is tracked apart from the state. Activation claims it, and the
//! claim is recorded in the store so a restarted worker can resume serving
//! the last activated install before (and regardless of) installing again.
//!
//! Activation holds the write half of the lock from eviction through
//! claim, and fetch handling holds the read half for the whole request, so
//! no request is ever served against a partially evicted cache set.

use std::fmt;

use nimbus_core::{Error, PartitionNames, Request, Response};
use serde::Serialize;

use crate::worker::Worker;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    #[default]
    Parsed,
    Installing,
    Installed,
    Activating,
    Activated,
    Redundant,
}

impl WorkerState {
    pub fn as_str(self) -> &'static str {
        match self {
            WorkerState::Parsed => "parsed",
            WorkerState::Installing => "installing",
            WorkerState::Installed => "installed",
            WorkerState::Activating => "activating",
            WorkerState::Activated => "activated",
            WorkerState::Redundant => "redundant",
        }
    }

    fn can_become(self, next: WorkerState) -> bool {
        use WorkerState::*;
        matches!(
            (self, next),
            (Parsed | Redundant, Installing)
                | (Installing, Installed | Redundant)
                | (Installed, Activating)
                | (Activating, Activated | Installed)
        )
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LifecycleEvent {
    Installed { entries: usize },
    Redundant { reason: String },
    Evicted { partitions: Vec<String> },
    Claimed,
    Resumed { version: String },
}

/// A lifecycle event with its position in the journal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JournalEntry {
    pub seq: u64,
    #[serde(flatten)]
    pub event: LifecycleEvent,
}

/// Result of one activation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivationReport {
    pub evicted: Vec<String>,
    pub evicted_seq: u64,
    pub claimed_seq: u64,
}

#[derive(Debug, Default)]
pub(crate) struct Lifecycle {
    state: WorkerState,
    skip_waiting: bool,
    controlling: bool,
    /// Version whose partitions are being served while controlling.
    serving: Option<String>,
    journal: Vec<JournalEntry>,
}

impl Lifecycle {
    pub(crate) fn state(&self) -> WorkerState {
        self.state
    }

    pub(crate) fn controlling(&self) -> bool {
        self.controlling
    }

    pub(crate) fn transition(&mut self, next: WorkerState) -> Result<(), Error> {
        if !self.state.can_become(next) {
            return Err(Error::InvalidState(format!("cannot move from {} to {next}", self.state)));
        }
        tracing::debug!(from = %self.state, to = %next, "lifecycle transition");
        self.state = next;
        Ok(())
    }

    fn record(&mut self, event: LifecycleEvent) -> u64 {
        let seq = self.journal.len() as u64 + 1;
        self.journal.push(JournalEntry { seq, event });
        seq
    }
}

impl Worker {
    pub async fn state(&self) -> WorkerState {
        self.lifecycle.read().await.state()
    }

    /// Whether fetches are being intercepted.
    pub async fn is_controlling(&self) -> bool {
        self.lifecycle.read().await.controlling()
    }

    /// Version of the install currently in control, which may predate this worker.
    pub async fn serving_version(&self) -> Option<String> {
        self.lifecycle.read().await.serving.clone()
    }

    pub async fn journal(&self) -> Vec<JournalEntry> {
        self.lifecycle.read().await.journal.clone()
    }

    /// Take back control over the last activated install still on disk.
    ///
    /// Control resumes only if that version's static partition holds entries.
    /// Nothing is evicted: stale partitions stay until the next activation.
    /// Returns the resumed version.
    pub async fn resume(&self) -> Result<Option<String>, Error> {
        let mut lifecycle = self.lifecycle.write().await;
        if lifecycle.controlling {
            return Ok(lifecycle.serving.clone());
        }

        let prefix = self.settings.names.prefix();
        let Some(version) = self.db.last_activated_version(prefix).await? else {
            return Ok(None);
        };
        let previous = PartitionNames::new(prefix, &version)?;
        if self.db.entry_count(&previous.static_name()).await? == 0 {
            tracing::info!(version = %version, "previous install is gone, not resuming");
            return Ok(None);
        }

        lifecycle.controlling = true;
        lifecycle.serving = Some(version.clone());
        lifecycle.record(LifecycleEvent::Resumed { version: version.clone() });
        tracing::info!(version = %version, "resumed control over previous install");
        Ok(Some(version))
    }

    /// Pre-cache the static manifest.
    ///
    /// On success the worker is `Installed` and asks to skip waiting. On any
    /// failure the worker becomes `Redundant` and the static partition is
    /// left exactly as it was; a previously resumed install keeps control.
    ///
    /// # Errors
    ///
    /// `Error::InstallFailure` naming the first entry that could not be
    /// fetched or stored; `Error::InvalidState` if called mid-install or after
    /// a successful install.
    pub async fn install(&self) -> Result<usize, Error> {
        self.lifecycle.write().await.transition(WorkerState::Installing)?;
        tracing::info!(
            version = %self.settings.names.version(),
            entries = self.settings.precache.len(),
            "installing"
        );

        let result = self.precache().await;

        let mut lifecycle = self.lifecycle.write().await;
        match result {
            Ok(entries) => {
                lifecycle.transition(WorkerState::Installed)?;
                lifecycle.skip_waiting = true;
                lifecycle.record(LifecycleEvent::Installed { entries });
                tracing::info!(entries, partition = %self.settings.names.static_name(), "installed");
                Ok(entries)
            }
            Err(err) => {
                lifecycle.transition(WorkerState::Redundant)?;
                lifecycle.record(LifecycleEvent::Redundant { reason: err.to_string() });
                tracing::error!(error = %err, serving = ?lifecycle.serving, "install failed");
                Err(err)
            }
        }
    }

    /// Fetch every manifest entry, then write them in one batch.
    async fn precache(&self) -> Result<usize, Error> {
        let mut batch: Vec<(Request, Response)> = Vec::with_capacity(self.settings.precache.len());

        for url in &self.settings.precache {
            let request = Request::get(url.clone());
            let response = self
                .network
                .fetch(&request)
                .await
                .map_err(|err| Error::InstallFailure(format!("{url}: {err}")))?;
            if !response.is_ok() {
                return Err(Error::InstallFailure(format!("{url}: status {}", response.status)));
            }
            batch.push((request, response));
        }

        self.db
            .put_all(&self.settings.names.static_name(), &batch)
            .await
            .map_err(|err| Error::InstallFailure(err.to_string()))
    }

    /// Evict stale partitions, then claim.
    ///
    /// # Errors
    ///
    /// `Error::InvalidState` unless the worker is `Installed`. A storage error
    /// during eviction returns the worker to `Installed` without claiming.
    pub async fn activate(&self) -> Result<ActivationReport, Error> {
        let mut lifecycle = self.lifecycle.write().await;
        self.activate_locked(&mut lifecycle).await
    }

    async fn activate_locked(&self, lifecycle: &mut Lifecycle) -> Result<ActivationReport, Error> {
        lifecycle.transition(WorkerState::Activating)?;

        let names = &self.settings.names;
        let evicted = match self.db.evict_stale(names, &names.current()).await {
            Ok(evicted) => evicted,
            Err(err) => {
                lifecycle.transition(WorkerState::Installed)?;
                tracing::error!(error = %err, "eviction failed, not claiming");
                return Err(err);
            }
        };
        let evicted_seq = lifecycle.record(LifecycleEvent::Evicted { partitions: evicted.clone() });

        lifecycle.controlling = true;
        lifecycle.serving = Some(names.version().to_string());
        lifecycle.skip_waiting = false;
        let claimed_seq = lifecycle.record(LifecycleEvent::Claimed);
        lifecycle.transition(WorkerState::Activated)?;

        if let Err(err) = self.db.record_activation(names).await {
            tracing::warn!(error = %err, "could not record activation, a restart will not resume");
        }

        tracing::info!(evicted = evicted.len(), version = %names.version(), "activated and claimed");
        Ok(ActivationReport { evicted, evicted_seq, claimed_seq })
    }

    /// Activate now if installed; otherwise remember the request.
    ///
    /// Returns `None` when there was nothing to activate.
    pub async fn skip_waiting(&self) -> Result<Option<ActivationReport>, Error> {
        let mut lifecycle = self.lifecycle.write().await;
        lifecycle.skip_waiting = true;
        match lifecycle.state() {
            WorkerState::Installed => self.activate_locked(&mut lifecycle).await.map(Some),
            state => {
                tracing::debug!(state = %state, "skip waiting: nothing to activate");
                Ok(None)
            }
        }
    }

    /// Resume any previous install, install this version, and activate it
    /// if skipping the waiting phase was requested.
    ///
    /// An install failure is returned, but a resumed install keeps serving.
    pub async fn start(&self) -> Result<Option<ActivationReport>, Error> {
        if let Err(err) = self.resume().await {
            tracing::warn!(error = %err, "could not read previous activation");
        }

        self.install().await?;

        let mut lifecycle = self.lifecycle.write().await;
        if !lifecycle.skip_waiting || lifecycle.state() != WorkerState::Installed {
            tracing::info!(state = %lifecycle.state(), "installed, waiting for skip waiting");
            return Ok(None);
        }
        self.activate_locked(&mut lifecycle).await.map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::Provenance;
    use crate::testing::{ScriptedNetwork, fresh_worker, worker_on};
    use crate::worker::FetchDisposition;
    use nimbus_core::{AppConfig, CacheDb, RequestMode};
    use std::sync::Arc;

    const MANIFEST: &[&str] = &[
        "http://localhost:8080/",
        "http://localhost:8080/app.html",
        "http://localhost:8080/styles.css",
        "http://localhost:8080/script.js",
        "http://localhost:8080/manifest.json",
    ];

    fn serving_manifest() -> Arc<ScriptedNetwork> {
        let net = Arc::new(ScriptedNetwork::new());
        for url in MANIFEST {
            net.ok(url, "text/plain", format!("body of {url}"));
        }
        net
    }

    #[test]
    fn test_transition_table() {
        assert!(WorkerState::Parsed.can_become(WorkerState::Installing));
        assert!(WorkerState::Redundant.can_become(WorkerState::Installing));
        assert!(WorkerState::Activating.can_become(WorkerState::Installed));
        assert!(!WorkerState::Parsed.can_become(WorkerState::Activating));
        assert!(!WorkerState::Activated.can_become(WorkerState::Installing));
    }

    #[tokio::test]
    async fn test_install_populates_static_partition() {
        let worker = fresh_worker(serving_manifest()).await;
        let entries = worker.install().await.unwrap();
        assert_eq!(entries, 5);
        assert_eq!(worker.state().await, WorkerState::Installed);
        assert!(!worker.is_controlling().await);

        let static_name = worker.settings().names.static_name();
        assert_eq!(worker.db().entry_count(&static_name).await.unwrap(), 5);
        assert!(matches!(worker.journal().await[0].event, LifecycleEvent::Installed { entries: 5 }));
    }

    #[tokio::test]
    async fn test_install_failure_writes_nothing() {
        let net = serving_manifest();
        net.fail("http://localhost:8080/script.js");
        let worker = fresh_worker(net).await;

        let err = worker.install().await.unwrap_err();
        assert!(matches!(err, Error::InstallFailure(_)));
        assert_eq!(worker.state().await, WorkerState::Redundant);

        let static_name = worker.settings().names.static_name();
        assert!(!worker.db().has_partition(&static_name).await.unwrap());
    }

    #[tokio::test]
    async fn test_install_rejects_error_status() {
        let net = serving_manifest();
        net.respond("http://localhost:8080/styles.css", Response::new(404, "Not Found", ""));
        let worker = fresh_worker(net).await;
        assert!(matches!(worker.install().await, Err(Error::InstallFailure(_))));
    }

    #[tokio::test]
    async fn test_redundant_worker_can_reinstall() {
        let net = serving_manifest();
        net.fail("http://localhost:8080/app.html");
        let worker = fresh_worker(net.clone()).await;
        assert!(worker.install().await.is_err());

        net.ok("http://localhost:8080/app.html", "text/html", "<html>");
        assert_eq!(worker.install().await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_activate_requires_install() {
        let worker = fresh_worker(serving_manifest()).await;
        assert!(matches!(worker.activate().await, Err(Error::InvalidState(_))));
        assert_eq!(worker.state().await, WorkerState::Parsed);
    }

    #[tokio::test]
    async fn test_activation_evicts_before_claiming() {
        let worker = fresh_worker(serving_manifest()).await;
        let stale = Request::get(url::Url::parse("http://localhost:8080/old.css").unwrap());
        let old = Response::ok("text/css", "old");
        for name in ["weather-app-static-v1.1", "weather-app-dynamic-v1.0", "other-app-cache"] {
            worker.db().put(name, &stale, &old).await.unwrap();
        }
        worker.db().open_partition("weather-app-dynamic-v1.2").await.unwrap();

        worker.install().await.unwrap();
        let report = worker.activate().await.unwrap();

        assert_eq!(report.evicted, ["weather-app-static-v1.1", "weather-app-dynamic-v1.0"]);
        assert!(report.evicted_seq < report.claimed_seq);
        assert!(worker.is_controlling().await);
        assert_eq!(worker.state().await, WorkerState::Activated);

        let remaining = worker.db().list_partitions().await.unwrap();
        assert!(remaining.contains(&"other-app-cache".to_string()));
        assert!(remaining.contains(&"weather-app-static-v1.2".to_string()));
        assert!(remaining.contains(&"weather-app-dynamic-v1.2".to_string()));
        assert_eq!(remaining.len(), 3);

        let events: Vec<_> = worker.journal().await.into_iter().map(|e| e.event).collect();
        let evicted_at = events.iter().position(|e| matches!(e, LifecycleEvent::Evicted { .. })).unwrap();
        let claimed_at = events.iter().position(|e| matches!(e, LifecycleEvent::Claimed)).unwrap();
        assert!(evicted_at < claimed_at);
    }

    #[tokio::test]
    async fn test_skip_waiting() {
        let worker = fresh_worker(serving_manifest()).await;
        assert_eq!(worker.skip_waiting().await.unwrap(), None);

        worker.install().await.unwrap();
        assert!(worker.skip_waiting().await.unwrap().is_some());
        assert_eq!(worker.state().await, WorkerState::Activated);

        assert_eq!(worker.skip_waiting().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_start() {
        let worker = fresh_worker(serving_manifest()).await;
        let report = worker.start().await.unwrap().unwrap();
        assert!(report.evicted.is_empty());
        assert!(worker.is_controlling().await);
        assert_eq!(worker.serving_version().await.as_deref(), Some("v1.2"));
    }

    fn app_html() -> Request {
        Request::parse("GET", "http://localhost:8080/app.html", RequestMode::Subresource).unwrap()
    }

    #[tokio::test]
    async fn test_offline_restart_keeps_serving_from_cache() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.sqlite");
        let net = serving_manifest();

        let db = CacheDb::open(&path).await.unwrap();
        let first = worker_on(db.clone(), net.clone(), &AppConfig::default());
        assert!(first.start().await.unwrap().is_some());
        drop(first);
        db.close().await.unwrap();

        net.offline();
        let db = CacheDb::open(&path).await.unwrap();
        let worker = worker_on(db, net, &AppConfig::default());

        assert!(matches!(worker.start().await, Err(Error::InstallFailure(_))));
        assert_eq!(worker.state().await, WorkerState::Redundant);
        assert!(worker.is_controlling().await);
        assert_eq!(worker.serving_version().await.as_deref(), Some("v1.2"));
        assert!(matches!(worker.journal().await[0].event, LifecycleEvent::Resumed { .. }));

        let FetchDisposition::Respond(outcome) = worker.handle_fetch(&app_html()).await else {
            panic!("expected /app.html to be intercepted");
        };
        assert_eq!(outcome.provenance, Provenance::Cache);
        assert_eq!(outcome.response.body, b"body of http://localhost:8080/app.html");
    }

    #[tokio::test]
    async fn test_offline_upgrade_serves_previous_version() {
        let net = serving_manifest();
        let db = CacheDb::open_in_memory().await.unwrap();
        let old_config = AppConfig { cache_version: "v1.1".into(), ..Default::default() };
        worker_on(db.clone(), net.clone(), &old_config).start().await.unwrap();

        net.offline();
        let worker = worker_on(db.clone(), net, &AppConfig::default());
        assert!(worker.start().await.is_err());
        assert!(worker.is_controlling().await);
        assert_eq!(worker.serving_version().await.as_deref(), Some("v1.1"));

        let FetchDisposition::Respond(outcome) = worker.handle_fetch(&app_html()).await else {
            panic!("expected /app.html to be intercepted");
        };
        assert_eq!(outcome.provenance, Provenance::Fallback);
        assert_eq!(outcome.partition.as_deref(), Some("weather-app-static-v1.1"));
        assert_eq!(db.entry_count("weather-app-static-v1.1").await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_failed_first_start_stays_passthrough() {
        let net = Arc::new(ScriptedNetwork::new());
        let worker = fresh_worker(net).await;
        assert!(worker.start().await.is_err());
        assert!(!worker.is_controlling().await);
        assert_eq!(worker.serving_version().await, None);
        assert!(matches!(worker.handle_fetch(&app_html()).await, FetchDisposition::Passthrough(_)));
    }

    #[tokio::test]
    async fn test_resume_skips_emptied_install() {
        let net = serving_manifest();
        let db = CacheDb::open_in_memory().await.unwrap();
        worker_on(db.clone(), net.clone(), &AppConfig::default()).start().await.unwrap();
        db.delete_partition("weather-app-static-v1.2").await.unwrap();

        let worker = worker_on(db, net, &AppConfig::default());
        assert_eq!(worker.resume().await.unwrap(), None);
        assert!(!worker.is_controlling().await);
    }
}
