//! Offline-caching worker engine for nimbus.
//!
//! Every request the page issues is first checked against the bypass
//! rules, then classified, then served by a strategy whose fallthrough
//! order is an explicit list of tiers:
//!
//! ```text
//! Request ─┬─ non-http / excluded / not controlling ──> Passthrough
//!          └─ classify ─┬─ Static  ─> CacheFirst            [cache+revalidate, network]
//!                       ├─ Dynamic ─> NetworkFirstWithShell [network, cache, shell]
//!                       └─ Default ─> NetworkFirst          [network, cache]
//!                                        │ all tiers failed
//!                                        v
//!                              Fallback [any partition, shell, offline 503]
//! ```
//!
//! The [`Worker`] context owns the cache store, the network seam and the
//! lifecycle state (`installing → installed → activating → activated`).

pub mod background;
pub mod classify;
pub mod fallback;
pub mod lifecycle;
pub mod message;
pub mod notify;
pub mod settings;
pub mod strategy;
#[cfg(any(test, feature = "test-util"))]
pub mod testing;
pub mod worker;

pub use background::Background;
pub use classify::{Bypass, Classifier, ContentClass};
pub use fallback::{FALLBACK_TIERS, FallbackTier, OFFLINE_ERROR_CODE, offline_response};
pub use lifecycle::{ActivationReport, JournalEntry, LifecycleEvent, WorkerState};
pub use message::{ControlMessage, ControlReply, UpdateSummary};
pub use notify::{Notification, NotificationAction, NotificationDefaults, PushPayload};
pub use settings::WorkerSettings;
pub use strategy::{Outcome, Provenance, Strategy, Tier};
pub use worker::{FetchDisposition, Worker};
