//! MCP tool implementations.
//!
//! This module contains all tools exposed by the nimbus-sw server.

pub mod fetch;
pub mod message;
pub mod notify;
pub mod status;

pub use fetch::{WorkerFetchParams, fetch_impl};
pub use message::{WorkerMessageParams, message_impl};
pub use notify::{NotificationClickParams, WorkerPushParams, click_impl, push_impl};
pub use status::status_impl;
