//! SQLite-backed partitioned response cache.
//!
//! This module is the Cache Store Manager: a set of named, versioned
//! partitions, each mapping a request key to a stored response. It provides:
//!
//! - Partition lifecycle (open, delete, enumerate, evict stale versions)
//! - GET-by-URL entry storage keyed by SHA-256
//! - A record of activated versions, so a restart can resume control
//! - Automatic schema migrations
//! - WAL mode for concurrent access

pub mod activations;
pub mod connection;
pub mod entries;
pub mod hash;
pub mod migrations;
pub mod naming;
pub mod partitions;

pub use crate::Error;

pub use connection::CacheDb;
pub use naming::{PartitionNames, Role};
pub use partitions::PartitionHandle;
