//! Core types and shared functionality for nimbus.
//!
//! This crate provides:
//! - The partitioned response cache with SQLite backend
//! - Request and response records
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod request;
pub mod response;

pub use cache::{CacheDb, PartitionHandle, PartitionNames, Role};
pub use config::{AppConfig, ConfigError};
pub use error::Error;
pub use request::{Request, RequestMode};
pub use response::Response;
