//! Network layer for nimbus.
//!
//! This crate provides the `Network` seam the worker fetches through and
//! its reqwest-backed implementation, plus URL helpers for resolving
//! scope-relative asset paths.

pub mod fetch;

pub use fetch::{FetchClient, FetchConfig, Network, UrlError, canonicalize, resolve};
