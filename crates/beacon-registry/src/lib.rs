//! Beacon Registry - locally cached view of the remote registry
//!
//! The RegistryCache keeps an eventually-consistent snapshot of every
//! application the registry knows about, refreshed in bulk on a timer and
//! on demand per application on cache miss. Readers get immutable per-app
//! records; writers build replacement records off-lock and swap them in
//! under one short exclusive section, so a reader can never observe a
//! partially updated application.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod cache;

// Re-exports
pub use cache::{AppRecord, RegistryCache};
