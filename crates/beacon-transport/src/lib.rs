//! Beacon Transport - REST transport for Eureka-compatible registries
//!
//! This crate provides the seam between the discovery client and the remote
//! registry:
//!
//! - **RegistryTransport**: the operations the registry exposes, as an async
//!   trait so cache, lifecycle, and tests can swap implementations
//! - **HttpRegistryTransport**: the production implementation speaking the
//!   Eureka v2 REST dialect over HTTP
//!
//! Transport failures are always recoverable for the caller: background
//! loops log and retry on their own cadence, synchronous reads propagate
//! the error.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod error;
pub mod http;

// Re-exports
pub use error::{TransportError, TransportResult};
pub use http::HttpRegistryTransport;

use async_trait::async_trait;
use beacon_types::{Application, Instance, InstanceStatus};

/// Operations against the remote service registry.
#[async_trait]
pub trait RegistryTransport: Send + Sync {
    /// Register an instance under an application.
    async fn register(&self, app_id: &str, instance: &Instance) -> TransportResult<()>;

    /// Remove an instance registration.
    async fn deregister(&self, app_id: &str, instance_id: &str) -> TransportResult<()>;

    /// Renew the instance's lease.
    async fn heartbeat(&self, app_id: &str, instance_id: &str) -> TransportResult<()>;

    /// Overwrite the instance's registered status.
    async fn update_status(
        &self,
        app_id: &str,
        instance_id: &str,
        status: InstanceStatus,
    ) -> TransportResult<()>;

    /// Fetch every registered application.
    async fn query_all(&self) -> TransportResult<Vec<Application>>;

    /// Fetch a single application by name.
    async fn query_by_app_id(&self, app_id: &str) -> TransportResult<Application>;

    /// Fetch a single instance by id.
    async fn query_instance(&self, instance_id: &str) -> TransportResult<Instance>;
}
