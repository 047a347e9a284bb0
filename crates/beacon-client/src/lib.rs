//! Beacon Client - discovery client facade
//!
//! One owned [`DiscoveryClient`] wires the whole stack together: the HTTP
//! transport, the cached registry view, the resolver read path, and the
//! lifecycle loops driving this instance's own registration. All state is
//! carried by the struct; there are no process-wide singletons.
//!
//! ```no_run
//! use beacon_client::{ClientConfig, DiscoveryClient};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ClientConfig::load("beacon.yaml")?;
//! let client = DiscoveryClient::new(config)?;
//! client.start().await;
//!
//! let url = client.rewrite_url("http://ORDERS/api/orders/42").await?;
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod client;
pub mod config;
pub mod error;
pub mod status;

// Re-exports
pub use client::DiscoveryClient;
pub use config::{ClientConfig, ClientSection, InstanceSection, LeaseSection, ServiceUrl};
pub use error::ConfigError;
pub use status::{HealthInfo, Link, ServerInfo, StatusInfo};

// The rest of the stack, for callers that only depend on this crate
pub use beacon_registry::{AppRecord, RegistryCache};
pub use beacon_resolver::{ResolveError, ResolveResult, Resolver};
pub use beacon_transport::{
    HttpRegistryTransport, RegistryTransport, TransportError, TransportResult,
};
pub use beacon_types::{Application, Instance, InstanceStatus, LeaseInfo, PortInfo};
