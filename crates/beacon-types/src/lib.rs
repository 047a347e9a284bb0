//! Beacon Types - data model for registry applications and instances
//!
//! These types mirror the JSON representation used by Eureka-compatible
//! registries, including its legacy field names (`"$"` for port numbers,
//! string-encoded `"@enabled"` flags, SCREAMING_SNAKE_CASE statuses).
//!
//! ## Key Concepts
//!
//! - **Instance**: one registered copy of a service, identified by
//!   `(app, instance_id)`
//! - **Application**: a named service and its registered instances
//! - **InstanceStatus**: the registration state machine's vocabulary

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod application;
pub mod instance;

// Re-export main types
pub use application::Application;
pub use instance::{DataCenterInfo, Instance, InstanceStatus, LeaseInfo, PortInfo};
