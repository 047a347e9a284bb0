//! Application records grouping registered instances

use crate::instance::Instance;
use serde::{Deserialize, Serialize};

/// A named service and its registered instances.
///
/// The registry upper-cases application names; lookups normalize the same
/// way before consulting the cache.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Application {
    /// Application name, upper-cased by the registry
    pub name: String,

    /// Registered instances in registry order
    #[serde(rename = "instance", default)]
    pub instances: Vec<Instance>,
}

impl Application {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instances: Vec::new(),
        }
    }
}
