//! Actuator-style status payloads
//!
//! Serializable bodies for the embedding process's status endpoints. The
//! client does not run an HTTP server; it only produces the payloads a
//! registry dashboard expects to find behind `/actuator/*`.

use std::collections::HashMap;

use serde::Serialize;

use crate::client::DiscoveryClient;

/// Body for the info endpoint.
#[derive(Debug, Serialize)]
pub struct StatusInfo {
    /// Application name
    pub name: String,

    /// Advertised server details
    pub server: ServerInfo,
}

/// Server details inside [`StatusInfo`].
#[derive(Debug, Serialize)]
pub struct ServerInfo {
    /// Advertised port
    pub port: u16,
}

/// Body for the health endpoint.
#[derive(Debug, Serialize)]
pub struct HealthInfo {
    /// Reported status
    pub status: &'static str,

    /// Detail map, empty by default
    pub details: HashMap<String, String>,
}

/// A discoverable endpoint in the links index.
#[derive(Debug, Serialize)]
pub struct Link {
    pub href: String,
    pub templated: bool,
}

impl DiscoveryClient {
    /// Payload for the info endpoint.
    pub fn actuator_info(&self) -> StatusInfo {
        let instance = self.local_instance();
        StatusInfo {
            name: self.app_name().to_string(),
            server: ServerInfo {
                port: instance.advertised_port(),
            },
        }
    }

    /// Payload for the health endpoint.
    pub fn actuator_health(&self) -> HealthInfo {
        HealthInfo {
            status: "UP",
            details: HashMap::new(),
        }
    }

    /// Index of the status endpoints, keyed by link name.
    pub fn actuator_links(&self) -> HashMap<String, Link> {
        let instance = self.local_instance();
        let base = format!("http://{}:{}", instance.ip_addr, instance.advertised_port());

        let mut links = HashMap::new();
        links.insert(
            "info".to_string(),
            Link {
                href: format!("{base}/actuator/info"),
                templated: false,
            },
        );
        links.insert(
            "health".to_string(),
            Link {
                href: format!("{base}/actuator/health"),
                templated: false,
            },
        );
        links
    }
}
