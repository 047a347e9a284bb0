//! Client configuration and local descriptor construction
//!
//! The YAML layout follows the conventional Eureka client sections:
//!
//! ```yaml
//! serviceUrl:
//!   defaultZone: http://registry:8761/eureka
//! client:
//!   fetchRegistry: true
//!   registerWithEureka: true
//! instance:
//!   appName: orders
//!   nonSecurePort: 8080
//! ```

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use beacon_types::{DataCenterInfo, Instance, InstanceStatus, LeaseInfo, PortInfo};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

const DEFAULT_FETCH_INTERVAL_SECS: u64 = 30;
const DEFAULT_STATUS_PAGE_PATH: &str = "/actuator/info";
const DEFAULT_HEALTH_CHECK_PATH: &str = "/actuator/health";

/// Full client configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientConfig {
    /// Registry endpoint
    pub service_url: ServiceUrl,

    /// Client-level behavior switches
    pub client: ClientSection,

    /// The local instance's descriptor fields
    pub instance: InstanceSection,
}

/// Registry endpoint configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServiceUrl {
    /// Base URL of the registry, e.g. `http://registry:8761/eureka`
    pub default_zone: String,
}

/// Client-level behavior switches.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientSection {
    /// Seconds between bulk registry refreshes; values of zero or below
    /// fall back to the 30s default
    pub registry_fetch_interval_seconds: i64,

    /// Keep a locally cached view of the registry
    pub fetch_registry: bool,

    /// Index only UP instances for resolution
    pub filter_only_up_instances: bool,

    /// Register this instance so other services can discover it
    pub register_with_eureka: bool,

    /// De-register on graceful shutdown
    pub should_unregister_on_shutdown: bool,
}

impl Default for ClientSection {
    fn default() -> Self {
        Self {
            registry_fetch_interval_seconds: DEFAULT_FETCH_INTERVAL_SECS as i64,
            fetch_registry: false,
            filter_only_up_instances: false,
            register_with_eureka: false,
            should_unregister_on_shutdown: true,
        }
    }
}

impl ClientSection {
    /// Effective bulk refresh interval.
    pub fn registry_fetch_interval(&self) -> Duration {
        if self.registry_fetch_interval_seconds <= 0 {
            Duration::from_secs(DEFAULT_FETCH_INTERVAL_SECS)
        } else {
            Duration::from_secs(self.registry_fetch_interval_seconds as u64)
        }
    }
}

/// Descriptor fields for the local instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InstanceSection {
    /// Explicit instance id; defaults to `<host>:<port>` when empty
    pub instance_id: String,

    /// Application name to register under
    pub app_name: String,

    /// Plain-text port
    pub non_secure_port: u16,

    /// Whether the plain-text port takes traffic
    pub non_secure_port_enabled: bool,

    /// TLS port
    pub secure_port: u16,

    /// Whether the TLS port takes traffic
    pub secure_port_enabled: bool,

    /// VIP name; defaults to the lower-cased app name
    pub virtual_host_name: String,

    /// Secure VIP name; defaults to the lower-cased app name
    pub secure_virtual_host_name: String,

    /// Home page path, absolutized against the advertised address
    pub home_page_url_path: String,

    /// Status page path, defaults to `/actuator/info`
    pub status_page_url_path: String,

    /// Health check path, defaults to `/actuator/health`
    pub health_check_url_path: String,

    /// Advertise the detected local IP instead of the hostname
    pub prefer_ip_address: bool,

    /// Promote to UP right after registration instead of waiting for the
    /// advertised port to answer
    pub instance_enabled_on_init: bool,

    /// Legacy country identifier
    pub country_id: i32,

    /// Free-form key/value annotations
    pub metadata: HashMap<String, String>,

    /// Lease timing
    pub lease_info: LeaseSection,
}

impl Default for InstanceSection {
    fn default() -> Self {
        Self {
            instance_id: String::new(),
            app_name: String::new(),
            non_secure_port: 8080,
            non_secure_port_enabled: true,
            secure_port: 443,
            secure_port_enabled: false,
            virtual_host_name: String::new(),
            secure_virtual_host_name: String::new(),
            home_page_url_path: String::new(),
            status_page_url_path: String::new(),
            health_check_url_path: String::new(),
            prefer_ip_address: false,
            instance_enabled_on_init: false,
            country_id: 0,
            metadata: HashMap::new(),
            lease_info: LeaseSection::default(),
        }
    }
}

/// Lease timing configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LeaseSection {
    /// Seconds between heartbeats
    pub renewal_interval_in_secs: u64,

    /// Seconds without a heartbeat before the registry evicts the lease
    pub duration_in_secs: u64,
}

impl Default for LeaseSection {
    fn default() -> Self {
        Self {
            renewal_interval_in_secs: 30,
            duration_in_secs: 90,
        }
    }
}

impl ClientConfig {
    /// Load configuration from a YAML file and validate it.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Check required fields.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service_url.default_zone.trim().is_empty() {
            return Err(ConfigError::Validation(
                "serviceUrl.defaultZone is required".to_string(),
            ));
        }
        if self.instance.app_name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "instance.appName is required".to_string(),
            ));
        }
        if !self.instance.non_secure_port_enabled && !self.instance.secure_port_enabled {
            return Err(ConfigError::Validation(
                "at least one of the instance ports must be enabled".to_string(),
            ));
        }
        Ok(())
    }
}

/// Build the immutable local instance descriptor from configuration.
///
/// Resolves the advertised host (detected local IP when `preferIpAddress`
/// is set, the OS hostname otherwise) and fills every defaulted field; the
/// result starts in STARTING and is only mutated by the lifecycle manager
/// afterwards.
pub fn build_instance(config: &ClientConfig) -> Result<Instance, ConfigError> {
    let host = if config.instance.prefer_ip_address {
        local_ip_address::local_ip()
            .map_err(|e| ConfigError::LocalAddress(e.to_string()))?
            .to_string()
    } else {
        hostname::get()?.to_string_lossy().into_owned()
    };

    if host.trim().is_empty() {
        return Err(ConfigError::LocalAddress(
            "resolved host name is empty".to_string(),
        ));
    }

    Ok(instance_with_host(config, &host))
}

fn instance_with_host(config: &ClientConfig, host: &str) -> Instance {
    let section = &config.instance;
    let advertised_port = if section.secure_port_enabled {
        section.secure_port
    } else {
        section.non_secure_port
    };

    let instance_id = if section.instance_id.trim().is_empty() {
        format!("{host}:{advertised_port}")
    } else {
        section.instance_id.clone()
    };

    let vip_address = defaulted(&section.virtual_host_name, || section.app_name.to_lowercase());
    let secure_vip_address = defaulted(&section.secure_virtual_host_name, || {
        section.app_name.to_lowercase()
    });

    let status_page_path = defaulted(&section.status_page_url_path, || {
        DEFAULT_STATUS_PAGE_PATH.to_string()
    });
    let health_check_path = defaulted(&section.health_check_url_path, || {
        DEFAULT_HEALTH_CHECK_PATH.to_string()
    });

    Instance {
        instance_id,
        host_name: host.to_string(),
        app: section.app_name.clone(),
        ip_addr: host.to_string(),
        status: InstanceStatus::Starting,
        vip_address,
        secure_vip_address,
        port: PortInfo::new(section.non_secure_port, section.non_secure_port_enabled),
        secure_port: PortInfo::new(section.secure_port, section.secure_port_enabled),
        home_page_url: absolutize(host, advertised_port, &section.home_page_url_path),
        status_page_url: absolutize(host, advertised_port, &status_page_path),
        health_check_url: absolutize(host, advertised_port, &health_check_path),
        data_center_info: DataCenterInfo::default(),
        lease_info: Some(LeaseInfo::new(
            section.lease_info.renewal_interval_in_secs,
            section.lease_info.duration_in_secs,
        )),
        metadata: section.metadata.clone(),
        country_id: section.country_id,
    }
}

fn defaulted(value: &str, fallback: impl FnOnce() -> String) -> String {
    if value.trim().is_empty() {
        fallback()
    } else {
        value.to_string()
    }
}

fn absolutize(host: &str, port: u16, path: &str) -> String {
    format!("http://{}:{}/{}", host, port, path.trim_start_matches('/'))
}
