//! Instance records and their registry wire encoding
//!
//! An Instance describes one registered copy of a service. Remote instances
//! are replaced wholesale on cache refresh; the local instance mutates only
//! its status and lease timestamps.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Registration status of an instance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstanceStatus {
    /// Instance is booting and not yet taking traffic
    Starting,

    /// Instance is serving and eligible for resolution
    Up,

    /// Instance reported itself unavailable
    Down,

    /// Instance was taken out of rotation administratively
    OutOfService,

    /// Status not reported
    #[default]
    Unknown,
}

impl InstanceStatus {
    /// Wire spelling of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            InstanceStatus::Starting => "STARTING",
            InstanceStatus::Up => "UP",
            InstanceStatus::Down => "DOWN",
            InstanceStatus::OutOfService => "OUT_OF_SERVICE",
            InstanceStatus::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A port advertisement with its enabled flag.
///
/// The registry's wire format names the number `"$"` and encodes the flag as
/// the string-valued attribute `"@enabled"`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortInfo {
    /// Port number
    #[serde(rename = "$")]
    pub port: u16,

    /// Whether traffic is accepted on this port
    #[serde(rename = "@enabled", with = "flag_string")]
    pub enabled: bool,
}

impl PortInfo {
    pub fn new(port: u16, enabled: bool) -> Self {
        Self { port, enabled }
    }
}

/// Data center classification carried on registrations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataCenterInfo {
    /// Registry-side deserialization hint
    #[serde(rename = "@class")]
    pub class: String,

    /// Data center name, `MyOwn` unless running on a known cloud profile
    pub name: String,
}

impl Default for DataCenterInfo {
    fn default() -> Self {
        Self {
            class: "com.netflix.appinfo.InstanceInfo$DefaultDataCenterInfo".to_string(),
            name: "MyOwn".to_string(),
        }
    }
}

/// Lease contract between an instance and the registry.
///
/// The instance promises a heartbeat every `renewal_interval_in_secs`; the
/// registry evicts the instance when no renewal arrives within
/// `duration_in_secs`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LeaseInfo {
    /// Seconds between heartbeats
    pub renewal_interval_in_secs: u64,

    /// Seconds without a heartbeat before eviction
    pub duration_in_secs: u64,

    /// When the registry accepted the registration, epoch milliseconds
    #[serde(skip_serializing_if = "timestamp_unset")]
    pub registration_timestamp: i64,

    /// When the lease was last renewed, epoch milliseconds
    #[serde(skip_serializing_if = "timestamp_unset")]
    pub last_renewal_timestamp: i64,
}

impl LeaseInfo {
    pub fn new(renewal_interval_in_secs: u64, duration_in_secs: u64) -> Self {
        Self {
            renewal_interval_in_secs,
            duration_in_secs,
            ..Self::default()
        }
    }
}

fn timestamp_unset(ts: &i64) -> bool {
    *ts == 0
}

/// One registered copy of a service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instance {
    /// Unique id within the application, conventionally `ip:port`
    #[serde(default)]
    pub instance_id: String,

    /// Hostname the instance advertises
    pub host_name: String,

    /// Application this instance belongs to
    pub app: String,

    /// Address used for resolution
    pub ip_addr: String,

    /// Current registration status
    #[serde(default)]
    pub status: InstanceStatus,

    /// Logical name for virtual-host style lookup
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub vip_address: String,

    /// Logical name for secure virtual-host style lookup
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub secure_vip_address: String,

    /// Plain-text port
    #[serde(default)]
    pub port: PortInfo,

    /// TLS port
    #[serde(default)]
    pub secure_port: PortInfo,

    /// Absolute home page URL
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub home_page_url: String,

    /// Absolute status page URL
    #[serde(default)]
    pub status_page_url: String,

    /// Absolute health check URL
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub health_check_url: String,

    /// Data center classification
    #[serde(default)]
    pub data_center_info: DataCenterInfo,

    /// Lease timing, absent on records the registry synthesized
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lease_info: Option<LeaseInfo>,

    /// Free-form key/value annotations
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,

    /// Legacy country identifier
    #[serde(default, skip_serializing_if = "country_unset")]
    pub country_id: i32,
}

fn country_unset(id: &i32) -> bool {
    *id == 0
}

impl Instance {
    /// Identity of an instance within the registry.
    pub fn key(&self) -> (String, String) {
        (self.app.to_uppercase(), self.instance_id.clone())
    }

    /// Whether the instance is serving.
    pub fn is_up(&self) -> bool {
        self.status == InstanceStatus::Up
    }

    /// Port the instance serves traffic on: the secure port when enabled,
    /// otherwise the plain port.
    pub fn advertised_port(&self) -> u16 {
        if self.secure_port.enabled {
            self.secure_port.port
        } else {
            self.port.port
        }
    }
}

mod flag_string {
    use serde::de::{self, Unexpected, Visitor};
    use serde::{Deserializer, Serializer};
    use std::fmt;

    pub fn serialize<S>(value: &bool, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(if *value { "true" } else { "false" })
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<bool, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct FlagVisitor;

        impl<'de> Visitor<'de> for FlagVisitor {
            type Value = bool;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a boolean or the strings \"true\"/\"false\"")
            }

            fn visit_bool<E>(self, v: bool) -> Result<bool, E>
            where
                E: de::Error,
            {
                Ok(v)
            }

            fn visit_str<E>(self, v: &str) -> Result<bool, E>
            where
                E: de::Error,
            {
                match v {
                    "true" => Ok(true),
                    "false" => Ok(false),
                    other => Err(E::invalid_value(Unexpected::Str(other), &self)),
                }
            }
        }

        deserializer.deserialize_any(FlagVisitor)
    }
}
