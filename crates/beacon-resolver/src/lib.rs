//! Beacon Resolver - load-balanced endpoint resolution
//!
//! The Resolver is the pure read path over the registry cache: it picks a
//! concrete instance for a logical application name, or rewrites a logical
//! URL like `http://ORDERS/api/x` into a physical one. Selection uses one
//! process-wide monotonically increasing counter shared across every call,
//! which spreads repeated resolutions approximately uniformly even across
//! different target applications.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod error;

// Re-exports
pub use error::{ResolveError, ResolveResult};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use beacon_registry::RegistryCache;
use beacon_types::Instance;
use tracing::debug;

const HTTP_PREFIX: &str = "http://";
const HTTPS_PREFIX: &str = "https://";

/// Picks endpoints out of the registry cache under a round-robin policy.
pub struct Resolver {
    cache: Arc<RegistryCache>,
    counter: AtomicU64,
}

impl Resolver {
    pub fn new(cache: Arc<RegistryCache>) -> Self {
        Self {
            cache,
            counter: AtomicU64::new(0),
        }
    }

    /// Pick an eligible instance of an application.
    ///
    /// Consults the cache (fetching on miss) and fails with
    /// [`ResolveError::NotFound`] when the application has no eligible
    /// instances.
    pub async fn pick_instance(&self, app_id: &str) -> ResolveResult<Instance> {
        let record = self.cache.lookup(app_id).await?;
        if record.eligible.is_empty() {
            return Err(ResolveError::NotFound(format!(
                "no eligible instances for application {app_id}"
            )));
        }

        let index = self.next_index(record.eligible.len());
        let instance = record.eligible[index].clone();
        debug!(app_id = %app_id, instance_id = %instance.instance_id, "Picked instance");
        Ok(instance)
    }

    /// Rewrite a logical URL into a physical one.
    ///
    /// The first path segment names the application; the scheme selects the
    /// http or https address set. The logical name is substituted with the
    /// selected `ip:port`, preserving scheme and remaining path.
    pub async fn rewrite_url(&self, logical_url: &str) -> ResolveResult<String> {
        let (secure, rest) = if let Some(rest) = logical_url.strip_prefix(HTTPS_PREFIX) {
            (true, rest)
        } else if let Some(rest) = logical_url.strip_prefix(HTTP_PREFIX) {
            (false, rest)
        } else {
            return Err(ResolveError::InvalidUrl(logical_url.to_string()));
        };

        let app_id = rest.split('/').next().unwrap_or_default();
        if app_id.is_empty() {
            return Err(ResolveError::InvalidUrl(logical_url.to_string()));
        }

        let record = self.cache.lookup(app_id).await?;
        let addresses = record.addresses(secure);
        if addresses.is_empty() {
            let scheme = if secure { "https" } else { "http" };
            return Err(ResolveError::NotFound(format!(
                "no {scheme} addresses for application {app_id}"
            )));
        }

        let index = self.next_index(addresses.len());
        match addresses.values().nth(index) {
            Some(address) => {
                let physical = logical_url.replacen(app_id, address, 1);
                debug!(app_id = %app_id, address = %address, "Rewrote logical URL");
                Ok(physical)
            }
            None => Err(ResolveError::NotFound(format!(
                "no addresses for application {app_id}"
            ))),
        }
    }

    fn next_index(&self, len: usize) -> usize {
        (self.counter.fetch_add(1, Ordering::Relaxed) % len as u64) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use beacon_transport::{RegistryTransport, TransportError, TransportResult};
    use beacon_types::{Application, InstanceStatus, PortInfo};
    use std::collections::HashMap;

    struct StaticTransport {
        apps: HashMap<String, Application>,
    }

    impl StaticTransport {
        fn new(apps: Vec<Application>) -> Arc<Self> {
            Arc::new(Self {
                apps: apps
                    .into_iter()
                    .map(|a| (a.name.to_uppercase(), a))
                    .collect(),
            })
        }
    }

    #[async_trait]
    impl RegistryTransport for StaticTransport {
        async fn register(&self, _app_id: &str, _instance: &Instance) -> TransportResult<()> {
            Ok(())
        }

        async fn deregister(&self, _app_id: &str, _instance_id: &str) -> TransportResult<()> {
            Ok(())
        }

        async fn heartbeat(&self, _app_id: &str, _instance_id: &str) -> TransportResult<()> {
            Ok(())
        }

        async fn update_status(
            &self,
            _app_id: &str,
            _instance_id: &str,
            _status: InstanceStatus,
        ) -> TransportResult<()> {
            Ok(())
        }

        async fn query_all(&self) -> TransportResult<Vec<Application>> {
            Ok(self.apps.values().cloned().collect())
        }

        async fn query_by_app_id(&self, app_id: &str) -> TransportResult<Application> {
            self.apps
                .get(&app_id.to_uppercase())
                .cloned()
                .ok_or(TransportError::Api {
                    status: 404,
                    message: format!("unknown application {app_id}"),
                })
        }

        async fn query_instance(&self, instance_id: &str) -> TransportResult<Instance> {
            Err(TransportError::Api {
                status: 404,
                message: format!("unknown instance {instance_id}"),
            })
        }
    }

    fn up_instance(ip: &str, http_port: u16, secure: bool) -> Instance {
        Instance {
            instance_id: format!("{ip}:{http_port}"),
            host_name: ip.to_string(),
            app: "ORDERS".to_string(),
            ip_addr: ip.to_string(),
            status: InstanceStatus::Up,
            vip_address: String::new(),
            secure_vip_address: String::new(),
            port: PortInfo::new(http_port, true),
            secure_port: PortInfo::new(8443, secure),
            home_page_url: String::new(),
            status_page_url: String::new(),
            health_check_url: String::new(),
            data_center_info: Default::default(),
            lease_info: None,
            metadata: Default::default(),
            country_id: 0,
        }
    }

    fn resolver_for(apps: Vec<Application>) -> Resolver {
        let cache = Arc::new(RegistryCache::new(StaticTransport::new(apps), true));
        Resolver::new(cache)
    }

    #[tokio::test]
    async fn test_pick_instance_round_robin_is_uniform() {
        let app = Application {
            name: "ORDERS".to_string(),
            instances: vec![
                up_instance("10.0.0.1", 8080, false),
                up_instance("10.0.0.2", 8080, false),
                up_instance("10.0.0.3", 8080, false),
            ],
        };
        let resolver = resolver_for(vec![app]);

        let mut counts: HashMap<String, usize> = HashMap::new();
        for _ in 0..300 {
            let instance = resolver.pick_instance("orders").await.unwrap();
            *counts.entry(instance.ip_addr).or_default() += 1;
        }

        assert_eq!(counts.len(), 3);
        for count in counts.values() {
            assert_eq!(*count, 100);
        }
    }

    #[tokio::test]
    async fn test_pick_instance_without_eligible_instances_is_not_found() {
        let resolver = resolver_for(vec![Application::new("BILLING")]);

        let err = resolver.pick_instance("billing").await.unwrap_err();
        match err {
            ResolveError::NotFound(message) => assert!(message.contains("billing")),
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_rewrite_url_substitutes_logical_name() {
        let app = Application {
            name: "ORDERS".to_string(),
            instances: vec![up_instance("10.0.0.5", 8080, false)],
        };
        let resolver = resolver_for(vec![app]);

        let physical = resolver.rewrite_url("http://ORDERS/api/x").await.unwrap();
        assert_eq!(physical, "http://10.0.0.5:8080/api/x");

        // lookup is case-normalized, the substitution keeps the caller's spelling
        let physical = resolver.rewrite_url("http://orders/api/x").await.unwrap();
        assert_eq!(physical, "http://10.0.0.5:8080/api/x");
    }

    #[tokio::test]
    async fn test_rewrite_url_cycles_addresses() {
        let app = Application {
            name: "ORDERS".to_string(),
            instances: vec![
                up_instance("10.0.0.1", 8080, false),
                up_instance("10.0.0.2", 8080, false),
            ],
        };
        let resolver = resolver_for(vec![app]);

        let first = resolver.rewrite_url("http://ORDERS/ping").await.unwrap();
        let second = resolver.rewrite_url("http://ORDERS/ping").await.unwrap();
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn test_rewrite_url_without_scheme_addresses_is_not_found() {
        // instances exist, but none advertises an enabled secure port
        let app = Application {
            name: "ORDERS".to_string(),
            instances: vec![up_instance("10.0.0.1", 8080, false)],
        };
        let resolver = resolver_for(vec![app]);

        let err = resolver.rewrite_url("https://ORDERS/api/x").await.unwrap_err();
        match err {
            ResolveError::NotFound(message) => {
                assert!(message.contains("https"));
                assert!(message.contains("ORDERS"));
            }
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_rewrite_url_rejects_unknown_scheme() {
        let resolver = resolver_for(vec![]);

        assert!(matches!(
            resolver.rewrite_url("ftp://ORDERS/file").await,
            Err(ResolveError::InvalidUrl(_))
        ));
        assert!(matches!(
            resolver.rewrite_url("http:///api/x").await,
            Err(ResolveError::InvalidUrl(_))
        ));
    }
}
