//! The discovery client facade

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use beacon_lifecycle::{probe, LifecycleConfig, LifecycleManager};
use beacon_registry::RegistryCache;
use beacon_resolver::{ResolveResult, Resolver};
use beacon_transport::{HttpRegistryTransport, RegistryTransport, TransportResult};
use beacon_types::{Application, Instance, InstanceStatus};
use tokio::time::sleep;
use tracing::{error, warn};

use crate::config::{build_instance, ClientConfig};
use crate::error::ConfigError;

/// Client-side service discovery against one registry endpoint.
///
/// Owns the transport, the cached registry view, the resolver, and the
/// lifecycle loops as one explicit struct; every loop and lookup works
/// through a handle to it.
pub struct DiscoveryClient {
    config: ClientConfig,
    cache: Arc<RegistryCache>,
    resolver: Resolver,
    lifecycle: Arc<LifecycleManager>,
}

impl DiscoveryClient {
    /// Build a client from validated configuration, wiring the HTTP
    /// transport against the configured registry endpoint.
    pub fn new(config: ClientConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let descriptor = build_instance(&config)?;
        let transport: Arc<dyn RegistryTransport> =
            Arc::new(HttpRegistryTransport::new(&config.service_url.default_zone)?);
        Self::with_transport(config, descriptor, transport)
    }

    /// Build a client over a caller-supplied transport and descriptor.
    pub fn with_transport(
        config: ClientConfig,
        descriptor: Instance,
        transport: Arc<dyn RegistryTransport>,
    ) -> Result<Self, ConfigError> {
        let (registry_host, registry_port) = probe::probe_target(&config.service_url.default_zone)
            .ok_or_else(|| {
                ConfigError::Validation("serviceUrl.defaultZone is not a valid URL".to_string())
            })?;

        let cache = Arc::new(RegistryCache::new(
            transport.clone(),
            config.client.filter_only_up_instances,
        ));

        let lifecycle_config = LifecycleConfig {
            enabled_on_init: config.instance.instance_enabled_on_init,
            unregister_on_shutdown: config.client.should_unregister_on_shutdown,
            // a zero renewal interval would turn the heartbeat into a busy loop
            renewal_interval: Duration::from_secs(
                config.instance.lease_info.renewal_interval_in_secs.max(1),
            ),
            registry_host,
            registry_port,
            ..LifecycleConfig::default()
        };
        let lifecycle = Arc::new(LifecycleManager::new(transport, descriptor, lifecycle_config));

        Ok(Self {
            resolver: Resolver::new(cache.clone()),
            cache,
            lifecycle,
            config,
        })
    }

    /// Start the background loops and perform initial registration.
    ///
    /// Spawns the bulk refresh loop when `fetchRegistry` is enabled. When
    /// `registerWithEureka` is enabled this waits for the first successful
    /// registration (retrying indefinitely on a fixed delay), then spawns
    /// the promotion, heartbeat, and watchdog loops and returns.
    pub async fn start(&self) {
        self.lifecycle.mark_running();

        if self.config.client.fetch_registry {
            let cache = self.cache.clone();
            let interval = self.config.client.registry_fetch_interval();
            tokio::spawn(async move {
                loop {
                    if let Err(e) = cache.refresh_all().await {
                        error!(error = %e, "Scheduled registry refresh failed");
                    }
                    sleep(interval).await;
                }
            });
        }

        if !self.config.client.register_with_eureka {
            warn!("Registration is disabled; this instance stays undiscoverable");
            return;
        }

        self.lifecycle.register_until_success().await;
        tokio::spawn(self.lifecycle.clone().run_promotion());
        tokio::spawn(self.lifecycle.clone().run_heartbeat());
        tokio::spawn(self.lifecycle.clone().run_watchdog());
    }

    /// Gracefully de-register this instance. Idempotent; a no-op when the
    /// client never started or unregister-on-shutdown is disabled.
    pub async fn shutdown(&self) -> TransportResult<()> {
        self.lifecycle.shutdown().await
    }

    /// Every cached application, keyed by upper-cased name. Snapshot read,
    /// no side effects.
    pub fn get_applications(&self) -> HashMap<String, Application> {
        self.cache.applications()
    }

    /// Eligible instances per application, keyed by upper-cased name.
    pub fn get_instances(&self) -> HashMap<String, Vec<Instance>> {
        self.cache.instances()
    }

    /// Pick an eligible instance of an application, round-robin.
    pub async fn pick_instance(&self, app_id: &str) -> ResolveResult<Instance> {
        self.resolver.pick_instance(app_id).await
    }

    /// Rewrite a logical URL like `http://ORDERS/api/x` into a physical one.
    pub async fn rewrite_url(&self, logical_url: &str) -> ResolveResult<String> {
        self.resolver.rewrite_url(logical_url).await
    }

    /// The application name this instance registers under.
    pub fn app_name(&self) -> &str {
        &self.config.instance.app_name
    }

    /// Snapshot of the local instance descriptor.
    pub fn local_instance(&self) -> Instance {
        self.lifecycle.descriptor()
    }

    /// Current status of the local instance.
    pub fn status(&self) -> InstanceStatus {
        self.lifecycle.status()
    }

    pub fn is_running(&self) -> bool {
        self.lifecycle.is_running()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use beacon_transport::{TransportError, TransportResult};
    use beacon_types::{LeaseInfo, PortInfo};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingTransport {
        register_calls: AtomicUsize,
        deregister_calls: AtomicUsize,
        query_all_calls: AtomicUsize,
        fail_query_all: AtomicBool,
    }

    #[async_trait]
    impl RegistryTransport for CountingTransport {
        async fn register(&self, _app_id: &str, _instance: &Instance) -> TransportResult<()> {
            self.register_calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn deregister(&self, _app_id: &str, _instance_id: &str) -> TransportResult<()> {
            self.deregister_calls.fetch_add(1, Ordering::SeqCst);
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
            self.query_all_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_query_all.load(Ordering::SeqCst) {
                return Err(TransportError::Api {
                    status: 500,
                    message: "boom".to_string(),
                });
            }
            Ok(Vec::new())
        }

        async fn query_by_app_id(&self, app_id: &str) -> TransportResult<Application> {
            Ok(Application::new(app_id))
        }

        async fn query_instance(&self, instance_id: &str) -> TransportResult<Instance> {
            Err(TransportError::Api {
                status: 404,
                message: format!("unknown instance {instance_id}"),
            })
        }
    }

    fn test_descriptor() -> Instance {
        Instance {
            instance_id: "127.0.0.1:8080".to_string(),
            host_name: "127.0.0.1".to_string(),
            app: "orders".to_string(),
            ip_addr: "127.0.0.1".to_string(),
            status: InstanceStatus::Starting,
            vip_address: "orders".to_string(),
            secure_vip_address: "orders".to_string(),
            port: PortInfo::new(8080, true),
            secure_port: PortInfo::new(8443, false),
            home_page_url: String::new(),
            status_page_url: String::new(),
            health_check_url: String::new(),
            data_center_info: Default::default(),
            lease_info: Some(LeaseInfo::new(30, 90)),
            metadata: Default::default(),
            country_id: 0,
        }
    }

    fn test_config(fetch: bool, register: bool) -> ClientConfig {
        let mut config = ClientConfig::default();
        config.service_url.default_zone = "http://127.0.0.1:8761/eureka".to_string();
        config.instance.app_name = "orders".to_string();
        config.instance.instance_enabled_on_init = true;
        config.client.fetch_registry = fetch;
        config.client.register_with_eureka = register;
        config
    }

    fn client_with(
        transport: Arc<CountingTransport>,
        config: ClientConfig,
    ) -> DiscoveryClient {
        DiscoveryClient::with_transport(config, test_descriptor(), transport).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_loop_keeps_ticking_after_failures() {
        let transport = Arc::new(CountingTransport::default());
        transport.fail_query_all.store(true, Ordering::SeqCst);
        let mut config = test_config(true, false);
        config.client.registry_fetch_interval_seconds = 30;
        let client = client_with(transport.clone(), config);

        client.start().await;
        tokio::time::sleep(Duration::from_secs(65)).await;

        // one immediate attempt plus one per elapsed interval, failures included
        assert!(transport.query_all_calls.load(Ordering::SeqCst) >= 3);
        assert!(client.get_applications().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_without_registration_skips_lifecycle() {
        let transport = Arc::new(CountingTransport::default());
        let client = client_with(transport.clone(), test_config(false, false));

        client.start().await;
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(transport.register_calls.load(Ordering::SeqCst), 0);
        assert!(client.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_registers_and_shutdown_deregisters() {
        let transport = Arc::new(CountingTransport::default());
        let client = client_with(transport.clone(), test_config(false, true));

        client.start().await;
        assert_eq!(transport.register_calls.load(Ordering::SeqCst), 1);

        client.shutdown().await.unwrap();
        assert_eq!(transport.deregister_calls.load(Ordering::SeqCst), 1);
        assert!(!client.is_running());

        // second shutdown is a no-op
        client.shutdown().await.unwrap();
        assert_eq!(transport.deregister_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_with_transport_rejects_unparseable_endpoint() {
        let mut config = test_config(false, false);
        config.service_url.default_zone = "not a url".to_string();

        let result = DiscoveryClient::with_transport(
            config,
            test_descriptor(),
            Arc::new(CountingTransport::default()),
        );
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }
}
