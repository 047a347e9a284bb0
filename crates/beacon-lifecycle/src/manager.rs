//! The local instance's registration state machine and its loops

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use beacon_transport::{RegistryTransport, TransportResult};
use beacon_types::{Instance, InstanceStatus};
use parking_lot::RwLock;
use tokio::time::sleep;
use tracing::{debug, error, info};

use crate::probe;

/// Fixed delay before retrying a failed register, promote, or renew call.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(3);

/// Period of the eviction-recovery watchdog.
pub const WATCHDOG_INTERVAL: Duration = Duration::from_secs(60);

/// Tunables for the lifecycle loops.
#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    /// Promote to UP immediately after registration instead of waiting for
    /// the advertised port to answer
    pub enabled_on_init: bool,

    /// De-register when shutdown is requested
    pub unregister_on_shutdown: bool,

    /// Time between lease renewals
    pub renewal_interval: Duration,

    /// Delay before retrying a failed register/promote/renew call
    pub retry_delay: Duration,

    /// Watchdog period
    pub watchdog_interval: Duration,

    /// Registry host the watchdog probes before trusting a failed query
    pub registry_host: String,

    /// Registry port the watchdog probes
    pub registry_port: u16,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            enabled_on_init: false,
            unregister_on_shutdown: true,
            renewal_interval: Duration::from_secs(30),
            retry_delay: DEFAULT_RETRY_DELAY,
            watchdog_interval: WATCHDOG_INTERVAL,
            registry_host: String::new(),
            registry_port: 80,
        }
    }
}

/// Drives the local instance through STARTING → UP and keeps its lease
/// alive for the process lifetime.
///
/// The descriptor is immutable after construction apart from its status and
/// lease timestamps, which only this manager mutates.
pub struct LifecycleManager {
    transport: Arc<dyn RegistryTransport>,
    descriptor: RwLock<Instance>,
    config: LifecycleConfig,
    running: AtomicBool,
}

impl LifecycleManager {
    pub fn new(
        transport: Arc<dyn RegistryTransport>,
        descriptor: Instance,
        config: LifecycleConfig,
    ) -> Self {
        Self {
            transport,
            descriptor: RwLock::new(descriptor),
            config,
            running: AtomicBool::new(false),
        }
    }

    /// Mark the client as running; checked by `shutdown`.
    pub fn mark_running(&self) {
        self.running.store(true, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Current status of the local instance.
    pub fn status(&self) -> InstanceStatus {
        self.descriptor.read().status
    }

    /// Snapshot of the local descriptor.
    pub fn descriptor(&self) -> Instance {
        self.descriptor.read().clone()
    }

    /// Register with the registry, retrying on a fixed delay until the
    /// first success. A registry that is down at boot is a transient
    /// condition, not a fatal one; this never gives up.
    pub async fn register_until_success(&self) {
        loop {
            let descriptor = self.descriptor();
            match self.transport.register(&descriptor.app, &descriptor).await {
                Ok(()) => {
                    self.stamp_registration();
                    info!(
                        app_id = %descriptor.app,
                        instance_id = %descriptor.instance_id,
                        status = %descriptor.status,
                        "Registered with the registry"
                    );
                    return;
                }
                Err(e) => {
                    error!(error = %e, "Registration failed, retrying");
                    sleep(self.config.retry_delay).await;
                }
            }
        }
    }

    /// Promote the instance to UP, then exit.
    ///
    /// Waits for the advertised port to accept connections (skipped when
    /// `enabled_on_init` is set), then pushes UP to the registry, retrying
    /// on the fixed delay until it lands.
    pub async fn run_promotion(self: Arc<Self>) {
        loop {
            let ready = self.config.enabled_on_init || self.advertised_port_ready().await;
            if ready {
                match self.promote().await {
                    Ok(()) => return,
                    Err(e) => error!(error = %e, "Status promotion failed, retrying"),
                }
            }
            sleep(self.config.retry_delay).await;
        }
    }

    /// Renew the lease forever.
    ///
    /// A failed renewal retries on the shorter fixed delay, then the loop
    /// resumes its normal interval. The loop never stops on error.
    pub async fn run_heartbeat(self: Arc<Self>) {
        loop {
            let (app, instance_id) = self.identity();
            match self.transport.heartbeat(&app, &instance_id).await {
                Ok(()) => {
                    self.stamp_renewal();
                    debug!(app_id = %app, instance_id = %instance_id, "Lease renewed");
                    sleep(self.config.renewal_interval).await;
                }
                Err(e) => {
                    error!(error = %e, "Lease renewal failed");
                    sleep(self.config.retry_delay).await;
                }
            }
        }
    }

    /// Watch for silent eviction forever.
    ///
    /// A lease that expires during an outage removes the instance from the
    /// registry while this process still believes it is registered; without
    /// recovery it would stay undiscoverable until restart.
    pub async fn run_watchdog(self: Arc<Self>) {
        loop {
            sleep(self.config.watchdog_interval).await;
            self.recover_if_evicted().await;

            let (app, instance_id) = self.identity();
            debug!(app_id = %app, instance_id = %instance_id, "Watchdog tick");
        }
    }

    /// Idempotent graceful de-registration.
    ///
    /// A no-op unless the client is running and unregister-on-shutdown is
    /// enabled. The running flag clears only on success; on failure the
    /// error is returned and the caller may retry or exit anyway.
    pub async fn shutdown(&self) -> TransportResult<()> {
        if !self.is_running() || !self.config.unregister_on_shutdown {
            return Ok(());
        }

        let (app, instance_id) = self.identity();
        info!(instance_id = %instance_id, "De-registering instance");

        match self.transport.deregister(&app, &instance_id).await {
            Ok(()) => {
                self.running.store(false, Ordering::SeqCst);
                info!(instance_id = %instance_id, "De-registered");
                Ok(())
            }
            Err(e) => {
                error!(instance_id = %instance_id, error = %e, "De-registration failed");
                Err(e)
            }
        }
    }

    async fn recover_if_evicted(&self) {
        if self.status() != InstanceStatus::Up {
            return;
        }

        // registry host unreachable: transient outage, check again next tick
        if !probe::port_reachable(&self.config.registry_host, self.config.registry_port).await {
            return;
        }

        let (app, instance_id) = self.identity();
        if let Ok(remote) = self.transport.query_instance(&instance_id).await {
            if !remote.ip_addr.is_empty() {
                return;
            }
        }

        info!(instance_id = %instance_id, "Instance missing from registry, re-registering");
        let descriptor = self.descriptor();
        match self.transport.register(&app, &descriptor).await {
            Ok(()) => {
                self.set_status(InstanceStatus::Up);
                self.stamp_registration();
                info!(instance_id = %instance_id, "Re-registration succeeded");
            }
            Err(e) => error!(error = %e, "Re-registration failed"),
        }
    }

    async fn promote(&self) -> TransportResult<()> {
        let (app, instance_id) = self.identity();
        info!(instance_id = %instance_id, "Updating instance status to UP");

        self.transport
            .update_status(&app, &instance_id, InstanceStatus::Up)
            .await?;
        self.set_status(InstanceStatus::Up);

        info!(instance_id = %instance_id, "Instance is UP");
        Ok(())
    }

    async fn advertised_port_ready(&self) -> bool {
        let (ip, port) = {
            let descriptor = self.descriptor.read();
            (descriptor.ip_addr.clone(), descriptor.advertised_port())
        };
        probe::port_reachable(&ip, port).await
    }

    fn identity(&self) -> (String, String) {
        let descriptor = self.descriptor.read();
        (descriptor.app.clone(), descriptor.instance_id.clone())
    }

    fn set_status(&self, status: InstanceStatus) {
        self.descriptor.write().status = status;
    }

    fn stamp_registration(&self) {
        if let Some(lease) = &mut self.descriptor.write().lease_info {
            lease.registration_timestamp = chrono::Utc::now().timestamp_millis();
        }
    }

    fn stamp_renewal(&self) {
        if let Some(lease) = &mut self.descriptor.write().lease_info {
            lease.last_renewal_timestamp = chrono::Utc::now().timestamp_millis();
        }
    }
}
