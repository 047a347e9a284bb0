//! Snapshot cache over the remote registry
//!
//! Both refresh paths derive immutable per-application records outside the
//! lock and publish them with one short exclusive swap. Network I/O never
//! happens while the snapshot lock is held.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use beacon_transport::{RegistryTransport, TransportResult};
use beacon_types::{Application, Instance};
use dashmap::DashMap;
use parking_lot::RwLock;
use tokio::sync::Mutex;
use tracing::debug;

/// Immutable, jointly derived view of one application.
///
/// The three collections are always built from the same instance list and
/// published together; an index present in `eligible` refers to the same
/// instance in every map.
#[derive(Debug, Clone, Default)]
pub struct AppRecord {
    /// Raw application as last fetched
    pub application: Application,

    /// Instances passing the eligibility policy, indexed densely
    /// `0..n-1` in filtered order
    pub eligible: Vec<Instance>,

    /// `ip:port` per eligible index whose plain port is enabled
    pub http_addrs: BTreeMap<usize, String>,

    /// `ip:port` per eligible index whose secure port is enabled
    pub https_addrs: BTreeMap<usize, String>,
}

impl AppRecord {
    fn derive(application: Application, filter_only_up: bool) -> Self {
        let mut eligible = Vec::new();
        let mut http_addrs = BTreeMap::new();
        let mut https_addrs = BTreeMap::new();

        for instance in &application.instances {
            if filter_only_up && !instance.is_up() {
                continue;
            }

            let index = eligible.len();
            if instance.port.enabled {
                http_addrs.insert(index, format!("{}:{}", instance.ip_addr, instance.port.port));
            }
            if instance.secure_port.enabled {
                https_addrs.insert(
                    index,
                    format!("{}:{}", instance.ip_addr, instance.secure_port.port),
                );
            }
            eligible.push(instance.clone());
        }

        Self {
            application,
            eligible,
            http_addrs,
            https_addrs,
        }
    }

    fn missing(name: &str) -> Self {
        Self {
            application: Application::new(name),
            ..Self::default()
        }
    }

    /// Address map for the requested scheme.
    pub fn addresses(&self, secure: bool) -> &BTreeMap<usize, String> {
        if secure {
            &self.https_addrs
        } else {
            &self.http_addrs
        }
    }
}

/// Concurrently-read, periodically-refreshed view of the registry.
pub struct RegistryCache {
    transport: Arc<dyn RegistryTransport>,
    filter_only_up: bool,
    snapshot: RwLock<HashMap<String, Arc<AppRecord>>>,
    // one lock per application name, so concurrent misses fetch once
    in_flight: DashMap<String, Arc<Mutex<()>>>,
}

impl RegistryCache {
    /// Create an empty cache.
    ///
    /// When `filter_only_up` is set, only instances with status UP are
    /// indexed for resolution; otherwise every instance is eligible.
    pub fn new(transport: Arc<dyn RegistryTransport>, filter_only_up: bool) -> Self {
        Self {
            transport,
            filter_only_up,
            snapshot: RwLock::new(HashMap::new()),
            in_flight: DashMap::new(),
        }
    }

    /// Fetch every application and replace the whole snapshot.
    ///
    /// On transport failure the existing snapshot is left untouched and the
    /// error is returned to the scheduling loop, which retries on its next
    /// tick.
    pub async fn refresh_all(&self) -> TransportResult<()> {
        debug!("Fetching registry snapshot");
        let applications = self.transport.query_all().await?;

        let mut next = HashMap::with_capacity(applications.len());
        for application in applications {
            let key = application.name.to_uppercase();
            let record = AppRecord::derive(application, self.filter_only_up);
            next.insert(key, Arc::new(record));
        }
        debug!(applications = next.len(), "Registry snapshot replaced");

        *self.snapshot.write() = next;
        Ok(())
    }

    /// Fetch one application and merge its entry into the snapshot.
    pub async fn refresh_one(&self, app_id: &str) -> TransportResult<()> {
        let key = app_id.to_uppercase();
        debug!(app_id = %key, "Fetching single application");
        let application = self.transport.query_by_app_id(&key).await?;
        let record = Arc::new(AppRecord::derive(application, self.filter_only_up));

        self.snapshot.write().insert(key, record);
        Ok(())
    }

    /// Cached record for an application, fetching it on miss.
    ///
    /// The name is upper-cased before lookup. Concurrent misses for the same
    /// application are collapsed into a single fetch; waiters re-check the
    /// cache and reuse the winner's entry. A fetch failure propagates to the
    /// caller and leaves the snapshot unchanged.
    pub async fn lookup(&self, app_id: &str) -> TransportResult<Arc<AppRecord>> {
        let key = app_id.to_uppercase();

        if let Some(record) = self.peek(&key) {
            return Ok(record);
        }

        let flight = self.in_flight.entry(key.clone()).or_default().clone();
        let _guard = flight.lock().await;

        if let Some(record) = self.peek(&key) {
            return Ok(record);
        }

        self.refresh_one(&key).await?;

        Ok(self
            .peek(&key)
            .unwrap_or_else(|| Arc::new(AppRecord::missing(&key))))
    }

    /// Cached record without triggering a fetch.
    pub fn get(&self, app_id: &str) -> Option<Arc<AppRecord>> {
        self.peek(&app_id.to_uppercase())
    }

    /// Every cached application, keyed by upper-cased name.
    pub fn applications(&self) -> HashMap<String, Application> {
        self.snapshot
            .read()
            .iter()
            .map(|(name, record)| (name.clone(), record.application.clone()))
            .collect()
    }

    /// Eligible instances per application, keyed by upper-cased name.
    pub fn instances(&self) -> HashMap<String, Vec<Instance>> {
        self.snapshot
            .read()
            .iter()
            .map(|(name, record)| (name.clone(), record.eligible.clone()))
            .collect()
    }

    fn peek(&self, key: &str) -> Option<Arc<AppRecord>> {
        self.snapshot.read().get(key).cloned()
    }
}
