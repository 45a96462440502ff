//! In-memory cluster clients for unit testing
//!
//! This module provides mock implementations of the client traits that can be
//! used in unit tests without a running API server. Writes are counted so
//! tests can assert that a converged cluster sees no further writes, and
//! replaces honour `resourceVersion` the way the API server does.

use crate::cluster_trait::{
    ApiServerConfigClient, HubClient, RemoteClientFactory, RemoteClients, SecretClient,
};
use crate::error::ClusterError;
use crds::{APIServer, ClusterDeployment, HiveConfig};
use k8s_openapi::api::core::v1::Secret;
use kube::ResourceExt;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Bump the resourceVersion of a stored object, checking the caller's copy
/// was not stale.
fn check_and_bump(
    stored: Option<&str>,
    incoming: Option<&str>,
    what: &str,
) -> Result<String, ClusterError> {
    if let (Some(stored), Some(incoming)) = (stored, incoming) {
        if stored != incoming {
            return Err(ClusterError::Conflict(format!(
                "{}: resourceVersion {} is stale (current {})",
                what, incoming, stored
            )));
        }
    }
    let current: u64 = stored.and_then(|v| v.parse().ok()).unwrap_or(0);
    Ok((current + 1).to_string())
}

/// Mock cluster for testing
///
/// Stores secrets and the APIServer singleton in memory. Clones share state,
/// so a test can keep a handle while the code under test owns another.
#[derive(Clone, Default)]
pub struct MockCluster {
    secrets: Arc<Mutex<BTreeMap<(String, String), Secret>>>,
    api_server: Arc<Mutex<Option<APIServer>>>,
    secret_writes: Arc<Mutex<usize>>,
    api_server_writes: Arc<Mutex<usize>>,
    latency: Arc<Mutex<Option<Duration>>>,
}

impl std::fmt::Debug for MockCluster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockCluster")
            .field("secrets", &self.secrets.lock().unwrap().len())
            .field("secret_writes", &self.secret_count_writes())
            .field("api_server_writes", &self.api_server_count_writes())
            .finish_non_exhaustive()
    }
}

impl MockCluster {
    /// Create an empty mock cluster
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock cluster with an APIServer singleton (for test setup)
    pub fn with_api_server(api_server: APIServer) -> Self {
        let cluster = Self::default();
        cluster.set_api_server(api_server);
        cluster
    }

    /// Add a secret to the mock store (for test setup, not counted as a write)
    pub fn add_secret(&self, mut secret: Secret) {
        let key = (secret.namespace().unwrap_or_default(), secret.name_any());
        secret
            .metadata
            .resource_version
            .get_or_insert_with(|| "1".to_string());
        self.secrets.lock().unwrap().insert(key, secret);
    }

    /// Current copy of a stored secret
    pub fn secret(&self, namespace: &str, name: &str) -> Option<Secret> {
        self.secrets
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    /// Number of stored secrets
    pub fn secret_count(&self) -> usize {
        self.secrets.lock().unwrap().len()
    }

    /// Set the APIServer singleton (for test setup, not counted as a write)
    pub fn set_api_server(&self, mut api_server: APIServer) {
        api_server
            .metadata
            .resource_version
            .get_or_insert_with(|| "1".to_string());
        *self.api_server.lock().unwrap() = Some(api_server);
    }

    /// Current copy of the APIServer singleton
    pub fn api_server(&self) -> Option<APIServer> {
        self.api_server.lock().unwrap().clone()
    }

    /// Number of secret create/replace/delete calls that changed the store
    pub fn secret_count_writes(&self) -> usize {
        *self.secret_writes.lock().unwrap()
    }

    /// Number of APIServer replace calls
    pub fn api_server_count_writes(&self) -> usize {
        *self.api_server_writes.lock().unwrap()
    }

    /// Delay every call by `latency` (simulates a hanging cluster)
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap() = Some(latency);
    }

    async fn simulate_latency(&self) {
        let latency = *self.latency.lock().unwrap();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait::async_trait]
impl SecretClient for MockCluster {
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>, ClusterError> {
        self.simulate_latency().await;
        Ok(self.secret(namespace, name))
    }

    async fn create_secret(&self, secret: &Secret) -> Result<Secret, ClusterError> {
        self.simulate_latency().await;
        let namespace = secret.namespace().ok_or_else(|| {
            ClusterError::InvalidRequest(format!("secret {} has no namespace", secret.name_any()))
        })?;
        let key = (namespace, secret.name_any());
        let mut secrets = self.secrets.lock().unwrap();
        if secrets.contains_key(&key) {
            return Err(ClusterError::Conflict(format!(
                "secret {}/{} already exists",
                key.0, key.1
            )));
        }
        let mut created = secret.clone();
        created.metadata.resource_version = Some("1".to_string());
        secrets.insert(key, created.clone());
        *self.secret_writes.lock().unwrap() += 1;
        Ok(created)
    }

    async fn replace_secret(&self, secret: &Secret) -> Result<Secret, ClusterError> {
        self.simulate_latency().await;
        let namespace = secret.namespace().unwrap_or_default();
        let key = (namespace, secret.name_any());
        let what = format!("secret {}/{}", key.0, key.1);
        let mut secrets = self.secrets.lock().unwrap();
        let stored = secrets
            .get(&key)
            .ok_or_else(|| ClusterError::NotFound(what.clone()))?;
        let version = check_and_bump(
            stored.metadata.resource_version.as_deref(),
            secret.metadata.resource_version.as_deref(),
            &what,
        )?;
        let mut replaced = secret.clone();
        replaced.metadata.resource_version = Some(version);
        secrets.insert(key, replaced.clone());
        *self.secret_writes.lock().unwrap() += 1;
        Ok(replaced)
    }

    async fn delete_secret(&self, namespace: &str, name: &str) -> Result<bool, ClusterError> {
        self.simulate_latency().await;
        let removed = self
            .secrets
            .lock()
            .unwrap()
            .remove(&(namespace.to_string(), name.to_string()))
            .is_some();
        if removed {
            *self.secret_writes.lock().unwrap() += 1;
        }
        Ok(removed)
    }
}

#[async_trait::async_trait]
impl ApiServerConfigClient for MockCluster {
    async fn get_api_server(&self) -> Result<Option<APIServer>, ClusterError> {
        self.simulate_latency().await;
        Ok(self.api_server())
    }

    async fn replace_api_server(&self, api_server: &APIServer) -> Result<APIServer, ClusterError> {
        self.simulate_latency().await;
        let mut slot = self.api_server.lock().unwrap();
        let stored = slot
            .as_ref()
            .ok_or_else(|| ClusterError::NotFound("apiserver cluster".to_string()))?;
        let version = check_and_bump(
            stored.metadata.resource_version.as_deref(),
            api_server.metadata.resource_version.as_deref(),
            "apiserver cluster",
        )?;
        let mut replaced = api_server.clone();
        replaced.metadata.resource_version = Some(version);
        *slot = Some(replaced.clone());
        *self.api_server_writes.lock().unwrap() += 1;
        Ok(replaced)
    }
}

/// Mock hub for testing
///
/// Holds the HiveConfig singleton, ClusterDeployments and hub secrets.
#[derive(Clone, Default)]
pub struct MockHub {
    secrets: MockCluster,
    hive_config: Arc<Mutex<Option<HiveConfig>>>,
    cluster_deployments: Arc<Mutex<Vec<ClusterDeployment>>>,
    hive_config_writes: Arc<Mutex<usize>>,
    fail_hive_config_writes: Arc<Mutex<bool>>,
}

impl std::fmt::Debug for MockHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockHub")
            .field("secrets", &self.secrets)
            .field("hive_config_writes", &self.hive_config_count_writes())
            .finish_non_exhaustive()
    }
}

impl MockHub {
    /// Create an empty mock hub
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the HiveConfig singleton (for test setup, not counted as a write)
    pub fn set_hive_config(&self, mut config: HiveConfig) {
        config
            .metadata
            .resource_version
            .get_or_insert_with(|| "1".to_string());
        *self.hive_config.lock().unwrap() = Some(config);
    }

    /// Current copy of the HiveConfig singleton
    pub fn hive_config(&self) -> Option<HiveConfig> {
        self.hive_config.lock().unwrap().clone()
    }

    /// Remove the HiveConfig singleton
    pub fn clear_hive_config(&self) {
        *self.hive_config.lock().unwrap() = None;
    }

    /// Add a ClusterDeployment (listed in insertion order)
    pub fn add_cluster_deployment(&self, cluster: ClusterDeployment) {
        self.cluster_deployments.lock().unwrap().push(cluster);
    }

    /// Add a secret to the hub (for test setup, not counted as a write)
    pub fn add_secret(&self, secret: Secret) {
        self.secrets.add_secret(secret);
    }

    /// Current copy of a hub secret
    pub fn secret(&self, namespace: &str, name: &str) -> Option<Secret> {
        self.secrets.secret(namespace, name)
    }

    /// Number of hub secret writes
    pub fn secret_count_writes(&self) -> usize {
        self.secrets.secret_count_writes()
    }

    /// Number of HiveConfig replace calls that succeeded
    pub fn hive_config_count_writes(&self) -> usize {
        *self.hive_config_writes.lock().unwrap()
    }

    /// Make every HiveConfig replace fail with a conflict
    pub fn fail_hive_config_writes(&self, fail: bool) {
        *self.fail_hive_config_writes.lock().unwrap() = fail;
    }
}

#[async_trait::async_trait]
impl SecretClient for MockHub {
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>, ClusterError> {
        self.secrets.get_secret(namespace, name).await
    }

    async fn create_secret(&self, secret: &Secret) -> Result<Secret, ClusterError> {
        self.secrets.create_secret(secret).await
    }

    async fn replace_secret(&self, secret: &Secret) -> Result<Secret, ClusterError> {
        self.secrets.replace_secret(secret).await
    }

    async fn delete_secret(&self, namespace: &str, name: &str) -> Result<bool, ClusterError> {
        self.secrets.delete_secret(namespace, name).await
    }
}

#[async_trait::async_trait]
impl HubClient for MockHub {
    async fn get_hive_config(&self) -> Result<Option<HiveConfig>, ClusterError> {
        Ok(self.hive_config())
    }

    async fn replace_hive_config(&self, config: &HiveConfig) -> Result<HiveConfig, ClusterError> {
        if *self.fail_hive_config_writes.lock().unwrap() {
            return Err(ClusterError::Conflict("hiveconfig hive: injected failure".to_string()));
        }
        let mut slot = self.hive_config.lock().unwrap();
        let stored = slot
            .as_ref()
            .ok_or_else(|| ClusterError::NotFound("hiveconfig hive".to_string()))?;
        let version = check_and_bump(
            stored.metadata.resource_version.as_deref(),
            config.metadata.resource_version.as_deref(),
            "hiveconfig hive",
        )?;
        let mut replaced = config.clone();
        replaced.metadata.resource_version = Some(version);
        *slot = Some(replaced.clone());
        *self.hive_config_writes.lock().unwrap() += 1;
        Ok(replaced)
    }

    async fn list_cluster_deployments(
        &self,
        namespace: Option<&str>,
    ) -> Result<Vec<ClusterDeployment>, ClusterError> {
        Ok(self
            .cluster_deployments
            .lock()
            .unwrap()
            .iter()
            .filter(|cd| namespace.is_none() || cd.namespace().as_deref() == namespace)
            .cloned()
            .collect())
    }
}

/// Mock remote client factory for testing
///
/// Maps `namespace/name` of a ClusterDeployment to a [`MockCluster`].
/// Unknown or unreachable targets fail the way a real connection would.
#[derive(Clone, Default)]
pub struct MockRemoteFactory {
    clusters: Arc<Mutex<HashMap<String, MockCluster>>>,
    unreachable: Arc<Mutex<HashSet<String>>>,
    builds: Arc<Mutex<Vec<String>>>,
}

impl std::fmt::Debug for MockRemoteFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockRemoteFactory")
            .field("clusters", &self.clusters.lock().unwrap().len())
            .finish_non_exhaustive()
    }
}

impl MockRemoteFactory {
    /// Create an empty factory
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the mock cluster behind `namespace/name`
    pub fn add_cluster(&self, key: impl Into<String>, cluster: MockCluster) {
        self.clusters.lock().unwrap().insert(key.into(), cluster);
    }

    /// Make connecting to `namespace/name` fail
    pub fn mark_unreachable(&self, key: impl Into<String>) {
        self.unreachable.lock().unwrap().insert(key.into());
    }

    /// Targets clients were built for, in call order
    pub fn builds(&self) -> Vec<String> {
        self.builds.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl RemoteClientFactory for MockRemoteFactory {
    async fn build_clients(&self, target: &ClusterDeployment) -> Result<RemoteClients, ClusterError> {
        let key = format!("{}/{}", target.namespace().unwrap_or_default(), target.name_any());
        self.builds.lock().unwrap().push(key.clone());

        if self.unreachable.lock().unwrap().contains(&key) {
            return Err(ClusterError::Unavailable(format!("{}: connection refused", key)));
        }

        let cluster = self
            .clusters
            .lock()
            .unwrap()
            .get(&key)
            .cloned()
            .ok_or_else(|| ClusterError::NotFound(format!("admin kubeconfig secret for {}", key)))?;

        Ok(RemoteClients {
            resources: Box::new(cluster.clone()),
            api_config: Box::new(cluster),
        })
    }
}
