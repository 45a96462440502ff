//! Client traits for mocking
//!
//! The controller only ever talks to Kubernetes through these traits. The
//! concrete kube-backed clients implement them, and tests use the in-memory
//! implementations from the `mock` module.

use crate::error::ClusterError;
use crds::{APIServer, ClusterDeployment, HiveConfig};
use k8s_openapi::api::core::v1::Secret;

/// Secret CRUD, on the hub or on a managed cluster.
///
/// All async methods must be `Send` to work with Tokio's work-stealing runtime.
#[async_trait::async_trait]
pub trait SecretClient: Send + Sync {
    /// Fetch a secret, `None` if it does not exist
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>, ClusterError>;

    /// Create a secret; the namespace is taken from its metadata
    async fn create_secret(&self, secret: &Secret) -> Result<Secret, ClusterError>;

    /// Replace an existing secret wholesale
    async fn replace_secret(&self, secret: &Secret) -> Result<Secret, ClusterError>;

    /// Delete a secret. Returns `false` when it was already absent.
    async fn delete_secret(&self, namespace: &str, name: &str) -> Result<bool, ClusterError>;
}

/// Access to the `config.openshift.io/v1` APIServer singleton of a managed cluster.
#[async_trait::async_trait]
pub trait ApiServerConfigClient: Send + Sync {
    /// Fetch the APIServer singleton, `None` if the cluster has none
    async fn get_api_server(&self) -> Result<Option<APIServer>, ClusterError>;

    /// Replace the APIServer singleton
    async fn replace_api_server(&self, api_server: &APIServer) -> Result<APIServer, ClusterError>;
}

/// Hub-side access: HiveConfig, ClusterDeployments and hub secrets.
#[async_trait::async_trait]
pub trait HubClient: SecretClient {
    /// Fetch the HiveConfig singleton, `None` if it does not exist
    async fn get_hive_config(&self) -> Result<Option<HiveConfig>, ClusterError>;

    /// Replace the HiveConfig singleton. Fails with [`ClusterError::Conflict`]
    /// if it changed since it was read.
    async fn replace_hive_config(&self, config: &HiveConfig) -> Result<HiveConfig, ClusterError>;

    /// List ClusterDeployments, in one namespace or across all of them
    async fn list_cluster_deployments(
        &self,
        namespace: Option<&str>,
    ) -> Result<Vec<ClusterDeployment>, ClusterError>;
}

/// The two short-lived clients used to converge one managed cluster.
pub struct RemoteClients {
    /// Generic resource client (secrets)
    pub resources: Box<dyn SecretClient>,
    /// Cluster API configuration client
    pub api_config: Box<dyn ApiServerConfigClient>,
}

impl std::fmt::Debug for RemoteClients {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteClients").finish_non_exhaustive()
    }
}

/// Builds [`RemoteClients`] for a managed cluster from its stored credentials.
#[async_trait::async_trait]
pub trait RemoteClientFactory: Send + Sync {
    /// Resolve the target's admin credentials and connect. Errors are
    /// specific to this target.
    async fn build_clients(&self, target: &ClusterDeployment) -> Result<RemoteClients, ClusterError>;
}
