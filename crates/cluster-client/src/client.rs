//! kube-backed cluster clients
//!
//! [`KubeClusterClient`] implements every client trait on top of a
//! `kube::Client`; the same type serves the hub and the managed clusters.
//! [`KubeconfigClientFactory`] connects to managed clusters from their stored
//! admin kubeconfig.

use crate::cluster_trait::{
    ApiServerConfigClient, HubClient, RemoteClientFactory, RemoteClients, SecretClient,
};
use crate::error::ClusterError;
use crate::kubeconfig::{ConnectionTimeouts, client_from_kubeconfig, load_kubeconfig};
use crds::names::{API_SERVER_NAME, HIVE_CONFIG_NAME};
use crds::{APIServer, ClusterDeployment, HiveConfig};
use k8s_openapi::api::core::v1::Secret;
use kube::api::{Api, DeleteParams, ListParams, PostParams};
use kube::{Client, ResourceExt};
use std::sync::Arc;
use tracing::debug;

/// Cluster client backed by the Kubernetes API
#[derive(Clone)]
pub struct KubeClusterClient {
    client: Client,
    /// Cluster label used in error messages ("hub" or "namespace/name")
    cluster: String,
}

impl std::fmt::Debug for KubeClusterClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeClusterClient")
            .field("cluster", &self.cluster)
            .finish_non_exhaustive()
    }
}

impl KubeClusterClient {
    /// Wrap a kube client
    ///
    /// # Arguments
    /// * `client` - Connected kube client
    /// * `cluster` - Label for error messages
    pub fn new(client: Client, cluster: impl Into<String>) -> Self {
        Self {
            client,
            cluster: cluster.into(),
        }
    }

    fn describe(&self, kind: &str, namespace: Option<&str>, name: &str) -> String {
        match namespace {
            Some(ns) => format!("{} {}/{} on {}", kind, ns, name, self.cluster),
            None => format!("{} {} on {}", kind, name, self.cluster),
        }
    }

    fn secret_api(&self, secret: &Secret) -> Result<(Api<Secret>, String), ClusterError> {
        let namespace = secret.namespace().ok_or_else(|| {
            ClusterError::InvalidRequest(format!("secret {} has no namespace", secret.name_any()))
        })?;
        Ok((Api::namespaced(self.client.clone(), &namespace), namespace))
    }
}

#[async_trait::async_trait]
impl SecretClient for KubeClusterClient {
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>, ClusterError> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        api.get_opt(name)
            .await
            .map_err(|e| ClusterError::from_kube(e, &self.describe("secret", Some(namespace), name)))
    }

    async fn create_secret(&self, secret: &Secret) -> Result<Secret, ClusterError> {
        let (api, namespace) = self.secret_api(secret)?;
        let name = secret.name_any();
        debug!("Creating {}", self.describe("secret", Some(&namespace), &name));
        api.create(&PostParams::default(), secret)
            .await
            .map_err(|e| ClusterError::from_kube(e, &self.describe("secret", Some(&namespace), &name)))
    }

    async fn replace_secret(&self, secret: &Secret) -> Result<Secret, ClusterError> {
        let (api, namespace) = self.secret_api(secret)?;
        let name = secret.name_any();
        debug!("Replacing {}", self.describe("secret", Some(&namespace), &name));
        api.replace(&name, &PostParams::default(), secret)
            .await
            .map_err(|e| ClusterError::from_kube(e, &self.describe("secret", Some(&namespace), &name)))
    }

    async fn delete_secret(&self, namespace: &str, name: &str) -> Result<bool, ClusterError> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        match api.delete(name, &DeleteParams::default()).await {
            Ok(_) => {
                debug!("Deleted {}", self.describe("secret", Some(namespace), name));
                Ok(true)
            }
            Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(false),
            Err(e) => Err(ClusterError::from_kube(
                e,
                &self.describe("secret", Some(namespace), name),
            )),
        }
    }
}

#[async_trait::async_trait]
impl ApiServerConfigClient for KubeClusterClient {
    async fn get_api_server(&self) -> Result<Option<APIServer>, ClusterError> {
        let api: Api<APIServer> = Api::all(self.client.clone());
        api.get_opt(API_SERVER_NAME)
            .await
            .map_err(|e| ClusterError::from_kube(e, &self.describe("apiserver", None, API_SERVER_NAME)))
    }

    async fn replace_api_server(&self, api_server: &APIServer) -> Result<APIServer, ClusterError> {
        let api: Api<APIServer> = Api::all(self.client.clone());
        api.replace(API_SERVER_NAME, &PostParams::default(), api_server)
            .await
            .map_err(|e| ClusterError::from_kube(e, &self.describe("apiserver", None, API_SERVER_NAME)))
    }
}

#[async_trait::async_trait]
impl HubClient for KubeClusterClient {
    async fn get_hive_config(&self) -> Result<Option<HiveConfig>, ClusterError> {
        let api: Api<HiveConfig> = Api::all(self.client.clone());
        api.get_opt(HIVE_CONFIG_NAME)
            .await
            .map_err(|e| ClusterError::from_kube(e, &self.describe("hiveconfig", None, HIVE_CONFIG_NAME)))
    }

    async fn replace_hive_config(&self, config: &HiveConfig) -> Result<HiveConfig, ClusterError> {
        let api: Api<HiveConfig> = Api::all(self.client.clone());
        api.replace(HIVE_CONFIG_NAME, &PostParams::default(), config)
            .await
            .map_err(|e| ClusterError::from_kube(e, &self.describe("hiveconfig", None, HIVE_CONFIG_NAME)))
    }

    async fn list_cluster_deployments(
        &self,
        namespace: Option<&str>,
    ) -> Result<Vec<ClusterDeployment>, ClusterError> {
        let api: Api<ClusterDeployment> = match namespace {
            Some(ns) => Api::namespaced(self.client.clone(), ns),
            None => Api::all(self.client.clone()),
        };
        let list = api
            .list(&ListParams::default())
            .await
            .map_err(|e| ClusterError::from_kube(e, &format!("clusterdeployments on {}", self.cluster)))?;
        debug!("Listed {} ClusterDeployments", list.items.len());
        Ok(list.items)
    }
}

/// Connects to managed clusters using the admin kubeconfig stored on the hub.
///
/// Connections are not cached: every call parses the kubeconfig again and
/// returns fresh clients that are dropped at the end of the pass.
pub struct KubeconfigClientFactory {
    hub: Arc<dyn HubClient>,
    timeouts: ConnectionTimeouts,
}

impl std::fmt::Debug for KubeconfigClientFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeconfigClientFactory")
            .field("timeouts", &self.timeouts)
            .finish_non_exhaustive()
    }
}

impl KubeconfigClientFactory {
    /// Create a factory reading credentials through `hub`
    pub fn new(hub: Arc<dyn HubClient>, timeouts: ConnectionTimeouts) -> Self {
        Self { hub, timeouts }
    }
}

#[async_trait::async_trait]
impl RemoteClientFactory for KubeconfigClientFactory {
    async fn build_clients(&self, target: &ClusterDeployment) -> Result<RemoteClients, ClusterError> {
        let label = format!(
            "{}/{}",
            target.namespace().unwrap_or_default(),
            target.name_any()
        );
        let kubeconfig = load_kubeconfig(self.hub.as_ref(), target).await?;
        let client = client_from_kubeconfig(kubeconfig, self.timeouts).await?;

        Ok(RemoteClients {
            resources: Box::new(KubeClusterClient::new(client.clone(), label.clone())),
            api_config: Box::new(KubeClusterClient::new(client, label)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kubeconfig::tests::{KUBECONFIG, deployment, kubeconfig_secret};
    use crate::mock::MockHub;
    use crds::names::KUBECONFIG_KEY;

    fn factory(hub: &MockHub) -> KubeconfigClientFactory {
        KubeconfigClientFactory::new(Arc::new(hub.clone()), ConnectionTimeouts::default())
    }

    #[tokio::test]
    async fn test_build_clients() {
        let _ = rustls::crypto::ring::default_provider().install_default();
        let hub = MockHub::new();
        hub.add_secret(kubeconfig_secret(KUBECONFIG_KEY, KUBECONFIG));

        let clients = factory(&hub)
            .build_clients(&deployment(Some("spoke-admin-kubeconfig")))
            .await;
        assert!(clients.is_ok());
    }

    #[tokio::test]
    async fn test_build_clients_missing_secret() {
        let hub = MockHub::new();

        let err = factory(&hub)
            .build_clients(&deployment(Some("spoke-admin-kubeconfig")))
            .await
            .err()
            .unwrap();
        assert!(err.is_not_found());
        assert!(err.to_string().contains("spoke-ns/spoke-admin-kubeconfig"));
    }

    #[tokio::test]
    async fn test_build_clients_missing_kubeconfig_key() {
        let hub = MockHub::new();
        hub.add_secret(kubeconfig_secret("raw-kubeconfig", KUBECONFIG));

        let err = factory(&hub)
            .build_clients(&deployment(Some("spoke-admin-kubeconfig")))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, ClusterError::InvalidKubeconfig(_)));
        assert!(err.to_string().contains("spoke-ns/spoke-admin-kubeconfig"));
    }

    #[tokio::test]
    async fn test_build_clients_without_reference() {
        let hub = MockHub::new();

        let err = factory(&hub).build_clients(&deployment(None)).await.err().unwrap();
        assert!(matches!(err, ClusterError::InvalidKubeconfig(_)));
        assert!(err.to_string().contains("spoke-ns/spoke"));
    }
}
