//! Hub and managed-cluster clients
//!
//! Thin, mockable access to the Kubernetes objects the trust propagation
//! controller reads and writes: the HiveConfig singleton, ClusterDeployments
//! and secrets on the hub, and secrets plus the APIServer singleton on each
//! managed cluster.
//!
//! # Example
//!
//! ```no_run
//! use cluster_client::{ConnectionTimeouts, HubClient, KubeClusterClient, KubeconfigClientFactory};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let hub = Arc::new(KubeClusterClient::new(kube::Client::try_default().await?, "hub"));
//!
//! // Read the trust configuration
//! let config = hub.get_hive_config().await?;
//!
//! // Connect to managed clusters through their stored admin kubeconfig
//! let factory = KubeconfigClientFactory::new(hub.clone(), ConnectionTimeouts::default());
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - **Hub access**: HiveConfig, ClusterDeployments, secrets
//! - **Managed clusters**: secrets and the APIServer serving certificate list
//! - **Error classification**: not-found, conflict and unreachable are distinct
//! - **Mocks**: in-memory implementations behind the `test-util` feature

pub mod client;
pub mod error;
pub mod kubeconfig;
#[path = "trait.rs"]
pub mod cluster_trait;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;

pub use client::{KubeClusterClient, KubeconfigClientFactory};
pub use cluster_trait::{
    ApiServerConfigClient, HubClient, RemoteClientFactory, RemoteClients, SecretClient,
};
pub use error::ClusterError;
pub use kubeconfig::{ConnectionTimeouts, client_from_kubeconfig, load_kubeconfig, parse_kubeconfig};
#[cfg(any(test, feature = "test-util"))]
pub use mock::{MockCluster, MockHub, MockRemoteFactory};
