//! Main controller implementation.
//!
//! Wires the hub client, the managed cluster client factory and the
//! reconciler together, then runs the two watchers and the pass worker as
//! background tasks.

use crate::config::ControllerConfig;
use crate::error::ControllerError;
use crate::reconciler::Reconciler;
use crate::watcher::{Watcher, run_worker, trigger_channel};
use cluster_client::{ClusterError, HubClient, KubeClusterClient, KubeconfigClientFactory};
use crds::HiveConfig;
use crds::names::HIVE_NAMESPACE;
use k8s_openapi::api::core::v1::Secret;
use kube::{Api, Client};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

/// Main controller for trust propagation.
pub struct Controller {
    hive_config_watcher: JoinHandle<Result<(), ControllerError>>,
    secret_watcher: JoinHandle<Result<(), ControllerError>>,
    worker: JoinHandle<Result<(), ControllerError>>,
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller").finish_non_exhaustive()
    }
}

impl Controller {
    /// Creates a new controller instance and starts its tasks.
    pub async fn new(config: ControllerConfig) -> Result<Self, ControllerError> {
        info!("Initializing HiveConfig Controller");

        let kube_client = Client::try_default()
            .await
            .map_err(|e| ControllerError::Cluster(ClusterError::Kube(e)))?;

        let hub: Arc<dyn HubClient> = Arc::new(KubeClusterClient::new(kube_client.clone(), "hub"));
        let remotes = Arc::new(KubeconfigClientFactory::new(
            Arc::clone(&hub),
            config.remote_timeouts,
        ));
        let reconciler = Arc::new(Reconciler::new(Arc::clone(&hub), remotes, &config));

        let hive_config_api: Api<HiveConfig> = Api::all(kube_client.clone());
        let secret_api: Api<Secret> = Api::namespaced(kube_client, HIVE_NAMESPACE);

        let (triggers, trigger_rx) = trigger_channel();
        let watcher_instance = Arc::new(Watcher::new(hub, hive_config_api, secret_api, triggers));

        let hive_config_watcher = {
            let watcher = Arc::clone(&watcher_instance);
            tokio::spawn(async move { watcher.watch_hive_config().await })
        };

        let secret_watcher = {
            let watcher = watcher_instance;
            tokio::spawn(async move { watcher.watch_bundle_secrets().await })
        };

        let worker = tokio::spawn(run_worker(reconciler, trigger_rx, config.retry_max));

        Ok(Self {
            hive_config_watcher,
            secret_watcher,
            worker,
        })
    }

    /// Runs the controller until shutdown.
    pub async fn run(mut self) -> Result<(), ControllerError> {
        info!("HiveConfig Controller running");

        // Every task runs forever; the first one to stop ends the controller
        tokio::select! {
            result = &mut self.hive_config_watcher => {
                result.map_err(|e| ControllerError::Watch(format!("HiveConfig watcher panicked: {}", e)))??;
            }
            result = &mut self.secret_watcher => {
                result.map_err(|e| ControllerError::Watch(format!("Secret watcher panicked: {}", e)))??;
            }
            result = &mut self.worker => {
                result.map_err(|e| ControllerError::Watch(format!("Pass worker panicked: {}", e)))??;
            }
        }

        Ok(())
    }
}
