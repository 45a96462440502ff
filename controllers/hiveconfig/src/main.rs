//! HiveConfig Controller
//!
//! Propagates the hub API TLS bundle named by the HiveConfig annotation to
//! every installed managed cluster:
//! - managed clusters get `openshift-config/acm-serving-cert` and a matching
//!   named certificate in their APIServer configuration
//! - the hub gets `hive/acm-additional-ca` and a reference to it in HiveConfig
//!
//! Clearing the annotation removes everything that was derived.

mod backoff;
mod config;
mod controller;
mod error;
mod reconciler;
mod watcher;
#[cfg(test)]
mod test_utils;

use crate::config::ControllerConfig;
use crate::error::ControllerError;
use controller::Controller;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), ControllerError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // kube is built without a default crypto provider
    let _ = rustls::crypto::ring::default_provider().install_default();

    info!("Starting HiveConfig Controller");

    let config = ControllerConfig::from_env()?;

    info!("Configuration:");
    info!("  Namespace: {}", config.watch_namespace.as_deref().unwrap_or("all namespaces"));
    info!(
        "  Remote timeouts: connect {}s, read {}s",
        config.remote_timeouts.connect.as_secs(),
        config.remote_timeouts.read.as_secs()
    );
    info!("  Target timeout: {}s", config.target_timeout.as_secs());
    info!("  Target concurrency: {}", config.target_concurrency);
    info!("  Retry cap: {}s", config.retry_max.as_secs());

    let controller = Controller::new(config).await?;
    controller.run().await?;

    Ok(())
}
