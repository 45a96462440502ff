//! Admin kubeconfig handling
//!
//! Turns the kubeconfig stored in a ClusterDeployment's admin secret into a
//! connected `kube::Client`.

use crate::error::ClusterError;
use crate::cluster_trait::SecretClient;
use crds::ClusterDeployment;
use crds::names::KUBECONFIG_KEY;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config, ResourceExt};
use std::time::Duration;
use tracing::debug;

/// Default connection timeout for managed cluster clients
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Default read timeout for managed cluster clients
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeouts applied to every managed cluster client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionTimeouts {
    /// TCP/TLS connect timeout
    pub connect: Duration,
    /// Per-request read timeout
    pub read: Duration,
}

impl Default for ConnectionTimeouts {
    fn default() -> Self {
        Self {
            connect: DEFAULT_CONNECT_TIMEOUT,
            read: DEFAULT_READ_TIMEOUT,
        }
    }
}

/// Parse a serialized kubeconfig.
///
/// The payload must be UTF-8 YAML describing at least one cluster.
pub fn parse_kubeconfig(data: &[u8]) -> Result<Kubeconfig, ClusterError> {
    let text = std::str::from_utf8(data)
        .map_err(|e| ClusterError::InvalidKubeconfig(format!("invalid UTF-8: {}", e)))?;

    let kubeconfig: Kubeconfig = serde_yaml::from_str(text)
        .map_err(|e| ClusterError::InvalidKubeconfig(format!("invalid YAML: {}", e)))?;

    if kubeconfig.clusters.is_empty() {
        return Err(ClusterError::InvalidKubeconfig(
            "kubeconfig defines no clusters".to_string(),
        ));
    }

    Ok(kubeconfig)
}

/// Load and parse the admin kubeconfig of a ClusterDeployment from the hub.
///
/// The secret lives in the ClusterDeployment's namespace.
pub async fn load_kubeconfig<S>(hub: &S, target: &ClusterDeployment) -> Result<Kubeconfig, ClusterError>
where
    S: SecretClient + ?Sized,
{
    let target_id = format!(
        "{}/{}",
        target.namespace().unwrap_or_default(),
        target.name_any()
    );

    let secret_name = target.admin_kubeconfig_secret_name().ok_or_else(|| {
        ClusterError::InvalidKubeconfig(format!("{} has no admin kubeconfig reference", target_id))
    })?;
    let namespace = target.namespace().ok_or_else(|| {
        ClusterError::InvalidKubeconfig(format!("{} has no namespace", target_id))
    })?;

    debug!("Loading admin kubeconfig {}/{} for {}", namespace, secret_name, target_id);

    let secret = hub
        .get_secret(&namespace, secret_name)
        .await?
        .ok_or_else(|| {
            ClusterError::NotFound(format!("admin kubeconfig secret {}/{}", namespace, secret_name))
        })?;

    let payload = secret
        .data
        .as_ref()
        .and_then(|data| data.get(KUBECONFIG_KEY))
        .ok_or_else(|| {
            ClusterError::InvalidKubeconfig(format!(
                "key {} not found in secret {}/{}",
                KUBECONFIG_KEY, namespace, secret_name
            ))
        })?;

    parse_kubeconfig(&payload.0)
}

/// Resolve a kubeconfig (current context) into a client with the given timeouts.
pub async fn client_from_kubeconfig(
    kubeconfig: Kubeconfig,
    timeouts: ConnectionTimeouts,
) -> Result<Client, ClusterError> {
    let mut config = Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
        .await
        .map_err(|e| ClusterError::InvalidKubeconfig(format!("failed to build config: {}", e)))?;
    config.connect_timeout = Some(timeouts.connect);
    config.read_timeout = Some(timeouts.read);

    Client::try_from(config).map_err(ClusterError::Kube)
}
