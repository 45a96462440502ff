//! Per-cluster convergence.
//!
//! Brings one managed cluster to the desired [`TrustState`]:
//!
//! - **Enabled**: the serving certificate secret `openshift-config/acm-serving-cert`
//!   holds the bundle's key pair, and the APIServer singleton serves it for
//!   the cluster's API hostname.
//! - **Disabled**: the secret is gone and no named certificate references it.
//!
//! Named certificates that do not reference the reserved secret are never
//! modified. An existing entry is left alone even if its hostname no longer
//! matches the cluster's API URL.

use super::evaluate::{TrustBundle, TrustState};
use super::targets::EligibleTarget;
use crate::error::{ControllerError, TargetError};
use cluster_client::{ApiServerConfigClient, ClusterError, RemoteClientFactory, SecretClient};
use crds::APIServerNamedServingCert;
use crds::names::{
    API_SERVER_NAME, OPENSHIFT_CONFIG_NAMESPACE, SECRET_TYPE_TLS, SERVING_CERT_SECRET_NAME, TLS_CRT,
    TLS_KEY,
};
use k8s_openapi::ByteString;
use k8s_openapi::api::core::v1::Secret;
use kube::api::ObjectMeta;
use std::collections::BTreeMap;
use tracing::{debug, info};
use url::{Host, Url};

/// Converge `target` to `state`. Errors are labelled with the target identity.
pub async fn converge(
    remotes: &dyn RemoteClientFactory,
    target: &EligibleTarget,
    state: &TrustState,
) -> Result<(), TargetError> {
    converge_target(remotes, target, state)
        .await
        .map_err(|e| TargetError::new(&target.id, e))
}

async fn converge_target(
    remotes: &dyn RemoteClientFactory,
    target: &EligibleTarget,
    state: &TrustState,
) -> Result<(), ControllerError> {
    let clients = remotes.build_clients(&target.deployment).await?;

    match state {
        TrustState::Enabled(bundle) => {
            apply_serving_secret(clients.resources.as_ref(), bundle, &target.id).await?;
            let hostname = extract_hostname(&target.api_url)?;
            apply_trust_entry(clients.api_config.as_ref(), &hostname, &target.id).await?;
        }
        TrustState::Disabled => {
            remove_serving_secret(clients.resources.as_ref(), &target.id).await?;
            remove_trust_entry(clients.api_config.as_ref(), &target.id).await?;
        }
    }

    Ok(())
}

/// Host component of an API URL, without port or IPv6 brackets.
pub fn extract_hostname(api_url: &str) -> Result<String, ControllerError> {
    let url = Url::parse(api_url)
        .map_err(|e| ControllerError::InvalidUrl(format!("failed to parse API URL {}: {}", api_url, e)))?;

    match url.host() {
        Some(Host::Domain(domain)) if !domain.is_empty() => Ok(domain.to_string()),
        Some(Host::Ipv4(ip)) => Ok(ip.to_string()),
        Some(Host::Ipv6(ip)) => Ok(ip.to_string()),
        _ => Err(ControllerError::InvalidUrl(format!("API URL {} has no host", api_url))),
    }
}

fn serving_data(bundle: &TrustBundle) -> BTreeMap<String, ByteString> {
    BTreeMap::from([
        (TLS_KEY.to_string(), bundle.tls_key.clone()),
        (TLS_CRT.to_string(), bundle.tls_crt.clone()),
    ])
}

/// Create the serving certificate secret, or overwrite its data wholesale.
async fn apply_serving_secret(
    client: &dyn SecretClient,
    bundle: &TrustBundle,
    cluster: &str,
) -> Result<(), ControllerError> {
    match client
        .get_secret(OPENSHIFT_CONFIG_NAMESPACE, SERVING_CERT_SECRET_NAME)
        .await?
    {
        None => {
            let secret = Secret {
                metadata: ObjectMeta {
                    name: Some(SERVING_CERT_SECRET_NAME.to_string()),
                    namespace: Some(OPENSHIFT_CONFIG_NAMESPACE.to_string()),
                    ..Default::default()
                },
                type_: Some(SECRET_TYPE_TLS.to_string()),
                data: Some(serving_data(bundle)),
                ..Default::default()
            };
            client.create_secret(&secret).await?;
            info!(cluster, "Created serving certificate secret {}/{}", OPENSHIFT_CONFIG_NAMESPACE, SERVING_CERT_SECRET_NAME);
        }
        Some(mut existing) => {
            existing.data = Some(serving_data(bundle));
            existing.string_data = None;
            client.replace_secret(&existing).await?;
            debug!(cluster, "Updated serving certificate secret {}/{}", OPENSHIFT_CONFIG_NAMESPACE, SERVING_CERT_SECRET_NAME);
        }
    }
    Ok(())
}

/// Append a named certificate for `hostname` unless one already references
/// the serving secret.
async fn apply_trust_entry(
    client: &dyn ApiServerConfigClient,
    hostname: &str,
    cluster: &str,
) -> Result<(), ControllerError> {
    let mut api_server = client
        .get_api_server()
        .await?
        .ok_or_else(|| ClusterError::NotFound(format!("apiserver {}", API_SERVER_NAME)))?;

    if api_server.serves_secret(SERVING_CERT_SECRET_NAME) {
        debug!(cluster, "APIServer already serves {}", SERVING_CERT_SECRET_NAME);
        return Ok(());
    }

    api_server
        .spec
        .serving_certs
        .named_certificates
        .push(APIServerNamedServingCert::new(hostname, SERVING_CERT_SECRET_NAME));
    client.replace_api_server(&api_server).await?;
    info!(cluster, "Added named certificate for {} to APIServer", hostname);
    Ok(())
}

async fn remove_serving_secret(client: &dyn SecretClient, cluster: &str) -> Result<(), ControllerError> {
    if client
        .delete_secret(OPENSHIFT_CONFIG_NAMESPACE, SERVING_CERT_SECRET_NAME)
        .await?
    {
        info!(cluster, "Deleted serving certificate secret {}/{}", OPENSHIFT_CONFIG_NAMESPACE, SERVING_CERT_SECRET_NAME);
    }
    Ok(())
}

/// Drop every named certificate referencing the serving secret. No write is
/// made when none does.
async fn remove_trust_entry(client: &dyn ApiServerConfigClient, cluster: &str) -> Result<(), ControllerError> {
    let Some(mut api_server) = client.get_api_server().await? else {
        debug!(cluster, "No APIServer configuration, nothing to remove");
        return Ok(());
    };

    if !api_server.remove_secret_entries(SERVING_CERT_SECRET_NAME) {
        return Ok(());
    }

    client.replace_api_server(&api_server).await?;
    info!(cluster, "Removed {} named certificates from APIServer", SERVING_CERT_SECRET_NAME);
    Ok(())
}
