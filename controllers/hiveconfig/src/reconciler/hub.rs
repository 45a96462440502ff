//! Hub bookkeeping.
//!
//! Mirrors the bundle's CA certificate into `hive/acm-additional-ca` and keeps
//! the matching reference in HiveConfig's additional CA list.

use super::evaluate::{TrustBundle, TrustState};
use crate::error::ControllerError;
use cluster_client::{ClusterError, HubClient};
use crds::names::{ADDITIONAL_CA_SECRET_NAME, CA_CRT, HIVE_CONFIG_NAME, HIVE_NAMESPACE, SECRET_TYPE_OPAQUE};
use k8s_openapi::api::core::v1::Secret;
use kube::api::ObjectMeta;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Converge the hub to `state`.
pub async fn sync_hub<H>(hub: &H, state: &TrustState) -> Result<(), ControllerError>
where
    H: HubClient + ?Sized,
{
    match state {
        TrustState::Enabled(bundle) => apply_additional_ca(hub, bundle).await,
        TrustState::Disabled => remove_additional_ca(hub).await,
    }
}

async fn apply_additional_ca<H>(hub: &H, bundle: &TrustBundle) -> Result<(), ControllerError>
where
    H: HubClient + ?Sized,
{
    let data = BTreeMap::from([(CA_CRT.to_string(), bundle.ca_crt.clone())]);

    match hub.get_secret(HIVE_NAMESPACE, ADDITIONAL_CA_SECRET_NAME).await? {
        None => {
            let secret = Secret {
                metadata: ObjectMeta {
                    name: Some(ADDITIONAL_CA_SECRET_NAME.to_string()),
                    namespace: Some(HIVE_NAMESPACE.to_string()),
                    ..Default::default()
                },
                type_: Some(SECRET_TYPE_OPAQUE.to_string()),
                data: Some(data),
                ..Default::default()
            };
            hub.create_secret(&secret).await?;
            info!("Created additional CA secret {}/{}", HIVE_NAMESPACE, ADDITIONAL_CA_SECRET_NAME);
        }
        Some(mut existing) => {
            existing.data = Some(data);
            existing.string_data = None;
            hub.replace_secret(&existing).await?;
            debug!("Updated additional CA secret {}/{}", HIVE_NAMESPACE, ADDITIONAL_CA_SECRET_NAME);
        }
    }

    // Re-read so concurrent edits to other references are not overwritten.
    let mut trust_config = hub
        .get_hive_config()
        .await?
        .ok_or_else(|| ClusterError::NotFound(format!("hiveconfig {}", HIVE_CONFIG_NAME)))?;

    if trust_config.add_additional_ca_reference() {
        hub.replace_hive_config(&trust_config).await?;
        info!("Added {} to HiveConfig additional CA references", ADDITIONAL_CA_SECRET_NAME);
    }

    Ok(())
}

/// Remove the reference, then the secret. The secret is only deleted when a
/// reference was actually removed.
async fn remove_additional_ca<H>(hub: &H) -> Result<(), ControllerError>
where
    H: HubClient + ?Sized,
{
    let Some(mut trust_config) = hub.get_hive_config().await? else {
        debug!("HiveConfig is gone, nothing to clean up");
        return Ok(());
    };

    if !trust_config.remove_additional_ca_reference() {
        debug!("HiveConfig does not reference {}", ADDITIONAL_CA_SECRET_NAME);
        return Ok(());
    }

    hub.replace_hive_config(&trust_config).await?;
    info!("Removed {} from HiveConfig additional CA references", ADDITIONAL_CA_SECRET_NAME);

    if hub.delete_secret(HIVE_NAMESPACE, ADDITIONAL_CA_SECRET_NAME).await? {
        info!("Deleted additional CA secret {}/{}", HIVE_NAMESPACE, ADDITIONAL_CA_SECRET_NAME);
    }

    Ok(())
}
