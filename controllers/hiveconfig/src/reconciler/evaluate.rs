//! Trust state evaluation.
//!
//! Decides from the HiveConfig annotation whether propagation is enabled and,
//! if so, loads and validates the referenced TLS bundle. Read only.

use crate::error::ControllerError;
use cluster_client::HubClient;
use crds::HiveConfig;
use crds::names::{CA_CRT, HIVE_NAMESPACE, REQUIRED_BUNDLE_KEYS, TLS_CRT, TLS_KEY};
use k8s_openapi::ByteString;
use k8s_openapi::api::core::v1::Secret;
use tracing::debug;

/// Validated contents of the TLS bundle secret.
#[derive(Clone, PartialEq)]
pub struct TrustBundle {
    /// Name of the source secret in the `hive` namespace
    pub secret_name: String,
    pub tls_key: ByteString,
    pub tls_crt: ByteString,
    pub ca_crt: ByteString,
}

impl std::fmt::Debug for TrustBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrustBundle")
            .field("secret_name", &self.secret_name)
            .finish_non_exhaustive()
    }
}

/// Desired state for every managed cluster and the hub.
#[derive(Debug, Clone, PartialEq)]
pub enum TrustState {
    /// No bundle configured: derived artifacts must be absent
    Disabled,
    /// Bundle configured: derived artifacts must exist
    Enabled(TrustBundle),
}

impl TrustState {
    pub fn is_enabled(&self) -> bool {
        matches!(self, Self::Enabled(_))
    }

    pub fn bundle(&self) -> Option<&TrustBundle> {
        match self {
            Self::Enabled(bundle) => Some(bundle),
            Self::Disabled => None,
        }
    }
}

/// Evaluate the desired trust state of `trust_config`.
///
/// A missing bundle secret and a bundle missing a key are distinct errors;
/// either one fails the pass before anything is written.
pub async fn evaluate<H>(hub: &H, trust_config: &HiveConfig) -> Result<TrustState, ControllerError>
where
    H: HubClient + ?Sized,
{
    let Some(secret_name) = trust_config.tls_secret_name() else {
        debug!("No TLS bundle annotation on HiveConfig, propagation disabled");
        return Ok(TrustState::Disabled);
    };

    let secret = hub
        .get_secret(HIVE_NAMESPACE, secret_name)
        .await?
        .ok_or_else(|| ControllerError::BundleNotFound(format!("{}/{}", HIVE_NAMESPACE, secret_name)))?;

    validate_bundle(&secret).map(TrustState::Enabled)
}

/// Check that `secret` carries every required key and extract them.
pub fn validate_bundle(secret: &Secret) -> Result<TrustBundle, ControllerError> {
    let name = secret.metadata.name.clone().unwrap_or_default();
    let data = secret.data.as_ref();

    if let Some(missing) = REQUIRED_BUNDLE_KEYS
        .iter()
        .find(|key| !data.is_some_and(|data| data.contains_key(**key)))
    {
        return Err(ControllerError::InvalidBundle(format!(
            "secret {}/{} is missing required key {}",
            HIVE_NAMESPACE, name, missing
        )));
    }

    let field = |key: &str| data.and_then(|data| data.get(key)).cloned().unwrap_or_default();

    Ok(TrustBundle {
        tls_key: field(TLS_KEY),
        tls_crt: field(TLS_CRT),
        ca_crt: field(CA_CRT),
        secret_name: name,
    })
}
