//! Managed cluster enumeration and eligibility.

use crate::error::ControllerError;
use cluster_client::HubClient;
use crds::ClusterDeployment;
use kube::ResourceExt;
use std::fmt;
use tracing::debug;

/// Why a ClusterDeployment is left out of a pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Installation has not finished
    NotInstalled,
    /// No API URL reported yet
    NoApiUrl,
    /// No admin kubeconfig secret referenced
    NoAdminKubeconfig,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotInstalled => write!(f, "cluster is not installed"),
            Self::NoApiUrl => write!(f, "cluster API URL is not set"),
            Self::NoAdminKubeconfig => write!(f, "cluster admin kubeconfig is not set"),
        }
    }
}

/// A ClusterDeployment that can be converged
#[derive(Debug, Clone)]
pub struct EligibleTarget {
    /// `namespace/name`
    pub id: String,
    /// Non-empty API URL from status
    pub api_url: String,
    pub deployment: ClusterDeployment,
}

/// `namespace/name` label for a ClusterDeployment.
pub fn target_id(target: &ClusterDeployment) -> String {
    format!("{}/{}", target.namespace().unwrap_or_default(), target.name_any())
}

/// List candidate targets. Always reads fresh from the hub.
pub async fn enumerate<H>(hub: &H, namespace: Option<&str>) -> Result<Vec<ClusterDeployment>, ControllerError>
where
    H: HubClient + ?Sized,
{
    let targets = hub.list_cluster_deployments(namespace).await?;
    debug!(
        "Enumerated {} ClusterDeployments in {}",
        targets.len(),
        namespace.unwrap_or("all namespaces")
    );
    Ok(targets)
}

/// Decide whether `target` can be converged.
///
/// Checks run in order: installed, API URL, admin kubeconfig reference.
pub fn eligibility(target: &ClusterDeployment) -> Result<EligibleTarget, SkipReason> {
    if !target.spec.installed {
        return Err(SkipReason::NotInstalled);
    }
    let api_url = target.api_url().ok_or(SkipReason::NoApiUrl)?;
    if target.admin_kubeconfig_secret_name().is_none() {
        return Err(SkipReason::NoAdminKubeconfig);
    }

    Ok(EligibleTarget {
        id: target_id(target),
        api_url: api_url.to_string(),
        deployment: target.clone(),
    })
}
