//! ClusterDeployment CRD
//!
//! One Hive-provisioned managed cluster. Only the fields needed to decide
//! eligibility and to reach the cluster are modelled; this controller never
//! writes ClusterDeployments.

use crate::references::SecretReference;
use kube::CustomResource;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(CustomResource, Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[kube(
    group = "hive.openshift.io",
    version = "v1",
    kind = "ClusterDeployment",
    namespaced,
    status = "ClusterDeploymentStatus",
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct ClusterDeploymentSpec {
    /// Set by Hive once installation has completed
    #[serde(default)]
    pub installed: bool,

    /// Metadata produced by the installer, absent until installed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_metadata: Option<ClusterMetadata>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterMetadata {
    /// Secret (in the ClusterDeployment's namespace) holding the admin kubeconfig
    #[serde(default)]
    pub admin_kubeconfig_secret_ref: SecretReference,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterDeploymentStatus {
    /// API server URL of the managed cluster, empty until known
    #[serde(default, rename = "apiURL")]
    pub api_url: String,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl ClusterDeployment {
    /// API endpoint URL, if reported and non-empty.
    pub fn api_url(&self) -> Option<&str> {
        self.status
            .as_ref()
            .map(|status| status.api_url.as_str())
            .filter(|url| !url.is_empty())
    }

    /// Name of the admin kubeconfig secret, if reported and non-empty.
    pub fn admin_kubeconfig_secret_name(&self) -> Option<&str> {
        self.spec
            .cluster_metadata
            .as_ref()
            .map(|metadata| metadata.admin_kubeconfig_secret_ref.name.as_str())
            .filter(|name| !name.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_installed_cluster() {
        let yaml = r#"
apiVersion: hive.openshift.io/v1
kind: ClusterDeployment
metadata:
  name: spoke-1
  namespace: spoke-1
spec:
  baseDomain: example.com
  clusterName: spoke-1
  installed: true
  clusterMetadata:
    clusterID: 7c1f
    infraID: spoke-1-x8k2
    adminKubeconfigSecretRef:
      name: spoke-1-admin-kubeconfig
status:
  apiURL: https://api.spoke-1.example.com:6443
"#;
        let cd: ClusterDeployment = serde_yaml::from_str(yaml).unwrap();
        assert!(cd.spec.installed);
        assert_eq!(cd.api_url(), Some("https://api.spoke-1.example.com:6443"));
        assert_eq!(cd.admin_kubeconfig_secret_name(), Some("spoke-1-admin-kubeconfig"));
    }

    #[test]
    fn test_parse_uninstalled_cluster() {
        let yaml = r#"
apiVersion: hive.openshift.io/v1
kind: ClusterDeployment
metadata:
  name: spoke-2
  namespace: spoke-2
spec:
  baseDomain: example.com
  clusterName: spoke-2
"#;
        let cd: ClusterDeployment = serde_yaml::from_str(yaml).unwrap();
        assert!(!cd.spec.installed);
        assert_eq!(cd.api_url(), None);
        assert_eq!(cd.admin_kubeconfig_secret_name(), None);
    }
}
