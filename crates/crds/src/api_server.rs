//! APIServer CRD (config.openshift.io)
//!
//! Cluster-wide API server configuration on a managed cluster. The controller
//! only touches `spec.servingCerts.namedCertificates`.

use crate::references::SecretReference;
use kube::CustomResource;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(CustomResource, Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[kube(
    group = "config.openshift.io",
    version = "v1",
    kind = "APIServer",
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct APIServerSpec {
    #[serde(default)]
    pub serving_certs: APIServerServingCerts,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct APIServerServingCerts {
    /// Per-hostname serving certificates. Order is not significant to the
    /// API server and is not relied on here.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub named_certificates: Vec<APIServerNamedServingCert>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct APIServerNamedServingCert {
    /// Hostnames served with this certificate
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub names: Vec<String>,

    /// TLS secret in `openshift-config`
    #[serde(default)]
    pub serving_certificate: SecretReference,
}

impl APIServerNamedServingCert {
    /// Entry serving `hostname` from the named secret.
    pub fn new(hostname: impl Into<String>, secret_name: impl Into<String>) -> Self {
        Self {
            names: vec![hostname.into()],
            serving_certificate: SecretReference::new(secret_name),
        }
    }
}

impl APIServer {
    /// Whether any named certificate is served from `secret_name`.
    pub fn serves_secret(&self, secret_name: &str) -> bool {
        self.spec
            .serving_certs
            .named_certificates
            .iter()
            .any(|cert| cert.serving_certificate.name == secret_name)
    }

    /// Remove every named certificate served from `secret_name`, by value
    /// rather than by index. Returns `true` when anything was removed.
    pub fn remove_secret_entries(&mut self, secret_name: &str) -> bool {
        let certs = &mut self.spec.serving_certs.named_certificates;
        let before = certs.len();
        certs.retain(|cert| cert.serving_certificate.name != secret_name);
        certs.len() != before
    }
}
