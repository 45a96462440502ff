//! HiveConfig CRD
//!
//! The cluster-scoped singleton whose annotation toggles fleet-wide trust
//! propagation and whose CA reference list is consumed by Hive itself.

use crate::names::{ADDITIONAL_CA_SECRET_NAME, TLS_SECRET_ANNOTATION};
use crate::references::SecretReference;
use kube::CustomResource;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(CustomResource, Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[kube(
    group = "hive.openshift.io",
    version = "v1",
    kind = "HiveConfig",
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct HiveConfigSpec {
    /// Secrets holding additional CA bundles Hive trusts when talking to
    /// managed clusters. Order is preserved.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub additional_certificate_authorities_secret_ref: Vec<SecretReference>,

    /// Every other HiveConfig field, kept verbatim
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl HiveConfig {
    /// Name of the TLS bundle secret, if the annotation is present and non-empty.
    pub fn tls_secret_name(&self) -> Option<&str> {
        self.metadata
            .annotations
            .as_ref()
            .and_then(|annotations| annotations.get(TLS_SECRET_ANNOTATION))
            .map(String::as_str)
            .filter(|name| !name.is_empty())
    }

    /// Whether the reserved CA secret is already referenced.
    pub fn references_additional_ca(&self) -> bool {
        self.spec
            .additional_certificate_authorities_secret_ref
            .iter()
            .any(|secret_ref| secret_ref.name == ADDITIONAL_CA_SECRET_NAME)
    }

    /// Append the reserved CA reference unless present. Returns `true` when
    /// the spec changed.
    pub fn add_additional_ca_reference(&mut self) -> bool {
        if self.references_additional_ca() {
            return false;
        }
        self.spec
            .additional_certificate_authorities_secret_ref
            .push(SecretReference::new(ADDITIONAL_CA_SECRET_NAME));
        true
    }

    /// Drop every reserved CA reference, leaving the others in order.
    /// Returns `true` when anything was removed.
    pub fn remove_additional_ca_reference(&mut self) -> bool {
        let refs = &mut self.spec.additional_certificate_authorities_secret_ref;
        let before = refs.len();
        refs.retain(|secret_ref| secret_ref.name != ADDITIONAL_CA_SECRET_NAME);
        refs.len() != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::names::HIVE_CONFIG_NAME;

    fn hive_config(annotation: Option<&str>, refs: &[&str]) -> HiveConfig {
        let mut config = HiveConfig::new(
            HIVE_CONFIG_NAME,
            HiveConfigSpec {
                additional_certificate_authorities_secret_ref: refs
                    .iter()
                    .map(|name| SecretReference::new(*name))
                    .collect(),
                ..Default::default()
            },
        );
        if let Some(value) = annotation {
            config.metadata.annotations = Some(BTreeMap::from([(
                TLS_SECRET_ANNOTATION.to_string(),
                value.to_string(),
            )]));
        }
        config
    }

    #[test]
    fn test_tls_secret_name() {
        assert_eq!(hive_config(None, &[]).tls_secret_name(), None);
        assert_eq!(hive_config(Some(""), &[]).tls_secret_name(), None);
        assert_eq!(
            hive_config(Some("hive-api-tls"), &[]).tls_secret_name(),
            Some("hive-api-tls")
        );
    }

    #[test]
    fn test_add_reference_is_idempotent() {
        let mut config = hive_config(None, &["corp-ca"]);
        assert!(config.add_additional_ca_reference());
        assert!(!config.add_additional_ca_reference());

        let names: Vec<_> = config
            .spec
            .additional_certificate_authorities_secret_ref
            .iter()
            .map(|r| r.name.as_str())
            .collect();
        assert_eq!(names, vec!["corp-ca", ADDITIONAL_CA_SECRET_NAME]);
    }

    #[test]
    fn test_remove_reference_keeps_others() {
        let mut config = hive_config(None, &["corp-ca", ADDITIONAL_CA_SECRET_NAME, "lab-ca"]);
        assert!(config.remove_additional_ca_reference());
        assert!(!config.remove_additional_ca_reference());

        let names: Vec<_> = config
            .spec
            .additional_certificate_authorities_secret_ref
            .iter()
            .map(|r| r.name.as_str())
            .collect();
        assert_eq!(names, vec!["corp-ca", "lab-ca"]);
    }

    #[test]
    fn test_unknown_fields_survive_round_trip() {
        let yaml = r#"
apiVersion: hive.openshift.io/v1
kind: HiveConfig
metadata:
  name: hive
spec:
  targetNamespace: hive
  logLevel: debug
  additionalCertificateAuthoritiesSecretRef:
    - name: corp-ca
"#;
        let config: HiveConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.spec.extra["targetNamespace"], "hive");

        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["spec"]["logLevel"], "debug");
        assert_eq!(
            json["spec"]["additionalCertificateAuthoritiesSecretRef"][0]["name"],
            "corp-ca"
        );
    }
}
