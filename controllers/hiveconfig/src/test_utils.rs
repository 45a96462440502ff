//! Test utilities for unit testing the reconciler
//!
//! Fixture builders for HiveConfig, ClusterDeployments, secrets and APIServer
//! objects, plus a small in-memory fleet wired to a [`Reconciler`].

use crate::config::ControllerConfig;
use crate::reconciler::Reconciler;
use cluster_client::{MockCluster, MockHub, MockRemoteFactory};
use crds::names::{HIVE_CONFIG_NAME, HIVE_NAMESPACE, SECRET_TYPE_OPAQUE, TLS_SECRET_ANNOTATION};
use crds::*;
use k8s_openapi::ByteString;
use k8s_openapi::api::core::v1::Secret;
use kube::api::ObjectMeta;
use std::collections::BTreeMap;
use std::sync::Arc;

/// HiveConfig with an optional bundle annotation and the given CA references
pub fn hive_config(annotation: Option<&str>, refs: &[&str]) -> HiveConfig {
    let mut config = HiveConfig::new(
        HIVE_CONFIG_NAME,
        HiveConfigSpec {
            additional_certificate_authorities_secret_ref: refs.iter().map(|name| SecretReference::new(*name)).collect(),
            extra: BTreeMap::from([("targetNamespace".to_string(), serde_json::json!("hive"))]),
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

/// Point the HiveConfig stored in `hub` at `annotation` (or clear it)
pub fn set_annotation(hub: &MockHub, annotation: Option<&str>) {
    let mut config = hub.hive_config().unwrap_or_else(|| hive_config(None, &[]));
    let annotations = config.metadata.annotations.get_or_insert_with(BTreeMap::new);
    match annotation {
        Some(value) => {
            annotations.insert(TLS_SECRET_ANNOTATION.to_string(), value.to_string());
        }
        None => {
            annotations.remove(TLS_SECRET_ANNOTATION);
        }
    }
    hub.set_hive_config(config);
}

/// Bundle secret in `hive` carrying `keys`, each with `<key>-data` as payload
pub fn bundle_secret(name: &str, keys: &[&str]) -> Secret {
    Secret {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(HIVE_NAMESPACE.to_string()),
            ..Default::default()
        },
        type_: Some("kubernetes.io/tls".to_string()),
        data: Some(
            keys.iter()
                .map(|key| (key.to_string(), ByteString(format!("{}-data", key).into_bytes())))
                .collect(),
        ),
        ..Default::default()
    }
}

/// Empty opaque secret
pub fn opaque_secret(namespace: &str, name: &str) -> Secret {
    Secret {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        type_: Some(SECRET_TYPE_OPAQUE.to_string()),
        ..Default::default()
    }
}

/// Installed ClusterDeployment with an admin kubeconfig reference
pub fn cluster_deployment(namespace: &str, name: &str, api_url: &str) -> ClusterDeployment {
    let mut cd = ClusterDeployment::new(
        name,
        ClusterDeploymentSpec {
            installed: true,
            cluster_metadata: Some(ClusterMetadata {
                admin_kubeconfig_secret_ref: SecretReference::new(format!("{}-admin-kubeconfig", name)),
                ..Default::default()
            }),
            ..Default::default()
        },
    );
    cd.metadata.namespace = Some(namespace.to_string());
    cd.status = Some(ClusterDeploymentStatus {
        api_url: api_url.to_string(),
        ..Default::default()
    });
    cd
}

/// APIServer singleton with `(hostname, secret)` named certificates
pub fn api_server(entries: &[(&str, &str)]) -> APIServer {
    let mut api_server = APIServer::new("cluster", APIServerSpec::default());
    api_server.spec.serving_certs.named_certificates = entries
        .iter()
        .map(|(host, secret)| APIServerNamedServingCert::new(*host, *secret))
        .collect();
    api_server
}

/// Named certificates of a mock cluster as `(first hostname, secret)` pairs
pub fn named_certs(cluster: &MockCluster) -> Vec<(String, String)> {
    cluster
        .api_server()
        .map(|api_server| {
            api_server
                .spec
                .serving_certs
                .named_certificates
                .into_iter()
                .map(|cert| (cert.names.first().cloned().unwrap_or_default(), cert.serving_certificate.name))
                .collect()
        })
        .unwrap_or_default()
}

/// In-memory hub plus managed clusters
pub struct Fleet {
    pub hub: MockHub,
    pub remotes: MockRemoteFactory,
    /// `(namespace/name, cluster)` in enumeration order
    pub clusters: Vec<(String, MockCluster)>,
}

impl Fleet {
    /// Hub with a bare HiveConfig and `names.len()` reachable clusters in
    /// namespace `spokes`, each with one unrelated named certificate.
    pub fn new(names: &[&str]) -> Self {
        let hub = MockHub::new();
        hub.set_hive_config(hive_config(None, &["corp-ca"]));
        let remotes = MockRemoteFactory::new();
        let mut clusters = Vec::new();

        for name in names {
            let id = format!("spokes/{}", name);
            let cluster = MockCluster::with_api_server(api_server(&[(
                "api.internal.example.com",
                "corp-serving",
            )]));
            hub.add_cluster_deployment(cluster_deployment(
                "spokes",
                name,
                &format!("https://api.{}.example.com:6443", name),
            ));
            remotes.add_cluster(id.clone(), cluster.clone());
            clusters.push((id, cluster));
        }

        Self { hub, remotes, clusters }
    }

    /// Store a complete bundle secret named `name` on the hub
    pub fn add_bundle(&self, name: &str) {
        self.hub.add_secret(bundle_secret(
            name,
            &[names::TLS_KEY, names::TLS_CRT, names::CA_CRT],
        ));
    }

    pub fn cluster(&self, id: &str) -> &MockCluster {
        &self
            .clusters
            .iter()
            .find(|(cluster_id, _)| cluster_id == id)
            .unwrap_or_else(|| panic!("no cluster {}", id))
            .1
    }

    pub fn reconciler(&self) -> Reconciler {
        self.reconciler_with(&ControllerConfig::default())
    }

    pub fn reconciler_with(&self, config: &ControllerConfig) -> Reconciler {
        Reconciler::new(Arc::new(self.hub.clone()), Arc::new(self.remotes.clone()), config)
    }
}
