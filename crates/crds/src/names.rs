//! Fixed resource names and keys.
//!
//! The reserved names double as idempotence keys: every artifact this
//! controller creates is recognised by one of them, and nothing else is ever
//! modified or removed.

/// Namespace holding the HiveConfig-referenced secrets on the hub.
pub const HIVE_NAMESPACE: &str = "hive";

/// Name of the HiveConfig singleton.
pub const HIVE_CONFIG_NAME: &str = "hive";

/// Annotation on HiveConfig naming the TLS bundle secret in [`HIVE_NAMESPACE`].
pub const TLS_SECRET_ANNOTATION: &str =
    "managedcluster-import-controller.open-cluster-management.io/hive-api-tls-cert-secret";

/// Hub secret (in [`HIVE_NAMESPACE`]) holding only the CA certificate, and the
/// name used for its reference inside HiveConfig.
pub const ADDITIONAL_CA_SECRET_NAME: &str = "acm-additional-ca";

/// Serving certificate secret created on every managed cluster.
pub const SERVING_CERT_SECRET_NAME: &str = "acm-serving-cert";

/// Namespace of [`SERVING_CERT_SECRET_NAME`] on managed clusters.
pub const OPENSHIFT_CONFIG_NAMESPACE: &str = "openshift-config";

/// Name of the APIServer configuration singleton on managed clusters.
pub const API_SERVER_NAME: &str = "cluster";

/// Key of the kubeconfig payload in an admin kubeconfig secret.
pub const KUBECONFIG_KEY: &str = "kubeconfig";

/// Private key entry of a TLS secret.
pub const TLS_KEY: &str = "tls.key";

/// Certificate entry of a TLS secret.
pub const TLS_CRT: &str = "tls.crt";

/// CA certificate entry of a TLS bundle secret.
pub const CA_CRT: &str = "ca.crt";

/// Keys a TLS bundle secret must carry before it can be propagated.
pub const REQUIRED_BUNDLE_KEYS: [&str; 3] = [TLS_KEY, TLS_CRT, CA_CRT];

/// Secret type of the serving certificate created on managed clusters.
pub const SECRET_TYPE_TLS: &str = "kubernetes.io/tls";

/// Secret type of the hub CA secret.
pub const SECRET_TYPE_OPAQUE: &str = "Opaque";
