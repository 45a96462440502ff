//! Name-only object references shared by the Hive and OpenShift types.

use serde::{Deserialize, Serialize};

/// Reference to a Secret by name, namespace implied by the referencing field.
///
/// Mirrors the `LocalObjectReference` / `SecretNameReference` shapes used by
/// HiveConfig, ClusterDeployment and APIServer.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SecretReference {
    /// Name of the referenced Secret
    #[serde(default)]
    pub name: String,
}

impl SecretReference {
    /// Create a reference to the named secret
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}
