//! Controller-specific error types.
//!
//! Hub-scope failures abort a pass and surface as [`ControllerError`];
//! failures confined to one managed cluster are wrapped in [`TargetError`]
//! and collected in the pass report instead.

use cluster_client::ClusterError;
use thiserror::Error;

/// Errors that can occur in the HiveConfig controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Hub or managed cluster API error
    #[error("Cluster error: {0}")]
    Cluster(#[from] ClusterError),

    /// Secret named by the HiveConfig annotation does not exist
    #[error("TLS bundle secret not found: {0}")]
    BundleNotFound(String),

    /// TLS bundle secret lacks a required key
    #[error("Invalid TLS bundle: {0}")]
    InvalidBundle(String),

    /// Managed cluster API URL cannot be parsed or has no host
    #[error("Invalid API URL: {0}")]
    InvalidUrl(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Resource watch failed
    #[error("Resource watch failed: {0}")]
    Watch(String),
}

/// A failure converging one managed cluster.
#[derive(Debug, Error)]
#[error("{target}: {source}")]
pub struct TargetError {
    /// `namespace/name` of the ClusterDeployment
    pub target: String,
    /// What went wrong
    pub source: ControllerError,
}

impl TargetError {
    pub fn new(target: impl Into<String>, source: impl Into<ControllerError>) -> Self {
        Self {
            target: target.into(),
            source: source.into(),
        }
    }
}
