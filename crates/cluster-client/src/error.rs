//! Cluster client errors

use thiserror::Error;

/// Errors that can occur when talking to the hub or a managed cluster
#[derive(Debug, Error)]
pub enum ClusterError {
    /// Object does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Write rejected because the object changed underneath us
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Cluster could not be reached or did not answer in time
    #[error("Cluster unavailable: {0}")]
    Unavailable(String),

    /// Stored kubeconfig missing, unreadable or unusable
    #[error("Invalid kubeconfig: {0}")]
    InvalidKubeconfig(String),

    /// Request could not be built (e.g., missing namespace)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Any other Kubernetes API error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] kube::Error),
}

impl ClusterError {
    /// Classify a kube error raised while operating on `what`.
    ///
    /// API 404 and 409 answers become [`ClusterError::NotFound`] and
    /// [`ClusterError::Conflict`]; transport failures become
    /// [`ClusterError::Unavailable`]. Everything else is kept as is.
    pub fn from_kube(err: kube::Error, what: &str) -> Self {
        match err {
            kube::Error::Api(ae) if ae.code == 404 => Self::NotFound(what.to_string()),
            kube::Error::Api(ae) if ae.code == 409 => {
                Self::Conflict(format!("{}: {}", what, ae.message))
            }
            kube::Error::HyperError(e) => Self::Unavailable(format!("{}: {}", what, e)),
            kube::Error::Service(e) => Self::Unavailable(format!("{}: {}", what, e)),
            other => Self::Kube(other),
        }
    }

    /// Whether this error means the object is absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
