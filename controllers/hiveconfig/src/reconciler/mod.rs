//! Trust propagation pass.
//!
//! One pass is level triggered and keeps no state between runs:
//!
//! 1. Load HiveConfig (absent: nothing to do)
//! 2. Evaluate the desired [`TrustState`] (bundle errors abort the pass)
//! 3. Enumerate ClusterDeployments and filter eligible ones
//! 4. Converge every eligible cluster, collecting failures
//! 5. Sync the hub (errors abort the pass)
//!
//! Module layout:
//! - `evaluate`: annotation and bundle validation
//! - `targets`: enumeration and eligibility
//! - `converge`: per-cluster serving secret and APIServer entry
//! - `hub`: hub CA secret and HiveConfig reference

pub mod converge;
pub mod evaluate;
pub mod hub;
pub mod targets;


use crate::config::ControllerConfig;
use crate::error::{ControllerError, TargetError};
use cluster_client::{ClusterError, HubClient, RemoteClientFactory};
use futures::StreamExt;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub use converge::converge;
pub use evaluate::{TrustState, evaluate};
pub use hub::sync_hub;
pub use targets::{EligibleTarget, SkipReason, eligibility, enumerate, target_id};

/// What caused a pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerSource {
    /// HiveConfig was created, deleted or its annotation changed
    TrustConfig,
    /// The referenced bundle secret changed
    BundleSecret(String),
    /// Retry of a failed pass
    Retry,
}

impl fmt::Display for TriggerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TrustConfig => write!(f, "hiveconfig"),
            Self::BundleSecret(name) => write!(f, "secret {}", name),
            Self::Retry => write!(f, "retry"),
        }
    }
}

/// A ClusterDeployment left out of a pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedTarget {
    pub target: String,
    pub reason: SkipReason,
}

/// Outcome of one pass that reached the end.
#[derive(Debug, Default)]
pub struct PassReport {
    /// Whether propagation was enabled for this pass
    pub enabled: bool,
    /// Clusters converged without error, in enumeration order
    pub converged: Vec<String>,
    /// Ineligible clusters with the reason
    pub skipped: Vec<SkippedTarget>,
    /// Per-cluster failures, in enumeration order
    pub failures: Vec<TargetError>,
}

impl PassReport {
    /// No per-cluster failures
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Runs trust propagation passes.
pub struct Reconciler {
    hub: Arc<dyn HubClient>,
    remotes: Arc<dyn RemoteClientFactory>,
    watch_namespace: Option<String>,
    target_timeout: Duration,
    target_concurrency: usize,
    /// Serialises passes; also covers the hub read-modify-write
    pass_lock: Mutex<()>,
}

impl fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reconciler")
            .field("watch_namespace", &self.watch_namespace)
            .field("target_timeout", &self.target_timeout)
            .field("target_concurrency", &self.target_concurrency)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    pub fn new(
        hub: Arc<dyn HubClient>,
        remotes: Arc<dyn RemoteClientFactory>,
        config: &ControllerConfig,
    ) -> Self {
        Self {
            hub,
            remotes,
            watch_namespace: config.watch_namespace.clone(),
            target_timeout: config.target_timeout,
            target_concurrency: config.target_concurrency.max(1),
            pass_lock: Mutex::new(()),
        }
    }

    /// Run one pass.
    ///
    /// Hub-scope failures are returned as errors. Failures on individual
    /// managed clusters are reported in [`PassReport::failures`] and do not
    /// stop the other clusters or the hub sync.
    pub async fn reconcile(&self, trigger: &TriggerSource) -> Result<PassReport, ControllerError> {
        let _pass = self.pass_lock.lock().await;
        debug!("Starting trust propagation pass (trigger: {})", trigger);

        let Some(trust_config) = self.hub.get_hive_config().await? else {
            debug!("HiveConfig not found, nothing to do");
            return Ok(PassReport::default());
        };

        let state = evaluate(self.hub.as_ref(), &trust_config).await?;
        let mut report = PassReport {
            enabled: state.is_enabled(),
            ..Default::default()
        };

        let mut eligible = Vec::new();
        for deployment in enumerate(self.hub.as_ref(), self.watch_namespace.as_deref()).await? {
            match eligibility(&deployment) {
                Ok(target) => eligible.push(target),
                Err(reason) => {
                    let target = target_id(&deployment);
                    info!(cluster = %target, "Skipping cluster: {}", reason);
                    report.skipped.push(SkippedTarget { target, reason });
                }
            }
        }

        // Futures are built up front so the pass future stays `Send`.
        // `buffered` keeps enumeration order and lets every future finish.
        let convergences: Vec<_> = eligible
            .iter()
            .map(|target| self.converge_with_deadline(target, &state))
            .collect();
        let results: Vec<Result<(), TargetError>> = futures::stream::iter(convergences)
            .buffered(self.target_concurrency)
            .collect()
            .await;

        for (target, result) in eligible.iter().zip(results) {
            match result {
                Ok(()) => report.converged.push(target.id.clone()),
                Err(e) => {
                    warn!(cluster = %target.id, "Failed to converge cluster: {}", e.source);
                    report.failures.push(e);
                }
            }
        }

        sync_hub(self.hub.as_ref(), &state).await?;

        info!(
            "Trust propagation {} pass finished: {} converged, {} skipped, {} failed",
            if report.enabled { "enable" } else { "disable" },
            report.converged.len(),
            report.skipped.len(),
            report.failures.len()
        );
        Ok(report)
    }

    async fn converge_with_deadline(
        &self,
        target: &EligibleTarget,
        state: &TrustState,
    ) -> Result<(), TargetError> {
        match tokio::time::timeout(self.target_timeout, converge(self.remotes.as_ref(), target, state)).await {
            Ok(result) => result,
            Err(_) => Err(TargetError::new(
                &target.id,
                ClusterError::Unavailable(format!(
                    "convergence did not finish within {}s",
                    self.target_timeout.as_secs()
                )),
            )),
        }
    }
}
