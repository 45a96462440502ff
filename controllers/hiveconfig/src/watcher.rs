//! Kubernetes resource watchers and the pass worker.
//!
//! Two watch streams decide when a pass is needed:
//! - HiveConfig `hive`: created with the annotation set, annotation changed, or deleted
//! - Secrets in `hive`: the secret currently named by the annotation changed
//!
//! Triggers go through a channel of capacity one, so a burst of events while a
//! pass is running collapses into a single follow-up pass. One worker runs
//! passes serially and retries failed ones with a Fibonacci backoff.

use crate::backoff::FibonacciBackoff;
use crate::error::ControllerError;
use crate::reconciler::{Reconciler, TriggerSource};
use cluster_client::HubClient;
use crds::HiveConfig;
use crds::names::{HIVE_CONFIG_NAME, HIVE_NAMESPACE};
use futures::StreamExt;
use k8s_openapi::api::core::v1::Secret;
use kube::{Api, ResourceExt};
use kube_runtime::watcher::Event;
use kube_runtime::{WatchStreamExt, watcher};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// A HiveConfig watch event, reduced to what the trigger decision needs
#[derive(Debug, Clone, Copy)]
pub enum HiveConfigEvent<'a> {
    /// Object created or updated
    Applied(&'a HiveConfig),
    /// Object deleted
    Deleted,
    /// Relist bookkeeping with no object attached
    Resync,
}

/// Whether a HiveConfig event needs a pass.
///
/// `last_annotation` is the annotation value seen on the previous event
/// (empty when unset), or `None` if the object has not been seen yet, in
/// which case the event is treated as a create.
pub fn trust_config_event_triggers(event: &HiveConfigEvent<'_>, last_annotation: Option<&str>) -> bool {
    match event {
        HiveConfigEvent::Applied(config) => {
            let current = config.tls_secret_name();
            match last_annotation {
                None => current.is_some(),
                Some(previous) => previous != current.unwrap_or_default(),
            }
        }
        HiveConfigEvent::Deleted => true,
        HiveConfigEvent::Resync => false,
    }
}

/// Whether a secret event needs a pass: the secret lives in `hive` and is the
/// one HiveConfig's annotation currently names.
pub fn secret_event_triggers(secret: &Secret, trust_config: Option<&HiveConfig>) -> bool {
    if secret.namespace().as_deref() != Some(HIVE_NAMESPACE) {
        return false;
    }
    trust_config
        .and_then(HiveConfig::tls_secret_name)
        .is_some_and(|name| name == secret.name_any())
}

/// Trigger channel; capacity one coalesces bursts.
pub fn trigger_channel() -> (mpsc::Sender<TriggerSource>, mpsc::Receiver<TriggerSource>) {
    mpsc::channel(1)
}

/// Queue a pass unless one is already pending.
pub fn enqueue(triggers: &mpsc::Sender<TriggerSource>, trigger: TriggerSource) {
    match triggers.try_send(trigger) {
        Ok(()) => {}
        Err(mpsc::error::TrySendError::Full(trigger)) => {
            debug!("Pass already pending, coalescing trigger {}", trigger);
        }
        Err(mpsc::error::TrySendError::Closed(trigger)) => {
            warn!("Worker stopped, dropping trigger {}", trigger);
        }
    }
}

/// Watches HiveConfig and bundle secrets and feeds the trigger channel.
pub struct Watcher {
    hub: Arc<dyn HubClient>,
    hive_config_api: Api<HiveConfig>,
    secret_api: Api<Secret>,
    triggers: mpsc::Sender<TriggerSource>,
}

impl std::fmt::Debug for Watcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Watcher").finish_non_exhaustive()
    }
}

impl Watcher {
    /// Creates a new watcher instance.
    pub fn new(
        hub: Arc<dyn HubClient>,
        hive_config_api: Api<HiveConfig>,
        secret_api: Api<Secret>,
        triggers: mpsc::Sender<TriggerSource>,
    ) -> Self {
        Self {
            hub,
            hive_config_api,
            secret_api,
            triggers,
        }
    }

    /// Watch the HiveConfig singleton. Only returns if the stream ends.
    pub async fn watch_hive_config(&self) -> Result<(), ControllerError> {
        info!("Starting HiveConfig watcher");

        let config = watcher::Config::default().fields(&format!("metadata.name={}", HIVE_CONFIG_NAME));
        let mut stream = watcher(self.hive_config_api.clone(), config)
            .default_backoff()
            .boxed();
        let mut last_annotation: Option<String> = None;

        while let Some(event) = stream.next().await {
            let (reduced, seen) = match &event {
                Ok(Event::Apply(config)) | Ok(Event::InitApply(config)) => (
                    HiveConfigEvent::Applied(config),
                    Some(config.tls_secret_name().unwrap_or_default().to_string()),
                ),
                Ok(Event::Delete(_)) => (HiveConfigEvent::Deleted, None),
                Ok(Event::Init) | Ok(Event::InitDone) => continue,
                Err(e) => {
                    warn!("HiveConfig watch error: {}", e);
                    continue;
                }
            };

            if trust_config_event_triggers(&reduced, last_annotation.as_deref()) {
                info!("HiveConfig changed, scheduling trust propagation pass");
                enqueue(&self.triggers, TriggerSource::TrustConfig);
            }
            last_annotation = seen;
        }

        Err(ControllerError::Watch("HiveConfig watch stream ended".to_string()))
    }

    /// Watch secrets in the `hive` namespace. Only returns if the stream ends.
    pub async fn watch_bundle_secrets(&self) -> Result<(), ControllerError> {
        info!("Starting Secret watcher in namespace {}", HIVE_NAMESPACE);

        let mut stream = watcher(self.secret_api.clone(), watcher::Config::default())
            .default_backoff()
            .boxed();

        while let Some(event) = stream.next().await {
            let secret = match event {
                Ok(Event::Apply(secret)) | Ok(Event::InitApply(secret)) | Ok(Event::Delete(secret)) => secret,
                Ok(Event::Init) | Ok(Event::InitDone) => continue,
                Err(e) => {
                    warn!("Secret watch error: {}", e);
                    continue;
                }
            };

            let trust_config = match self.hub.get_hive_config().await {
                Ok(config) => config,
                Err(e) => {
                    error!("Failed to get HiveConfig: {}", e);
                    continue;
                }
            };

            if secret_event_triggers(&secret, trust_config.as_ref()) {
                let name = secret.name_any();
                info!("TLS bundle secret {}/{} changed, scheduling trust propagation pass", HIVE_NAMESPACE, name);
                enqueue(&self.triggers, TriggerSource::BundleSecret(name));
            }
        }

        Err(ControllerError::Watch("Secret watch stream ended".to_string()))
    }
}

/// Run passes as triggers arrive.
///
/// A failed pass is retried after a backoff capped at `retry_max`; a new
/// trigger arriving during the wait runs immediately instead. Returns only
/// when every sender is gone.
pub async fn run_worker(
    reconciler: Arc<Reconciler>,
    mut triggers: mpsc::Receiver<TriggerSource>,
    retry_max: Duration,
) -> Result<(), ControllerError> {
    let mut backoff = FibonacciBackoff::new(1, retry_max.as_secs().max(1));
    let mut pending: Option<TriggerSource> = None;

    loop {
        let trigger = match pending.take() {
            Some(trigger) => trigger,
            None => match triggers.recv().await {
                Some(trigger) => trigger,
                None => break,
            },
        };

        match reconciler.reconcile(&trigger).await {
            Ok(report) => {
                backoff.reset();
                if !report.is_clean() {
                    warn!(
                        "{} managed clusters failed to converge; they are retried on the next change",
                        report.failures.len()
                    );
                }
            }
            Err(e) => {
                let delay = backoff.next_backoff();
                error!(
                    "Trust propagation pass failed (trigger: {}): {}. Retrying in {}s",
                    trigger,
                    e,
                    delay.as_secs()
                );

                let woken = tokio::select! {
                    _ = tokio::time::sleep(delay) => Some(TriggerSource::Retry),
                    next = triggers.recv() => next,
                };
                match woken {
                    Some(next) => pending = Some(next),
                    None => break,
                }
            }
        }
    }

    Err(ControllerError::Watch("trigger channel closed".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ControllerConfig;
    use crate::test_utils::*;
    use crds::names::ADDITIONAL_CA_SECRET_NAME;

    #[test]
    fn test_create_triggers_only_with_annotation() {
        let annotated = hive_config(Some("api-tls"), &[]);
        let bare = hive_config(None, &[]);
        let blank = hive_config(Some(""), &[]);

        assert!(trust_config_event_triggers(&HiveConfigEvent::Applied(&annotated), None));
        assert!(!trust_config_event_triggers(&HiveConfigEvent::Applied(&bare), None));
        assert!(!trust_config_event_triggers(&HiveConfigEvent::Applied(&blank), None));
    }

    #[test]
    fn test_update_triggers_on_annotation_change() {
        let annotated = hive_config(Some("api-tls"), &[]);
        let bare = hive_config(None, &[]);

        assert!(!trust_config_event_triggers(&HiveConfigEvent::Applied(&annotated), Some("api-tls")));
        assert!(trust_config_event_triggers(&HiveConfigEvent::Applied(&annotated), Some("old-tls")));
        assert!(trust_config_event_triggers(&HiveConfigEvent::Applied(&annotated), Some("")));
        assert!(trust_config_event_triggers(&HiveConfigEvent::Applied(&bare), Some("api-tls")));
        assert!(!trust_config_event_triggers(&HiveConfigEvent::Applied(&bare), Some("")));
    }

    #[test]
    fn test_delete_always_triggers_resync_never() {
        assert!(trust_config_event_triggers(&HiveConfigEvent::Deleted, None));
        assert!(trust_config_event_triggers(&HiveConfigEvent::Deleted, Some("api-tls")));
        assert!(!trust_config_event_triggers(&HiveConfigEvent::Resync, Some("api-tls")));
    }

    #[test]
    fn test_secret_trigger_requires_reference() {
        let config = hive_config(Some("api-tls"), &[]);

        assert!(secret_event_triggers(&bundle_secret("api-tls", &[]), Some(&config)));
        assert!(!secret_event_triggers(&bundle_secret("other", &[]), Some(&config)));
        assert!(!secret_event_triggers(&bundle_secret("api-tls", &[]), None));
        assert!(!secret_event_triggers(
            &bundle_secret("api-tls", &[]),
            Some(&hive_config(None, &[]))
        ));
        assert!(!secret_event_triggers(&opaque_secret("default", "api-tls"), Some(&config)));
    }

    #[test]
    fn test_enqueue_coalesces() {
        let (tx, mut rx) = trigger_channel();
        enqueue(&tx, TriggerSource::TrustConfig);
        enqueue(&tx, TriggerSource::BundleSecret("api-tls".to_string()));

        assert_eq!(rx.try_recv().unwrap(), TriggerSource::TrustConfig);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_worker_runs_after_failed_pass() {
        let fleet = Fleet::new(&["alpha"]);
        set_annotation(&fleet.hub, Some("api-tls"));
        let reconciler = Arc::new(fleet.reconciler_with(&ControllerConfig::default()));
        let (tx, rx) = trigger_channel();
        let worker = tokio::spawn(run_worker(reconciler, rx, Duration::from_secs(5)));

        // Bundle missing: first pass fails
        enqueue(&tx, TriggerSource::TrustConfig);
        tokio::time::sleep(Duration::from_millis(50)).await;
        fleet.add_bundle("api-tls");
        enqueue(&tx, TriggerSource::BundleSecret("api-tls".to_string()));

        let converged = tokio::time::timeout(Duration::from_secs(5), async {
            while fleet.hub.secret(HIVE_NAMESPACE, ADDITIONAL_CA_SECRET_NAME).is_none() {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await;
        assert!(converged.is_ok(), "worker never completed a pass");

        drop(tx);
        let result = tokio::time::timeout(Duration::from_secs(5), worker).await.unwrap().unwrap();
        assert!(matches!(result, Err(ControllerError::Watch(_))));
    }
}
