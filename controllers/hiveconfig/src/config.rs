//! Controller configuration from environment variables.

use crate::error::ControllerError;
use cluster_client::ConnectionTimeouts;
use std::env;
use std::time::Duration;

/// Runtime settings, read once at start-up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Restrict ClusterDeployment listing to one namespace (`None` = all)
    pub watch_namespace: Option<String>,
    /// Connect/read timeouts for managed cluster clients
    pub remote_timeouts: ConnectionTimeouts,
    /// Deadline for converging a single managed cluster
    pub target_timeout: Duration,
    /// Managed clusters converged at the same time
    pub target_concurrency: usize,
    /// Cap for the delay between retries of a failed pass
    pub retry_max: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            watch_namespace: None,
            remote_timeouts: ConnectionTimeouts::default(),
            target_timeout: Duration::from_secs(60),
            target_concurrency: 1,
            retry_max: Duration::from_secs(300),
        }
    }
}

impl ControllerConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ControllerError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through `lookup`, falling back to defaults for
    /// unset variables.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ControllerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let watch_namespace = lookup("WATCH_NAMESPACE")
            .map(|ns| ns.trim().to_string())
            .filter(|ns| !ns.is_empty());

        let connect = positive_secs(&lookup, "REMOTE_CONNECT_TIMEOUT_SECS", defaults.remote_timeouts.connect)?;
        let read = positive_secs(&lookup, "REMOTE_READ_TIMEOUT_SECS", defaults.remote_timeouts.read)?;
        let target_timeout = positive_secs(&lookup, "TARGET_TIMEOUT_SECS", defaults.target_timeout)?;
        let retry_max = positive_secs(&lookup, "RETRY_MAX_SECS", defaults.retry_max)?;

        let target_concurrency = match lookup("TARGET_CONCURRENCY") {
            Some(raw) => usize::try_from(parse_positive("TARGET_CONCURRENCY", &raw)?)
                .map_err(|e| ControllerError::InvalidConfig(format!("TARGET_CONCURRENCY: {}", e)))?,
            None => defaults.target_concurrency,
        };

        Ok(Self {
            watch_namespace,
            remote_timeouts: ConnectionTimeouts { connect, read },
            target_timeout,
            target_concurrency,
            retry_max,
        })
    }
}

fn positive_secs<F>(lookup: &F, key: &str, default: Duration) -> Result<Duration, ControllerError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => parse_positive(key, &raw).map(Duration::from_secs),
        None => Ok(default),
    }
}

fn parse_positive(key: &str, raw: &str) -> Result<u64, ControllerError> {
    let value: u64 = raw.trim().parse().map_err(|_| {
        ControllerError::InvalidConfig(format!("{} must be a positive integer, got {:?}", key, raw))
    })?;
    if value == 0 {
        return Err(ControllerError::InvalidConfig(format!("{} must be greater than zero", key)));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<ControllerConfig, ControllerError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ControllerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config, ControllerConfig::default());
        assert_eq!(config.remote_timeouts.connect, Duration::from_secs(5));
        assert_eq!(config.remote_timeouts.read, Duration::from_secs(30));
        assert_eq!(config.target_concurrency, 1);
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("WATCH_NAMESPACE", "clusters"),
            ("REMOTE_CONNECT_TIMEOUT_SECS", "2"),
            ("REMOTE_READ_TIMEOUT_SECS", "10"),
            ("TARGET_TIMEOUT_SECS", "15"),
            ("TARGET_CONCURRENCY", "8"),
            ("RETRY_MAX_SECS", " 120 "),
        ])
        .unwrap();

        assert_eq!(config.watch_namespace.as_deref(), Some("clusters"));
        assert_eq!(config.remote_timeouts.connect, Duration::from_secs(2));
        assert_eq!(config.remote_timeouts.read, Duration::from_secs(10));
        assert_eq!(config.target_timeout, Duration::from_secs(15));
        assert_eq!(config.target_concurrency, 8);
        assert_eq!(config.retry_max, Duration::from_secs(120));
    }

    #[test]
    fn test_blank_namespace_means_all() {
        let config = load(&[("WATCH_NAMESPACE", "  ")]).unwrap();
        assert_eq!(config.watch_namespace, None);
    }

    #[test]
    fn test_invalid_values_rejected() {
        for (key, value) in [
            ("TARGET_CONCURRENCY", "0"),
            ("TARGET_TIMEOUT_SECS", "soon"),
            ("REMOTE_READ_TIMEOUT_SECS", "-1"),
            ("RETRY_MAX_SECS", "0"),
        ] {
            let err = load(&[(key, value)]).unwrap_err();
            assert!(
                matches!(err, ControllerError::InvalidConfig(ref msg) if msg.contains(key)),
                "{}={} should be rejected, got {}",
                key,
                value,
                err
            );
        }
    }
}
