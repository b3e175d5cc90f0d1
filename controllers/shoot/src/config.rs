//! Controller configuration loaded from environment variables.

use crate::error::ControllerError;
use std::net::SocketAddr;
use std::time::Duration;

/// Runtime configuration of the shoot controller.
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerConfig {
    /// Namespace the Shoot watcher is restricted to (`None` = all namespaces)
    pub watch_namespace: Option<String>,
    /// Vertical autoscaling (HVPA) feature flag
    pub hvpa_enabled: bool,
    /// Effective etcd volume size (max of default and seed minimum)
    pub etcd_storage_capacity: String,
    /// Bound on the readiness wait during legacy backup migration
    pub etcd_readiness_timeout: Duration,
    /// Whether per-shoot ignore / sync-period annotations are honoured
    pub respect_sync_period_overwrite: bool,
    /// Default and minimum resync period
    pub min_sync_period: Duration,
    /// Listener for probes and metrics
    pub metrics_bind_address: SocketAddr,
    /// Version written to `status.controllerVersion`
    pub controller_version: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            watch_namespace: None,
            hvpa_enabled: false,
            etcd_storage_capacity: DEFAULT_ETCD_STORAGE_CAPACITY.to_string(),
            etcd_readiness_timeout: Duration::from_secs(300),
            respect_sync_period_overwrite: false,
            min_sync_period: Duration::from_secs(3600),
            metrics_bind_address: SocketAddr::from(([0, 0, 0, 0], 8080)),
            controller_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

const DEFAULT_ETCD_STORAGE_CAPACITY: &str = "10Gi";

impl ControllerConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, ControllerError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ControllerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let storage_default = match get("ETCD_STORAGE_CAPACITY") {
            Some(v) => validated_quantity("ETCD_STORAGE_CAPACITY", v)?,
            None => defaults.etcd_storage_capacity.clone(),
        };
        let seed_minimum = get("SEED_MINIMUM_VOLUME_SIZE")
            .map(|v| validated_quantity("SEED_MINIMUM_VOLUME_SIZE", v))
            .transpose()?;

        Ok(Self {
            watch_namespace: get("WATCH_NAMESPACE"),
            hvpa_enabled: parse_or("HVPA_ENABLED", get("HVPA_ENABLED"), parse_bool, false)?,
            etcd_storage_capacity: valid_volume_size(storage_default, seed_minimum.as_deref()),
            etcd_readiness_timeout: parse_or(
                "ETCD_READINESS_TIMEOUT_SECONDS",
                get("ETCD_READINESS_TIMEOUT_SECONDS"),
                parse_seconds,
                defaults.etcd_readiness_timeout,
            )?,
            respect_sync_period_overwrite: parse_or(
                "RESPECT_SYNC_PERIOD_OVERWRITE",
                get("RESPECT_SYNC_PERIOD_OVERWRITE"),
                parse_bool,
                false,
            )?,
            min_sync_period: parse_or(
                "MIN_SYNC_PERIOD_SECONDS",
                get("MIN_SYNC_PERIOD_SECONDS"),
                parse_seconds,
                defaults.min_sync_period,
            )?,
            metrics_bind_address: parse_or(
                "METRICS_BIND_ADDRESS",
                get("METRICS_BIND_ADDRESS"),
                |v| v.parse().ok(),
                defaults.metrics_bind_address,
            )?,
            controller_version: get("CONTROLLER_VERSION").unwrap_or(defaults.controller_version),
        })
    }
}

fn parse_or<T>(
    key: &str,
    value: Option<String>,
    parse: impl Fn(&str) -> Option<T>,
    default: T,
) -> Result<T, ControllerError> {
    match value {
        None => Ok(default),
        Some(v) => parse(v.trim()).ok_or_else(|| {
            ControllerError::InvalidConfig(format!("{key} has invalid value {v:?}"))
        }),
    }
}

fn parse_bool(v: &str) -> Option<bool> {
    match v.to_ascii_lowercase().as_str() {
        "1" | "t" | "true" | "yes" => Some(true),
        "0" | "f" | "false" | "no" => Some(false),
        _ => None,
    }
}

fn parse_seconds(v: &str) -> Option<Duration> {
    v.parse::<u64>()
        .ok()
        .filter(|s| *s > 0)
        .map(Duration::from_secs)
}

fn validated_quantity(key: &str, value: String) -> Result<String, ControllerError> {
    let value = value.trim().to_string();
    if quantity_bytes(&value).is_none() {
        return Err(ControllerError::InvalidConfig(format!(
            "{key} is not a valid quantity: {value:?}"
        )));
    }
    Ok(value)
}

/// Returns the larger of the requested size and the seed's minimum volume size.
pub fn valid_volume_size(size: String, seed_minimum: Option<&str>) -> String {
    match (seed_minimum, quantity_bytes(&size)) {
        (Some(min), Some(requested)) => match quantity_bytes(min) {
            Some(minimum) if minimum > requested => min.to_string(),
            _ => size,
        },
        _ => size,
    }
}

/// Byte value of a Kubernetes storage quantity ("10Gi", "500M", "1024").
pub fn quantity_bytes(quantity: &str) -> Option<f64> {
    const SUFFIXES: &[(&str, f64)] = &[
        ("Ki", 1024.0),
        ("Mi", 1_048_576.0),
        ("Gi", 1_073_741_824.0),
        ("Ti", 1_099_511_627_776.0),
        ("Pi", 1_125_899_906_842_624.0),
        ("k", 1e3),
        ("M", 1e6),
        ("G", 1e9),
        ("T", 1e12),
        ("P", 1e15),
    ];

    let quantity = quantity.trim();
    let (number, factor) = SUFFIXES
        .iter()
        .find_map(|(suffix, factor)| quantity.strip_suffix(suffix).map(|n| (n, *factor)))
        .unwrap_or((quantity, 1.0));

    number
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite() && *n >= 0.0)
        .map(|n| n * factor)
}
