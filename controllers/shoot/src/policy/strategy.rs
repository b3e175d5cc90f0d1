//! Scheduling predicates over the shoot status and annotations.

use crds::{
    IGNORE_ANNOTATION, LastOperationState, LastOperationType, SYNC_PERIOD_ANNOTATION,
    SYSTEM_NAMESPACE, Shoot,
};
use std::time::Duration;

/// Failed at the latest generation by this controller version.
///
/// Such a shoot is not retried until a retry annotation or a new generation arrives.
pub fn is_shoot_failed(shoot: &Shoot, controller_version: &str) -> bool {
    let Some(status) = shoot.status.as_ref() else {
        return false;
    };
    status
        .last_operation
        .as_ref()
        .is_some_and(|op| op.state == LastOperationState::Failed)
        && shoot.generation() == status.observed_generation
        && status.controller_version.as_deref() == Some(controller_version)
}

/// Latest generation observed and last operation succeeded.
pub fn is_observed_at_latest_generation_and_succeeded(shoot: &Shoot) -> bool {
    shoot.status.as_ref().is_some_and(|status| {
        shoot.generation() == status.observed_generation
            && status
                .last_operation
                .as_ref()
                .is_some_and(|op| op.state == LastOperationState::Succeeded)
    })
}

/// Deletion requested and already recorded as a pending delete operation.
pub fn is_deletion_scheduled(shoot: &Shoot) -> bool {
    shoot.metadata.deletion_timestamp.is_some()
        && shoot.last_operation().is_some_and(|op| {
            op.type_ == LastOperationType::Delete && op.state == LastOperationState::Pending
        })
}

fn respect_sync_period_overwrite(respect: bool, shoot: &Shoot) -> bool {
    respect || shoot.metadata.namespace.as_deref() == Some(SYSTEM_NAMESPACE)
}

fn annotation<'a>(shoot: &'a Shoot, key: &str) -> Option<&'a str> {
    shoot
        .metadata
        .annotations
        .as_ref()
        .and_then(|a| a.get(key))
        .map(String::as_str)
}

/// Whether the shoot carries a truthy ignore annotation that is honoured.
pub fn should_ignore_shoot(respect: bool, shoot: &Shoot) -> bool {
    if !respect_sync_period_overwrite(respect, shoot) {
        return false;
    }
    annotation(shoot, IGNORE_ANNOTATION)
        .and_then(parse_bool)
        .unwrap_or(false)
}

/// Resync period of the shoot, never below `min_sync_period`.
pub fn sync_period_of_shoot(respect: bool, min_sync_period: Duration, shoot: &Shoot) -> Duration {
    if !respect_sync_period_overwrite(respect, shoot) {
        return min_sync_period;
    }
    annotation(shoot, SYNC_PERIOD_ANNOTATION)
        .and_then(parse_duration)
        .filter(|period| *period >= min_sync_period)
        .unwrap_or(min_sync_period)
}

fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}

/// Parse a duration in the "1h30m" / "90s" / "250ms" notation.
fn parse_duration(value: &str) -> Option<Duration> {
    let mut rest = value.trim();
    if rest.is_empty() {
        return None;
    }
    if rest == "0" {
        return Some(Duration::ZERO);
    }

    let mut total = Duration::ZERO;
    while !rest.is_empty() {
        let digits = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if digits == 0 {
            return None;
        }
        let amount: f64 = rest[..digits].parse().ok()?;
        rest = &rest[digits..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let seconds_per_unit = match &rest[..unit_len] {
            "ns" => 1e-9,
            "us" | "µs" => 1e-6,
            "ms" => 1e-3,
            "s" => 1.0,
            "m" => 60.0,
            "h" => 3600.0,
            _ => return None,
        };
        rest = &rest[unit_len..];
        total += Duration::try_from_secs_f64(amount * seconds_per_unit).ok()?;
    }
    Some(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crds::{LastOperation, LastOperationType, ShootSpec, ShootStatus};
    use std::collections::BTreeMap;

    fn shoot_with(namespace: &str, annotations: &[(&str, &str)]) -> Shoot {
        let mut shoot = Shoot::new("a", ShootSpec::default());
        shoot.metadata.namespace = Some(namespace.to_string());
        shoot.metadata.annotations = Some(
            annotations
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<BTreeMap<_, _>>(),
        );
        shoot
    }

    fn with_status(mut shoot: Shoot, generation: i64, observed: i64, state: LastOperationState) -> Shoot {
        shoot.metadata.generation = Some(generation);
        shoot.status = Some(ShootStatus {
            observed_generation: observed,
            last_operation: Some(LastOperation {
                type_: LastOperationType::Reconcile,
                state,
                description: String::new(),
                progress: 100,
                last_update_time: None,
            }),
            controller_version: Some("v1".to_string()),
            ..ShootStatus::default()
        });
        shoot
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("90s"), Some(Duration::from_secs(90)));
        assert_eq!(parse_duration("1h30m"), Some(Duration::from_secs(5400)));
        assert_eq!(parse_duration("1.5h"), Some(Duration::from_secs(5400)));
        assert_eq!(parse_duration("250ms"), Some(Duration::from_millis(250)));
        assert_eq!(parse_duration("0"), Some(Duration::ZERO));
        assert_eq!(parse_duration("10"), None);
        assert_eq!(parse_duration("1d"), None);
        assert_eq!(parse_duration(""), None);
    }

    #[test]
    fn test_sync_period_respects_minimum() {
        let min = Duration::from_secs(3600);
        let shoot = shoot_with("garden-dev", &[(SYNC_PERIOD_ANNOTATION, "2h")]);
        assert_eq!(sync_period_of_shoot(false, min, &shoot), min);
        assert_eq!(sync_period_of_shoot(true, min, &shoot), Duration::from_secs(7200));

        let shoot = shoot_with("garden-dev", &[(SYNC_PERIOD_ANNOTATION, "5m")]);
        assert_eq!(sync_period_of_shoot(true, min, &shoot), min);

        let shoot = shoot_with("garden-dev", &[(SYNC_PERIOD_ANNOTATION, "soon")]);
        assert_eq!(sync_period_of_shoot(true, min, &shoot), min);
    }

    #[test]
    fn test_system_namespace_always_respects_overwrites() {
        let shoot = shoot_with(SYSTEM_NAMESPACE, &[(IGNORE_ANNOTATION, "true")]);
        assert!(should_ignore_shoot(false, &shoot));

        let shoot = shoot_with("garden-dev", &[(IGNORE_ANNOTATION, "true")]);
        assert!(!should_ignore_shoot(false, &shoot));
        assert!(should_ignore_shoot(true, &shoot));

        let shoot = shoot_with("garden-dev", &[(IGNORE_ANNOTATION, "nope")]);
        assert!(!should_ignore_shoot(true, &shoot));
    }

    #[test]
    fn test_is_shoot_failed() {
        let shoot = with_status(shoot_with("p", &[]), 3, 3, LastOperationState::Failed);
        assert!(is_shoot_failed(&shoot, "v1"));
        // Different controller version gets another chance
        assert!(!is_shoot_failed(&shoot, "v2"));

        let shoot = with_status(shoot_with("p", &[]), 4, 3, LastOperationState::Failed);
        assert!(!is_shoot_failed(&shoot, "v1"));

        assert!(!is_shoot_failed(&shoot_with("p", &[]), "v1"));
    }

    #[test]
    fn test_is_observed_at_latest_generation_and_succeeded() {
        let shoot = with_status(shoot_with("p", &[]), 3, 3, LastOperationState::Succeeded);
        assert!(is_observed_at_latest_generation_and_succeeded(&shoot));

        let shoot = with_status(shoot_with("p", &[]), 4, 3, LastOperationState::Succeeded);
        assert!(!is_observed_at_latest_generation_and_succeeded(&shoot));

        let shoot = with_status(shoot_with("p", &[]), 3, 3, LastOperationState::Processing);
        assert!(!is_observed_at_latest_generation_and_succeeded(&shoot));
    }

    #[test]
    fn test_is_deletion_scheduled() {
        let mut shoot = with_status(shoot_with("p", &[]), 2, 1, LastOperationState::Pending);
        // Pending reconcile without deletion timestamp
        assert!(!is_deletion_scheduled(&shoot));

        shoot.metadata.deletion_timestamp =
            Some(serde_json::from_value(serde_json::json!("2024-01-01T00:00:00Z")).unwrap());
        assert!(!is_deletion_scheduled(&shoot));

        if let Some(op) = shoot.status.as_mut().and_then(|s| s.last_operation.as_mut()) {
            op.type_ = LastOperationType::Delete;
        }
        assert!(is_deletion_scheduled(&shoot));

        if let Some(op) = shoot.status.as_mut().and_then(|s| s.last_operation.as_mut()) {
            op.state = LastOperationState::Failed;
        }
        assert!(!is_deletion_scheduled(&shoot));
    }
}
