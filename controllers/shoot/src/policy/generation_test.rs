//! Unit tests for the generation policy

#[cfg(test)]
mod tests {
    use crate::policy::generation::*;
    use crate::test_utils::{shoot_with_operation, test_shoot};
    use crds::{
        Hibernation, LastOperationState, OPERATION_ANNOTATION, PURPOSE_ANNOTATION, Shoot,
        ShootOperation, ShootSpec, Worker,
    };
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
    use proptest::prelude::*;

    fn arb_spec() -> impl Strategy<Value = ShootSpec> {
        (
            "1\\.(2[6-9]|3[0-1])\\.[0-9]",
            proptest::option::of(any::<bool>()),
            proptest::collection::vec(0u32..200, 0..4),
            proptest::option::of("seed-[a-z]{1,6}"),
        )
            .prop_map(|(version, hibernated, maxima, seed)| {
                let mut spec = ShootSpec::default();
                spec.kubernetes.version = version;
                spec.hibernation = hibernated.map(|enabled| Hibernation { enabled: Some(enabled) });
                spec.workers = maxima
                    .into_iter()
                    .enumerate()
                    .map(|(i, maximum)| Worker {
                        name: format!("pool-{i}"),
                        maximum,
                        ..Worker::default()
                    })
                    .collect();
                spec.seed_name = seed;
                spec
            })
    }

    fn arb_state() -> impl Strategy<Value = Option<LastOperationState>> {
        proptest::option::of(prop_oneof![
            Just(LastOperationState::Pending),
            Just(LastOperationState::Processing),
            Just(LastOperationState::Succeeded),
            Just(LastOperationState::Failed),
        ])
    }

    fn shoot(spec: ShootSpec, state: Option<LastOperationState>) -> Shoot {
        let mut shoot = test_shoot("a", "garden-dev", state);
        shoot.spec = spec;
        shoot
    }

    fn deleting(mut shoot: Shoot) -> Shoot {
        let timestamp: Time =
            serde_json::from_value(serde_json::json!("2024-01-01T00:00:00Z")).unwrap();
        shoot.metadata.deletion_timestamp = Some(timestamp);
        shoot
    }

    proptest! {
        #[test]
        fn prop_unchanged_shoot_never_increments(spec in arb_spec(), state in arb_state()) {
            let old = shoot(spec.clone(), state);
            let new = shoot(spec, state);
            prop_assert_eq!(decide(&old, &new), ReconciliationRequest::default());
        }

        #[test]
        fn prop_new_deletion_always_increments(
            old_spec in arb_spec(),
            new_spec in arb_spec(),
            state in arb_state(),
        ) {
            let old = shoot(old_spec, state);
            let new = deleting(shoot(new_spec, state));
            prop_assert!(decide(&old, &new).must_increment_generation);
        }

        #[test]
        fn prop_rotate_always_increments_and_persists(spec in arb_spec(), state in arb_state()) {
            let old = shoot(spec.clone(), state);
            let new = shoot_with_operation(shoot(spec, state), "rotate-kubeconfig-credentials");

            let request = decide(&old, &new);
            prop_assert!(request.must_increment_generation);
            prop_assert_eq!(request.consumed_annotation, None);
        }

        #[test]
        fn prop_spec_change_increments(a in arb_spec(), b in arb_spec(), state in arb_state()) {
            prop_assume!(a != b);
            let request = decide(&shoot(a, state), &shoot(b, state));
            prop_assert_eq!(request.reason, Some(IncrementReason::SpecChanged));
        }
    }

    #[test]
    fn test_retry_on_failed_shoot_is_consumed() {
        let old = test_shoot("a", "garden-dev", Some(LastOperationState::Failed));
        let new = shoot_with_operation(old.clone(), "retry");

        let request = decide(&old, &new);
        assert!(request.must_increment_generation);
        assert_eq!(request.consumed_annotation, Some(ShootOperation::Retry));
        assert_eq!(request.reason, Some(IncrementReason::RetryRequested));
    }

    #[test]
    fn test_retry_on_succeeded_shoot_does_nothing() {
        let old = test_shoot("a", "garden-dev", Some(LastOperationState::Succeeded));
        let new = shoot_with_operation(old.clone(), "retry");
        assert_eq!(decide(&old, &new), ReconciliationRequest::default());
    }

    #[test]
    fn test_reconcile_requires_non_failed_state() {
        let old = test_shoot("a", "garden-dev", Some(LastOperationState::Succeeded));
        let new = shoot_with_operation(old.clone(), "reconcile");
        let request = decide(&old, &new);
        assert_eq!(request.reason, Some(IncrementReason::ReconcileRequested));
        assert_eq!(request.consumed_annotation, Some(ShootOperation::Reconcile));

        let old = test_shoot("a", "garden-dev", Some(LastOperationState::Failed));
        let new = shoot_with_operation(old.clone(), "reconcile");
        assert!(!decide(&old, &new).must_increment_generation);
    }

    #[test]
    fn test_retry_and_reconcile_need_a_last_operation() {
        let old = test_shoot("a", "garden-dev", None);
        for value in ["retry", "reconcile"] {
            let new = shoot_with_operation(old.clone(), value);
            assert!(!decide(&old, &new).must_increment_generation, "{value}");
        }
    }

    #[test]
    fn test_unknown_operation_is_treated_as_absent() {
        let old = test_shoot("a", "garden-dev", Some(LastOperationState::Failed));
        let new = shoot_with_operation(old.clone(), "Retry");
        assert_eq!(decide(&old, &new), ReconciliationRequest::default());
    }

    #[test]
    fn test_purpose_change_increments() {
        let old = test_shoot("a", "garden-dev", Some(LastOperationState::Succeeded));
        let mut new = old.clone();
        new.metadata
            .annotations
            .get_or_insert_with(Default::default)
            .insert(PURPOSE_ANNOTATION.to_string(), "production".to_string());

        let request = decide(&old, &new);
        assert_eq!(request.reason, Some(IncrementReason::PurposeChanged));
        assert_eq!(request.consumed_annotation, None);
    }

    #[test]
    fn test_deletion_wins_over_annotations() {
        let old = test_shoot("a", "garden-dev", Some(LastOperationState::Failed));
        let new = deleting(shoot_with_operation(old.clone(), "retry"));
        let request = decide(&old, &new);
        assert_eq!(request.reason, Some(IncrementReason::DeletionRequested));
        // The retry annotation is left alone when another rule matched first
        assert_eq!(request.consumed_annotation, None);
        assert_eq!(new.operation_annotation(), Some("retry"));
    }

    #[test]
    fn test_decide_initial() {
        let shoot = test_shoot("a", "garden-dev", Some(LastOperationState::Succeeded));
        assert!(!decide_initial(&shoot).must_increment_generation);

        let pending_delete = deleting(shoot.clone());
        assert_eq!(
            decide_initial(&pending_delete).reason,
            Some(IncrementReason::DeletionRequested)
        );

        let mut annotated = shoot;
        annotated
            .metadata
            .annotations
            .get_or_insert_with(Default::default)
            .insert(OPERATION_ANNOTATION.to_string(), "reconcile".to_string());
        assert_eq!(
            decide_initial(&annotated).consumed_annotation,
            Some(ShootOperation::Reconcile)
        );
    }

    #[test]
    fn test_observed_rotate_counts_once() {
        let before = test_shoot("a", "garden-dev", Some(LastOperationState::Succeeded));
        let rotating = shoot_with_operation(before.clone(), "rotate-kubeconfig-credentials");
        assert_eq!(
            decide_observed(&before, &rotating).reason,
            Some(IncrementReason::CredentialsRotation)
        );

        // Status write while the annotation is still there
        let mut status_only = rotating.clone();
        status_only.metadata.resource_version = Some("101".to_string());
        if let Some(op) = status_only
            .status
            .as_mut()
            .and_then(|s| s.last_operation.as_mut())
        {
            op.description = "Shoot control plane reconciled".to_string();
        }
        assert_eq!(
            decide_observed(&rotating, &status_only),
            ReconciliationRequest::default()
        );
    }

    #[test]
    fn test_observed_rotate_still_sees_other_changes() {
        let rotating = shoot_with_operation(
            test_shoot("a", "garden-dev", Some(LastOperationState::Succeeded)),
            "rotate-kubeconfig-credentials",
        );
        let mut changed = rotating.clone();
        changed.spec.kubernetes.version = "1.30.3".to_string();
        assert_eq!(
            decide_observed(&rotating, &changed).reason,
            Some(IncrementReason::SpecChanged)
        );

        let mut purpose = rotating.clone();
        purpose
            .metadata
            .annotations
            .get_or_insert_with(Default::default)
            .insert(PURPOSE_ANNOTATION.to_string(), "production".to_string());
        assert_eq!(
            decide_observed(&rotating, &purpose).reason,
            Some(IncrementReason::PurposeChanged)
        );
    }

    #[test]
    fn test_observed_without_rotate_matches_decide() {
        let old = test_shoot("a", "garden-dev", Some(LastOperationState::Failed));
        let new = shoot_with_operation(old.clone(), "retry");
        assert_eq!(decide_observed(&old, &new), decide(&old, &new));
    }
}
