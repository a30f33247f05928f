//! Applicability filtering
//!
//! Decides which policy actions affect the current compilation, in a
//! fixed order that downstream job naming depends on. Invalid policies
//! are skipped locally; to the caller that is indistinguishable from a
//! policy that did not apply.

use crate::core::policy::{Action, GitRef, PipelineSource, Policy};
use tracing::{debug, warn};

/// One action that applies to this compilation, tagged with the index
/// of the policy it came from (aggregation order)
#[derive(Debug, Clone)]
pub struct SelectedAction {
    pub action: Action,
    pub policy_index: usize,
}

/// Flatten the applicable actions of all policies, in aggregation order
/// then per-policy document order.
pub fn select_actions(
    policies: &[Policy],
    git_ref: &GitRef,
    source: PipelineSource,
) -> Vec<SelectedAction> {
    // Tags never trigger policy-mandated scans.
    if git_ref.is_tag {
        debug!(git_ref = %git_ref.name, "tag ref, no policies apply");
        return Vec::new();
    }

    // On-demand scans must not re-trigger policy compilation.
    if source == PipelineSource::OndemandDastScan {
        debug!("ondemand scan source, no policies apply");
        return Vec::new();
    }

    let mut selected = Vec::new();

    for (index, policy) in policies.iter().enumerate() {
        if let Err(error) = policy.validate() {
            warn!(
                policy = %policy.name,
                origin = %policy.origin,
                %error,
                "skipping structurally invalid policy"
            );
            continue;
        }

        if policy.scheduled() && !source.is_scheduled() {
            debug!(policy = %policy.name, "schedule-only policy skipped for regular pipeline");
            continue;
        }

        if !policy.applies_to(git_ref, source) {
            continue;
        }

        for action in &policy.actions {
            selected.push(SelectedAction {
                action: action.clone(),
                policy_index: index,
            });
        }
    }

    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::policy::{
        ApplicabilityRule, BranchScope, ScanAction, ScanType, MAX_ACTIONS_PER_POLICY,
    };

    fn scan(scan: ScanType) -> Action {
        Action::Scan(ScanAction {
            scan,
            site_profile: None,
            scanner_profile: None,
        })
    }

    fn policy_matching_all(name: &str, actions: Vec<Action>) -> Policy {
        Policy {
            name: name.to_string(),
            origin: String::new(),
            rules: vec![ApplicabilityRule::Pipeline(BranchScope {
                branches: Some(vec!["*".into()]),
                ..Default::default()
            })],
            actions,
        }
    }

    #[test]
    fn test_tags_never_match() {
        let policies = vec![policy_matching_all("p", vec![scan(ScanType::Sast)])];
        let selected = select_actions(&policies, &GitRef::tag("v1.0"), PipelineSource::Push);
        assert!(selected.is_empty());
    }

    #[test]
    fn test_ondemand_source_never_matches() {
        let policies = vec![policy_matching_all("p", vec![scan(ScanType::Dast)])];
        let selected = select_actions(
            &policies,
            &GitRef::branch("main"),
            PipelineSource::OndemandDastScan,
        );
        assert!(selected.is_empty());
    }

    #[test]
    fn test_schedule_only_policy_skipped_for_regular_pipeline() {
        let policy = Policy {
            name: "nightly".into(),
            origin: String::new(),
            rules: vec![ApplicabilityRule::Schedule(BranchScope::default())],
            actions: vec![scan(ScanType::SecretDetection)],
        };
        assert!(select_actions(&[policy.clone()], &GitRef::branch("main"), PipelineSource::Push)
            .is_empty());
        assert_eq!(
            select_actions(&[policy], &GitRef::branch("main"), PipelineSource::Schedule).len(),
            1
        );
    }

    #[test]
    fn test_invalid_policy_skipped_others_survive() {
        let invalid = Policy {
            actions: vec![scan(ScanType::Sast); MAX_ACTIONS_PER_POLICY + 1],
            ..policy_matching_all("invalid", vec![])
        };
        let valid = policy_matching_all("valid", vec![scan(ScanType::SecretDetection)]);

        let selected = select_actions(
            &[invalid, valid],
            &GitRef::branch("main"),
            PipelineSource::Push,
        );
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].policy_index, 1);
    }

    #[test]
    fn test_non_matching_branch_skipped() {
        let policy = Policy {
            rules: vec![ApplicabilityRule::Pipeline(BranchScope {
                branches: Some(vec!["release-*".into()]),
                ..Default::default()
            })],
            ..policy_matching_all("releases", vec![scan(ScanType::Sast)])
        };
        assert!(
            select_actions(&[policy.clone()], &GitRef::branch("main"), PipelineSource::Push)
                .is_empty()
        );
        assert_eq!(
            select_actions(&[policy], &GitRef::branch("release-7"), PipelineSource::Push).len(),
            1
        );
    }

    #[test]
    fn test_flattening_preserves_order_and_indices() {
        let first = policy_matching_all(
            "first",
            vec![scan(ScanType::Sast), scan(ScanType::SecretDetection)],
        );
        let second = policy_matching_all("second", vec![scan(ScanType::Sast)]);

        let selected = select_actions(
            &[first, second],
            &GitRef::branch("main"),
            PipelineSource::Push,
        );
        let indices: Vec<usize> = selected.iter().map(|s| s.policy_index).collect();
        assert_eq!(indices, vec![0, 0, 1]);
    }
}
