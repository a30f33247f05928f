//! Test utility functions for policyweave

use policyweave::{
    compile, Action, ApplicabilityRule, BranchScope, CompilationRequest, DastProfileResolver,
    GitRef, PipelineConfig, PipelineSource, Policy, ScanAction, ScanType, StaticProfileResolver,
};

/// A pipeline rule matching the given branch patterns
pub fn pipeline_rule(branches: &[&str]) -> ApplicabilityRule {
    ApplicabilityRule::Pipeline(BranchScope {
        branches: Some(branches.iter().map(|s| s.to_string()).collect()),
        ..Default::default()
    })
}

/// A schedule rule matching the given branch patterns
pub fn schedule_rule(branches: &[&str]) -> ApplicabilityRule {
    ApplicabilityRule::Schedule(BranchScope {
        branches: Some(branches.iter().map(|s| s.to_string()).collect()),
        ..Default::default()
    })
}

/// A scan action with no profile references
pub fn scan_action(scan: ScanType) -> Action {
    Action::Scan(ScanAction {
        scan,
        site_profile: None,
        scanner_profile: None,
    })
}

/// A DAST action referencing the given profiles
pub fn dast_action(site: &str, scanner: &str) -> Action {
    Action::Scan(ScanAction {
        scan: ScanType::Dast,
        site_profile: Some(site.to_string()),
        scanner_profile: Some(scanner.to_string()),
    })
}

/// A policy with one pipeline rule matching every branch
pub fn policy_for_all_branches(name: &str, actions: Vec<Action>) -> Policy {
    Policy {
        name: name.to_string(),
        origin: String::new(),
        rules: vec![pipeline_rule(&["*"])],
        actions,
    }
}

/// Compile a request assembled from parts; panics on failure
pub fn compile_config(
    base_yaml: &str,
    policies: Vec<Policy>,
    git_ref: GitRef,
    source: PipelineSource,
    custom_ci_enabled: bool,
    profiles: &dyn DastProfileResolver,
) -> PipelineConfig {
    let base_config = PipelineConfig::from_yaml(base_yaml)
        .unwrap_or_else(|e| panic!("Failed to parse base config: {}", e));
    let request = CompilationRequest {
        base_config,
        git_ref,
        source,
        policies,
        custom_ci_enabled,
        profiles,
    };
    compile(&request).unwrap_or_else(|e| panic!("Compilation failed: {}", e))
}

/// Compile with defaults: branch `main`, push source, custom CI off
pub fn compile_simple(base_yaml: &str, policies: Vec<Policy>) -> PipelineConfig {
    let resolver = StaticProfileResolver::new();
    compile_config(
        base_yaml,
        policies,
        GitRef::branch("main"),
        PipelineSource::Push,
        false,
        &resolver,
    )
}

/// Assert the stage list of a compiled config
pub fn assert_stages(config: &PipelineConfig, expected: &[&str]) {
    let stages = config.stages().expect("config should have stages");
    let expected: Vec<String> = expected.iter().map(|s| s.to_string()).collect();
    assert_eq!(stages, expected, "unexpected stage list");
}

/// Assert a job exists and sits on the expected stage
pub fn assert_job_on_stage(config: &PipelineConfig, job: &str, stage: &str) {
    assert!(
        config.job(job).is_some(),
        "job '{}' missing from compiled config",
        job
    );
    assert_eq!(
        config.job_stage(job),
        Some(stage),
        "job '{}' on wrong stage",
        job
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_simple_noop() {
        let config = compile_simple("stages: [build]\n", vec![]);
        assert_stages(&config, &["build"]);
    }

    #[test]
    fn test_policy_for_all_branches_applies_to_any_branch() {
        let policy = policy_for_all_branches("p", vec![scan_action(ScanType::Sast)]);
        assert!(policy.applies_to(&GitRef::branch("anything"), PipelineSource::Push));
    }
}
