//! End-to-end compilation scenarios for scan execution policies

mod helpers;

use helpers::*;
use policyweave::{
    compile, CompilationRequest, GitRef, PipelineConfig, PipelineSource, ScanType,
    StaticProfileResolver,
};

#[test]
fn noop_when_no_policy_applies() {
    let base_yaml = r#"
stages: [build, test]
variables:
  CUSTOM_KEY: untouched
build-job:
  stage: build
  script: [make]
"#;
    // Policy only matches release branches, compilation is for main.
    let mut policy = policy_for_all_branches("sast", vec![scan_action(ScanType::Sast)]);
    policy.rules = vec![pipeline_rule(&["release-*"])];

    let resolver = StaticProfileResolver::new();
    let output = compile_config(
        base_yaml,
        vec![policy],
        GitRef::branch("main"),
        PipelineSource::Push,
        false,
        &resolver,
    );

    let base = PipelineConfig::from_yaml(base_yaml).unwrap();
    assert_eq!(output, base);
}

#[test]
fn tag_refs_always_return_base_unchanged() {
    let base_yaml = "stages: [build]\njob:\n  stage: build\n  script: [make]\n";
    let policy = policy_for_all_branches("p", vec![scan_action(ScanType::SecretDetection)]);

    let resolver = StaticProfileResolver::new();
    let output = compile_config(
        base_yaml,
        vec![policy],
        GitRef::tag("v1.0"),
        PipelineSource::Push,
        false,
        &resolver,
    );

    assert_eq!(output, PipelineConfig::from_yaml(base_yaml).unwrap());
}

#[test]
fn schedule_only_policy_never_touches_regular_pipelines() {
    let base_yaml = "stages: [build]\n";
    let policy = policyweave::Policy {
        name: "nightly".into(),
        origin: String::new(),
        rules: vec![schedule_rule(&["*"])],
        actions: vec![scan_action(ScanType::SecretDetection)],
    };

    for source in [
        PipelineSource::Push,
        PipelineSource::Web,
        PipelineSource::MergeRequestEvent,
    ] {
        let resolver = StaticProfileResolver::new();
        let output = compile_config(
            base_yaml,
            vec![policy.clone()],
            GitRef::branch("main"),
            source,
            false,
            &resolver,
        );
        assert_eq!(output, PipelineConfig::from_yaml(base_yaml).unwrap());
    }

    // But it does apply on a scheduled run.
    let resolver = StaticProfileResolver::new();
    let output = compile_config(
        base_yaml,
        vec![policy],
        GitRef::branch("main"),
        PipelineSource::Schedule,
        false,
        &resolver,
    );
    assert_job_on_stage(&output, "secret-detection-0", "scan-policies");
}

#[test]
fn example_scenario_secret_detection_on_existing_test_stage() {
    let base_yaml = "stages: [build, test, release]\n";
    let policy = policy_for_all_branches("secrets", vec![scan_action(ScanType::SecretDetection)]);

    let output = compile_simple(base_yaml, vec![policy]);

    assert_stages(&output, &["build", "test", "release"]);
    assert_job_on_stage(&output, "secret-detection-0", "test");
}

#[test]
fn scan_policies_stage_inserted_when_no_test_stage() {
    let base_yaml = "stages: [build, not-test, release]\n";
    let policy = policy_for_all_branches("sast", vec![scan_action(ScanType::Sast)]);

    let output = compile_simple(base_yaml, vec![policy]);

    assert_stages(&output, &["build", "scan-policies", "not-test", "release"]);
    assert_job_on_stage(&output, "sast-0", "scan-policies");
}

#[test]
fn dast_action_appends_dast_stage() {
    let base_yaml = "stages: [build, not-test, release]\n";
    let resolver = StaticProfileResolver::new()
        .with_site("Staging")
        .with_scanner("Quick");
    let policy = policy_for_all_branches(
        "both",
        vec![scan_action(ScanType::Sast), dast_action("Staging", "Quick")],
    );

    let output = compile_config(
        base_yaml,
        vec![policy],
        GitRef::branch("main"),
        PipelineSource::Push,
        false,
        &resolver,
    );

    assert_stages(
        &output,
        &["build", "scan-policies", "not-test", "release", "dast"],
    );
    assert_job_on_stage(&output, "dast-on-demand-0", "dast");
}

#[test]
fn build_takes_priority_over_pre_for_insertion() {
    let base_yaml = "stages: ['.pre', build, not-test, release]\n";
    let policy = policy_for_all_branches("sast", vec![scan_action(ScanType::Sast)]);

    let output = compile_simple(base_yaml, vec![policy]);

    assert_stages(
        &output,
        &[".pre", "build", "scan-policies", "not-test", "release"],
    );
}

#[test]
fn deterministic_naming_across_policies_and_repeated_runs() {
    let base_yaml = "stages: [test]\n";
    let first = policy_for_all_branches(
        "namespace policy",
        vec![scan_action(ScanType::Sast), scan_action(ScanType::SecretDetection)],
    );
    let second = policy_for_all_branches("project policy", vec![scan_action(ScanType::Sast)]);

    let run = || compile_simple(base_yaml, vec![first.clone(), second.clone()]);
    let output = run();

    assert_job_on_stage(&output, "sast-0", "test");
    assert_job_on_stage(&output, "sast-1", "test");
    assert_job_on_stage(&output, "secret-detection-0", "test");

    // Byte-identical output on a second run with the same inputs.
    assert_eq!(output.to_yaml().unwrap(), run().to_yaml().unwrap());
}

#[test]
fn merge_without_override_keeps_synthesized_rules() {
    let base_yaml = r#"
stages: [build, test]
sast-0:
  stage: build
  needs: [build-job]
  rules:
    - when: never
  retry: 2
build-job:
  stage: build
  script: [make]
"#;
    let policy = policy_for_all_branches("sast", vec![scan_action(ScanType::Sast)]);

    let output = compile_simple(base_yaml, vec![policy]);

    let job = output.job("sast-0").unwrap();
    // The user's rules/needs must not survive, or the mandated scan
    // could be silently disabled.
    let rules = job.get("rules").and_then(|v| v.as_sequence()).unwrap();
    assert_eq!(
        rules[0].get("if").and_then(|v| v.as_str()),
        Some("$CI_COMMIT_BRANCH")
    );
    assert!(job.get("needs").is_none());
    // Unrelated user keys survive.
    assert_eq!(job.get("retry").and_then(|v| v.as_u64()), Some(2));
    assert_eq!(output.job_stage("sast-0"), Some("test"));
}

#[test]
fn degraded_dast_job_on_missing_profile() {
    let base_yaml = "stages: [test]\n";
    let resolver = StaticProfileResolver::new().with_scanner("Quick");
    let policy = policy_for_all_branches("dast", vec![dast_action("Nowhere", "Quick")]);

    let output = compile_config(
        base_yaml,
        vec![policy],
        GitRef::branch("main"),
        PipelineSource::Push,
        false,
        &resolver,
    );

    let job = output.job("dast-on-demand-0").unwrap();
    assert_eq!(job.get("allow_failure").and_then(|v| v.as_bool()), Some(true));
    assert!(job.get("dast_configuration").is_none());
    let script = job.get("script").and_then(|v| v.as_sequence()).unwrap();
    assert!(script[0].as_str().unwrap().contains("Nowhere"));
}

#[test]
fn empty_base_config_gets_workflow_and_stage() {
    let policy = policy_for_all_branches("secrets", vec![scan_action(ScanType::SecretDetection)]);

    let output = compile_simple("", vec![policy]);

    assert_stages(&output, &["scan-policies"]);
    assert_job_on_stage(&output, "secret-detection-0", "scan-policies");
    let workflow = output.as_mapping().get("workflow").unwrap();
    let rules = workflow.get("rules").and_then(|v| v.as_sequence()).unwrap();
    assert_eq!(rules[0].get("when").and_then(|v| v.as_str()), Some("always"));
}

#[test]
fn invalid_policy_skipped_while_others_apply() {
    let base_yaml = "stages: [test]\n";
    let mut invalid = policy_for_all_branches("invalid", vec![scan_action(ScanType::Sast)]);
    invalid.rules = vec![policyweave::ApplicabilityRule::Pipeline(
        policyweave::BranchScope {
            branches: Some(vec!["*".into()]),
            branch_type: Some(policyweave::BranchType::Protected),
            branch_exceptions: vec![],
        },
    )];
    let valid = policy_for_all_branches("valid", vec![scan_action(ScanType::SecretDetection)]);

    let output = compile_simple(base_yaml, vec![invalid, valid]);

    // The invalid policy contributes nothing; indices start at 0 for
    // the surviving policy.
    assert!(output.job("sast-0").is_none());
    assert_job_on_stage(&output, "secret-detection-0", "test");
}

#[test]
fn ondemand_source_returns_base_unchanged() {
    let base_yaml = "stages: [build]\n";
    let policy = policy_for_all_branches("dast", vec![dast_action("Staging", "Quick")]);

    let resolver = StaticProfileResolver::new()
        .with_site("Staging")
        .with_scanner("Quick");
    let output = compile_config(
        base_yaml,
        vec![policy],
        GitRef::branch("main"),
        PipelineSource::OndemandDastScan,
        false,
        &resolver,
    );

    assert_eq!(output, PipelineConfig::from_yaml(base_yaml).unwrap());
}

#[test]
fn unknown_base_keys_pass_through_unchanged() {
    let base_yaml = r#"
stages: [test]
variables:
  GLOBAL: value
odd_directive:
  nested: [1, 2, 3]
deploy-job:
  stage: test
  script: [./deploy.sh]
  environment: production
"#;
    let policy = policy_for_all_branches("sast", vec![scan_action(ScanType::Sast)]);

    let output = compile_simple(base_yaml, vec![policy]);

    let base = PipelineConfig::from_yaml(base_yaml).unwrap();
    assert_eq!(
        output.as_mapping().get("odd_directive"),
        base.as_mapping().get("odd_directive")
    );
    assert_eq!(
        output.as_mapping().get("deploy-job"),
        base.as_mapping().get("deploy-job")
    );
    assert_eq!(
        output.as_mapping().get("variables"),
        base.as_mapping().get("variables")
    );
}

#[test]
fn malformed_base_config_aborts_compilation() {
    let base_config = PipelineConfig::from_yaml("job: scalar-definition").unwrap();
    let resolver = StaticProfileResolver::new();
    let request = CompilationRequest {
        base_config,
        git_ref: GitRef::branch("main"),
        source: PipelineSource::Push,
        policies: vec![policy_for_all_branches(
            "p",
            vec![scan_action(ScanType::Sast)],
        )],
        custom_ci_enabled: false,
        profiles: &resolver,
    };
    assert!(compile(&request).is_err());
}
