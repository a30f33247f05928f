//! Per-scan-type job templates
//!
//! Templates are data: adding a scan type means adding a constant here
//! and a variant to `ScanType`, nothing else. The synthesizer turns a
//! template into a concrete job definition.

use crate::core::policy::ScanType;
use serde_yaml::{Mapping, Value};

/// Canonical job shape for one scan type
#[derive(Debug, Clone, Copy)]
pub struct ScanTemplate {
    pub image: &'static str,
    pub script: &'static [&'static str],
    pub variables: &'static [(&'static str, &'static str)],
    /// Key under `artifacts.reports`
    pub report: &'static str,
    /// File the report artifact is written to
    pub report_path: &'static str,
}

const SAST: ScanTemplate = ScanTemplate {
    image: "registry.example.com/security-products/semgrep:latest",
    script: &["/analyzer run"],
    variables: &[("SEARCH_MAX_DEPTH", "4")],
    report: "sast",
    report_path: "gl-sast-report.json",
};

const SECRET_DETECTION: ScanTemplate = ScanTemplate {
    image: "registry.example.com/security-products/secrets:latest",
    script: &["/analyzer run"],
    variables: &[("SECRET_DETECTION_HISTORIC_SCAN", "false")],
    report: "secret_detection",
    report_path: "gl-secret-detection-report.json",
};

const DEPENDENCY_SCANNING: ScanTemplate = ScanTemplate {
    image: "registry.example.com/security-products/gemnasium:latest",
    script: &["/analyzer run"],
    variables: &[],
    report: "dependency_scanning",
    report_path: "gl-dependency-scanning-report.json",
};

const CONTAINER_SCANNING: ScanTemplate = ScanTemplate {
    image: "registry.example.com/security-products/container-scanning:latest",
    script: &["gtcs scan"],
    variables: &[("CS_SCHEMA_MODEL", "15")],
    report: "container_scanning",
    report_path: "gl-container-scanning-report.json",
};

const DAST: ScanTemplate = ScanTemplate {
    image: "registry.example.com/security-products/dast:latest",
    script: &["/analyze"],
    variables: &[],
    report: "dast",
    report_path: "gl-dast-report.json",
};

/// Look up the template for a scan type
pub fn template_for(scan: ScanType) -> &'static ScanTemplate {
    match scan {
        ScanType::Sast => &SAST,
        ScanType::SecretDetection => &SECRET_DETECTION,
        ScanType::DependencyScanning => &DEPENDENCY_SCANNING,
        ScanType::ContainerScanning => &CONTAINER_SCANNING,
        ScanType::Dast => &DAST,
    }
}

/// Rules every synthesized scan job carries: run whenever the pipeline
/// is for a branch. Never inherited from a user-authored job.
pub fn scan_rules() -> Value {
    let mut rule = Mapping::new();
    rule.insert(
        Value::String("if".into()),
        Value::String("$CI_COMMIT_BRANCH".into()),
    );
    Value::Sequence(vec![Value::Mapping(rule)])
}

impl ScanTemplate {
    /// Render this template into a job definition on the given stage
    pub fn render(&self, stage: &str) -> Mapping {
        let mut job = Mapping::new();
        job.insert(
            Value::String("stage".into()),
            Value::String(stage.to_string()),
        );
        job.insert(
            Value::String("image".into()),
            Value::String(self.image.to_string()),
        );
        job.insert(
            Value::String("script".into()),
            Value::Sequence(
                self.script
                    .iter()
                    .map(|line| Value::String(line.to_string()))
                    .collect(),
            ),
        );
        if !self.variables.is_empty() {
            let mut variables = Mapping::new();
            for (key, value) in self.variables {
                variables.insert(
                    Value::String(key.to_string()),
                    Value::String(value.to_string()),
                );
            }
            job.insert(Value::String("variables".into()), Value::Mapping(variables));
        }

        let mut reports = Mapping::new();
        reports.insert(
            Value::String(self.report.to_string()),
            Value::String(self.report_path.to_string()),
        );
        let mut artifacts = Mapping::new();
        artifacts.insert(Value::String("reports".into()), Value::Mapping(reports));
        job.insert(Value::String("artifacts".into()), Value::Mapping(artifacts));

        job.insert(Value::String("rules".into()), scan_rules());
        job
    }
}
