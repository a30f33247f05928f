//! Custom CI fragment injection
//!
//! Policies may carry raw pipeline fragments destined for the three
//! reserved policy stages. The reserved stages are policy-owned: user
//! jobs declared on them are evicted once injection is active. The
//! whole component fails closed when the namespace toggle is off.

use crate::compiler::filter::SelectedAction;
use crate::compiler::stages::RESERVED_STAGES;
use crate::core::config::PipelineConfig;
use crate::core::policy::Action;
use serde_yaml::{Mapping, Value};
use tracing::{debug, warn};

/// Outcome of custom-CI injection
#[derive(Debug, Clone, Default)]
pub struct CustomInjection {
    /// Jobs to add to the output configuration, in action order
    pub jobs: Vec<(String, Mapping)>,

    /// User jobs to delete because they sit on a reserved stage
    pub deletions: Vec<String>,
}

impl CustomInjection {
    /// Whether injection contributes anything to this compilation
    pub fn active(&self) -> bool {
        !self.jobs.is_empty()
    }
}

/// Parse and validate the custom actions' fragments.
///
/// Each invalid fragment (unparseable, or declaring a job outside the
/// reserved stages) is skipped on its own; other actions still apply.
pub fn inject_custom(
    actions: &[SelectedAction],
    existing: &PipelineConfig,
    custom_ci_enabled: bool,
) -> CustomInjection {
    let mut injection = CustomInjection::default();

    if !custom_ci_enabled {
        debug!("custom CI disabled for namespace, skipping custom actions");
        return injection;
    }

    for selected in actions {
        let Action::Custom { ci_configuration } = &selected.action else {
            continue;
        };
        match fragment_jobs(ci_configuration) {
            Ok(jobs) => injection.jobs.extend(jobs),
            Err(reason) => {
                warn!(
                    policy_index = selected.policy_index,
                    reason = %reason,
                    "skipping invalid custom CI fragment"
                );
            }
        }
    }

    if injection.active() {
        for (name, _) in existing.jobs() {
            if let Some(stage) = existing.job_stage(name) {
                if RESERVED_STAGES.contains(&stage) {
                    debug!(job = name, stage, "evicting user job from reserved stage");
                    injection.deletions.push(name.to_string());
                }
            }
        }
    }

    injection
}

/// Extract the jobs of one fragment, enforcing reserved-stage placement.
///
/// A fragment-level `stages` key is discarded: policy authors control
/// job placement, never stage declarations.
fn fragment_jobs(fragment: &str) -> Result<Vec<(String, Mapping)>, String> {
    let mapping: Mapping =
        serde_yaml::from_str(fragment).map_err(|e| format!("fragment is not a mapping: {}", e))?;

    let mut jobs = Vec::new();
    for (key, value) in mapping {
        let Value::String(name) = key else {
            return Err("fragment has a non-string job name".to_string());
        };
        if name == "stages" {
            continue;
        }
        let Value::Mapping(job) = value else {
            return Err(format!("job `{}` is not a mapping", name));
        };
        match job.get("stage").and_then(|v| v.as_str()) {
            Some(stage) if RESERVED_STAGES.contains(&stage) => {}
            Some(stage) => {
                return Err(format!(
                    "job `{}` declares stage `{}` outside the reserved policy stages",
                    name, stage
                ));
            }
            None => {
                return Err(format!("job `{}` declares no reserved stage", name));
            }
        }
        jobs.push((name, job));
    }
    Ok(jobs)
}
