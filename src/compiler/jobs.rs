//! Scan job synthesis
//!
//! Turns the flattened scan actions into concrete job definitions with
//! deterministic names, merging carefully over any user-authored job
//! that happens to share a name.

use crate::compiler::filter::SelectedAction;
use crate::compiler::stages::{StagePlan, DAST_STAGE};
use crate::compiler::templates::{scan_rules, template_for};
use crate::core::config::PipelineConfig;
use crate::core::policy::{Action, ScanAction, ScanType};
use crate::core::request::DastProfileResolver;
use serde_yaml::{Mapping, Value};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Synthesize one job per scan action, in flattened filter order.
///
/// Job names are `<slug>-<index>` with the index counted per scan type
/// across the whole action list, so repeated compilations of the same
/// inputs always produce the same names.
pub fn synthesize(
    actions: &[SelectedAction],
    plan: &StagePlan,
    existing: &PipelineConfig,
    profiles: &dyn DastProfileResolver,
) -> Vec<(String, Mapping)> {
    let mut counters: HashMap<ScanType, usize> = HashMap::new();
    let mut jobs = Vec::new();

    for selected in actions {
        let Action::Scan(scan_action) = &selected.action else {
            continue;
        };

        let index = counters.entry(scan_action.scan).or_insert(0);
        let name = format!("{}-{}", scan_action.scan.slug(), index);
        *index += 1;

        let definition = build_job(scan_action, plan, profiles);

        let merged = match existing.job(&name) {
            Some(user_job) => {
                debug!(job = %name, "merging synthesized scan job over existing job");
                merge_without_override(user_job, &definition)
            }
            None => definition,
        };

        jobs.push((name, merged));
    }

    jobs
}

fn build_job(scan_action: &ScanAction, plan: &StagePlan, profiles: &dyn DastProfileResolver) -> Mapping {
    if scan_action.scan == ScanType::Dast {
        return build_dast_job(scan_action, profiles);
    }
    template_for(scan_action.scan).render(&plan.scan_stage)
}

fn build_dast_job(scan_action: &ScanAction, profiles: &dyn DastProfileResolver) -> Mapping {
    let site = scan_action
        .site_profile
        .as_deref()
        .and_then(|name| profiles.site_profile(name));
    let scanner = scan_action
        .scanner_profile
        .as_deref()
        .and_then(|name| profiles.scanner_profile(name));

    let (site, scanner) = match (site, scanner) {
        (Some(site), Some(scanner)) => (site, scanner),
        (None, _) => {
            let name = scan_action.site_profile.as_deref().unwrap_or("(none)");
            warn!(profile = name, "DAST site profile not found, emitting degraded job");
            return degraded_dast_job("site", name);
        }
        (_, None) => {
            let name = scan_action.scanner_profile.as_deref().unwrap_or("(none)");
            warn!(profile = name, "DAST scanner profile not found, emitting degraded job");
            return degraded_dast_job("scanner", name);
        }
    };

    let mut job = template_for(ScanType::Dast).render(DAST_STAGE);
    let mut configuration = Mapping::new();
    configuration.insert(Value::String("site_profile".into()), Value::String(site));
    configuration.insert(
        Value::String("scanner_profile".into()),
        Value::String(scanner),
    );
    job.insert(
        Value::String("dast_configuration".into()),
        Value::Mapping(configuration),
    );
    job
}

/// A job that fails loudly (but alone) when a DAST profile reference
/// cannot be resolved; the pipeline itself still runs.
fn degraded_dast_job(kind: &str, profile: &str) -> Mapping {
    let mut job = Mapping::new();
    job.insert(
        Value::String("stage".into()),
        Value::String(DAST_STAGE.into()),
    );
    job.insert(Value::String("allow_failure".into()), Value::Bool(true));
    job.insert(
        Value::String("script".into()),
        Value::Sequence(vec![Value::String(format!(
            "echo \"DAST {} profile '{}' could not be found\" && false",
            kind, profile
        ))]),
    );
    job.insert(Value::String("rules".into()), scan_rules());
    job
}

/// Merge a synthesized job over a pre-existing user job with the same
/// name. Template keys win; the user's `rules` and `needs` are dropped
/// even where the template has no replacement, so a name collision can
/// never disable the mandated scan. Unrelated user keys survive.
fn merge_without_override(user_job: &Mapping, template_job: &Mapping) -> Mapping {
    let mut merged = user_job.clone();
    merged.remove("rules");
    merged.remove("needs");
    for (key, value) in template_job {
        merged.insert(key.clone(), value.clone());
    }
    merged
}
