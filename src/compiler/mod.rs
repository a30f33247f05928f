//! Policy compilation pipeline
//!
//! One synchronous pass: aggregate, filter, plan stages, then
//! synthesize scan jobs and inject custom fragments into the merged
//! output. Every function here is pure over the request; identical
//! inputs produce identical output.

pub mod aggregate;
pub mod custom;
pub mod filter;
pub mod jobs;
pub mod stages;
pub mod templates;

pub use aggregate::aggregate;
pub use custom::{inject_custom, CustomInjection};
pub use filter::{select_actions, SelectedAction};
pub use jobs::synthesize;
pub use stages::{
    plan_stages, StagePlan, DAST_STAGE, POLICY_POST_STAGE, POLICY_PRE_STAGE, POLICY_TEST_STAGE,
    RESERVED_STAGES, SCAN_POLICIES_STAGE,
};
pub use templates::{template_for, ScanTemplate};

use crate::core::config::{ConfigError, PipelineConfig};
use crate::core::policy::ScanType;
use crate::core::request::CompilationRequest;
use serde_yaml::{Mapping, Value};
use tracing::debug;

/// Compile a request into the merged pipeline configuration.
///
/// When no action applies the base configuration is returned unchanged,
/// key for key. The only fatal condition is a malformed base config;
/// every policy-side problem is absorbed locally.
pub fn compile(request: &CompilationRequest) -> Result<PipelineConfig, ConfigError> {
    request.base_config.validate()?;

    let selected = select_actions(&request.policies, &request.git_ref, request.source);
    if selected.is_empty() {
        debug!("no applicable actions, returning base configuration unchanged");
        return Ok(request.base_config.clone());
    }

    let injection = inject_custom(&selected, &request.base_config, request.custom_ci_enabled);

    let has_scan = selected
        .iter()
        .any(|s| s.action.scan_type().is_some());
    let has_dast = selected
        .iter()
        .any(|s| s.action.scan_type() == Some(ScanType::Dast));

    // Only custom actions and the toggle is off (or every fragment was
    // invalid): nothing left to do.
    if !has_scan && !injection.active() {
        debug!("no scan jobs and no active custom injection, returning base unchanged");
        return Ok(request.base_config.clone());
    }

    let existing_stages = request.base_config.stages().unwrap_or_default();
    let plan = plan_stages(&existing_stages, has_scan, has_dast, injection.active());

    let synthesized = synthesize(
        &selected,
        &plan,
        &request.base_config,
        request.profiles,
    );

    let mut output = request.base_config.clone();

    // An empty pipeline would otherwise never schedule the mandated
    // jobs; force the workflow open.
    if !request.base_config.has_stages_key() && !output.contains_key("workflow") {
        output.insert_value("workflow", always_workflow());
    }

    output.set_stages(plan.stages);

    for name in &injection.deletions {
        output.remove(name);
    }
    for (name, definition) in synthesized {
        output.insert_job(&name, definition);
    }
    for (name, definition) in injection.jobs {
        output.insert_job(&name, definition);
    }

    Ok(output)
}

fn always_workflow() -> Value {
    let mut rule = Mapping::new();
    rule.insert(Value::String("when".into()), Value::String("always".into()));
    let mut workflow = Mapping::new();
    workflow.insert(
        Value::String("rules".into()),
        Value::Sequence(vec![Value::Mapping(rule)]),
    );
    Value::Mapping(workflow)
}
