//! Stage planning
//!
//! Computes the final stage list without ever removing or reordering
//! stages the user already declared; missing stages are inserted at the
//! documented positions only.

use tracing::debug;

/// Fallback stage for ordinary scan jobs when no `test` stage exists
pub const SCAN_POLICIES_STAGE: &str = "scan-policies";

/// Reserved stages owned by custom-CI policy injection
pub const POLICY_PRE_STAGE: &str = ".pipeline-policy-pre";
pub const POLICY_TEST_STAGE: &str = ".pipeline-policy-test";
pub const POLICY_POST_STAGE: &str = ".pipeline-policy-post";

pub const RESERVED_STAGES: [&str; 3] = [POLICY_PRE_STAGE, POLICY_TEST_STAGE, POLICY_POST_STAGE];

/// Stage DAST jobs conventionally run on, always last
pub const DAST_STAGE: &str = "dast";

/// The planned stage layout for one compilation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagePlan {
    /// Final stage list to overlay onto the output configuration
    pub stages: Vec<String>,

    /// Stage ordinary (non-DAST) scan jobs are placed on
    pub scan_stage: String,
}

/// Compute the final stage list.
///
/// * Scan jobs go on `test` when it exists; otherwise `scan-policies`
///   is inserted after `build`, else after `.pre`, else first.
/// * Custom CI guarantees the three reserved stages:
///   `.pipeline-policy-pre` first overall, `.pipeline-policy-test`
///   positioned by the same rule as `scan-policies` (independently),
///   `.pipeline-policy-post` last overall.
/// * A DAST action appends a `dast` stage after everything else.
pub fn plan_stages(
    existing: &[String],
    needs_scan_stage: bool,
    needs_dast_stage: bool,
    needs_custom_ci: bool,
) -> StagePlan {
    let mut stages: Vec<String> = existing.to_vec();

    let scan_stage = if stages.iter().any(|s| s == "test") {
        "test".to_string()
    } else {
        SCAN_POLICIES_STAGE.to_string()
    };

    if needs_scan_stage
        && scan_stage == SCAN_POLICIES_STAGE
        && !stages.iter().any(|s| s == SCAN_POLICIES_STAGE)
    {
        let at = insertion_point(&stages);
        debug!(position = at, "inserting scan-policies stage");
        stages.insert(at, SCAN_POLICIES_STAGE.to_string());
    }

    if needs_custom_ci {
        if !stages.iter().any(|s| s == POLICY_TEST_STAGE) {
            let at = insertion_point(&stages);
            stages.insert(at, POLICY_TEST_STAGE.to_string());
        }
        if !stages.iter().any(|s| s == POLICY_PRE_STAGE) {
            stages.insert(0, POLICY_PRE_STAGE.to_string());
        }
        if !stages.iter().any(|s| s == POLICY_POST_STAGE) {
            stages.push(POLICY_POST_STAGE.to_string());
        }
    }

    if needs_dast_stage && !stages.iter().any(|s| s == DAST_STAGE) {
        stages.push(DAST_STAGE.to_string());
    }

    StagePlan { stages, scan_stage }
}

/// Position for an inserted test-phase stage: immediately after `build`
/// if present, else immediately after `.pre`, else the very front.
fn insertion_point(stages: &[String]) -> usize {
    if let Some(idx) = stages.iter().position(|s| s == "build") {
        return idx + 1;
    }
    if let Some(idx) = stages.iter().position(|s| s == ".pre") {
        return idx + 1;
    }
    0
}
