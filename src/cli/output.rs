//! CLI output formatting

use crate::core::policy::{Action, Policy};
use console::Emoji;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "!");

/// One-line description of a policy for listings
pub fn format_policy_summary(policy: &Policy) -> String {
    let name = if policy.name.is_empty() {
        "(unnamed)"
    } else {
        &policy.name
    };
    let origin = if policy.origin.is_empty() {
        "project".to_string()
    } else {
        policy.origin.clone()
    };
    format!(
        "{} [{}] - {} rule(s), {} action(s)",
        style(name).bold(),
        style(origin).dim(),
        policy.rules.len(),
        policy.actions.len()
    )
}

/// One-line description of an action for listings
pub fn format_action(action: &Action) -> String {
    match action {
        Action::Scan(scan) => format!("scan: {}", style(scan.scan).cyan()),
        Action::Custom { ci_configuration } => {
            let jobs = ci_configuration
                .lines()
                .filter(|line| !line.starts_with([' ', '\t', '#']) && line.contains(':'))
                .count();
            format!("custom CI fragment ({} top-level entries)", jobs)
        }
    }
}
