//! Security policy document model
//!
//! Policies arrive already fetched from their backing repositories; this
//! module models their structured form and the per-policy validation the
//! applicability filter relies on.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::path::Path;
use thiserror::Error;

/// Maximum number of actions a single policy may declare
pub const MAX_ACTIONS_PER_POLICY: usize = 10;

/// Maximum number of actions of the same scan type a single policy may declare
pub const MAX_ACTIONS_PER_SCAN_TYPE: usize = 5;

/// Structural validation errors for a single policy document
///
/// These are always absorbed locally: an invalid policy is skipped and
/// the rest of the compilation proceeds untouched.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PolicyError {
    #[error("unrecognized rule type")]
    UnknownRuleType,

    #[error("rule combines `branches` with `branch_type`")]
    ConflictingBranchKeys,

    #[error("policy declares {0} actions (limit {MAX_ACTIONS_PER_POLICY})")]
    TooManyActions(usize),

    #[error("policy declares {count} `{scan}` actions (limit {MAX_ACTIONS_PER_SCAN_TYPE})")]
    TooManyOfScanType { scan: ScanType, count: usize },
}

/// The closed set of scan types a policy can mandate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanType {
    Sast,
    SecretDetection,
    DependencyScanning,
    ContainerScanning,
    Dast,
}

impl ScanType {
    /// Slug used to build deterministic job names (`<slug>-<index>`)
    pub fn slug(&self) -> &'static str {
        match self {
            ScanType::Sast => "sast",
            ScanType::SecretDetection => "secret-detection",
            ScanType::DependencyScanning => "dependency-scanning",
            ScanType::ContainerScanning => "container-scanning",
            ScanType::Dast => "dast-on-demand",
        }
    }
}

impl std::fmt::Display for ScanType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ScanType::Sast => "sast",
            ScanType::SecretDetection => "secret_detection",
            ScanType::DependencyScanning => "dependency_scanning",
            ScanType::ContainerScanning => "container_scanning",
            ScanType::Dast => "dast",
        };
        write!(f, "{}", name)
    }
}

/// Branch class a rule can target instead of explicit patterns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BranchType {
    All,
    Default,
    Protected,
}

/// How the pipeline under compilation was triggered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineSource {
    Push,
    Web,
    Api,
    Trigger,
    MergeRequestEvent,
    Schedule,
    /// An already-running on-demand scan; must never re-trigger policy
    /// compilation on top of itself
    OndemandDastScan,
}

impl PipelineSource {
    /// Whether this is a scheduled-run context
    pub fn is_scheduled(&self) -> bool {
        matches!(self, PipelineSource::Schedule)
    }
}

/// The ref a pipeline is being compiled for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitRef {
    /// Short ref name, e.g. `main`
    pub name: String,
    pub is_tag: bool,
    pub is_default: bool,
    pub is_protected: bool,
}

impl GitRef {
    /// A plain branch ref
    pub fn branch(name: &str) -> Self {
        Self {
            name: name.to_string(),
            is_tag: false,
            is_default: false,
            is_protected: false,
        }
    }

    /// A tag ref (never triggers policy-mandated scans)
    pub fn tag(name: &str) -> Self {
        Self {
            name: name.to_string(),
            is_tag: true,
            is_default: false,
            is_protected: false,
        }
    }

    pub fn with_default(mut self) -> Self {
        self.is_default = true;
        self
    }

    pub fn with_protected(mut self) -> Self {
        self.is_protected = true;
        self
    }
}

/// Branch targeting shared by pipeline and schedule rules
///
/// `branches` (wildcard patterns) and `branch_type` are mutually
/// exclusive; declaring both is a structural validation error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BranchScope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branches: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch_type: Option<BranchType>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub branch_exceptions: Vec<String>,
}

impl BranchScope {
    fn validate(&self) -> Result<(), PolicyError> {
        if self.branches.is_some() && self.branch_type.is_some() {
            return Err(PolicyError::ConflictingBranchKeys);
        }
        Ok(())
    }

    /// Whether this scope covers the given branch ref
    ///
    /// A scope with neither `branches` nor `branch_type` covers every
    /// branch. Exceptions are checked first and always win.
    pub fn covers(&self, git_ref: &GitRef) -> bool {
        if self
            .branch_exceptions
            .iter()
            .any(|pattern| branch_pattern_matches(pattern, &git_ref.name))
        {
            return false;
        }

        if let Some(branches) = &self.branches {
            return branches
                .iter()
                .any(|pattern| branch_pattern_matches(pattern, &git_ref.name));
        }

        match self.branch_type {
            Some(BranchType::All) | None => true,
            Some(BranchType::Default) => git_ref.is_default,
            Some(BranchType::Protected) => git_ref.is_protected,
        }
    }
}

/// One applicability condition of a policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ApplicabilityRule {
    /// Applies to ordinary (non-scheduled) pipeline runs
    Pipeline(BranchScope),

    /// Applies only to scheduled runs
    Schedule(BranchScope),

    /// Any rule type this build does not recognise; rejected during
    /// structural validation
    #[serde(untagged)]
    Unknown(Value),
}

impl ApplicabilityRule {
    fn validate(&self) -> Result<(), PolicyError> {
        match self {
            ApplicabilityRule::Pipeline(scope) | ApplicabilityRule::Schedule(scope) => {
                scope.validate()
            }
            ApplicabilityRule::Unknown(_) => Err(PolicyError::UnknownRuleType),
        }
    }

    /// Whether this rule matches the compilation context
    pub fn matches(&self, git_ref: &GitRef, source: PipelineSource) -> bool {
        match self {
            ApplicabilityRule::Pipeline(scope) => !source.is_scheduled() && scope.covers(git_ref),
            ApplicabilityRule::Schedule(scope) => source.is_scheduled() && scope.covers(git_ref),
            ApplicabilityRule::Unknown(_) => false,
        }
    }
}

/// A scan mandated by a policy, plus any DAST profile references
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanAction {
    pub scan: ScanType,

    /// Human-readable name of a DAST site profile, resolved externally
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site_profile: Option<String>,

    /// Human-readable name of a DAST scanner profile, resolved externally
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scanner_profile: Option<String>,
}

/// One mandated effect of a policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "scan", rename_all = "snake_case")]
pub enum Action {
    /// Inject a raw CI fragment into the reserved policy stages
    Custom { ci_configuration: String },

    /// Run one of the built-in scanners
    #[serde(untagged)]
    Scan(ScanAction),
}

impl Action {
    /// The scan type, for scan actions
    pub fn scan_type(&self) -> Option<ScanType> {
        match self {
            Action::Scan(scan) => Some(scan.scan),
            Action::Custom { .. } => None,
        }
    }
}

/// One security policy document, already parsed into structured form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    #[serde(default)]
    pub name: String,

    /// Namespace or project the policy was declared on; used only for
    /// ordering and diagnostics, normally filled in by the aggregator
    #[serde(default)]
    pub origin: String,

    #[serde(default)]
    pub rules: Vec<ApplicabilityRule>,

    #[serde(default)]
    pub actions: Vec<Action>,
}

impl Policy {
    /// True if every rule is schedule-only
    ///
    /// Schedule-only policies never affect regular pipelines.
    pub fn scheduled(&self) -> bool {
        !self.rules.is_empty()
            && self
                .rules
                .iter()
                .all(|rule| matches!(rule, ApplicabilityRule::Schedule(_)))
    }

    /// Structural validation: unknown rule types, conflicting branch
    /// keys, and action-count limits
    pub fn validate(&self) -> Result<(), PolicyError> {
        for rule in &self.rules {
            rule.validate()?;
        }
        if self.actions.len() > MAX_ACTIONS_PER_POLICY {
            return Err(PolicyError::TooManyActions(self.actions.len()));
        }
        for scan in [
            ScanType::Sast,
            ScanType::SecretDetection,
            ScanType::DependencyScanning,
            ScanType::ContainerScanning,
            ScanType::Dast,
        ] {
            let count = self
                .actions
                .iter()
                .filter(|action| action.scan_type() == Some(scan))
                .count();
            if count > MAX_ACTIONS_PER_SCAN_TYPE {
                return Err(PolicyError::TooManyOfScanType { scan, count });
            }
        }
        Ok(())
    }

    /// Whether at least one rule matches the compilation context
    pub fn applies_to(&self, git_ref: &GitRef, source: PipelineSource) -> bool {
        self.rules.iter().any(|rule| rule.matches(git_ref, source))
    }
}

/// Load policies from a YAML file
///
/// Accepts either a top-level sequence of policies or a mapping with a
/// `scan_execution_policy` key, the shape policy repositories use.
pub fn load_policies<P: AsRef<Path>>(path: P) -> anyhow::Result<Vec<Policy>> {
    let content = std::fs::read_to_string(path)?;
    policies_from_yaml(&content)
}

/// Parse policies from a YAML string
pub fn policies_from_yaml(yaml: &str) -> anyhow::Result<Vec<Policy>> {
    let value: Value = serde_yaml::from_str(yaml)?;
    let policies = match value {
        Value::Sequence(_) => serde_yaml::from_value(value)?,
        Value::Mapping(mut mapping) => {
            match mapping.remove(Value::String("scan_execution_policy".into())) {
                Some(list) => serde_yaml::from_value(list)?,
                None => anyhow::bail!("policy document has no `scan_execution_policy` key"),
            }
        }
        Value::Null => Vec::new(),
        _ => anyhow::bail!("policy document is neither a sequence nor a mapping"),
    };
    Ok(policies)
}

/// Match a branch name against a wildcard pattern (`*` matches any run
/// of characters; everything else is literal)
pub fn branch_pattern_matches(pattern: &str, name: &str) -> bool {
    if !pattern.contains('*') {
        return pattern == name;
    }
    let escaped = regex::escape(pattern).replace(r"\*", ".*");
    match Regex::new(&format!("^{}$", escaped)) {
        Ok(re) => re.is_match(name),
        Err(_) => false,
    }
}
