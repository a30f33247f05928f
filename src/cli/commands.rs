//! CLI command definitions

use crate::core::policy::PipelineSource;
use clap::Args;

/// Flags that describe the compilation context
#[derive(Debug, Args, Clone)]
pub struct RequestArgs {
    /// Ref the pipeline is compiled for
    #[arg(long, default_value = "main")]
    pub git_ref: String,

    /// Treat the ref as a tag
    #[arg(long)]
    pub tag: bool,

    /// The ref is the project's default branch
    #[arg(long)]
    pub default_branch: bool,

    /// The ref is a protected branch
    #[arg(long)]
    pub protected: bool,

    /// How the pipeline was triggered
    #[arg(long, value_enum, default_value_t = PipelineSourceArg::Push)]
    pub source: PipelineSourceArg,

    /// Project-level policy file (repeatable)
    #[arg(long = "policy")]
    pub policy: Vec<String>,

    /// Namespace policy file as origin=path, immediate parent first (repeatable)
    #[arg(long = "namespace", value_parser = parse_origin_file)]
    pub namespace: Vec<(String, String)>,

    /// Namespace without the security-policy feature (repeatable)
    #[arg(long = "disabled-namespace")]
    pub disabled_namespace: Vec<String>,

    /// Enable custom-CI injection for the namespace
    #[arg(long)]
    pub custom_ci: bool,

    /// Known DAST site profile name (repeatable)
    #[arg(long = "site-profile")]
    pub site_profile: Vec<String>,

    /// Known DAST scanner profile name (repeatable)
    #[arg(long = "scanner-profile")]
    pub scanner_profile: Vec<String>,
}

/// Compile a base configuration against the applicable policies
#[derive(Debug, Args, Clone)]
pub struct CompileCommand {
    /// Path to the base pipeline YAML file
    #[arg(short, long)]
    pub file: String,

    #[command(flatten)]
    pub request: RequestArgs,

    /// Write the merged configuration to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<String>,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Validate a policy file structurally
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Path to the policy YAML file
    #[arg(short, long)]
    pub file: String,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Show which policies and actions would apply, without compiling
#[derive(Debug, Args, Clone)]
pub struct InspectCommand {
    /// Path to the base pipeline YAML file (defaults to an empty pipeline)
    #[arg(short, long)]
    pub file: Option<String>,

    #[command(flatten)]
    pub request: RequestArgs,
}

/// Pipeline source argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum PipelineSourceArg {
    Push,
    Web,
    Api,
    Trigger,
    MergeRequestEvent,
    Schedule,
    OndemandDastScan,
}

impl From<PipelineSourceArg> for PipelineSource {
    fn from(arg: PipelineSourceArg) -> Self {
        match arg {
            PipelineSourceArg::Push => PipelineSource::Push,
            PipelineSourceArg::Web => PipelineSource::Web,
            PipelineSourceArg::Api => PipelineSource::Api,
            PipelineSourceArg::Trigger => PipelineSource::Trigger,
            PipelineSourceArg::MergeRequestEvent => PipelineSource::MergeRequestEvent,
            PipelineSourceArg::Schedule => PipelineSource::Schedule,
            PipelineSourceArg::OndemandDastScan => PipelineSource::OndemandDastScan,
        }
    }
}

/// Parse origin=path pairs
pub fn parse_origin_file(s: &str) -> Result<(String, String), String> {
    let parts: Vec<&str> = s.splitn(2, '=').collect();
    if parts.len() != 2 {
        return Err(format!("Invalid origin=path pair: {}", s));
    }
    Ok((parts[0].to_string(), parts[1].to_string()))
}
