//! policyweave - compiles security policy scan requirements into CI
//! pipeline configuration

pub mod cli;
pub mod compiler;
pub mod core;

// Re-export commonly used types
pub use compiler::{aggregate, compile, inject_custom, plan_stages, select_actions, synthesize};
pub use crate::core::{
    Action, ApplicabilityRule, BranchScope, BranchType, CompilationRequest, ConfigError,
    DastProfileResolver, GitRef, NamespacePolicies, PipelineConfig, PipelineSource, Policy,
    PolicyError, ScanAction, ScanType, StaticProfileResolver,
};
