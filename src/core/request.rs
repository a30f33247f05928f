//! Compilation request and collaborator capabilities
//!
//! Everything the compiler needs is handed over up front: policies are
//! already fetched, feature gates are plain booleans, and DAST profile
//! lookup is an injected capability. The compiler never reaches out to
//! anything itself.

use crate::core::config::PipelineConfig;
use crate::core::policy::{GitRef, PipelineSource, Policy};
use std::collections::HashMap;

/// DAST profile lookup capability
///
/// Provided by an external collaborator; the compiler only cares about
/// found vs. not found plus the canonical profile name.
pub trait DastProfileResolver {
    /// Resolve a site profile by its human-readable name
    fn site_profile(&self, name: &str) -> Option<String>;

    /// Resolve a scanner profile by its human-readable name
    fn scanner_profile(&self, name: &str) -> Option<String>;
}

/// Map-backed resolver used by the CLI and tests
#[derive(Debug, Clone, Default)]
pub struct StaticProfileResolver {
    sites: HashMap<String, String>,
    scanners: HashMap<String, String>,
}

impl StaticProfileResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_site(mut self, name: &str) -> Self {
        self.sites.insert(name.to_string(), name.to_string());
        self
    }

    pub fn with_scanner(mut self, name: &str) -> Self {
        self.scanners.insert(name.to_string(), name.to_string());
        self
    }
}

impl DastProfileResolver for StaticProfileResolver {
    fn site_profile(&self, name: &str) -> Option<String> {
        self.sites.get(name).cloned()
    }

    fn scanner_profile(&self, name: &str) -> Option<String> {
        self.scanners.get(name).cloned()
    }
}

/// One namespace in the project's ancestry, paired with its policies
///
/// A namespace without the security-policy feature contributes an empty
/// policy set; that is a no-op, not an error.
#[derive(Debug, Clone)]
pub struct NamespacePolicies {
    /// Namespace path, recorded as each policy's origin
    pub origin: String,

    /// Whether the security-policy feature is licensed/enabled here
    pub enabled: bool,

    pub policies: Vec<Policy>,
}

impl NamespacePolicies {
    pub fn new(origin: &str, policies: Vec<Policy>) -> Self {
        Self {
            origin: origin.to_string(),
            enabled: true,
            policies,
        }
    }

    /// A namespace whose security-policy feature is not enabled
    pub fn disabled(origin: &str) -> Self {
        Self {
            origin: origin.to_string(),
            enabled: false,
            policies: Vec::new(),
        }
    }
}

/// Immutable input to one compilation call
///
/// `policies` is the already-aggregated list, outermost namespace first
/// (see `compiler::aggregate`).
pub struct CompilationRequest<'a> {
    pub base_config: PipelineConfig,
    pub git_ref: GitRef,
    pub source: PipelineSource,
    pub policies: Vec<Policy>,

    /// Namespace-level custom-CI toggle; fail-closed when false
    pub custom_ci_enabled: bool,

    pub profiles: &'a dyn DastProfileResolver,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_resolver() {
        let resolver = StaticProfileResolver::new()
            .with_site("Staging")
            .with_scanner("Quick");
        assert_eq!(resolver.site_profile("Staging"), Some("Staging".into()));
        assert_eq!(resolver.site_profile("Production"), None);
        assert_eq!(resolver.scanner_profile("Quick"), Some("Quick".into()));
        assert_eq!(resolver.scanner_profile("Deep"), None);
    }

    #[test]
    fn test_disabled_namespace_has_no_policies() {
        let ns = NamespacePolicies::disabled("group/subgroup");
        assert!(!ns.enabled);
        assert!(ns.policies.is_empty());
    }
}
