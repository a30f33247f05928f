//! Policy aggregation across the namespace ancestry
//!
//! Aggregation order is what makes job naming deterministic: indices in
//! `compiler::jobs` follow this order exactly.

use crate::core::policy::Policy;
use crate::core::request::NamespacePolicies;
use tracing::debug;

/// Collect policies from the namespace chain and the project itself.
///
/// `namespace_chain` runs from the project's immediate parent up to the
/// root. The output is ordered root-most namespace FIRST, then each
/// nearer namespace, with the project's own policies LAST. Nothing is
/// deduplicated: identical policies from different namespaces each
/// contribute independently. Disabled namespaces contribute nothing.
pub fn aggregate(
    project_policies: Vec<Policy>,
    namespace_chain: Vec<NamespacePolicies>,
) -> Vec<Policy> {
    let mut aggregated = Vec::new();

    for namespace in namespace_chain.into_iter().rev() {
        if !namespace.enabled {
            debug!(origin = %namespace.origin, "namespace policy feature disabled, skipping");
            continue;
        }
        for mut policy in namespace.policies {
            policy.origin = namespace.origin.clone();
            aggregated.push(policy);
        }
    }

    aggregated.extend(project_policies);
    aggregated
}
