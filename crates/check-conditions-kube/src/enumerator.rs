//! Resource enumeration
//!
//! Turns the advertised resource types into scan jobs. Subresources such as
//! `pods/log` and pseudo-resources which cannot be listed are dropped.

use check_conditions_core::ResourceTypeDescriptor;

use crate::access::ClusterAccess;
use crate::error::Result;

/// Resource types that carry no objects worth listing
pub const DENY_LIST: &[&str] = &[
    "bindings",
    "tokenreviews",
    "selfsubjectreviews",
    "selfsubjectaccessreviews",
    "selfsubjectrulesreviews",
    "localsubjectaccessreviews",
    "subjectaccessreviews",
    "componentstatuses",
];

/// One unit of work for the worker pool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanJob {
    pub descriptor: ResourceTypeDescriptor,
}

/// Whether a resource type should be scanned at all
pub fn is_scannable(descriptor: &ResourceTypeDescriptor, namespace: Option<&str>) -> bool {
    if descriptor.name.contains('/') || DENY_LIST.contains(&descriptor.name.as_str()) {
        return false;
    }
    // Cluster-scoped types are skipped when a namespace was requested.
    namespace.is_none() || descriptor.namespaced
}

pub fn jobs_from_types(
    types: Vec<ResourceTypeDescriptor>,
    namespace: Option<&str>,
) -> Vec<ScanJob> {
    types
        .into_iter()
        .filter(|d| is_scannable(d, namespace))
        .map(|descriptor| ScanJob { descriptor })
        .collect()
}

/// Discover resource types and build the job list for one cycle
pub async fn enumerate(access: &dyn ClusterAccess, namespace: Option<&str>) -> Result<Vec<ScanJob>> {
    let types = access.enumerate_resource_types().await?;
    let advertised = types.len();
    let jobs = jobs_from_types(types, namespace);
    tracing::debug!(advertised, jobs = jobs.len(), "enumerated resource types");
    Ok(jobs)
}
