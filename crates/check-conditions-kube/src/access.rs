//! Cluster access capability
//!
//! The scanner only needs two things from a cluster: the list of resource
//! types it serves and the objects of one type. Everything else goes through
//! this trait so the scan pipeline can run against `MockClusterAccess` in tests.

use async_trait::async_trait;
use check_conditions_core::{GenericObject, ResourceTypeDescriptor};

use crate::error::Result;

#[async_trait]
pub trait ClusterAccess: Send + Sync {
    /// All resource types the API server advertises, unfiltered
    async fn enumerate_resource_types(&self) -> Result<Vec<ResourceTypeDescriptor>>;

    /// All objects of one type, restricted to `namespace` when given
    async fn list_objects(
        &self,
        descriptor: &ResourceTypeDescriptor,
        namespace: Option<&str>,
    ) -> Result<Vec<GenericObject>>;
}
