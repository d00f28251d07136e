//! `kube`-backed cluster access
//!
//! Discovery walks the aggregated API group list (preferred version of each
//! group plus the first core version) and lists objects through the dynamic
//! API, one page at a time.

use async_trait::async_trait;
use futures::future::join_all;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::APIResourceList;
use kube::Client;
use kube::api::{Api, DynamicObject, ListParams};
use kube::discovery::ApiResource;
use std::time::Duration;

use check_conditions_core::{GenericObject, ResourceTypeDescriptor};

use crate::access::ClusterAccess;
use crate::error::{KubeError, Result};

/// Objects requested per list call
pub const LIST_PAGE_SIZE: u32 = 500;

/// Pause between connection attempts
pub const CONNECT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Cluster access through a `kube::Client`
#[derive(Clone)]
pub struct KubeAccess {
    client: Client,
}

impl KubeAccess {
    /// Connect using the default kubeconfig and probe the API server.
    ///
    /// Up to `retry_count` attempts are made; zero retries forever.
    pub async fn connect(retry_count: u32) -> Result<Self> {
        Self::connect_with_delay(retry_count, CONNECT_RETRY_DELAY).await
    }

    pub async fn connect_with_delay(retry_count: u32, delay: Duration) -> Result<Self> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match Self::try_connect().await {
                Ok(access) => return Ok(access),
                Err(e) if retry_count == 0 || attempt < retry_count => {
                    tracing::warn!(attempt, error = %e, "connection to API server failed, retrying");
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    return Err(KubeError::ConnectionFailed {
                        attempts: attempt,
                        message: e.to_string(),
                    });
                }
            }
        }
    }

    async fn try_connect() -> Result<Self> {
        let client = Client::try_default().await?;
        let info = client.apiserver_version().await?;
        tracing::info!(version = %info.git_version, "connected to API server");
        Ok(Self { client })
    }
}

#[async_trait]
impl ClusterAccess for KubeAccess {
    async fn enumerate_resource_types(&self) -> Result<Vec<ResourceTypeDescriptor>> {
        let discovery_failed = |e: kube::Error| KubeError::Discovery(e.to_string());

        let groups = self.client.list_api_groups().await.map_err(discovery_failed)?;
        let core_versions = self
            .client
            .list_core_api_versions()
            .await
            .map_err(discovery_failed)?;

        let mut lists = Vec::new();
        if let Some(version) = core_versions.versions.first() {
            lists.push(
                self.client
                    .list_core_api_resources(version)
                    .await
                    .map_err(discovery_failed)?,
            );
        }

        let group_versions: Vec<&str> = groups
            .groups
            .iter()
            .filter_map(|g| g.preferred_version.as_ref())
            .map(|v| v.group_version.as_str())
            .collect();

        let results = join_all(group_versions.iter().map(|gv| async move {
            (*gv, self.client.list_api_group_resources(gv).await)
        }))
        .await;

        for (group_version, result) in results {
            match result {
                Ok(list) => lists.push(list),
                // An orphaned APIService fails here; the rest of the cluster is still scanned.
                Err(e) => tracing::warn!(
                    group_version,
                    error = %e,
                    "API group discovery failed, the server may have an orphaned API service"
                ),
            }
        }

        Ok(lists.iter().flat_map(descriptors_from_list).collect())
    }

    async fn list_objects(
        &self,
        descriptor: &ResourceTypeDescriptor,
        namespace: Option<&str>,
    ) -> Result<Vec<GenericObject>> {
        let resource = api_resource(descriptor);
        let api: Api<DynamicObject> = match namespace {
            Some(ns) if descriptor.namespaced => {
                Api::namespaced_with(self.client.clone(), ns, &resource)
            }
            _ => Api::all_with(self.client.clone(), &resource),
        };

        let mut objects = Vec::new();
        let mut params = ListParams::default().limit(LIST_PAGE_SIZE);
        loop {
            let page = api.list(&params).await?;
            for item in page.items {
                objects.push(GenericObject::from_value(serde_json::to_value(&item)?));
            }
            match page.metadata.continue_ {
                Some(token) if !token.is_empty() => {
                    params = params.continue_token(&token);
                }
                _ => break,
            }
        }
        Ok(objects)
    }
}

fn api_resource(descriptor: &ResourceTypeDescriptor) -> ApiResource {
    ApiResource {
        group: descriptor.group.clone(),
        version: descriptor.version.clone(),
        api_version: descriptor.api_version(),
        kind: descriptor.kind.clone(),
        plural: descriptor.name.clone(),
    }
}

fn split_group_version(group_version: &str) -> (&str, &str) {
    match group_version.split_once('/') {
        Some((group, version)) => (group, version),
        None => ("", group_version),
    }
}

/// Resource types of one discovery document
pub fn descriptors_from_list(list: &APIResourceList) -> Vec<ResourceTypeDescriptor> {
    let (group, version) = split_group_version(&list.group_version);
    list.resources
        .iter()
        .map(|r| ResourceTypeDescriptor::new(group, version, &r.name, &r.kind, r.namespaced))
        .collect()
}
