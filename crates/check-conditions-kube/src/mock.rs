//! Mock cluster access for testing
//!
//! Serves resource types and objects from memory, useful for unit tests
//! without requiring a Kubernetes cluster. Object sets can be scripted per
//! cycle: each list call of a type consumes the next scripted set, and the
//! last set is repeated once the script runs out.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use check_conditions_core::{GenericObject, ResourceTypeDescriptor};

use crate::access::ClusterAccess;
use crate::error::{KubeError, Result};

/// In-memory cluster access for testing
#[derive(Clone, Default)]
pub struct MockClusterAccess {
    state: Arc<RwLock<MockState>>,
    /// Track operation counts for assertions
    operations: Arc<RwLock<OperationCounts>>,
}

#[derive(Default)]
struct MockState {
    types: Vec<ResourceTypeDescriptor>,
    objects: HashMap<String, VecDeque<Vec<Value>>>,
    failing: HashSet<String>,
    discovery_error: Option<String>,
    list_delay: Option<Duration>,
}

/// Counts of operations performed for testing assertions
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct OperationCounts {
    pub enumerations: usize,
    pub lists: usize,
}

fn type_key(descriptor: &ResourceTypeDescriptor) -> String {
    format!("{}/{}", descriptor.api_version(), descriptor.name)
}

impl MockClusterAccess {
    /// Create a new empty mock cluster
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve a resource type with a fixed object set
    pub fn with_type(self, descriptor: ResourceTypeDescriptor, objects: Vec<Value>) -> Self {
        self.script_type(descriptor, vec![objects])
    }

    /// Serve a resource type whose objects change from one list call to the next
    pub fn script_type(self, descriptor: ResourceTypeDescriptor, cycles: Vec<Vec<Value>>) -> Self {
        {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            state.objects.insert(type_key(&descriptor), cycles.into());
            if !state.types.contains(&descriptor) {
                state.types.push(descriptor);
            }
        }
        self
    }

    /// Make listing of this type fail with a forbidden error
    pub fn with_failing_type(self, descriptor: ResourceTypeDescriptor) -> Self {
        {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            state.failing.insert(type_key(&descriptor));
            if !state.types.contains(&descriptor) {
                state.types.push(descriptor);
            }
        }
        self
    }

    /// Make discovery fail, or succeed again with `None`
    pub fn set_discovery_error(&self, message: Option<&str>) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.discovery_error = message.map(String::from);
    }

    /// Delay every list call, for timeout tests
    pub fn with_list_delay(self, delay: Duration) -> Self {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .list_delay = Some(delay);
        self
    }

    /// Get operation counts for assertions
    pub fn operation_counts(&self) -> OperationCounts {
        self.operations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn next_objects(&self, descriptor: &ResourceTypeDescriptor) -> Result<Vec<Value>> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let key = type_key(descriptor);
        if state.failing.contains(&key) {
            return Err(KubeError::Api(kube::Error::Api(kube::error::ErrorResponse {
                status: "Failure".to_string(),
                message: format!("{} is forbidden", descriptor.name),
                reason: "Forbidden".to_string(),
                code: 403,
            })));
        }

        let Some(script) = state.objects.get_mut(&key) else {
            return Ok(Vec::new());
        };
        let objects = if script.len() > 1 {
            script.pop_front().unwrap_or_default()
        } else {
            script.front().cloned().unwrap_or_default()
        };
        Ok(objects)
    }
}

#[async_trait]
impl ClusterAccess for MockClusterAccess {
    async fn enumerate_resource_types(&self) -> Result<Vec<ResourceTypeDescriptor>> {
        self.operations
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .enumerations += 1;

        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        if let Some(message) = &state.discovery_error {
            return Err(KubeError::Discovery(message.clone()));
        }
        Ok(state.types.clone())
    }

    async fn list_objects(
        &self,
        descriptor: &ResourceTypeDescriptor,
        namespace: Option<&str>,
    ) -> Result<Vec<GenericObject>> {
        self.operations
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .lists += 1;

        let delay = self
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .list_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let objects = self
            .next_objects(descriptor)?
            .into_iter()
            .map(GenericObject::from_value)
            .filter(|o| match namespace {
                Some(ns) if descriptor.namespaced => o.namespace == ns,
                _ => true,
            })
            .collect();
        Ok(objects)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pods() -> ResourceTypeDescriptor {
        ResourceTypeDescriptor::new("", "v1", "pods", "Pod", true)
    }

    fn pod(namespace: &str, name: &str) -> Value {
        json!({"metadata": {"name": name, "namespace": namespace}})
    }

    #[tokio::test]
    async fn test_enumerate_and_list() {
        let mock = MockClusterAccess::new().with_type(pods(), vec![pod("a", "p1"), pod("b", "p2")]);

        let types = mock.enumerate_resource_types().await.unwrap();
        assert_eq!(types, vec![pods()]);

        let all = mock.list_objects(&pods(), None).await.unwrap();
        assert_eq!(all.len(), 2);

        let only_a = mock.list_objects(&pods(), Some("a")).await.unwrap();
        assert_eq!(only_a.len(), 1);
        assert_eq!(only_a[0].name, "p1");

        assert_eq!(
            mock.operation_counts(),
            OperationCounts {
                enumerations: 1,
                lists: 2
            }
        );
    }

    #[tokio::test]
    async fn test_scripted_cycles_repeat_last() {
        let mock = MockClusterAccess::new().script_type(
            pods(),
            vec![vec![pod("a", "p1")], vec![]],
        );
        assert_eq!(mock.list_objects(&pods(), None).await.unwrap().len(), 1);
        assert_eq!(mock.list_objects(&pods(), None).await.unwrap().len(), 0);
        assert_eq!(mock.list_objects(&pods(), None).await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_failing_type() {
        let mock = MockClusterAccess::new().with_failing_type(pods());
        let err = mock.list_objects(&pods(), None).await.unwrap_err();
        assert!(err.is_forbidden());
    }

    #[tokio::test]
    async fn test_discovery_error() {
        let mock = MockClusterAccess::new();
        mock.set_discovery_error(Some("boom"));
        assert!(matches!(
            mock.enumerate_resource_types().await,
            Err(KubeError::Discovery(_))
        ));
        mock.set_discovery_error(None);
        assert!(mock.enumerate_resource_types().await.is_ok());
    }
}
