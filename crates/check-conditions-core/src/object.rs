//! Resource types and the objects listed from them

use serde_json::Value;
use std::fmt;

use crate::paths::lookup;

/// One kind of object in the cluster, e.g. `apps/v1 deployments`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceTypeDescriptor {
    /// API group, empty for the core group
    pub group: String,
    pub version: String,
    /// Plural resource name as used in URLs, e.g. `deployments` or `pods/log`
    pub name: String,
    pub kind: String,
    pub namespaced: bool,
}

impl ResourceTypeDescriptor {
    pub fn new(group: &str, version: &str, name: &str, kind: &str, namespaced: bool) -> Self {
        Self {
            group: group.to_string(),
            version: version.to_string(),
            name: name.to_string(),
            kind: kind.to_string(),
            namespaced,
        }
    }

    /// `group/version`, or just `version` for the core group
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }
}

impl fmt::Display for ResourceTypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.api_version(), self.name)
    }
}

/// An object of any type, with its identity and raw content
#[derive(Debug, Clone, PartialEq)]
pub struct GenericObject {
    /// Empty for cluster-scoped objects
    pub namespace: String,
    pub name: String,
    pub data: Value,
}

impl GenericObject {
    /// Build from a full object document, reading identity from `metadata`
    pub fn from_value(data: Value) -> Self {
        let meta = |field: &str| {
            data.get("metadata")
                .and_then(|m| m.get(field))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        Self {
            namespace: meta("namespace"),
            name: meta("name"),
            data,
        }
    }

    /// Look up a dotted field path such as `status.conditions`
    pub fn field(&self, path: &str) -> Option<&Value> {
        let segments: Vec<&str> = path.split('.').filter(|s| !s.is_empty()).collect();
        lookup(&self.data, &segments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_api_version() {
        let core = ResourceTypeDescriptor::new("", "v1", "pods", "Pod", true);
        assert_eq!(core.api_version(), "v1");
        let apps = ResourceTypeDescriptor::new("apps", "v1", "deployments", "Deployment", true);
        assert_eq!(apps.api_version(), "apps/v1");
        assert_eq!(apps.to_string(), "apps/v1 deployments");
    }

    #[test]
    fn test_generic_object_identity() {
        let obj = GenericObject::from_value(json!({
            "metadata": {"name": "web", "namespace": "prod"},
            "status": {"conditions": []}
        }));
        assert_eq!(obj.namespace, "prod");
        assert_eq!(obj.name, "web");
        assert_eq!(obj.field("status.conditions"), Some(&json!([])));
        assert_eq!(obj.field("spec.replicas"), None);
    }

    #[test]
    fn test_cluster_scoped_object() {
        let obj = GenericObject::from_value(json!({"metadata": {"name": "node-1"}}));
        assert!(obj.namespace.is_empty());
    }
}
