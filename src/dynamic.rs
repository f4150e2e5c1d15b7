use std::borrow::Cow;

use kube::{
    Resource,
    api::{ObjectMeta, TypeMeta},
    core::DynamicResourceScope,
};
use serde_json::Value;

use crate::resource::ResourceDescriptor;

/// A cluster object of any kind, read without a static schema.
///
/// `kube::api::DynamicObject` is keyed by `kube::api::ApiResource`, which does not
/// carry short names or the namespaced flag. This type is keyed by
/// [`ResourceDescriptor`] instead so a resolved descriptor can be handed straight
/// to `Api::all_with` / `Api::namespaced_with`.
///
/// See https://github.com/kube-rs/kube/issues/1002
#[derive(serde::Serialize, serde::Deserialize, Clone, Debug, PartialEq)]
pub struct ListedObject {
    /// The type fields, not always present
    #[serde(flatten, default)]
    pub types: Option<TypeMeta>,
    /// Object metadata
    #[serde(default)]
    pub metadata: ObjectMeta,

    /// All other keys
    #[serde(flatten)]
    pub data: Value,
}

impl ListedObject {
    pub fn name(&self) -> Option<&str> {
        self.metadata.name.as_deref()
    }

    pub fn namespace(&self) -> Option<&str> {
        self.metadata.namespace.as_deref()
    }
}

impl Resource for ListedObject {
    type DynamicType = ResourceDescriptor;
    type Scope = DynamicResourceScope;

    fn group(dt: &ResourceDescriptor) -> Cow<'_, str> {
        dt.group.as_str().into()
    }

    fn version(dt: &ResourceDescriptor) -> Cow<'_, str> {
        dt.version.as_str().into()
    }

    fn kind(dt: &ResourceDescriptor) -> Cow<'_, str> {
        dt.kind.as_str().into()
    }

    fn api_version(dt: &ResourceDescriptor) -> Cow<'_, str> {
        dt.api_version().into()
    }

    fn plural(dt: &ResourceDescriptor) -> Cow<'_, str> {
        dt.plural_name.as_str().into()
    }

    fn meta(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::ListedObject;

    fn pod() -> ListedObject {
        serde_json::from_value(json!({
            "apiVersion": "v1",
            "kind": "Pod",
            "metadata": { "name": "pod-a", "namespace": "default" },
            "status": { "phase": "Running" }
        }))
        .expect("valid pod")
    }

    #[test]
    fn exposes_name_and_namespace() {
        let pod = pod();
        assert_eq!(pod.name(), Some("pod-a"));
        assert_eq!(pod.namespace(), Some("default"));
        assert_eq!(pod.types.as_ref().map(|t| t.kind.as_str()), Some("Pod"));
    }

    #[test]
    fn cluster_scoped_object_has_no_namespace() {
        let node: ListedObject = serde_json::from_value(json!({
            "apiVersion": "v1",
            "kind": "Node",
            "metadata": { "name": "node-1" }
        }))
        .expect("valid node");
        assert_eq!(node.name(), Some("node-1"));
        assert_eq!(node.namespace(), None);
    }
}
