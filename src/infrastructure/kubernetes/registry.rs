// Copyright 2025 JiangLong.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Registry of the Rust types a cluster knows how to read and write.

use crate::shared::error::ClusterError;
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, ReplicaSet, StatefulSet};
use k8s_openapi::api::batch::v1::{CronJob, Job};
use k8s_openapi::api::coordination::v1::Lease;
use k8s_openapi::api::core::v1::{
    ConfigMap, Endpoints, Event, Namespace, Node, PersistentVolume, PersistentVolumeClaim, Pod,
    Secret, Service, ServiceAccount,
};
use k8s_openapi::NamespaceResourceScope;
use kube::core::{ApiResource, GroupVersionKind};
use kube::Resource;
use std::any::{type_name, TypeId};
use std::collections::HashMap;

/// Resource metadata for a registered kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceMapping {
    pub resource: ApiResource,
    pub namespaced: bool,
}

impl ResourceMapping {
    pub fn gvk(&self) -> GroupVersionKind {
        gvk_of(&self.resource)
    }
}

/// Maps Rust types to their group/version/kind and the kind to its resource
/// metadata.
///
/// There is no process-wide instance: [`TypeRegistry::default`] builds a fresh
/// registry holding the built-in Kubernetes kinds, and callers inject it (or
/// their own) through the cluster options.
#[derive(Debug, Clone)]
pub struct TypeRegistry {
    by_type: HashMap<TypeId, GroupVersionKind>,
    by_kind: HashMap<GroupVersionKind, ResourceMapping>,
}

impl TypeRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            by_type: HashMap::new(),
            by_kind: HashMap::new(),
        }
    }

    pub fn register<K>(&mut self) -> &mut Self
    where
        K: Resource<DynamicType = ()> + 'static,
        K::Scope: 'static,
    {
        let resource = ApiResource::erase::<K>(&());
        let gvk = gvk_of(&resource);
        let namespaced = TypeId::of::<K::Scope>() == TypeId::of::<NamespaceResourceScope>();

        self.by_type.insert(TypeId::of::<K>(), gvk.clone());
        self.by_kind.insert(
            gvk,
            ResourceMapping {
                resource,
                namespaced,
            },
        );
        self
    }

    /// Builder form of [`TypeRegistry::register`].
    pub fn with<K>(mut self) -> Self
    where
        K: Resource<DynamicType = ()> + 'static,
        K::Scope: 'static,
    {
        self.register::<K>();
        self
    }

    /// Registers a kind that has no Rust type, e.g. a custom resource read as
    /// `DynamicObject`.
    pub fn register_dynamic(&mut self, resource: ApiResource, namespaced: bool) -> &mut Self {
        self.by_kind.insert(
            gvk_of(&resource),
            ResourceMapping {
                resource,
                namespaced,
            },
        );
        self
    }

    pub fn kind_for<K: 'static>(&self) -> Result<GroupVersionKind, ClusterError> {
        self.by_type
            .get(&TypeId::of::<K>())
            .cloned()
            .ok_or_else(|| ClusterError::UnregisteredType(type_name::<K>().to_string()))
    }

    pub fn get(&self, gvk: &GroupVersionKind) -> Option<&ResourceMapping> {
        self.by_kind.get(gvk)
    }

    pub fn recognizes(&self, gvk: &GroupVersionKind) -> bool {
        self.by_kind.contains_key(gvk)
    }

    /// Registered kinds ordered by group, version and kind.
    pub fn kinds(&self) -> Vec<&ResourceMapping> {
        let mut kinds: Vec<_> = self.by_kind.values().collect();
        kinds.sort_by(|a, b| {
            (&a.resource.group, &a.resource.version, &a.resource.kind).cmp(&(
                &b.resource.group,
                &b.resource.version,
                &b.resource.kind,
            ))
        });
        kinds
    }

    /// Looks a kind up by its `Kind` name alone, case-insensitively. Returns the
    /// first match in [`TypeRegistry::kinds`] order.
    pub fn find_by_kind_name(&self, kind: &str) -> Option<&ResourceMapping> {
        self.kinds()
            .into_iter()
            .find(|t| t.resource.kind.eq_ignore_ascii_case(kind))
    }

    pub fn len(&self) -> usize {
        self.by_kind.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_kind.is_empty()
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
            .with::<Pod>()
            .with::<Service>()
            .with::<ConfigMap>()
            .with::<Secret>()
            .with::<ServiceAccount>()
            .with::<Endpoints>()
            .with::<Event>()
            .with::<PersistentVolumeClaim>()
            .with::<PersistentVolume>()
            .with::<Namespace>()
            .with::<Node>()
            .with::<Deployment>()
            .with::<StatefulSet>()
            .with::<DaemonSet>()
            .with::<ReplicaSet>()
            .with::<Job>()
            .with::<CronJob>()
            .with::<Lease>()
    }
}

pub fn gvk_of(resource: &ApiResource) -> GroupVersionKind {
    GroupVersionKind::gvk(&resource.group, &resource.version, &resource.kind)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registry_contains_builtin_kinds() {
        let registry = TypeRegistry::default();
        assert!(registry.recognizes(&GroupVersionKind::gvk("", "v1", "Pod")));
        assert!(registry.recognizes(&GroupVersionKind::gvk("apps", "v1", "StatefulSet")));
        assert!(registry.recognizes(&GroupVersionKind::gvk(
            "coordination.k8s.io",
            "v1",
            "Lease"
        )));
        assert_eq!(registry.len(), 18);
    }

    #[test]
    fn test_scope_detection() {
        let registry = TypeRegistry::default();
        let pod = registry
            .get(&GroupVersionKind::gvk("", "v1", "Pod"))
            .unwrap();
        assert!(pod.namespaced);
        assert_eq!(pod.resource.plural, "pods");

        let node = registry
            .get(&GroupVersionKind::gvk("", "v1", "Node"))
            .unwrap();
        assert!(!node.namespaced);
    }

    #[test]
    fn test_kind_for_unregistered_type() {
        let registry = TypeRegistry::new().with::<Pod>();
        assert_eq!(
            registry.kind_for::<Pod>().unwrap(),
            GroupVersionKind::gvk("", "v1", "Pod")
        );
        let err = registry.kind_for::<Service>().unwrap_err();
        assert!(matches!(err, ClusterError::UnregisteredType(name) if name.contains("Service")));
    }

    #[test]
    fn test_register_dynamic_kind() {
        let gvk = GroupVersionKind::gvk("example.com", "v1", "Widget");
        let mut registry = TypeRegistry::new();
        registry.register_dynamic(ApiResource::from_gvk(&gvk), true);

        assert!(registry.recognizes(&gvk));
        assert_eq!(
            registry.find_by_kind_name("widget").map(|t| t.gvk()),
            Some(gvk)
        );
    }

    #[test]
    fn test_separate_registries_do_not_share_state() {
        let mut first = TypeRegistry::default();
        let second = TypeRegistry::default();
        first.register_dynamic(
            ApiResource::from_gvk(&GroupVersionKind::gvk("example.com", "v1", "Widget")),
            true,
        );
        assert_eq!(first.len(), second.len() + 1);
    }
}
