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

//! Object clients: the read/write traits and the default implementations.
//!
//! The default client built by [`new_client`] is a [`DelegatingClient`] that
//! reads from the cache and writes through an [`ApiClient`]. Kinds listed in
//! [`CacheReadOptions::disable_for`] are read through the [`ApiClient`] as well.

pub mod api;
pub mod delegating;
pub mod dry_run;
pub mod typed;

#[cfg(test)]
pub(crate) mod testing;

pub use api::ApiClient;
pub use delegating::DelegatingClient;
pub use dry_run::DryRunClient;
pub use typed::TypedClient;

use crate::infrastructure::kubernetes::registry::TypeRegistry;
use crate::infrastructure::kubernetes::resolver::TypeResolver;
use crate::shared::error::{ClusterError, Result};
use kube::api::{DeleteParams, DynamicObject, ListParams, Patch, PatchParams, PostParams};
use kube::core::{ApiResource, GroupVersionKind, TypeMeta};
use kube::{Client, Config};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

/// Namespace and name of a single object. `namespace` is `None` for
/// cluster-scoped objects.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectKey {
    pub namespace: Option<String>,
    pub name: String,
}

impl ObjectKey {
    pub fn namespaced(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            name: name.into(),
        }
    }

    pub fn cluster_scoped(name: impl Into<String>) -> Self {
        Self {
            namespace: None,
            name: name.into(),
        }
    }

    pub fn of(obj: &DynamicObject) -> Result<Self> {
        let name = obj
            .metadata
            .name
            .clone()
            .ok_or_else(|| ClusterError::InvalidObject("metadata.name is required".to_string()))?;
        Ok(Self {
            namespace: obj.metadata.namespace.clone(),
            name,
        })
    }
}

/// Exact-match selector on an indexed field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSelector {
    pub field: String,
    pub value: String,
}

#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    pub namespace: Option<String>,
    pub labels: BTreeMap<String, String>,
    pub field: Option<FieldSelector>,
}

impl ListOptions {
    pub fn in_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn with_field(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.field = Some(FieldSelector {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    /// True when every requested label is present with the requested value.
    pub fn matches_labels(&self, labels: Option<&BTreeMap<String, String>>) -> bool {
        self.labels
            .iter()
            .all(|(k, v)| labels.and_then(|l| l.get(k)) == Some(v))
    }

    pub fn list_params(&self) -> ListParams {
        let mut lp = ListParams::default();
        if !self.labels.is_empty() {
            let selector = self
                .labels
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join(",");
            lp = lp.labels(&selector);
        }
        if let Some(field) = &self.field {
            lp = lp.fields(&format!("{}={}", field.field, field.value));
        }
        lp
    }
}

/// Options applied to every mutating call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteOptions {
    /// Ask the API server to validate the request without persisting it.
    pub dry_run: bool,
    pub field_manager: Option<String>,
}

impl WriteOptions {
    pub fn dry_run() -> Self {
        Self {
            dry_run: true,
            field_manager: None,
        }
    }

    pub fn post_params(&self) -> PostParams {
        PostParams {
            dry_run: self.dry_run,
            field_manager: self.field_manager.clone(),
        }
    }

    pub fn patch_params(&self) -> PatchParams {
        PatchParams {
            dry_run: self.dry_run,
            field_manager: self.field_manager.clone(),
            ..PatchParams::default()
        }
    }

    pub fn delete_params(&self) -> DeleteParams {
        DeleteParams {
            dry_run: self.dry_run,
            ..DeleteParams::default()
        }
    }
}

#[async_trait::async_trait]
pub trait ObjectReader: Send + Sync {
    async fn get(&self, gvk: &GroupVersionKind, key: &ObjectKey) -> Result<DynamicObject>;

    async fn list(&self, gvk: &GroupVersionKind, opts: &ListOptions) -> Result<Vec<DynamicObject>>;
}

#[async_trait::async_trait]
pub trait ObjectWriter: Send + Sync {
    async fn create(&self, obj: &DynamicObject, opts: &WriteOptions) -> Result<DynamicObject>;

    async fn update(&self, obj: &DynamicObject, opts: &WriteOptions) -> Result<DynamicObject>;

    async fn patch(
        &self,
        gvk: &GroupVersionKind,
        key: &ObjectKey,
        patch: &Patch<serde_json::Value>,
        opts: &WriteOptions,
    ) -> Result<DynamicObject>;

    async fn delete(
        &self,
        gvk: &GroupVersionKind,
        key: &ObjectKey,
        opts: &WriteOptions,
    ) -> Result<()>;
}

/// A full read/write client.
pub trait ObjectClient: ObjectReader + ObjectWriter {
    /// The registry used to map Rust types to kinds.
    fn registry(&self) -> &TypeRegistry;
}

#[async_trait::async_trait]
impl<T: ObjectReader + ?Sized> ObjectReader for Arc<T> {
    async fn get(&self, gvk: &GroupVersionKind, key: &ObjectKey) -> Result<DynamicObject> {
        (**self).get(gvk, key).await
    }

    async fn list(&self, gvk: &GroupVersionKind, opts: &ListOptions) -> Result<Vec<DynamicObject>> {
        (**self).list(gvk, opts).await
    }
}

#[async_trait::async_trait]
impl<T: ObjectWriter + ?Sized> ObjectWriter for Arc<T> {
    async fn create(&self, obj: &DynamicObject, opts: &WriteOptions) -> Result<DynamicObject> {
        (**self).create(obj, opts).await
    }

    async fn update(&self, obj: &DynamicObject, opts: &WriteOptions) -> Result<DynamicObject> {
        (**self).update(obj, opts).await
    }

    async fn patch(
        &self,
        gvk: &GroupVersionKind,
        key: &ObjectKey,
        patch: &Patch<serde_json::Value>,
        opts: &WriteOptions,
    ) -> Result<DynamicObject> {
        (**self).patch(gvk, key, patch, opts).await
    }

    async fn delete(
        &self,
        gvk: &GroupVersionKind,
        key: &ObjectKey,
        opts: &WriteOptions,
    ) -> Result<()> {
        (**self).delete(gvk, key, opts).await
    }
}

impl<T: ObjectClient + ?Sized> ObjectClient for Arc<T> {
    fn registry(&self) -> &TypeRegistry {
        (**self).registry()
    }
}

/// Cache-backed reads handed to the client builder.
#[derive(Clone)]
pub struct CacheReadOptions {
    pub reader: Arc<dyn ObjectReader>,
    /// Kinds that are always read from the API server.
    pub disable_for: HashSet<GroupVersionKind>,
}

#[derive(Clone)]
pub struct ClientOptions {
    pub transport: Client,
    pub registry: Arc<TypeRegistry>,
    pub resolver: Arc<dyn TypeResolver>,
    pub cache: Option<CacheReadOptions>,
}

/// Builds the composed client for a cluster.
pub type ClientStrategy =
    Arc<dyn Fn(&Config, ClientOptions) -> Result<Arc<dyn ObjectClient>> + Send + Sync>;

/// Default client: direct when no cache is given, otherwise cached reads with
/// direct writes.
pub fn new_client(_config: &Config, options: ClientOptions) -> Result<Arc<dyn ObjectClient>> {
    let direct: Arc<dyn ObjectClient> = Arc::new(ApiClient::new(
        options.transport,
        options.registry,
        options.resolver,
    ));

    match options.cache {
        None => Ok(direct),
        Some(cache) => Ok(Arc::new(DelegatingClient::new(
            cache.reader,
            direct,
            cache.disable_for,
        ))),
    }
}

pub fn default_client_strategy() -> ClientStrategy {
    Arc::new(new_client)
}

/// Group/version/kind of an object, read from its type metadata.
pub fn gvk_of_object(obj: &DynamicObject) -> Result<GroupVersionKind> {
    let types = obj
        .types
        .as_ref()
        .ok_or_else(|| ClusterError::InvalidObject("apiVersion and kind are required".to_string()))?;
    let (group, version) = match types.api_version.split_once('/') {
        Some((group, version)) => (group, version),
        None => ("", types.api_version.as_str()),
    };
    Ok(GroupVersionKind::gvk(group, version, &types.kind))
}

/// Fills in `apiVersion`/`kind`, which list and watch responses leave out of
/// their items.
pub fn with_type_meta(mut obj: DynamicObject, resource: &ApiResource) -> DynamicObject {
    if obj.types.is_none() {
        obj.types = Some(TypeMeta {
            api_version: resource.api_version.clone(),
            kind: resource.kind.clone(),
        });
    }
    obj
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gvk_of_object() {
        let obj = DynamicObject::new(
            "web",
            &ApiResource::from_gvk(&GroupVersionKind::gvk("apps", "v1", "Deployment")),
        );
        assert_eq!(
            gvk_of_object(&obj).unwrap(),
            GroupVersionKind::gvk("apps", "v1", "Deployment")
        );

        let core = DynamicObject::new(
            "cfg",
            &ApiResource::from_gvk(&GroupVersionKind::gvk("", "v1", "ConfigMap")),
        );
        assert_eq!(
            gvk_of_object(&core).unwrap(),
            GroupVersionKind::gvk("", "v1", "ConfigMap")
        );
    }

    #[test]
    fn test_object_without_types_is_invalid() {
        let mut obj = DynamicObject::new(
            "web",
            &ApiResource::from_gvk(&GroupVersionKind::gvk("", "v1", "Pod")),
        );
        obj.types = None;
        assert!(matches!(
            gvk_of_object(&obj),
            Err(ClusterError::InvalidObject(_))
        ));
    }

    #[test]
    fn test_write_options_carry_dry_run() {
        let opts = WriteOptions::dry_run();
        assert!(opts.post_params().dry_run);
        assert!(opts.patch_params().dry_run);
        assert!(opts.delete_params().dry_run);

        let normal = WriteOptions::default();
        assert!(!normal.post_params().dry_run);
    }

    #[test]
    fn test_list_options_label_matching() {
        let opts = ListOptions::default()
            .with_label("app", "web")
            .with_label("tier", "frontend");

        let mut labels = BTreeMap::new();
        labels.insert("app".to_string(), "web".to_string());
        assert!(!opts.matches_labels(Some(&labels)));

        labels.insert("tier".to_string(), "frontend".to_string());
        assert!(opts.matches_labels(Some(&labels)));
        assert!(!opts.matches_labels(None));
        assert!(ListOptions::default().matches_labels(None));
    }

    #[test]
    fn test_list_params_selectors() {
        let lp = ListOptions::default()
            .with_label("app", "web")
            .with_field("spec.nodeName", "node-1")
            .list_params();
        assert_eq!(lp.label_selector.as_deref(), Some("app=web"));
        assert_eq!(lp.field_selector.as_deref(), Some("spec.nodeName=node-1"));
    }

    #[test]
    fn test_object_key_requires_name() {
        let mut obj = DynamicObject::new(
            "web",
            &ApiResource::from_gvk(&GroupVersionKind::gvk("", "v1", "Pod")),
        )
        .within("default");
        assert_eq!(
            ObjectKey::of(&obj).unwrap(),
            ObjectKey::namespaced("default", "web")
        );

        obj.metadata.name = None;
        assert!(ObjectKey::of(&obj).is_err());
    }
}
