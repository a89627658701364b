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

use super::{with_type_meta, ListOptions, ObjectClient, ObjectKey, WriteOptions};
use crate::infrastructure::kubernetes::registry::{ResourceMapping, TypeRegistry};
use crate::shared::error::{ClusterError, Result};
use kube::api::DynamicObject;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::any::type_name;
use std::sync::Arc;

/// Typed view over an [`ObjectClient`]. Rust types are mapped to kinds through
/// `registry`; unregistered types fail with [`ClusterError::UnregisteredType`].
#[derive(Clone)]
pub struct TypedClient {
    inner: Arc<dyn ObjectClient>,
    registry: Arc<TypeRegistry>,
}

impl TypedClient {
    pub fn new(inner: Arc<dyn ObjectClient>, registry: Arc<TypeRegistry>) -> Self {
        Self { inner, registry }
    }

    fn mapping_for<K: 'static>(&self) -> Result<ResourceMapping> {
        let gvk = self.registry.kind_for::<K>()?;
        self.registry
            .get(&gvk)
            .cloned()
            .ok_or_else(|| ClusterError::UnregisteredType(type_name::<K>().to_string()))
    }

    pub async fn get<K>(&self, key: &ObjectKey) -> Result<K>
    where
        K: DeserializeOwned + 'static,
    {
        let mapping = self.mapping_for::<K>()?;
        let obj = self.inner.get(&mapping.gvk(), key).await?;
        from_dynamic(obj, &mapping)
    }

    pub async fn list<K>(&self, opts: &ListOptions) -> Result<Vec<K>>
    where
        K: DeserializeOwned + 'static,
    {
        let mapping = self.mapping_for::<K>()?;
        self.inner
            .list(&mapping.gvk(), opts)
            .await?
            .into_iter()
            .map(|obj| from_dynamic(obj, &mapping))
            .collect()
    }

    pub async fn create<K>(&self, obj: &K, opts: &WriteOptions) -> Result<K>
    where
        K: Serialize + DeserializeOwned + 'static,
    {
        let mapping = self.mapping_for::<K>()?;
        let created = self.inner.create(&to_dynamic(obj, &mapping)?, opts).await?;
        from_dynamic(created, &mapping)
    }

    pub async fn update<K>(&self, obj: &K, opts: &WriteOptions) -> Result<K>
    where
        K: Serialize + DeserializeOwned + 'static,
    {
        let mapping = self.mapping_for::<K>()?;
        let updated = self.inner.update(&to_dynamic(obj, &mapping)?, opts).await?;
        from_dynamic(updated, &mapping)
    }

    pub async fn delete<K: 'static>(&self, key: &ObjectKey, opts: &WriteOptions) -> Result<()> {
        let mapping = self.mapping_for::<K>()?;
        self.inner.delete(&mapping.gvk(), key, opts).await
    }
}

fn to_dynamic<K: Serialize>(obj: &K, mapping: &ResourceMapping) -> Result<DynamicObject> {
    let dynamic: DynamicObject = serde_json::from_value(serde_json::to_value(obj)?)?;
    Ok(with_type_meta(dynamic, &mapping.resource))
}

fn from_dynamic<K: DeserializeOwned>(obj: DynamicObject, mapping: &ResourceMapping) -> Result<K> {
    let obj = with_type_meta(obj, &mapping.resource);
    Ok(serde_json::from_value(serde_json::to_value(obj)?)?)
}
