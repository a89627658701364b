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

use super::{ListOptions, ObjectClient, ObjectKey, ObjectReader, ObjectWriter, WriteOptions};
use crate::infrastructure::kubernetes::registry::TypeRegistry;
use crate::shared::error::Result;
use kube::api::{DynamicObject, Patch};
use kube::core::GroupVersionKind;
use std::collections::HashSet;
use std::sync::Arc;

/// Serves reads from the cache and sends writes straight to the API server.
pub struct DelegatingClient {
    cache: Arc<dyn ObjectReader>,
    direct: Arc<dyn ObjectClient>,
    uncached: HashSet<GroupVersionKind>,
}

impl DelegatingClient {
    pub fn new(
        cache: Arc<dyn ObjectReader>,
        direct: Arc<dyn ObjectClient>,
        uncached: HashSet<GroupVersionKind>,
    ) -> Self {
        Self {
            cache,
            direct,
            uncached,
        }
    }

    fn bypasses_cache(&self, gvk: &GroupVersionKind) -> bool {
        self.uncached.contains(gvk)
    }
}

#[async_trait::async_trait]
impl ObjectReader for DelegatingClient {
    async fn get(&self, gvk: &GroupVersionKind, key: &ObjectKey) -> Result<DynamicObject> {
        if self.bypasses_cache(gvk) {
            self.direct.get(gvk, key).await
        } else {
            self.cache.get(gvk, key).await
        }
    }

    async fn list(&self, gvk: &GroupVersionKind, opts: &ListOptions) -> Result<Vec<DynamicObject>> {
        if self.bypasses_cache(gvk) {
            self.direct.list(gvk, opts).await
        } else {
            self.cache.list(gvk, opts).await
        }
    }
}

#[async_trait::async_trait]
impl ObjectWriter for DelegatingClient {
    async fn create(&self, obj: &DynamicObject, opts: &WriteOptions) -> Result<DynamicObject> {
        self.direct.create(obj, opts).await
    }

    async fn update(&self, obj: &DynamicObject, opts: &WriteOptions) -> Result<DynamicObject> {
        self.direct.update(obj, opts).await
    }

    async fn patch(
        &self,
        gvk: &GroupVersionKind,
        key: &ObjectKey,
        patch: &Patch<serde_json::Value>,
        opts: &WriteOptions,
    ) -> Result<DynamicObject> {
        self.direct.patch(gvk, key, patch, opts).await
    }

    async fn delete(
        &self,
        gvk: &GroupVersionKind,
        key: &ObjectKey,
        opts: &WriteOptions,
    ) -> Result<()> {
        self.direct.delete(gvk, key, opts).await
    }
}

impl ObjectClient for DelegatingClient {
    fn registry(&self) -> &TypeRegistry {
        self.direct.registry()
    }
}
