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
use std::sync::Arc;

/// Marks every mutating request as a dry run. Reads pass through untouched.
///
/// Whether anything is persisted is up to the API server honouring the
/// marker; this wrapper only guarantees the marker is always sent.
pub struct DryRunClient {
    inner: Arc<dyn ObjectClient>,
}

impl DryRunClient {
    pub fn new(inner: Arc<dyn ObjectClient>) -> Self {
        Self { inner }
    }
}

fn forced(opts: &WriteOptions) -> WriteOptions {
    WriteOptions {
        dry_run: true,
        ..opts.clone()
    }
}

#[async_trait::async_trait]
impl ObjectReader for DryRunClient {
    async fn get(&self, gvk: &GroupVersionKind, key: &ObjectKey) -> Result<DynamicObject> {
        self.inner.get(gvk, key).await
    }

    async fn list(&self, gvk: &GroupVersionKind, opts: &ListOptions) -> Result<Vec<DynamicObject>> {
        self.inner.list(gvk, opts).await
    }
}

#[async_trait::async_trait]
impl ObjectWriter for DryRunClient {
    async fn create(&self, obj: &DynamicObject, opts: &WriteOptions) -> Result<DynamicObject> {
        self.inner.create(obj, &forced(opts)).await
    }

    async fn update(&self, obj: &DynamicObject, opts: &WriteOptions) -> Result<DynamicObject> {
        self.inner.update(obj, &forced(opts)).await
    }

    async fn patch(
        &self,
        gvk: &GroupVersionKind,
        key: &ObjectKey,
        patch: &Patch<serde_json::Value>,
        opts: &WriteOptions,
    ) -> Result<DynamicObject> {
        self.inner.patch(gvk, key, patch, &forced(opts)).await
    }

    async fn delete(
        &self,
        gvk: &GroupVersionKind,
        key: &ObjectKey,
        opts: &WriteOptions,
    ) -> Result<()> {
        self.inner.delete(gvk, key, &forced(opts)).await
    }
}

impl ObjectClient for DryRunClient {
    fn registry(&self) -> &TypeRegistry {
        self.inner.registry()
    }
}
