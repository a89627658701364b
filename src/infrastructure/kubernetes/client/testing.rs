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

//! Client stubs shared by unit tests.

use super::{ListOptions, ObjectClient, ObjectKey, ObjectReader, ObjectWriter, WriteOptions};
use crate::infrastructure::kubernetes::registry::TypeRegistry;
use crate::shared::error::{ClusterError, Result};
use kube::api::{DynamicObject, Patch};
use kube::core::{ApiResource, GroupVersionKind};
use std::sync::Mutex;

pub(crate) fn pod_gvk() -> GroupVersionKind {
    GroupVersionKind::gvk("", "v1", "Pod")
}

pub(crate) fn configmap(name: &str) -> DynamicObject {
    DynamicObject::new(
        name,
        &ApiResource::from_gvk(&GroupVersionKind::gvk("", "v1", "ConfigMap")),
    )
    .within("default")
}

/// Fails every read, standing in for a cache that cannot serve a kind.
pub(crate) struct FailingReader;

#[async_trait::async_trait]
impl ObjectReader for FailingReader {
    async fn get(&self, gvk: &GroupVersionKind, _key: &ObjectKey) -> Result<DynamicObject> {
        Err(ClusterError::Cache(format!("no informer for {}", gvk.kind)))
    }

    async fn list(&self, gvk: &GroupVersionKind, _opts: &ListOptions) -> Result<Vec<DynamicObject>> {
        Err(ClusterError::Cache(format!("no informer for {}", gvk.kind)))
    }
}

/// Succeeds on every call and records what it was asked to do.
#[derive(Default)]
pub(crate) struct RecordingClient {
    registry: TypeRegistry,
    ops: Mutex<Vec<&'static str>>,
    writes: Mutex<Vec<(&'static str, WriteOptions)>>,
}

impl RecordingClient {
    pub(crate) fn ops(&self) -> Vec<&'static str> {
        self.ops.lock().unwrap().clone()
    }

    pub(crate) fn writes(&self) -> Vec<(&'static str, WriteOptions)> {
        self.writes.lock().unwrap().clone()
    }

    fn record(&self, op: &'static str, opts: Option<&WriteOptions>) {
        self.ops.lock().unwrap().push(op);
        if let Some(opts) = opts {
            self.writes.lock().unwrap().push((op, opts.clone()));
        }
    }
}

#[async_trait::async_trait]
impl ObjectReader for RecordingClient {
    async fn get(&self, gvk: &GroupVersionKind, key: &ObjectKey) -> Result<DynamicObject> {
        self.record("get", None);
        let mut obj = DynamicObject::new(&key.name, &ApiResource::from_gvk(gvk));
        obj.metadata.namespace = key.namespace.clone();
        Ok(obj)
    }

    async fn list(&self, _gvk: &GroupVersionKind, _opts: &ListOptions) -> Result<Vec<DynamicObject>> {
        self.record("list", None);
        Ok(Vec::new())
    }
}

#[async_trait::async_trait]
impl ObjectWriter for RecordingClient {
    async fn create(&self, obj: &DynamicObject, opts: &WriteOptions) -> Result<DynamicObject> {
        self.record("create", Some(opts));
        Ok(obj.clone())
    }

    async fn update(&self, obj: &DynamicObject, opts: &WriteOptions) -> Result<DynamicObject> {
        self.record("update", Some(opts));
        Ok(obj.clone())
    }

    async fn patch(
        &self,
        gvk: &GroupVersionKind,
        key: &ObjectKey,
        _patch: &Patch<serde_json::Value>,
        opts: &WriteOptions,
    ) -> Result<DynamicObject> {
        self.record("patch", Some(opts));
        Ok(DynamicObject::new(&key.name, &ApiResource::from_gvk(gvk)))
    }

    async fn delete(
        &self,
        _gvk: &GroupVersionKind,
        _key: &ObjectKey,
        opts: &WriteOptions,
    ) -> Result<()> {
        self.record("delete", Some(opts));
        Ok(())
    }
}

impl ObjectClient for RecordingClient {
    fn registry(&self) -> &TypeRegistry {
        &self.registry
    }
}
