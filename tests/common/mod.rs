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

//! Stubs shared by the integration tests.

#![allow(dead_code)]

use kube::api::{DynamicObject, GroupVersionKind, Patch};
use kube::core::ApiResource;
use kube::{Client, Config};
use kube_cluster::infrastructure::kubernetes::recorder::EventRecord;
use kube_cluster::infrastructure::kubernetes::{
    BroadcasterFactory, Cache, CacheOptions, CacheStrategy, EventSink, FieldIndexer, IndexFn,
    ListOptions, ObjectClient, ObjectKey, ObjectReader, ObjectWriter, RecorderProvider,
    RecorderProviderStrategy, ResolverStrategy, StaticResolver, TypeRegistry, TypeResolver,
    WriteOptions,
};
use kube_cluster::shared::Logger;
use kube_cluster::{ClusterError, Options, Result};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub const STUB_CACHE_STOPPED: &str = "cache stub stopped";

pub fn test_config() -> Config {
    Config::new("http://127.0.0.1:1".parse().unwrap())
}

pub fn static_resolver() -> Arc<dyn TypeResolver> {
    Arc::new(StaticResolver::from_registry(&TypeRegistry::default()))
}

pub fn static_resolver_strategy() -> ResolverStrategy {
    Arc::new(|_: &Config, _: &Client| Ok(static_resolver()))
}

pub fn stub_cache_strategy() -> CacheStrategy {
    Arc::new(|_: &Config, _: CacheOptions| Ok(Arc::new(StubCache::default()) as Arc<dyn Cache>))
}

/// Options that build a cluster without discovery and with a failing cache.
pub fn stub_options() -> Options {
    Options::new()
        .with_resolver_strategy(static_resolver_strategy())
        .with_cache_strategy(stub_cache_strategy())
}

/// Compares `Arc`s by data pointer only.
pub fn thin<T: ?Sized>(arc: &Arc<T>) -> *const () {
    Arc::as_ptr(arc) as *const ()
}

/// Cache that fails every read and, once cancelled, stops with an error.
#[derive(Default)]
pub struct StubCache;

#[async_trait::async_trait]
impl ObjectReader for StubCache {
    async fn get(&self, gvk: &GroupVersionKind, _key: &ObjectKey) -> Result<DynamicObject> {
        Err(ClusterError::Cache(format!("simulated failure reading {}", gvk.kind)))
    }

    async fn list(&self, gvk: &GroupVersionKind, _opts: &ListOptions) -> Result<Vec<DynamicObject>> {
        Err(ClusterError::Cache(format!("simulated failure listing {}", gvk.kind)))
    }
}

#[async_trait::async_trait]
impl FieldIndexer for StubCache {
    async fn index_field(&self, _gvk: &GroupVersionKind, _field: &str, _extract: IndexFn) -> Result<()> {
        Ok(())
    }
}

#[async_trait::async_trait]
impl Cache for StubCache {
    async fn run(&self, cancel: CancellationToken) -> Result<()> {
        cancel.cancelled().await;
        Err(ClusterError::Cache(STUB_CACHE_STOPPED.to_string()))
    }
}

/// Client standing in for the API server. Every call succeeds and is recorded.
#[derive(Default)]
pub struct DirectStub {
    registry: TypeRegistry,
    ops: Mutex<Vec<&'static str>>,
    writes: Mutex<Vec<(&'static str, WriteOptions)>>,
}

impl DirectStub {
    pub fn ops(&self) -> Vec<&'static str> {
        self.ops.lock().unwrap().clone()
    }

    pub fn writes(&self) -> Vec<(&'static str, WriteOptions)> {
        self.writes.lock().unwrap().clone()
    }

    fn write(&self, op: &'static str, opts: &WriteOptions) {
        self.ops.lock().unwrap().push(op);
        self.writes.lock().unwrap().push((op, opts.clone()));
    }
}

#[async_trait::async_trait]
impl ObjectReader for DirectStub {
    async fn get(&self, gvk: &GroupVersionKind, key: &ObjectKey) -> Result<DynamicObject> {
        self.ops.lock().unwrap().push("get");
        let mut obj = DynamicObject::new(&key.name, &ApiResource::from_gvk(gvk));
        obj.metadata.namespace = key.namespace.clone();
        Ok(obj)
    }

    async fn list(&self, _gvk: &GroupVersionKind, _opts: &ListOptions) -> Result<Vec<DynamicObject>> {
        self.ops.lock().unwrap().push("list");
        Ok(Vec::new())
    }
}

#[async_trait::async_trait]
impl ObjectWriter for DirectStub {
    async fn create(&self, obj: &DynamicObject, opts: &WriteOptions) -> Result<DynamicObject> {
        self.write("create", opts);
        Ok(obj.clone())
    }

    async fn update(&self, obj: &DynamicObject, opts: &WriteOptions) -> Result<DynamicObject> {
        self.write("update", opts);
        Ok(obj.clone())
    }

    async fn patch(
        &self,
        gvk: &GroupVersionKind,
        key: &ObjectKey,
        _patch: &Patch<serde_json::Value>,
        opts: &WriteOptions,
    ) -> Result<DynamicObject> {
        self.write("patch", opts);
        Ok(DynamicObject::new(&key.name, &ApiResource::from_gvk(gvk)))
    }

    async fn delete(&self, _gvk: &GroupVersionKind, _key: &ObjectKey, opts: &WriteOptions) -> Result<()> {
        self.write("delete", opts);
        Ok(())
    }
}

impl ObjectClient for DirectStub {
    fn registry(&self) -> &TypeRegistry {
        &self.registry
    }
}

/// Sink that keeps every event it is handed.
#[derive(Default)]
pub struct CollectingSink {
    records: Mutex<Vec<EventRecord>>,
}

impl CollectingSink {
    pub fn records(&self) -> Vec<EventRecord> {
        self.records.lock().unwrap().clone()
    }

    /// Waits up to a second for at least `count` events.
    pub async fn wait_for(&self, count: usize) -> Vec<EventRecord> {
        for _ in 0..100 {
            if self.records.lock().unwrap().len() >= count {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.records()
    }
}

#[async_trait::async_trait]
impl EventSink for CollectingSink {
    async fn write(&self, record: &EventRecord) -> Result<()> {
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }
}

pub type FactorySlot = Arc<Mutex<Option<BroadcasterFactory>>>;

/// Recorder strategy writing to a [`CollectingSink`] and keeping a copy of the
/// broadcaster factory it was given.
pub fn capturing_recorder_strategy() -> (RecorderProviderStrategy, FactorySlot, Arc<CollectingSink>) {
    let slot: FactorySlot = Arc::default();
    let sink = Arc::new(CollectingSink::default());

    let strategy: RecorderProviderStrategy = {
        let slot = slot.clone();
        let sink = sink.clone();
        Arc::new(
            move |_: &Config,
                  _: &Client,
                  _: &TypeRegistry,
                  logger: Logger,
                  factory: BroadcasterFactory| {
                *slot.lock().unwrap() = Some(factory.clone());
                Ok(RecorderProvider::with_sink(sink.clone(), logger, factory))
            },
        )
    };
    (strategy, slot, sink)
}
