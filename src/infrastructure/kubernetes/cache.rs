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

//! Watch-backed, read-through object cache.
//!
//! [`InformerCache`] keeps one watcher and one in-memory store per kind. Kinds
//! are added on first read or when a field index is registered for them, and
//! every store is fully relisted once per (jittered) resync interval.

use crate::infrastructure::constants::RESYNC_JITTER_FACTOR;
use crate::infrastructure::kubernetes::client::{
    with_type_meta, ListOptions, ObjectKey, ObjectReader,
};
use crate::infrastructure::kubernetes::registry::{ResourceMapping, TypeRegistry};
use crate::infrastructure::kubernetes::resolver::TypeResolver;
use crate::shared::error::{display_gvk, ClusterError, Result};
use futures::StreamExt;
use kube::api::DynamicObject;
use kube::core::GroupVersionKind;
use kube::runtime::reflector::store::Writer;
use kube::runtime::reflector::{ObjectRef, Store};
use kube::runtime::{watcher, WatchStreamExt};
use kube::{Api, Client, Config};
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

/// Extracts the values of an indexed field from an object.
pub type IndexFn = Arc<dyn Fn(&DynamicObject) -> Vec<String> + Send + Sync>;

/// Registers secondary lookup keys against cached objects.
#[async_trait::async_trait]
pub trait FieldIndexer: Send + Sync {
    async fn index_field(&self, gvk: &GroupVersionKind, field: &str, extract: IndexFn)
        -> Result<()>;
}

#[async_trait::async_trait]
impl<T: FieldIndexer + ?Sized> FieldIndexer for Arc<T> {
    async fn index_field(
        &self,
        gvk: &GroupVersionKind,
        field: &str,
        extract: IndexFn,
    ) -> Result<()> {
        (**self).index_field(gvk, field, extract).await
    }
}

/// A read-through cache with a blocking run loop.
#[async_trait::async_trait]
pub trait Cache: ObjectReader + FieldIndexer {
    /// Runs until `cancel` fires or the cache fails, returning the failure.
    async fn run(&self, cancel: CancellationToken) -> Result<()>;
}

#[derive(Clone)]
pub struct CacheOptions {
    pub transport: Client,
    pub registry: Arc<TypeRegistry>,
    pub resolver: Arc<dyn TypeResolver>,
    /// Minimum period between full relists. Each kind adds up to 10 % jitter.
    pub resync_interval: Duration,
    /// Restricts namespaced kinds to one namespace. `None` watches everything.
    pub namespace: Option<String>,
}

/// Builds the cache for a cluster.
pub type CacheStrategy =
    Arc<dyn Fn(&Config, CacheOptions) -> Result<Arc<dyn Cache>> + Send + Sync>;

pub fn default_cache_strategy() -> CacheStrategy {
    Arc::new(|config: &Config, options: CacheOptions| {
        Ok(Arc::new(InformerCache::new(config, options)) as Arc<dyn Cache>)
    })
}

struct Informer {
    mapping: ResourceMapping,
    store: Store<DynamicObject>,
    // Taken by the task that drives the watch.
    writer: Mutex<Option<Writer<DynamicObject>>>,
}

pub struct InformerCache {
    client: Client,
    resolver: Arc<dyn TypeResolver>,
    resync_interval: Duration,
    namespace: Option<String>,
    informers: RwLock<HashMap<GroupVersionKind, Arc<Informer>>>,
    indexers: RwLock<HashMap<GroupVersionKind, HashMap<String, IndexFn>>>,
    running: Mutex<Option<CancellationToken>>,
    tasks: TaskTracker,
}

impl InformerCache {
    pub fn new(_config: &Config, options: CacheOptions) -> Self {
        Self {
            client: options.transport,
            resolver: options.resolver,
            resync_interval: options.resync_interval,
            namespace: options.namespace,
            informers: RwLock::new(HashMap::new()),
            indexers: RwLock::new(HashMap::new()),
            running: Mutex::new(None),
            tasks: TaskTracker::new(),
        }
    }

    async fn running_token(&self) -> Option<CancellationToken> {
        self.running.lock().await.clone()
    }

    /// Returns the informer for `gvk`, creating it if needed. A new informer is
    /// started immediately when the cache is already running.
    async fn ensure_informer(&self, gvk: &GroupVersionKind) -> Result<Arc<Informer>> {
        if let Some(informer) = self.informers.read().await.get(gvk) {
            return Ok(informer.clone());
        }

        let mapping = self.resolver.resolve(gvk).await?;
        let informer = {
            let mut informers = self.informers.write().await;
            informers
                .entry(gvk.clone())
                .or_insert_with(|| {
                    let writer = Writer::new(mapping.resource.clone());
                    Arc::new(Informer {
                        store: writer.as_reader(),
                        writer: Mutex::new(Some(writer)),
                        mapping,
                    })
                })
                .clone()
        };

        if let Some(token) = self.running_token().await {
            self.spawn_informer(&informer, &token).await;
        }
        Ok(informer)
    }

    async fn informer_for_read(&self, gvk: &GroupVersionKind) -> Result<Arc<Informer>> {
        let token = self
            .running_token()
            .await
            .ok_or(ClusterError::CacheNotStarted)?;
        let informer = self.ensure_informer(gvk).await?;

        tokio::select! {
            _ = token.cancelled() => Err(ClusterError::Cache(format!(
                "cache stopped before {} synced",
                display_gvk(gvk)
            ))),
            ready = informer.store.wait_until_ready() => {
                ready.map_err(|_| ClusterError::Cache(format!(
                    "informer for {} stopped before syncing",
                    display_gvk(gvk)
                )))?;
                Ok(informer)
            }
        }
    }

    async fn spawn_informer(&self, informer: &Informer, token: &CancellationToken) {
        let Some(writer) = informer.writer.lock().await.take() else {
            return;
        };

        let resource = &informer.mapping.resource;
        let api = match (&self.namespace, informer.mapping.namespaced) {
            (Some(ns), true) => Api::namespaced_with(self.client.clone(), ns, resource),
            _ => Api::all_with(self.client.clone(), resource),
        };

        debug!(kind = %resource.kind, namespace = ?self.namespace, "Starting informer");
        self.tasks.spawn(run_informer(
            api,
            writer,
            self.resync_interval,
            token.clone(),
            resource.kind.clone(),
        ));
    }

    async fn indexer(&self, gvk: &GroupVersionKind, field: &str) -> Option<IndexFn> {
        self.indexers
            .read()
            .await
            .get(gvk)
            .and_then(|by_field| by_field.get(field))
            .cloned()
    }
}

#[async_trait::async_trait]
impl ObjectReader for InformerCache {
    async fn get(&self, gvk: &GroupVersionKind, key: &ObjectKey) -> Result<DynamicObject> {
        let informer = self.informer_for_read(gvk).await?;

        let mut obj_ref = ObjectRef::new_with(&key.name, informer.mapping.resource.clone());
        if informer.mapping.namespaced {
            if let Some(ns) = &key.namespace {
                obj_ref = obj_ref.within(ns);
            }
        }

        informer
            .store
            .get(&obj_ref)
            .map(|obj| with_type_meta(obj.as_ref().clone(), &informer.mapping.resource))
            .ok_or_else(|| ClusterError::not_found(gvk, &key.name, key.namespace.as_deref()))
    }

    async fn list(&self, gvk: &GroupVersionKind, opts: &ListOptions) -> Result<Vec<DynamicObject>> {
        let informer = self.informer_for_read(gvk).await?;

        let index = match &opts.field {
            Some(selector) => Some(self.indexer(gvk, &selector.field).await.ok_or_else(|| {
                ClusterError::Cache(format!(
                    "field {} is not indexed for {}",
                    selector.field,
                    display_gvk(gvk)
                ))
            })?),
            None => None,
        };

        Ok(filter_objects(
            informer.store.state(),
            opts,
            &informer.mapping,
            index.as_ref(),
        ))
    }
}

#[async_trait::async_trait]
impl FieldIndexer for InformerCache {
    async fn index_field(
        &self,
        gvk: &GroupVersionKind,
        field: &str,
        extract: IndexFn,
    ) -> Result<()> {
        self.ensure_informer(gvk).await?;

        let mut indexers = self.indexers.write().await;
        let by_field = indexers.entry(gvk.clone()).or_default();
        if by_field.contains_key(field) {
            return Err(ClusterError::IndexConflict {
                kind: display_gvk(gvk),
                field: field.to_string(),
            });
        }
        by_field.insert(field.to_string(), extract);
        Ok(())
    }
}

#[async_trait::async_trait]
impl Cache for InformerCache {
    async fn run(&self, cancel: CancellationToken) -> Result<()> {
        {
            let mut running = self.running.lock().await;
            if running.is_some() {
                return Err(ClusterError::AlreadyStarted);
            }
            *running = Some(cancel.clone());
        }

        let informers: Vec<_> = self.informers.read().await.values().cloned().collect();
        info!(
            kinds = informers.len(),
            namespace = self.namespace.as_deref().unwrap_or("all"),
            "Starting informer cache"
        );
        for informer in &informers {
            self.spawn_informer(informer, &cancel).await;
        }

        cancel.cancelled().await;

        self.tasks.close();
        self.tasks.wait().await;
        info!("Informer cache stopped");
        Ok(())
    }
}

async fn run_informer(
    api: Api<DynamicObject>,
    mut writer: Writer<DynamicObject>,
    resync_interval: Duration,
    cancel: CancellationToken,
    kind: String,
) {
    loop {
        let resync = tokio::time::sleep(jittered(resync_interval));
        tokio::pin!(resync);
        let mut events = watcher(api.clone(), watcher::Config::default())
            .default_backoff()
            .boxed();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(kind = %kind, "Informer stopped");
                    return;
                }
                _ = &mut resync => {
                    debug!(kind = %kind, "Resyncing informer");
                    break;
                }
                event = events.next() => match event {
                    Some(Ok(event)) => writer.apply_watcher_event(&event),
                    Some(Err(e)) => warn!(kind = %kind, error = %e, "Watch failed"),
                    None => break,
                },
            }
        }
    }
}

fn jittered(base: Duration) -> Duration {
    let factor = 1.0 + rand::thread_rng().gen::<f64>() * RESYNC_JITTER_FACTOR;
    base.mul_f64(factor)
}

fn filter_objects(
    objects: Vec<Arc<DynamicObject>>,
    opts: &ListOptions,
    mapping: &ResourceMapping,
    index: Option<&IndexFn>,
) -> Vec<DynamicObject> {
    objects
        .into_iter()
        .filter(|obj| match (&opts.namespace, mapping.namespaced) {
            (Some(ns), true) => obj.metadata.namespace.as_ref() == Some(ns),
            _ => true,
        })
        .filter(|obj| opts.matches_labels(obj.metadata.labels.as_ref()))
        .filter(|obj| match (index, &opts.field) {
            (Some(extract), Some(selector)) => extract(obj).contains(&selector.value),
            _ => true,
        })
        .map(|obj| with_type_meta(obj.as_ref().clone(), &mapping.resource))
        .collect()
}
