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

//! Cluster construction options and their defaults.

use crate::infrastructure::constants::{CLUSTER_LOGGER_NAME, DEFAULT_RESYNC_INTERVAL};
use crate::infrastructure::kubernetes::cache::{default_cache_strategy, CacheStrategy};
use crate::infrastructure::kubernetes::client::{default_client_strategy, ClientStrategy};
use crate::infrastructure::kubernetes::recorder::{
    default_recorder_provider_strategy, BroadcasterFactory, EventBroadcaster,
    RecorderProviderStrategy,
};
use crate::infrastructure::kubernetes::registry::TypeRegistry;
use crate::infrastructure::kubernetes::resolver::{discovery_strategy, ResolverStrategy};
use crate::shared::error::{ClusterError, Result};
use crate::shared::logger::Logger;
use kube::api::GroupVersionKind;
use kube::{Client, Config, Resource};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// Caller-supplied settings for building a [`Cluster`](crate::domain::cluster::Cluster).
///
/// Every field is optional. [`Options::resolve`] fills the gaps without touching
/// the original value, so one `Options` can seed any number of clusters.
#[derive(Clone, Default)]
pub struct Options {
    pub registry: Option<Arc<TypeRegistry>>,
    pub resolver_strategy: Option<ResolverStrategy>,
    pub logger: Option<Logger>,
    /// Minimum time between cache relists.
    pub resync_interval: Option<Duration>,
    /// Restricts the cache to one namespace. Empty means all namespaces.
    pub namespace: Option<String>,
    pub transport: Option<Client>,
    pub cache_strategy: Option<CacheStrategy>,
    pub client_strategy: Option<ClientStrategy>,
    pub recorder_strategy: Option<RecorderProviderStrategy>,
    /// Kinds the composed client always reads from the API server.
    pub disable_cache_for: HashSet<GroupVersionKind>,
    pub dry_run: bool,
    /// A broadcaster owned by the caller. The cluster never shuts it down.
    pub event_broadcaster: Option<Arc<EventBroadcaster>>,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_registry(mut self, registry: Arc<TypeRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn with_resolver_strategy(mut self, strategy: ResolverStrategy) -> Self {
        self.resolver_strategy = Some(strategy);
        self
    }

    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn with_resync_interval(mut self, interval: Duration) -> Self {
        self.resync_interval = Some(interval);
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_transport(mut self, transport: Client) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn with_cache_strategy(mut self, strategy: CacheStrategy) -> Self {
        self.cache_strategy = Some(strategy);
        self
    }

    pub fn with_client_strategy(mut self, strategy: ClientStrategy) -> Self {
        self.client_strategy = Some(strategy);
        self
    }

    pub fn with_recorder_provider_strategy(mut self, strategy: RecorderProviderStrategy) -> Self {
        self.recorder_strategy = Some(strategy);
        self
    }

    /// Reads of `K` bypass the cache.
    pub fn disable_cache_for<K>(self) -> Self
    where
        K: Resource<DynamicType = ()>,
    {
        let gvk = GroupVersionKind::gvk(&K::group(&()), &K::version(&()), &K::kind(&()));
        self.disable_cache_for_kind(gvk)
    }

    pub fn disable_cache_for_kind(mut self, gvk: GroupVersionKind) -> Self {
        self.disable_cache_for.insert(gvk);
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_event_broadcaster(mut self, broadcaster: Arc<EventBroadcaster>) -> Self {
        self.event_broadcaster = Some(broadcaster);
        self
    }

    /// Returns a copy with every setting filled in.
    ///
    /// Deriving the transport from `config` needs a Tokio runtime. No network
    /// I/O happens here, and the broadcaster factory is not invoked.
    pub fn resolve(&self, config: &Config) -> Result<ResolvedOptions> {
        let logger = self
            .logger
            .clone()
            .unwrap_or_else(|| Logger::new(CLUSTER_LOGGER_NAME));

        let transport = match &self.transport {
            Some(transport) => transport.clone(),
            None => Client::try_from(config.clone()).map_err(|e| {
                let err = ClusterError::TransportDerivation(e.to_string());
                logger.error(&err, "Failed to set defaults");
                err
            })?,
        };

        let broadcaster_factory: BroadcasterFactory = match &self.event_broadcaster {
            Some(external) => {
                let external = external.clone();
                Arc::new(move || (external.clone(), false))
            }
            None => Arc::new(|| (Arc::new(EventBroadcaster::new()), true)),
        };

        Ok(ResolvedOptions {
            transport,
            registry: self
                .registry
                .clone()
                .unwrap_or_else(|| Arc::new(TypeRegistry::default())),
            resolver_strategy: self
                .resolver_strategy
                .clone()
                .unwrap_or_else(discovery_strategy),
            logger,
            resync_interval: self.resync_interval.unwrap_or(DEFAULT_RESYNC_INTERVAL),
            namespace: self.namespace.clone().filter(|ns| !ns.is_empty()),
            cache_strategy: self
                .cache_strategy
                .clone()
                .unwrap_or_else(default_cache_strategy),
            client_strategy: self
                .client_strategy
                .clone()
                .unwrap_or_else(default_client_strategy),
            recorder_strategy: self
                .recorder_strategy
                .clone()
                .unwrap_or_else(default_recorder_provider_strategy),
            disable_cache_for: self.disable_cache_for.clone(),
            dry_run: self.dry_run,
            broadcaster_factory,
        })
    }
}

/// [`Options`] with every setting concrete.
#[derive(Clone)]
pub struct ResolvedOptions {
    pub transport: Client,
    pub registry: Arc<TypeRegistry>,
    pub resolver_strategy: ResolverStrategy,
    pub logger: Logger,
    pub resync_interval: Duration,
    pub namespace: Option<String>,
    pub cache_strategy: CacheStrategy,
    pub client_strategy: ClientStrategy,
    pub recorder_strategy: RecorderProviderStrategy,
    pub disable_cache_for: HashSet<GroupVersionKind>,
    pub dry_run: bool,
    pub broadcaster_factory: BroadcasterFactory,
}
