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

use super::lifecycle::{Lifecycle, LifecycleState};
use crate::domain::config::options::Options;
use crate::infrastructure::constants::EVENTS_LOGGER_NAME;
use crate::infrastructure::kubernetes::cache::{Cache, CacheOptions, FieldIndexer};
use crate::infrastructure::kubernetes::client::{
    ApiClient, CacheReadOptions, ClientOptions, DryRunClient, ObjectClient, ObjectReader,
    TypedClient,
};
use crate::infrastructure::kubernetes::recorder::{EventRecorder, RecorderProvider};
use crate::infrastructure::kubernetes::registry::TypeRegistry;
use crate::infrastructure::kubernetes::resolver::TypeResolver;
use crate::shared::error::{ClusterError, Result};
use crate::shared::logger::Logger;
use kube::{Client, Config};
use std::fmt;
use std::mem::discriminant;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// Everything a controller needs to talk to one API server.
///
/// The cache, the composed client and the direct reader share one registry and
/// one resolver. Nothing is replaced after [`Cluster::build`] returns, so every
/// accessor is a plain read.
pub struct Cluster {
    config: Arc<Config>,
    transport: Client,
    registry: Arc<TypeRegistry>,
    resolver: Arc<dyn TypeResolver>,
    cache: Arc<dyn Cache>,
    client: Arc<dyn ObjectClient>,
    api_reader: Arc<dyn ObjectReader>,
    recorder_provider: RecorderProvider,
    logger: Logger,
    lifecycle: Lifecycle,
}

impl Cluster {
    /// Builds a cluster from connection settings and options.
    ///
    /// Steps run in order: defaults, type resolver, cache, client, direct
    /// reader, recorder provider. The first failure aborts the build. Nothing
    /// here talks to the API server or starts background work, but deriving a
    /// transport needs a Tokio runtime.
    pub fn build(config: Option<Config>, options: Options) -> Result<Self> {
        let config = Arc::new(config.ok_or(ClusterError::ConfigMissing)?);
        let resolved = options.resolve(&config)?;
        let logger = resolved.logger.clone();

        let resolver = (resolved.resolver_strategy)(&config, &resolved.transport).map_err(|e| {
            let err = classify(e, ClusterError::TypeResolution);
            logger.error(&err, "Failed to get API Group-Resources");
            err
        })?;

        let cache = (resolved.cache_strategy)(
            &config,
            CacheOptions {
                transport: resolved.transport.clone(),
                registry: resolved.registry.clone(),
                resolver: resolver.clone(),
                resync_interval: resolved.resync_interval,
                namespace: resolved.namespace.clone(),
            },
        )
        .map_err(|e| {
            let err = classify(e, ClusterError::CacheConstruction);
            logger.error(&err, "Failed to create cache");
            err
        })?;

        let client = (resolved.client_strategy)(
            &config,
            ClientOptions {
                transport: resolved.transport.clone(),
                registry: resolved.registry.clone(),
                resolver: resolver.clone(),
                cache: Some(CacheReadOptions {
                    reader: Arc::new(cache.clone()),
                    disable_for: resolved.disable_cache_for.clone(),
                }),
            },
        )
        .map_err(|e| {
            let err = classify(e, ClusterError::ClientConstruction);
            logger.error(&err, "Failed to create client");
            err
        })?;
        let client: Arc<dyn ObjectClient> = if resolved.dry_run {
            Arc::new(DryRunClient::new(client))
        } else {
            client
        };

        let api_reader: Arc<dyn ObjectReader> = Arc::new(ApiClient::new(
            resolved.transport.clone(),
            resolved.registry.clone(),
            resolver.clone(),
        ));

        let recorder_provider = (resolved.recorder_strategy)(
            &config,
            &resolved.transport,
            &resolved.registry,
            logger.with_name(EVENTS_LOGGER_NAME),
            resolved.broadcaster_factory.clone(),
        )
        .map_err(|e| {
            let err = classify(e, ClusterError::RecorderProvider);
            logger.error(&err, "Failed to create recorder provider");
            err
        })?;

        Ok(Self {
            config,
            transport: resolved.transport,
            registry: resolved.registry,
            resolver,
            cache,
            client,
            api_reader,
            recorder_provider,
            logger,
            lifecycle: Lifecycle::new(),
        })
    }

    pub fn transport(&self) -> &Client {
        &self.transport
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn cache(&self) -> Arc<dyn Cache> {
        self.cache.clone()
    }

    pub fn registry(&self) -> Arc<TypeRegistry> {
        self.registry.clone()
    }

    /// Reads from the cache unless the kind bypasses it; writes go to the API
    /// server.
    pub fn client(&self) -> Arc<dyn ObjectClient> {
        self.client.clone()
    }

    /// The composed client addressed by Rust type through the cluster's
    /// registry.
    pub fn typed_client(&self) -> TypedClient {
        TypedClient::new(self.client.clone(), self.registry.clone())
    }

    pub fn field_indexer(&self) -> Arc<dyn FieldIndexer> {
        Arc::new(self.cache.clone())
    }

    /// Recorder whose events name `name` as the reporting controller.
    pub fn recorder_for(&self, name: &str) -> EventRecorder {
        self.recorder_provider.recorder_for(name)
    }

    pub fn type_resolver(&self) -> Arc<dyn TypeResolver> {
        self.resolver.clone()
    }

    /// Uncached reader for callers that need the API server's current view.
    pub fn api_reader(&self) -> Arc<dyn ObjectReader> {
        self.api_reader.clone()
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    pub fn state(&self) -> LifecycleState {
        self.lifecycle.get()
    }

    /// Runs the cache until `cancel` fires or the cache fails.
    ///
    /// Returns whatever the cache returned. Afterwards the cluster is
    /// terminated and a broadcaster it created is shut down. A cluster starts
    /// at most once; later calls fail with [`ClusterError::AlreadyStarted`].
    pub async fn start(&self, cancel: CancellationToken) -> Result<()> {
        if !self.lifecycle.begin() {
            return Err(ClusterError::AlreadyStarted);
        }

        self.logger.info("Starting cluster");
        let result = self.cache.run(cancel).instrument(self.logger.span()).await;
        self.lifecycle.terminate();
        self.recorder_provider.stop().await;

        match &result {
            Ok(()) => self.logger.info("Cluster stopped"),
            Err(e) => self.logger.error(e, "Cluster cache terminated"),
        }
        result
    }
}

impl fmt::Debug for Cluster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cluster")
            .field("cluster_url", &self.config.cluster_url)
            .field("default_namespace", &self.config.default_namespace)
            .field("registered_kinds", &self.registry.len())
            .field("logger", &self.logger.name())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Wraps a strategy failure in the construction error for its step, unless the
/// strategy already reported that step's error.
fn classify(err: ClusterError, wrap: fn(String) -> ClusterError) -> ClusterError {
    let wrapped_kind = discriminant(&wrap(String::new()));
    if discriminant(&err) == wrapped_kind {
        err
    } else {
        wrap(err.to_string())
    }
}
