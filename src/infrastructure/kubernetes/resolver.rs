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

//! Resolution of logical kinds to addressable API resources.

use crate::infrastructure::kubernetes::registry::{ResourceMapping, TypeRegistry};
use crate::shared::error::{ClusterError, Result};
use kube::core::GroupVersionKind;
use kube::discovery::{self, Scope};
use kube::{Client, Config};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Maps a group/version/kind to the resource path and scope used to address it.
#[async_trait::async_trait]
pub trait TypeResolver: Send + Sync {
    async fn resolve(&self, gvk: &GroupVersionKind) -> Result<ResourceMapping>;
}

/// Builds the resolver for a cluster from its connection config and transport.
pub type ResolverStrategy =
    Arc<dyn Fn(&Config, &Client) -> Result<Arc<dyn TypeResolver>> + Send + Sync>;

/// The default strategy: a [`DiscoveryResolver`] bound to the transport.
pub fn discovery_strategy() -> ResolverStrategy {
    Arc::new(|_config: &Config, client: &Client| {
        Ok(Arc::new(DiscoveryResolver::new(client.clone())) as Arc<dyn TypeResolver>)
    })
}

/// Resolves kinds against the API server's discovery endpoints.
///
/// Nothing is fetched at construction time. Each kind is looked up on first use
/// and the answer is kept for the life of the resolver.
pub struct DiscoveryResolver {
    client: Client,
    resolved: RwLock<HashMap<GroupVersionKind, ResourceMapping>>,
}

impl DiscoveryResolver {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            resolved: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait::async_trait]
impl TypeResolver for DiscoveryResolver {
    async fn resolve(&self, gvk: &GroupVersionKind) -> Result<ResourceMapping> {
        if let Some(mapping) = self.resolved.read().await.get(gvk) {
            return Ok(mapping.clone());
        }

        let (resource, capabilities) = discovery::pinned_kind(&self.client, gvk)
            .await
            .map_err(|e| match e {
                kube::Error::Discovery(_) => ClusterError::unknown_kind(gvk),
                kube::Error::Api(ae) if ae.code == 404 => ClusterError::unknown_kind(gvk),
                other => ClusterError::Api(other),
            })?;

        let mapping = ResourceMapping {
            resource,
            namespaced: capabilities.scope == Scope::Namespaced,
        };
        debug!(
            kind = %gvk.kind,
            plural = %mapping.resource.plural,
            namespaced = mapping.namespaced,
            "Discovered resource mapping"
        );

        self.resolved
            .write()
            .await
            .insert(gvk.clone(), mapping.clone());
        Ok(mapping)
    }
}

/// Answers from a fixed table and never touches the network.
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    mappings: HashMap<GroupVersionKind, ResourceMapping>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every kind the registry knows, with the registry's scope.
    pub fn from_registry(registry: &TypeRegistry) -> Self {
        let mappings = registry
            .kinds()
            .into_iter()
            .map(|mapping| (mapping.gvk(), mapping.clone()))
            .collect();
        Self { mappings }
    }

    pub fn with(mut self, mapping: ResourceMapping) -> Self {
        self.mappings.insert(mapping.gvk(), mapping);
        self
    }
}

#[async_trait::async_trait]
impl TypeResolver for StaticResolver {
    async fn resolve(&self, gvk: &GroupVersionKind) -> Result<ResourceMapping> {
        self.mappings
            .get(gvk)
            .cloned()
            .ok_or_else(|| ClusterError::unknown_kind(gvk))
    }
}
