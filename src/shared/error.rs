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

use kube::core::GroupVersionKind;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ClusterError>;

#[derive(Error, Debug)]
pub enum ClusterError {
    #[error("must specify Config")]
    ConfigMissing,

    #[error("Failed to derive transport from config: {0}")]
    TransportDerivation(String),

    #[error("Failed to get API Group-Resources: {0}")]
    TypeResolution(String),

    #[error("Failed to create cache: {0}")]
    CacheConstruction(String),

    #[error("Failed to create client: {0}")]
    ClientConstruction(String),

    #[error("Failed to create recorder provider: {0}")]
    RecorderProvider(String),

    #[error("Kubernetes API error: {0}")]
    Api(#[from] kube::Error),

    #[error("Resource not found: {kind} '{name}' in namespace '{namespace}'")]
    NotFound {
        kind: String,
        name: String,
        namespace: String,
    },

    #[error("No resource mapping for kind {0}")]
    UnknownKind(String),

    #[error("Type {0} is not registered")]
    UnregisteredType(String),

    #[error("Cache has not been started")]
    CacheNotStarted,

    #[error("Already started")]
    AlreadyStarted,

    #[error("Index for field '{field}' on kind {kind} already exists")]
    IndexConflict { kind: String, field: String },

    #[error("Invalid object: {0}")]
    InvalidObject(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ClusterError {
    pub fn not_found(
        gvk: &GroupVersionKind,
        name: impl Into<String>,
        namespace: Option<&str>,
    ) -> Self {
        Self::NotFound {
            kind: display_gvk(gvk),
            name: name.into(),
            namespace: namespace.unwrap_or_default().to_string(),
        }
    }

    pub fn unknown_kind(gvk: &GroupVersionKind) -> Self {
        Self::UnknownKind(display_gvk(gvk))
    }

    /// True when the error means the object does not exist, whether reported by
    /// the cache or by the API server.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound { .. } => true,
            Self::Api(kube::Error::Api(ae)) => ae.code == 404,
            _ => false,
        }
    }
}

/// Renders a kind as `group/version, Kind=Kind`, or `version, Kind=Kind` for the
/// core group.
pub fn display_gvk(gvk: &GroupVersionKind) -> String {
    if gvk.group.is_empty() {
        format!("{}, Kind={}", gvk.version, gvk.kind)
    } else {
        format!("{}/{}, Kind={}", gvk.group, gvk.version, gvk.kind)
    }
}
