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

use crate::shared::error::{ClusterError, Result};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::Config;
use std::path::Path;

/// Loads connection settings.
///
/// With neither a kubeconfig path nor a context, the usual inference applies
/// (`KUBECONFIG`, `~/.kube/config`, then the in-cluster service account).
/// Otherwise the given file (or the default one) is read and `context` picks
/// the entry to use.
pub async fn load_config(kubeconfig: Option<&Path>, context: Option<String>) -> Result<Config> {
    if kubeconfig.is_none() && context.is_none() {
        return Config::infer()
            .await
            .map_err(|e| ClusterError::Config(format!("Failed to infer Kubernetes config: {}", e)));
    }

    let kubeconfig = match kubeconfig {
        Some(path) => Kubeconfig::read_from(path),
        None => Kubeconfig::read(),
    }
    .map_err(|e| ClusterError::Config(format!("Failed to load kubeconfig: {}", e)))?;

    let options = KubeConfigOptions {
        context,
        cluster: None,
        user: None,
    };

    Config::from_custom_kubeconfig(kubeconfig, &options)
        .await
        .map_err(|e| ClusterError::Config(format!("Failed to create Kubernetes config: {}", e)))
}
