//! Settings merged from command line flags and an optional TOML file

use crate::domain::config::Options;
use crate::infrastructure::kubernetes::TypeRegistry;
use anyhow::Context;
use kube::api::GroupVersionKind;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Contents of a `--config-file`. Every key is optional; flags win.
///
/// ```toml
/// context = "staging"
/// namespace = "payments"
/// resync-seconds = 3600
/// dry-run = true
/// disable-cache-for = ["Secret", "apps/v1/Deployment"]
/// ```
#[derive(Debug, Default, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileSettings {
    pub kubeconfig: Option<PathBuf>,
    pub context: Option<String>,
    pub namespace: Option<String>,
    pub resync_seconds: Option<u64>,
    pub dry_run: Option<bool>,
    #[serde(default)]
    pub disable_cache_for: Vec<String>,
}

impl FileSettings {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Loads `path`, falling back to `env_file`, the file named by
    /// the config-file environment variable. Returns empty settings when
    /// neither is given.
    pub fn discover(path: Option<&Path>, env_file: Option<String>) -> anyhow::Result<Self> {
        match (path, env_file) {
            (Some(path), _) => Self::load(path),
            (None, Some(file)) if !file.is_empty() => Self::load(Path::new(&file)),
            _ => Ok(Self::default()),
        }
    }
}

/// Flag values as parsed, before merging.
#[derive(Debug, Default, Clone)]
pub struct FlagSettings {
    pub kubeconfig: Option<PathBuf>,
    pub context: Option<String>,
    pub namespace: Option<String>,
    pub resync_seconds: Option<u64>,
    pub dry_run: bool,
    pub disable_cache_for: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub kubeconfig: Option<PathBuf>,
    pub context: Option<String>,
    pub namespace: Option<String>,
    pub resync_interval: Option<Duration>,
    pub dry_run: bool,
    pub disable_cache_for: Vec<String>,
}

impl Settings {
    pub fn merge(flags: FlagSettings, file: FileSettings) -> Self {
        let mut disable_cache_for = file.disable_cache_for;
        for kind in flags.disable_cache_for {
            if !disable_cache_for.contains(&kind) {
                disable_cache_for.push(kind);
            }
        }

        Self {
            kubeconfig: flags.kubeconfig.or(file.kubeconfig),
            context: flags.context.or(file.context),
            namespace: flags.namespace.or(file.namespace),
            resync_interval: flags
                .resync_seconds
                .or(file.resync_seconds)
                .map(Duration::from_secs),
            dry_run: flags.dry_run || file.dry_run.unwrap_or(false),
            disable_cache_for,
        }
    }

    /// Cluster options for these settings. Kind names are looked up in
    /// `registry`.
    pub fn options(&self, registry: Arc<TypeRegistry>) -> anyhow::Result<Options> {
        let mut options = Options::new().with_dry_run(self.dry_run);
        if let Some(interval) = self.resync_interval {
            options = options.with_resync_interval(interval);
        }
        if let Some(namespace) = &self.namespace {
            options = options.with_namespace(namespace.clone());
        }
        for kind in &self.disable_cache_for {
            options = options.disable_cache_for_kind(parse_kind(&registry, kind)?);
        }
        Ok(options.with_registry(registry))
    }
}

/// Parses `Kind`, `version/Kind` or `group/version/Kind`.
///
/// A bare kind name is looked up (case-insensitively) in the registry; the
/// qualified forms are taken as given.
pub fn parse_kind(registry: &TypeRegistry, input: &str) -> anyhow::Result<GroupVersionKind> {
    match input.rsplit_once('/') {
        Some((api_version, kind)) if !kind.is_empty() && !api_version.is_empty() => {
            let (group, version) = api_version.split_once('/').unwrap_or(("", api_version));
            Ok(GroupVersionKind::gvk(group, version, kind))
        }
        Some(_) => anyhow::bail!("Invalid kind '{}'", input),
        None => registry
            .find_by_kind_name(input)
            .map(|mapping| mapping.gvk())
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "Unknown kind '{}', use group/version/Kind for unregistered kinds",
                    input
                )
            }),
    }
}
