//! Kubernetes cluster commands

use super::commands::GlobalArgs;
use super::display::{table::SyncSummary, TableRenderer};
use super::settings::{parse_kind, Settings};
use crate::domain::cluster::Cluster;
use crate::infrastructure::kubernetes::recorder::Event;
use crate::infrastructure::kubernetes::{
    load_config, ListOptions, ObjectKey, ObjectReader, ResourceMapping, TypeRegistry,
};
use crate::shared::error::{ClusterError, Result};
use clap::Parser;
use k8s_openapi::api::core::v1::ObjectReference;
use kube::api::{DynamicObject, GroupVersionKind};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const REPORTING_CONTROLLER: &str = "kube-cluster";

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Yaml,
    Json,
    Table,
}

#[derive(Parser, Debug, Clone)]
pub struct RunCommand {
    /// Kinds to sync immediately and summarize (repeatable)
    /// Other kinds start syncing on first read
    #[arg(long, value_name = "KIND")]
    pub watch: Vec<String>,
}

#[derive(Parser, Debug, Clone)]
pub struct GetCommand {
    /// Kind, e.g. Pod, apps/v1/Deployment
    pub kind: String,

    /// Object name
    pub name: String,

    /// Read through the cache instead of straight from the API server
    #[arg(long)]
    pub cached: bool,

    #[arg(long, short = 'o', value_enum, default_value = "yaml")]
    pub output: OutputFormat,
}

#[derive(Parser, Debug, Clone)]
pub struct ListCommand {
    /// Kind, e.g. Pod, apps/v1/Deployment
    pub kind: String,

    /// Label selector terms (key=value, repeatable)
    #[arg(long, short = 'l', value_name = "KEY=VALUE")]
    pub selector: Vec<String>,

    /// Read through the cache instead of straight from the API server
    #[arg(long)]
    pub cached: bool,

    #[arg(long, short = 'o', value_enum, default_value = "table")]
    pub output: OutputFormat,
}

#[derive(Parser, Debug, Clone)]
pub struct ResolveCommand {
    /// Kind, e.g. Pod, apps/v1/Deployment
    pub kind: String,
}

#[derive(Parser, Debug, Clone)]
pub struct TypesCommand {}

#[derive(Parser, Debug, Clone)]
pub struct EventCommand {
    /// Kind of the object the event is about
    pub kind: String,

    /// Object name
    pub name: String,

    /// Short machine-readable reason, e.g. Synced
    #[arg(long)]
    pub reason: String,

    /// What was done, e.g. Reconciling
    #[arg(long, default_value = "Manual")]
    pub action: String,

    /// Human-readable message
    #[arg(long)]
    pub note: Option<String>,

    /// Record a Warning instead of a Normal event
    #[arg(long)]
    pub warning: bool,
}

/// A built cluster plus, when cached reads are needed, its running cache.
struct Session {
    cluster: Arc<Cluster>,
    settings: Settings,
    cancel: CancellationToken,
    running: Option<JoinHandle<Result<()>>>,
}

impl Session {
    async fn open(global: &GlobalArgs) -> anyhow::Result<Self> {
        let settings = global.settings()?;
        let config = load_config(settings.kubeconfig.as_deref(), settings.context.clone()).await?;
        let options = settings.options(Arc::new(TypeRegistry::default()))?;
        let cluster = Arc::new(Cluster::build(Some(config), options)?);
        info!(cluster = ?cluster, "Cluster built");

        Ok(Self {
            cluster,
            settings,
            cancel: CancellationToken::new(),
            running: None,
        })
    }

    fn start(&mut self) {
        if self.running.is_none() {
            let cluster = self.cluster.clone();
            let cancel = self.cancel.clone();
            self.running = Some(tokio::spawn(async move { cluster.start(cancel).await }));
        }
    }

    /// The composed client with the cache running, or the direct reader.
    fn reader(&mut self, cached: bool) -> Arc<dyn ObjectReader> {
        if cached {
            self.start();
            Arc::new(self.cluster.client())
        } else {
            self.cluster.api_reader()
        }
    }

    fn parse_kind(&self, kind: &str) -> anyhow::Result<GroupVersionKind> {
        parse_kind(&self.cluster.registry(), kind)
    }

    async fn mapping(&self, gvk: &GroupVersionKind) -> anyhow::Result<ResourceMapping> {
        Ok(self.cluster.type_resolver().resolve(gvk).await?)
    }

    fn key(&self, mapping: &ResourceMapping, name: &str) -> ObjectKey {
        if mapping.namespaced {
            let namespace = self
                .settings
                .namespace
                .clone()
                .filter(|ns| !ns.is_empty())
                .unwrap_or_else(|| self.cluster.config().default_namespace.clone());
            ObjectKey::namespaced(namespace, name)
        } else {
            ObjectKey::cluster_scoped(name)
        }
    }

    /// Stops the cache if it was started and returns its result.
    async fn close(self) -> anyhow::Result<()> {
        self.cancel.cancel();
        if let Some(running) = self.running {
            running.await??;
        }
        Ok(())
    }
}

/// Retries reads that race the cache's startup.
async fn read_with_startup<T, F, Fut>(mut read: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    for _ in 0..100 {
        match read().await {
            Err(ClusterError::CacheNotStarted) => tokio::time::sleep(Duration::from_millis(50)).await,
            other => return other,
        }
    }
    read().await
}

fn print_object(obj: &DynamicObject, output: OutputFormat) -> anyhow::Result<()> {
    match output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(obj)?),
        OutputFormat::Yaml | OutputFormat::Table => print!("{}", serde_yaml::to_string(obj)?),
    }
    Ok(())
}

fn parse_selector(terms: &[String]) -> anyhow::Result<ListOptions> {
    let mut options = ListOptions::default();
    for term in terms {
        let (key, value) = term
            .split_once('=')
            .ok_or_else(|| anyhow::anyhow!("Invalid selector '{}', expected key=value", term))?;
        options = options.with_label(key.trim(), value.trim());
    }
    Ok(options)
}

fn object_reference(obj: &DynamicObject, mapping: &ResourceMapping) -> ObjectReference {
    ObjectReference {
        api_version: Some(mapping.resource.api_version.clone()),
        kind: Some(mapping.resource.kind.clone()),
        name: obj.metadata.name.clone(),
        namespace: obj.metadata.namespace.clone(),
        uid: obj.metadata.uid.clone(),
        resource_version: obj.metadata.resource_version.clone(),
        ..Default::default()
    }
}

impl RunCommand {
    pub async fn execute(&self, global: &GlobalArgs) -> anyhow::Result<()> {
        let mut session = Session::open(global).await?;
        let kinds = self
            .watch
            .iter()
            .map(|kind| session.parse_kind(kind).map(|gvk| (kind.clone(), gvk)))
            .collect::<anyhow::Result<Vec<_>>>()?;
        session.start();

        let cache = session.cluster.cache();
        let everything = ListOptions::default();
        let mut rows = Vec::new();
        for (kind, gvk) in kinds {
            let list = read_with_startup(|| cache.list(&gvk, &everything)).await;
            match list {
                Ok(objects) => rows.push(SyncSummary {
                    kind,
                    count: Some(objects.len()),
                    detail: String::new(),
                }),
                Err(e) => {
                    warn!(kind = %kind, error = %e, "Failed to sync kind");
                    rows.push(SyncSummary {
                        kind,
                        count: None,
                        detail: e.to_string(),
                    });
                }
            }
        }
        println!("{}", TableRenderer::new().render_sync_summary(&rows));

        info!("Cluster running, press Ctrl-C to stop");
        let Some(mut running) = session.running.take() else {
            return Ok(());
        };
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal?;
                info!("Shutting down");
                session.cancel.cancel();
                running.await??;
            }
            result = &mut running => {
                result??;
            }
        }
        Ok(())
    }
}

impl GetCommand {
    pub async fn execute(&self, global: &GlobalArgs) -> anyhow::Result<()> {
        let mut session = Session::open(global).await?;
        let gvk = session.parse_kind(&self.kind)?;
        let mapping = session.mapping(&gvk).await?;
        let key = session.key(&mapping, &self.name);
        let reader = session.reader(self.cached);

        let obj = read_with_startup(|| reader.get(&gvk, &key)).await?;
        print_object(&obj, self.output)?;
        session.close().await
    }
}

impl ListCommand {
    pub async fn execute(&self, global: &GlobalArgs) -> anyhow::Result<()> {
        let mut session = Session::open(global).await?;
        let gvk = session.parse_kind(&self.kind)?;
        let mut options = parse_selector(&self.selector)?;
        if let Some(namespace) = session.settings.namespace.clone().filter(|ns| !ns.is_empty()) {
            options = options.in_namespace(namespace);
        }
        let reader = session.reader(self.cached);

        let objects = read_with_startup(|| reader.list(&gvk, &options)).await?;
        match self.output {
            OutputFormat::Table => {
                println!("{}", TableRenderer::new().render_objects(&gvk.kind, &objects))
            }
            format => {
                for obj in &objects {
                    if format == OutputFormat::Yaml {
                        println!("---");
                    }
                    print_object(obj, format)?;
                }
            }
        }
        session.close().await
    }
}

impl ResolveCommand {
    pub async fn execute(&self, global: &GlobalArgs) -> anyhow::Result<()> {
        let session = Session::open(global).await?;
        let gvk = session.parse_kind(&self.kind)?;
        let mapping = session.mapping(&gvk).await?;
        println!("{}", TableRenderer::new().render_resolution(&mapping));
        Ok(())
    }
}

impl TypesCommand {
    pub async fn execute(&self, _global: &GlobalArgs) -> anyhow::Result<()> {
        let registry = TypeRegistry::default();
        println!("{}", TableRenderer::new().render_types(&registry.kinds()));
        Ok(())
    }
}

impl EventCommand {
    pub async fn execute(&self, global: &GlobalArgs) -> anyhow::Result<()> {
        let mut session = Session::open(global).await?;
        let gvk = session.parse_kind(&self.kind)?;
        let mapping = session.mapping(&gvk).await?;
        let key = session.key(&mapping, &self.name);
        let obj = session.cluster.api_reader().get(&gvk, &key).await?;

        // The cluster flushes and stops its broadcaster when the cache stops.
        session.start();
        let mut event = if self.warning {
            Event::warning(&self.reason, &self.action)
        } else {
            Event::normal(&self.reason, &self.action)
        };
        if let Some(note) = &self.note {
            event = event.with_note(note);
        }
        session
            .cluster
            .recorder_for(REPORTING_CONTROLLER)
            .publish(&object_reference(&obj, &mapping), event);

        session.close().await?;
        println!(
            "Recorded {} event on {} {}",
            self.reason, mapping.resource.kind, self.name
        );
        Ok(())
    }
}
