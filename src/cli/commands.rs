// CLI command definitions

use super::k8s::{
    EventCommand, GetCommand, ListCommand, ResolveCommand, RunCommand, TypesCommand,
};
use super::settings::{FileSettings, FlagSettings, Settings};
use crate::infrastructure::constants::CONFIG_FILE_ENV;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "kube-cluster",
    version,
    about = "Build and drive a cached Kubernetes cluster connection",
    long_about = "Assembles a watch-backed cache, a composed client, an uncached reader, a type resolver and event recorders from one kubeconfig, then runs or queries them"
)]
pub struct CliArgs {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(clap::Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Path to kubeconfig file
    /// If not specified, uses default kubeconfig resolution (KUBECONFIG env, ~/.kube/config, in-cluster)
    #[arg(long, global = true, value_name = "PATH")]
    pub kubeconfig: Option<PathBuf>,

    /// Kubernetes context to use
    #[arg(long, global = true)]
    pub context: Option<String>,

    /// Namespace the cache is restricted to; also the namespace for get/list/event
    #[arg(long, short = 'n', global = true)]
    pub namespace: Option<String>,

    /// Minimum seconds between cache relists (default 36000)
    #[arg(long, global = true, value_name = "SECONDS")]
    pub resync_seconds: Option<u64>,

    /// Send every write as a server-side dry run
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Always read this kind from the API server (repeatable)
    #[arg(long, global = true, value_name = "KIND")]
    pub disable_cache_for: Vec<String>,

    /// TOML file with defaults for the flags above
    /// Falls back to the KUBE_CLUSTER_CONFIG_FILE environment variable
    #[arg(long, global = true, value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub log_json: bool,
}

impl GlobalArgs {
    pub fn settings(&self) -> anyhow::Result<Settings> {
        self.settings_with_env(std::env::var(CONFIG_FILE_ENV).ok())
    }

    /// Like [`GlobalArgs::settings`], with the value of the config-file
    /// environment variable passed in.
    pub fn settings_with_env(&self, env_file: Option<String>) -> anyhow::Result<Settings> {
        let file = FileSettings::discover(self.config_file.as_deref(), env_file)?;
        let flags = FlagSettings {
            kubeconfig: self.kubeconfig.clone(),
            context: self.context.clone(),
            namespace: self.namespace.clone(),
            resync_seconds: self.resync_seconds,
            dry_run: self.dry_run,
            disable_cache_for: self.disable_cache_for.clone(),
        };
        Ok(Settings::merge(flags, file))
    }
}

#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Run the cluster cache until interrupted
    Run(RunCommand),

    /// Print one object
    Get(GetCommand),

    /// List objects of a kind
    List(ListCommand),

    /// Show how a kind maps to an API resource
    Resolve(ResolveCommand),

    /// List the kinds known without discovery
    Types(TypesCommand),

    /// Record an event about an object
    Event(EventCommand),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_flags_after_subcommand() {
        let args = CliArgs::try_parse_from([
            "kube-cluster",
            "list",
            "Pod",
            "-n",
            "payments",
            "--disable-cache-for",
            "Secret",
            "--disable-cache-for",
            "ConfigMap",
            "--dry-run",
        ])
        .unwrap();

        assert_eq!(args.global.namespace.as_deref(), Some("payments"));
        assert_eq!(args.global.disable_cache_for, vec!["Secret", "ConfigMap"]);
        assert!(args.global.dry_run);
        assert!(matches!(args.command, Commands::List(ref cmd) if cmd.kind == "Pod"));
    }

    #[test]
    fn test_settings_without_file() {
        let args = CliArgs::try_parse_from(["kube-cluster", "--resync-seconds", "60", "types"])
            .unwrap();
        let settings = args.global.settings_with_env(None).unwrap();
        assert_eq!(
            settings.resync_interval,
            Some(std::time::Duration::from_secs(60))
        );
        assert!(!settings.dry_run);
    }
}
