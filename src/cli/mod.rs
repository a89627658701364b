//! Command line interface for the `kube-cluster` binary

pub mod commands;
pub mod display;
pub mod k8s;
pub mod settings;

pub use commands::{CliArgs, Commands, GlobalArgs};
