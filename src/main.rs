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

use clap::Parser;
use kube_cluster::cli::{CliArgs, Commands, GlobalArgs};
use tracing_subscriber::EnvFilter;

fn init_tracing(global: &GlobalArgs) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&global.log_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if global.log_json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    // Initialize tracing
    init_tracing(&args.global);

    match &args.command {
        Commands::Run(cmd) => cmd.execute(&args.global).await,
        Commands::Get(cmd) => cmd.execute(&args.global).await,
        Commands::List(cmd) => cmd.execute(&args.global).await,
        Commands::Resolve(cmd) => cmd.execute(&args.global).await,
        Commands::Types(cmd) => cmd.execute(&args.global).await,
        Commands::Event(cmd) => cmd.execute(&args.global).await,
    }
}
