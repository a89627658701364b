//! Build automation for kube-cluster
//!
//! Usage: cargo xtask <command>
//!
//! Available commands:
//! - build: Build the project
//! - test: Run unit and/or integration tests
//! - dist: Create a release tarball
//! - doc: Build the library documentation
//! - ci: Run CI checks

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use xshell::{cmd, Shell};

const BINARY: &str = "kube-cluster";

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Build automation for kube-cluster")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the project
    Build {
        /// Build in release mode
        #[arg(long)]
        release: bool,
    },
    /// Run tests
    Test {
        /// Run only integration tests (tests/)
        #[arg(long, conflicts_with = "unit")]
        integration: bool,
        /// Run only unit tests (src/)
        #[arg(long)]
        unit: bool,
        /// Only run tests whose name contains this string
        filter: Option<String>,
    },
    /// Create distribution packages
    Dist {
        /// Target triple (e.g., x86_64-unknown-linux-gnu)
        #[arg(long)]
        target: Option<String>,
    },
    /// Build library docs, failing on broken intra-doc links
    Doc,
    /// Run CI checks (format, clippy, test, doc)
    Ci,
    /// Format code
    Format {
        /// Check formatting without modifying files
        #[arg(long)]
        check: bool,
    },
    /// Run clippy
    Clippy,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let sh = Shell::new()?;

    sh.change_dir(project_root()?);

    match cli.command {
        Commands::Build { release } => build(&sh, release),
        Commands::Test {
            integration,
            unit,
            filter,
        } => test(&sh, integration, unit, filter.as_deref()),
        Commands::Dist { target } => dist(&sh, target),
        Commands::Doc => doc(&sh),
        Commands::Ci => ci(&sh),
        Commands::Format { check } => format(&sh, check),
        Commands::Clippy => clippy(&sh),
    }
}

fn build(sh: &Shell, release: bool) -> Result<()> {
    println!("🔨 Building {}...", BINARY);

    if release {
        cmd!(sh, "cargo build --release").run()?;
        println!("✅ Release build completed: target/release/{}", BINARY);
    } else {
        cmd!(sh, "cargo build").run()?;
        println!("✅ Debug build completed: target/debug/{}", BINARY);
    }

    Ok(())
}

fn test(sh: &Shell, integration: bool, unit: bool, filter: Option<&str>) -> Result<()> {
    println!("🧪 Running tests...");

    let filter: Vec<&str> = filter.into_iter().collect();
    if integration {
        cmd!(sh, "cargo test -p {BINARY} --test '*' {filter...}").run()?;
    } else if unit {
        cmd!(sh, "cargo test -p {BINARY} --lib --bins {filter...}").run()?;
    } else {
        cmd!(sh, "cargo test --workspace {filter...}").run()?;
    }

    println!("✅ All tests passed");
    Ok(())
}

fn dist(sh: &Shell, target: Option<String>) -> Result<()> {
    println!("📦 Creating distribution package...");

    let release_dir = match &target {
        Some(target_triple) => {
            cmd!(sh, "cargo build --release --target {target_triple}").run()?;
            format!("target/{}/release", target_triple)
        }
        None => {
            cmd!(sh, "cargo build --release").run()?;
            "target/release".to_string()
        }
    };

    let root = project_root()?;
    let dist_dir = root.join("dist");
    sh.create_dir(&dist_dir)?;
    sh.copy_file(root.join(&release_dir).join(BINARY), dist_dir.join(BINARY))?;

    let version = env!("CARGO_PKG_VERSION");
    let suffix = target.map(|t| format!("-{}", t)).unwrap_or_default();
    let archive_name = format!("{}-{}{}.tar.gz", BINARY, version, suffix);

    cmd!(sh, "tar -czf {archive_name} -C dist {BINARY}")
        .run()
        .context("Failed to create tarball")?;

    println!("✅ Distribution package created: {}", archive_name);
    Ok(())
}

fn doc(sh: &Shell) -> Result<()> {
    cmd!(sh, "cargo doc -p {BINARY} --no-deps --lib")
        .env("RUSTDOCFLAGS", "-D rustdoc::broken_intra_doc_links")
        .run()?;
    println!("✅ Documentation built: target/doc/kube_cluster/index.html");
    Ok(())
}

fn ci(sh: &Shell) -> Result<()> {
    println!("🔍 Running CI checks...");

    println!("\n📝 Checking formatting...");
    format(sh, true)?;

    println!("\n🔧 Running clippy...");
    clippy(sh)?;

    println!("\n🧪 Running tests...");
    test(sh, false, false, None)?;

    println!("\n📚 Building docs...");
    doc(sh)?;

    println!("\n✅ All CI checks passed!");
    Ok(())
}

fn format(sh: &Shell, check: bool) -> Result<()> {
    if check {
        cmd!(sh, "cargo fmt --all -- --check").run()?;
        println!("✅ Code formatting is correct");
    } else {
        cmd!(sh, "cargo fmt --all").run()?;
        println!("✅ Code formatted");
    }
    Ok(())
}

fn clippy(sh: &Shell) -> Result<()> {
    cmd!(sh, "cargo clippy --workspace --all-targets -- -D warnings").run()?;
    println!("✅ Clippy checks passed");
    Ok(())
}

fn project_root() -> Result<PathBuf> {
    Path::new(&env!("CARGO_MANIFEST_DIR"))
        .ancestors()
        .nth(1)
        .map(Path::to_path_buf)
        .context("xtask must live one level below the workspace root")
}
