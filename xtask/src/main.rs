use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::Command;

#[derive(Parser)]
#[command(name = "xtask", about = "Workspace automation for modelsketch")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Clone, Copy)]
enum Commands {
    /// Run fmt, clippy, tests, docs and the sketch smoke check
    Check,
    /// Run cargo fmt --check on all crates
    Fmt,
    /// Run clippy on all crates, warnings denied
    Clippy,
    /// Run all tests
    Test,
    /// Build rustdoc for the workspace
    Doc,
    /// Build the entire workspace
    Build,
    /// Describe every shipped sketch with the CLI
    Sketches,
}

fn cargo(label: &str, args: &[&str]) -> Result<()> {
    println!("==> {label}");
    let status = Command::new("cargo")
        .args(args)
        .status()
        .with_context(|| format!("spawning cargo for {label}"))?;
    if !status.success() {
        bail!("{label} failed");
    }
    Ok(())
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Check => {
            for step in [
                Commands::Fmt,
                Commands::Clippy,
                Commands::Test,
                Commands::Doc,
                Commands::Sketches,
            ] {
                run(step)?;
            }
            Ok(())
        }
        Commands::Fmt => cargo("cargo fmt --check", &["fmt", "--all", "--", "--check"]),
        Commands::Clippy => cargo(
            "cargo clippy",
            &["clippy", "--workspace", "--all-targets", "--", "-D", "warnings"],
        ),
        Commands::Test => cargo("cargo test", &["test", "--workspace"]),
        Commands::Doc => cargo("cargo doc", &["doc", "--workspace", "--no-deps"]),
        Commands::Build => cargo("cargo build", &["build", "--workspace"]),
        Commands::Sketches => {
            for sketch in sketch_files(&workspace_root().join("sketches"))? {
                let path = sketch.to_string_lossy();
                cargo(
                    &format!("describe {path}"),
                    &["run", "-q", "-p", "modelsketch-cli", "--", "describe", &path],
                )?;
            }
            Ok(())
        }
    }
}

fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

fn sketch_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("reading {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext == "yaml"))
        .collect();
    files.sort();
    Ok(files)
}

fn main() -> Result<()> {
    run(Cli::parse().command)
}
