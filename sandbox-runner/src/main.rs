//! Isolated runner executable for untrusted workspace commands.
//!
//! Invoked once per command by the engine's dispatcher. Always prints exactly
//! one JSON report on stdout so the caller can parse a uniform contract even
//! when the requested command failed; internal errors become `ok = false`
//! reports rather than bare exit codes.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand};

use engine::core::confine::resolve_within;
use engine::core::exec::ExecOutcome;
use engine::io::local::LocalSandbox;
use engine::io::sandbox::Sandbox;

#[derive(Parser)]
#[command(
    name = "sandbox-runner",
    version,
    about = "Confined runner for untrusted workspace commands"
)]
struct Cli {
    /// Workspace root. All file operations are restricted to this directory.
    #[arg(long)]
    root: PathBuf,

    /// Wall-clock budget in milliseconds.
    #[arg(long, default_value_t = 10_000)]
    timeout_ms: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run an arbitrary command: sandbox-runner run -- <cmd> <args...>
    Run {
        #[arg(last = true, required = true)]
        argv: Vec<String>,
    },
    /// Run the workspace test suite (python -m pytest -q).
    Pytest,
    /// Print a workspace file; contents arrive as the report's stdout field.
    ReadFile {
        #[arg(long)]
        path: String,
    },
    /// Apply a unified diff read from stdin.
    ApplyDiff,
}

fn main() {
    let cli = Cli::parse();
    let report = match execute(cli) {
        Ok(report) => report,
        Err(err) => ExecOutcome::failure(format!("{err:#}")),
    };
    match serde_json::to_string(&report) {
        Ok(line) => println!("{line}"),
        Err(err) => {
            eprintln!("{err:#}");
            std::process::exit(1);
        }
    }
}

fn execute(cli: Cli) -> Result<ExecOutcome> {
    let root = canonicalize_root(&cli.root)?;
    let timeout = Duration::from_millis(cli.timeout_ms);
    let sandbox = LocalSandbox::default();

    let outcome = match cli.command {
        Command::Run { argv } => sandbox.run(&argv, &root, timeout)?,
        Command::Pytest => sandbox.run_tests(&root, timeout)?,
        Command::ReadFile { path } => {
            let resolved = resolve_strict(&root, &path)?;
            let bytes =
                fs::read(&resolved).with_context(|| format!("read {}", resolved.display()))?;
            ExecOutcome::file_view(String::from_utf8_lossy(&bytes).to_string())
        }
        Command::ApplyDiff => {
            let mut diff = String::new();
            std::io::stdin()
                .read_to_string(&mut diff)
                .context("read diff from stdin")?;
            sandbox.apply_diff(&diff, &root, timeout)?
        }
    };
    Ok(outcome)
}

fn canonicalize_root(root: &Path) -> Result<PathBuf> {
    let root = root
        .canonicalize()
        .with_context(|| format!("canonicalize root {}", root.display()))?;
    if !root.is_dir() {
        bail!("root is not a directory: {}", root.display());
    }
    Ok(root)
}

/// Lexical containment plus canonicalization, so symlinks cannot escape the
/// root either.
fn resolve_strict(root: &Path, rel: &str) -> Result<PathBuf> {
    if rel.contains('\0') {
        bail!("invalid path");
    }
    let lexical = resolve_within(root, rel).map_err(|violation| anyhow!("{violation}"))?;
    let resolved = lexical
        .canonicalize()
        .with_context(|| format!("canonicalize {}", lexical.display()))?;
    if !resolved.starts_with(root) {
        bail!("path escapes workspace root: {rel}");
    }
    Ok(resolved)
}
