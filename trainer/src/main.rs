//! Episode driver for the code-repair engine.
//!
//! `episode` runs a single traced episode with a chosen baseline agent;
//! `train` runs many episodes of tabular Q-learning and reports success
//! rates.

mod cli;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(
    name = "trainer",
    version,
    about = "Drive code-repair episodes with baseline agents"
)]
struct Cli {
    /// Directory containing task definitions.
    #[arg(long, default_value = "tasks")]
    tasks_root: PathBuf,

    /// Path to the external sandbox runner binary; when absent the engine
    /// falls back to in-process execution.
    #[arg(long, default_value = "target/release/sandbox-runner")]
    runner: PathBuf,

    /// Engine configuration TOML (missing file means defaults).
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one episode and print a per-step trace.
    Episode {
        #[arg(long, default_value = "bugfix_1")]
        task: String,
        #[arg(long, value_enum, default_value_t = AgentKind::Random)]
        agent: AgentKind,
        #[arg(long, default_value_t = 0)]
        seed: u64,
    },
    /// Train the tabular Q-learning agent over many episodes.
    Train {
        #[arg(long, default_value = "bugfix_1")]
        task: String,
        #[arg(long, default_value_t = 2000)]
        episodes: u32,
        #[arg(long, default_value_t = 0)]
        seed: u64,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum AgentKind {
    Random,
    Qlearn,
}

fn main() -> Result<()> {
    engine::logging::init();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => engine::io::config::load_config(path)?,
        None => engine::io::config::EngineConfig::default(),
    };

    match cli.command {
        Command::Episode { task, agent, seed } => {
            cli::run_episode(&cli.tasks_root, &cli.runner, config, &task, agent, seed)
        }
        Command::Train {
            task,
            episodes,
            seed,
        } => cli::train(&cli.tasks_root, &cli.runner, config, &task, episodes, seed),
    }
}
