use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use autosteer::config::SteerConfig;

mod cmd;

#[derive(Parser)]
#[command(name = "autosteer")]
#[command(version, about = "Phase and stop-condition engine for iterative task execution")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    /// Print results as JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize .autosteer/ in the project directory
    Init,
    /// Import, list, show, or delete profiles
    Profile {
        #[command(subcommand)]
        command: ProfileCommands,
    },
    /// Start executing a profile for a task
    Start {
        task: String,
        /// Profile id to execute
        #[arg(short, long)]
        profile: String,
        /// JSON file of metric readings
        #[arg(short, long)]
        metrics: Option<PathBuf>,
        /// Scenario id recorded with the run
        #[arg(long)]
        scenario: Option<String>,
    },
    /// Count one iteration and decide whether the current phase should end
    Evaluate {
        task: String,
        #[arg(short, long)]
        metrics: Option<PathBuf>,
        /// Decide on stored metrics without counting an iteration
        #[arg(long, conflicts_with = "metrics")]
        no_collect: bool,
    },
    /// Leave the current phase, checking quality gates
    Advance {
        task: String,
        #[arg(short, long)]
        metrics: Option<PathBuf>,
        /// Scenario id for the archive record; defaults to the one given at start
        #[arg(long)]
        scenario: Option<String>,
    },
    /// Reposition a task to a phase and iteration
    Seek {
        task: String,
        #[arg(long, allow_negative_numbers = true)]
        phase: i64,
        #[arg(long, allow_negative_numbers = true)]
        iteration: i64,
        /// Profile to start with when the task has no active execution
        #[arg(long)]
        profile: Option<String>,
        #[arg(short, long)]
        metrics: Option<PathBuf>,
    },
    /// Show where a task is in its profile
    Status { task: String },
    /// Discard a task's active execution
    Cancel { task: String },
    /// Show archived runs, newest first
    History {
        #[arg(long)]
        profile: Option<String>,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ProfileCommands {
    /// Import a profile from a .json, .toml, or .yaml file
    Import {
        file: PathBuf,
        /// Replace an existing profile with the same id
        #[arg(long)]
        replace: bool,
    },
    /// List stored profiles
    List,
    /// Show a profile's phases and gates
    Show { id: String },
    /// Delete a profile
    Delete { id: String },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Validate configuration and show any warnings
    Validate,
    /// Initialize a default autosteer.toml file
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    // Init and config commands must work even when the config file is broken.
    match &cli.command {
        Commands::Init => return cmd::cmd_init(&project_dir),
        Commands::Config { command } => return cmd::cmd_config(&project_dir, command.clone()),
        _ => {}
    }

    let config = SteerConfig::with_cli_args(project_dir, cli.verbose)?;
    let _log_guard = autosteer::logging::init(&config)?;
    let session = cmd::Session::open(config)?;

    match &cli.command {
        Commands::Init | Commands::Config { .. } => {}
        Commands::Profile { command } => cmd::cmd_profile(&session, command.clone(), cli.json).await?,
        Commands::Start {
            task,
            profile,
            metrics,
            scenario,
        } => {
            cmd::cmd_start(&session, task, profile, metrics.as_deref(), scenario.as_deref(), cli.json)
                .await?
        }
        Commands::Evaluate {
            task,
            metrics,
            no_collect,
        } => cmd::cmd_evaluate(&session, task, metrics.as_deref(), *no_collect, cli.json).await?,
        Commands::Advance {
            task,
            metrics,
            scenario,
        } => cmd::cmd_advance(&session, task, metrics.as_deref(), scenario.as_deref(), cli.json).await?,
        Commands::Seek {
            task,
            phase,
            iteration,
            profile,
            metrics,
        } => {
            cmd::cmd_seek(
                &session,
                task,
                *phase,
                *iteration,
                profile.as_deref(),
                metrics.as_deref(),
                cli.json,
            )
            .await?
        }
        Commands::Status { task } => cmd::cmd_status(&session, task, cli.json).await?,
        Commands::Cancel { task } => cmd::cmd_cancel(&session, task).await?,
        Commands::History { profile, limit } => {
            cmd::cmd_history(&session, profile.as_deref(), *limit, cli.json).await?
        }
    }

    Ok(())
}
