//! Warden CLI
//!
//! Run untrusted scripts under policy and resource limits, and inspect
//! their execution history.

#![warn(missing_docs)]
#![warn(clippy::all)]

use clap::{Parser, Subcommand};
use color_eyre::Result;
use color_eyre::eyre::WrapErr;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use warden_policy::default_blacklist;
use warden_runtime::{ExecutorConfig, ScriptExecutor};

#[derive(Parser)]
#[command(name = "warden")]
#[command(about = "Warden - sandboxed script execution with an audit ledger", long_about = None)]
struct Cli {
    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// More logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the storage directories
    Init,
    /// Execute a script and print its record
    Run {
        /// Path to the script
        #[arg(short, long)]
        file: PathBuf,
        /// Script id the record is filed under
        #[arg(short, long)]
        id: String,
        /// Override the wall-clock limit
        #[arg(long)]
        timeout_ms: Option<u64>,
        /// Override the console call budget
        #[arg(long)]
        max_calls: Option<u64>,
        /// Override the heap limit
        #[arg(long)]
        max_memory_bytes: Option<u64>,
    },
    /// Report every blacklisted symbol a script references
    Check {
        /// Path to the script
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Print every record for a script id
    History {
        /// Script id
        #[arg(short, long)]
        id: String,
    },
    /// List the blacklist in match order
    Blacklist,
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warden=info",
        1 => "warden=debug",
        _ => "warden=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<ExecutorConfig> {
    match path {
        Some(path) => ExecutorConfig::from_file(path)
            .wrap_err_with(|| format!("loading configuration from {}", path.display())),
        None => Ok(ExecutorConfig::default()),
    }
}

fn read_script(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).wrap_err_with(|| format!("reading script {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let config = load_config(cli.config.as_deref())?;
    tracing::debug!(?config, "configuration loaded");

    match cli.command {
        Commands::Init => {
            let config = ScriptExecutor::init(config)?.config().clone();
            println!("scripts: {}", config.scripts_dir.display());
            println!("results: {}", config.results_dir.display());
            println!("logs:    {}", config.logs_dir.display());
            Ok(())
        }
        Commands::Run {
            file,
            id,
            timeout_ms,
            max_calls,
            max_memory_bytes,
        } => {
            let mut config = config;
            if let Some(ms) = timeout_ms {
                config = config.with_timeout_ms(ms);
            }
            if let Some(calls) = max_calls {
                config = config.with_max_calls(calls);
            }
            if let Some(bytes) = max_memory_bytes {
                config = config.with_max_memory_bytes(bytes);
            }
            let source = read_script(&file)?;
            let executor = ScriptExecutor::init(config)?;
            let record = executor.execute_script(&source, &id).await?;
            println!("{}", serde_json::to_string_pretty(&record)?);
            if !record.success {
                std::process::exit(1);
            }
            Ok(())
        }
        Commands::Check { file } => {
            let source = read_script(&file)?;
            let violations = default_blacklist().scan(&source);
            if violations.is_empty() {
                println!("No blacklisted symbols found");
                return Ok(());
            }
            for violation in &violations {
                println!("{}", violation.summary());
            }
            std::process::exit(1);
        }
        Commands::History { id } => {
            let executor = ScriptExecutor::init(config)?;
            let records = executor.get_script_history(&id)?;
            println!("{}", serde_json::to_string_pretty(&records)?);
            Ok(())
        }
        Commands::Blacklist => {
            for entry in default_blacklist().entries() {
                println!(
                    "{:<20} {:<9} {}",
                    entry.symbol,
                    entry.risk_level.to_string(),
                    entry.reasons.join("; ")
                );
            }
            Ok(())
        }
    }
}
