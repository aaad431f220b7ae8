//! Sandbox bridge CLI.
//!
//! `sbx hook` is installed as the agent's PreToolUse hook; `sbx exec` runs a
//! single command through the pool; `sbx config` edits the boundary document.

use anyhow::Result;
use clap::{Parser, Subcommand};
use sbx::commands::{ConfigAction, run_config};
use sbx::hook::{run_exec, run_hook};
use sbx::{ExecutionBridge, HttpPool};
use sbx_common::{LogConfig, Settings, init_logging};
use tracing::{debug, warn};

#[derive(Parser)]
#[command(name = "sbx")]
#[command(author, version, about = "Sandbox bridge - run agent shell calls in a remote execution pool")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Handle one PreToolUse hook invocation (JSON on stdin)
    Hook,

    /// Run a command in the execution pool
    Exec {
        /// Command to execute
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
        command: Vec<String>,
    },

    /// Inspect or edit the isolation boundary
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // stdout is reserved for hook responses and command output
    let mut log_config = LogConfig::from_env("info").with_stderr();
    if cli.verbose {
        log_config = log_config.with_level("debug");
    }
    // Logging problems never block the hook
    let logging_guards = match init_logging(&log_config) {
        Ok(guards) => Some(guards),
        Err(e) => {
            eprintln!("sbx: {e}");
            None
        }
    };

    let settings = Settings::from_env();
    debug!(data_dir = %settings.data_dir.display(), config = %settings.config_path.display(), "Loaded settings");

    match cli.command {
        Commands::Hook => {
            let pool = match HttpPool::new(settings.pool_token.clone()) {
                Ok(pool) => pool,
                Err(e) => {
                    // Fail open: let the tool run unchanged
                    warn!("Failed to build pool client: {}", e);
                    return Ok(());
                }
            };
            let bridge = ExecutionBridge::new(pool, &settings);
            if let Err(e) = run_hook(&bridge).await {
                warn!("Hook failed: {}", e);
            }
            Ok(())
        }
        Commands::Exec { command } => {
            let pool = HttpPool::new(settings.pool_token.clone())?;
            let bridge = ExecutionBridge::new(pool, &settings);
            let code = run_exec(&bridge, command).await?;
            // process::exit skips destructors; flush the log writer first
            drop(logging_guards);
            std::process::exit(code);
        }
        Commands::Config { action } => {
            let mut stdout = std::io::stdout().lock();
            run_config(action, &settings, &mut stdout)
        }
    }
}
