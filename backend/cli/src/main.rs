mod backup_cmd;
mod config;
mod page_cmd;
mod rules_cmd;
mod settings_cmd;
mod terminal_output;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{debug, error};

use veil_config::store_file_path;
use veil_core::{FileKvStore, KeyValueStore};
use veil_logging::init_logger;

use config::Config;
use rules_cmd::RuleCommands;
use settings_cmd::SettingsCommands;
use terminal_output::note_error;

#[derive(Parser)]
#[command(name = "veil")]
#[command(about = "Veil: hide page elements with saved selector rules")]
#[command(version)]
struct Cli {
    /// Directory holding the rule store and logs (default: $VEIL_DATA_DIR or ~/.veil)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Host the rules are scoped to (default: $VEIL_HOST, or the snapshot's host)
    #[arg(long, global = true)]
    host: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage stored rules
    #[command(subcommand)]
    Rules(RuleCommands),
    /// Write every rule to a timestamped backup file
    Backup {
        /// Where to write the backup
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
    },
    /// Replace every rule with the contents of a backup file
    Restore { file: PathBuf },
    /// Apply the stored rules to a page snapshot
    Apply {
        /// JSON page snapshot
        #[arg(long)]
        page: PathBuf,
        /// Report how many rules matched
        #[arg(long)]
        summary: bool,
    },
    /// Tap an element of a page snapshot and build a rule for it
    Pick {
        #[arg(long)]
        page: PathBuf,
        #[arg(long)]
        x: f64,
        #[arg(long)]
        y: f64,
        /// Widen the selection this many ancestors up
        #[arg(long, default_value_t = 0)]
        level: usize,
        /// Save the rule and hide the matches
        #[arg(long)]
        save: bool,
    },
    /// Show or change settings
    #[command(subcommand)]
    Settings(SettingsCommands),
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %format!("{e:#}"), "Command failed");
            note_error(&format!("{e:#}"));
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let env = Config::from_env();
    let config = Config {
        data_dir: cli.data_dir.unwrap_or(env.data_dir),
        host: cli.host.or(env.host),
        ..env
    };

    init_logger(config.logs_dir(), &config.log_level)?;

    let store_path = store_file_path(&config.data_dir);
    debug!(path = %store_path.display(), "Using rule store");
    let kv: Arc<dyn KeyValueStore> = Arc::new(FileKvStore::new(store_path));

    match cli.command {
        Commands::Rules(cmd) => rules_cmd::run(cmd, kv, &require_host(&config)?).await,
        Commands::Backup { out_dir } => {
            backup_cmd::backup(kv, config.host.as_deref().unwrap_or_default(), &out_dir).await
        }
        Commands::Restore { file } => {
            backup_cmd::restore(kv, config.host.as_deref().unwrap_or_default(), &file).await
        }
        Commands::Apply { page, summary } => {
            let doc = page_cmd::load_page(&page, config.host.as_deref()).await?;
            page_cmd::apply(kv, doc, summary).await
        }
        Commands::Pick {
            page,
            x,
            y,
            level,
            save,
        } => {
            let doc = page_cmd::load_page(&page, config.host.as_deref()).await?;
            page_cmd::pick(kv, doc, x, y, level, save).await
        }
        Commands::Settings(cmd) => settings_cmd::run(cmd, kv).await,
    }
}

fn require_host(config: &Config) -> Result<String> {
    config
        .host
        .clone()
        .context("No host given; pass --host or set VEIL_HOST")
}
