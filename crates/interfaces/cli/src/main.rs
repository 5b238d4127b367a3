mod transcript;
mod vault_cmds;

use std::path::PathBuf;

use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use paravault_config::AppConfig;
use paravault_memory::Category;

use crate::vault_cmds::{ExtractArgs, Vault};

#[derive(Debug, Parser)]
#[command(
    name = "paravault",
    version,
    about = "PARA-style knowledge vault with daily notes and session capture"
)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, global = true, default_value = "config/default.toml")]
    config: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Create the category, daily and template directories.
    Init,
    /// Make sure a daily note exists; prints its path, or its text with --print.
    Daily {
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long)]
        print: bool,
    },
    /// Add a timestamped line to the daily Log.
    Log {
        text: String,
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Add a bullet to the top of a daily-note section.
    Append {
        section: String,
        text: String,
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    Priorities {
        #[command(subcommand)]
        command: PriorityCommands,
    },
    /// Dates of the most recent daily notes.
    Recent {
        #[arg(short = 'n', long, default_value_t = 7)]
        limit: usize,
    },
    /// Notes in one category, newest first.
    List { category: Category },
    Counts,
    /// Drop a new note into the inbox.
    Capture {
        title: String,
        #[arg(long)]
        body: Option<String>,
    },
    /// Project matching a directory (defaults to the current one).
    Project {
        #[arg(long)]
        dir: Option<PathBuf>,
    },
    Search {
        query: String,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Extract knowledge from a JSONL conversation transcript.
    /// Ctrl-C cancels a running deep extraction.
    Extract {
        transcript: PathBuf,
        /// Use the completion provider regardless of `extraction.mode`.
        #[arg(long)]
        deep: bool,
        #[arg(long)]
        project: Option<String>,
        #[arg(long)]
        date: Option<NaiveDate>,
    },
}

#[derive(Debug, Subcommand)]
enum PriorityCommands {
    Show {
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Replace the day's priorities with the given items.
    Set {
        #[arg(required = true)]
        items: Vec<String>,
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Check off item N (1-based, as numbered by `show`).
    Done {
        index: usize,
        #[arg(long)]
        date: Option<NaiveDate>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = AppConfig::load_from(&cli.config)?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.telemetry.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let vault = Vault::open(&config);

    match cli.command {
        Commands::Init => vault_cmds::run_init(&vault)?,
        Commands::Daily { date, print } => vault_cmds::run_daily(&vault, date, print)?,
        Commands::Log { text, date } => vault_cmds::run_log(&vault, &text, date)?,
        Commands::Append { section, text, date } => {
            vault_cmds::run_append(&vault, &section, &text, date)?;
        }
        Commands::Priorities { command } => match command {
            PriorityCommands::Show { date } => vault_cmds::run_priorities_show(&vault, date)?,
            PriorityCommands::Set { items, date } => vault_cmds::run_priorities_set(&vault, &items, date)?,
            PriorityCommands::Done { index, date } => vault_cmds::run_priorities_done(&vault, index, date)?,
        },
        Commands::Recent { limit } => vault_cmds::run_recent(&vault, limit)?,
        Commands::List { category } => vault_cmds::run_list(&vault, category)?,
        Commands::Counts => vault_cmds::run_counts(&vault)?,
        Commands::Capture { title, body } => vault_cmds::run_capture(&vault, &title, body.as_deref())?,
        Commands::Project { dir } => vault_cmds::run_project(&vault, dir)?,
        Commands::Search { query, limit } => vault_cmds::run_search(&vault, &query, limit).await?,
        Commands::Extract {
            transcript,
            deep,
            project,
            date,
        } => {
            let args = ExtractArgs {
                transcript: &transcript,
                deep,
                project,
                date,
            };
            vault_cmds::run_extract(&vault, &config, args).await?;
        }
    }

    Ok(())
}
