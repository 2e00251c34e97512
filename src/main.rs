//! probe - validate business ideas against a streaming research service.

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use ideaprobe::chat::TurnOutcome;
use ideaprobe::cli::{self, commands, AskOptions};
use ideaprobe::db::Database;

/// probe - research a business idea from your terminal 🔎
#[derive(Parser, Debug)]
#[command(name = "probe")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Args {
    /// Enable debug logging (equivalent to RUST_LOG=debug)
    #[arg(short = 'd', long, global = true)]
    debug: bool,

    /// Enable verbose logging (equivalent to RUST_LOG=trace)
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ask the research service about an idea
    Ask {
        /// The question or idea to research
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,

        /// Continue a specific conversation
        #[arg(short, long, conflicts_with = "continue_last")]
        conversation: Option<String>,

        /// Continue the most recent conversation
        #[arg(short = 'c', long = "continue")]
        continue_last: bool,

        /// Rewrite the query with the enhancement service before sending
        #[arg(short, long)]
        enhance: bool,

        /// Answer feedback requests with this option instead of prompting
        #[arg(long, value_name = "OPTION")]
        feedback: Option<String>,

        /// Don't show the agent's thought steps
        #[arg(long)]
        no_thoughts: bool,
    },

    /// Browse past conversations
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },

    /// Print an enhanced version of a prompt
    Enhance {
        #[arg(required = true, num_args = 1..)]
        prompt: Vec<String>,
    },

    /// Generate a conversation title for a message
    Title {
        #[arg(required = true, num_args = 1..)]
        message: Vec<String>,
    },

    /// Search past conversations
    Search {
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,

        /// Search only the local database
        #[arg(long)]
        local: bool,
    },

    /// Generate an audio summary of a research report
    Podcast { report_id: String },

    /// Track extraction and embedding of uploaded files
    Files {
        #[command(subcommand)]
        action: FilesAction,
    },

    /// Read and change settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum HistoryAction {
    /// List recent conversations
    List {
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: usize,
    },
    /// Print a conversation (the most recent by default)
    Show { id: Option<String> },
    /// Delete a conversation
    Clear { id: String },
}

#[derive(Subcommand, Debug)]
enum FilesAction {
    /// Show tracked files
    Status { file_id: Option<String> },
    /// Start text extraction
    Extract {
        file_id: String,
        #[arg(long)]
        name: Option<String>,
    },
    /// Start embedding
    Embed {
        file_id: String,
        #[arg(long)]
        name: Option<String>,
    },
    /// Re-run a failed job
    Retry {
        file_id: String,
        #[arg(long, value_enum)]
        job: commands::JobKind,
    },
    /// Record a status reported by the server
    Report {
        file_id: String,
        #[arg(long, value_enum)]
        job: commands::JobKind,
        status: String,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Show stored and effective settings
    List,
    Get { key: String },
    Set { key: String, value: String },
    Unset { key: String },
}

fn init_tracing(args: &Args) {
    let default_filter = if args.verbose {
        "trace"
    } else if args.debug {
        "debug"
    } else {
        "warn"
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_writer(std::io::stderr),
        )
        .init();

    if args.debug || args.verbose {
        tracing::info!("Debug logging enabled");
    }
}

fn join(words: &[String]) -> String {
    words.join(" ").trim().to_string()
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(&args);

    // Reject an empty query before touching the database.
    if let Command::Ask { query, .. } = &args.command {
        if join(query).is_empty() {
            anyhow::bail!("Query must not be empty");
        }
    }

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(run(args.command))
}

async fn run(command: Command) -> anyhow::Result<()> {
    let db = Database::open().context("Failed to open database")?;
    db.migrate().context("Failed to migrate database")?;

    match command {
        Command::Ask {
            query,
            conversation,
            continue_last,
            enhance,
            feedback,
            no_thoughts,
        } => {
            let opts = AskOptions {
                conversation,
                continue_last,
                enhance,
                feedback,
                hide_thoughts: no_thoughts,
            };
            let outcome = cli::run_ask(&db, &join(&query), opts).await?;
            if let TurnOutcome::Failed { recoverable, .. } = outcome {
                std::process::exit(if recoverable { 75 } else { 1 });
            }
        }
        Command::History { action } => match action {
            HistoryAction::List { limit } => commands::history::list(&db, limit)?,
            HistoryAction::Show { id } => commands::history::show(&db, id.as_deref())?,
            HistoryAction::Clear { id } => commands::history::clear(&db, &id)?,
        },
        Command::Enhance { prompt } => commands::services::enhance(&db, &join(&prompt)).await?,
        Command::Title { message } => commands::services::title(&db, &join(&message)).await?,
        Command::Search { query, local } => {
            commands::services::search(&db, &join(&query), local).await?
        }
        Command::Podcast { report_id } => commands::services::podcast(&db, &report_id).await?,
        Command::Files { action } => match action {
            FilesAction::Status { file_id } => commands::files::status(&db, file_id.as_deref())?,
            FilesAction::Extract { file_id, name } => {
                commands::files::trigger(
                    &db,
                    commands::JobKind::Extraction,
                    &file_id,
                    name.as_deref(),
                    false,
                )
                .await?
            }
            FilesAction::Embed { file_id, name } => {
                commands::files::trigger(
                    &db,
                    commands::JobKind::Embedding,
                    &file_id,
                    name.as_deref(),
                    false,
                )
                .await?
            }
            FilesAction::Retry { file_id, job } => {
                commands::files::trigger(&db, job, &file_id, None, true).await?
            }
            FilesAction::Report {
                file_id,
                job,
                status,
            } => commands::files::report(&db, job, &file_id, &status)?,
        },
        Command::Config { action } => match action {
            ConfigAction::List => commands::config::list(&db)?,
            ConfigAction::Get { key } => commands::config::get(&db, &key)?,
            ConfigAction::Set { key, value } => commands::config::set(&db, &key, &value)?,
            ConfigAction::Unset { key } => commands::config::unset(&db, &key)?,
        },
    }

    Ok(())
}
