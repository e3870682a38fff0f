//! Quarry CLI - Semantic retrieval over your document corpus

mod commands;

use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Quarry - Semantic retrieval over your document corpus
#[derive(Parser)]
#[command(name = "quarry")]
#[command(version)]
#[command(about = "Ingest documents, search them by meaning, ask questions", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize Quarry (create config and database)
    Init,

    /// Manage configuration
    #[command(subcommand)]
    Config(ConfigCommands),

    /// Ingest files or directories
    Ingest {
        /// Path to file or directory to ingest
        path: String,

        /// Recurse into subdirectories
        #[arg(short, long)]
        recursive: bool,

        /// Replace documents whose source file changed since ingestion
        #[arg(short, long)]
        update: bool,

        /// Show what would be ingested without actually ingesting
        #[arg(long)]
        dry_run: bool,
    },

    /// Search the corpus by meaning
    Search {
        /// Search query
        query: String,

        /// Maximum results
        #[arg(short, long, default_value = "10")]
        limit: usize,

        /// Minimum similarity score (0.0 to 1.0)
        #[arg(short, long)]
        min_score: Option<f32>,

        /// Restrict to a content type (text, markdown, pdf, code)
        #[arg(short = 't', long)]
        content_type: Option<String>,

        /// Restrict to a document ID
        #[arg(short, long)]
        document: Option<String>,

        /// Restrict to documents ingested in the last N days
        #[arg(long)]
        days: Option<i64>,

        /// Show N neighboring chunks around each match
        #[arg(short, long, default_value = "0")]
        context: usize,
    },

    /// Find chunks similar to an existing chunk
    Related {
        /// Chunk ID
        chunk_id: String,

        /// Maximum results
        #[arg(short, long, default_value = "5")]
        limit: usize,
    },

    /// Ask a question using retrieval-augmented generation
    Ask {
        /// Your question
        question: String,

        /// Model to use for generation (default: from config)
        #[arg(short, long)]
        model: Option<String>,

        /// Maximum tokens to generate
        #[arg(long)]
        max_tokens: Option<i32>,

        /// Ask the model to emit its reasoning separately
        #[arg(long)]
        thinking: bool,

        /// Show source references
        #[arg(short, long, default_value = "true")]
        sources: bool,
    },

    /// Show details of a document
    Show {
        /// Document ID
        id: String,
    },

    /// List recently ingested documents
    Recent {
        /// Maximum number of documents to show
        #[arg(short, long, default_value = "10")]
        limit: i64,
    },

    /// Show database statistics
    Stats,

    /// Delete a document (and its chunks) by content hash
    Delete {
        /// Content hash of the document
        hash: String,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Print the config file path
    Path,

    /// Open config file in editor
    Edit,
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("quarry=debug,info"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("quarry=info,warn"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Init => commands::init::run(),
        Commands::Config(cmd) => match cmd {
            ConfigCommands::Show => commands::config::show(),
            ConfigCommands::Path => commands::config::path(),
            ConfigCommands::Edit => commands::config::edit(),
        },
        Commands::Ingest {
            path,
            recursive,
            update,
            dry_run,
        } => commands::ingest::run(&path, recursive, update, dry_run),
        Commands::Search {
            query,
            limit,
            min_score,
            content_type,
            document,
            days,
            context,
        } => commands::search::run(&query, limit, min_score, content_type, document, days, context),
        Commands::Related { chunk_id, limit } => commands::related::run(&chunk_id, limit),
        Commands::Ask {
            question,
            model,
            max_tokens,
            thinking,
            sources,
        } => commands::ask::run(&question, model, max_tokens, thinking, sources),
        Commands::Show { id } => commands::show::run(&id),
        Commands::Recent { limit } => commands::recent::run(limit),
        Commands::Stats => commands::stats::run(),
        Commands::Delete { hash } => commands::delete::run(&hash),
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}
