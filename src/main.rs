//! # Civic RAG CLI (`civic`)
//!
//! The `civic` binary answers questions about a PDF handbook. It builds
//! (or reuses) a persistent vector index of the handbook, retrieves the
//! passages relevant to a question, and asks a language model for an
//! answer grounded in them, with page citations.
//!
//! ## Usage
//!
//! ```bash
//! civic --config ./config/civic.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `civic init` | Write an example configuration file |
//! | `civic index` | Build the index, or confirm the cached one is current |
//! | `civic search "<query>"` | Show the best-matching passages |
//! | `civic ask "<question>"` | Answer one question |
//! | `civic chat` | Interactive question loop |
//! | `civic completions <shell>` | Print shell completions |
//!
//! ## Examples
//!
//! ```bash
//! civic init
//! civic index --rebuild
//! civic search "passport photo" --limit 3
//! civic ask "What do I need to reissue a passport?" --stream
//! ```

use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use tracing_subscriber::EnvFilter;

use civic_rag::progress::ProgressMode;
use civic_rag::{answer_cmd, config, index_cmd, init_cmd, search};

/// Civic RAG: grounded answers from a PDF handbook, with page citations.
#[derive(Parser)]
#[command(
    name = "civic",
    about = "Civic RAG: grounded answers from a PDF handbook, with page citations",
    version,
    long_about = "Civic RAG indexes a PDF handbook into a persistent vector index (rebuilt only \
    when the document bytes change), retrieves the passages relevant to a question, and asks a \
    language model for an answer grounded in those passages, citing source pages."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/civic.toml")]
    config: PathBuf,

    /// API key for the embedding/generation provider.
    ///
    /// Overrides the environment variables named by `api_key_env`.
    #[arg(long, global = true)]
    api_key: Option<String>,

    /// Increase log verbosity (-v info, -vv debug). `RUST_LOG` takes precedence.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Index progress on stderr: auto, off, human, or json.
    #[arg(long, global = true, default_value = "auto")]
    progress: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write an example configuration file to the --config path.
    Init {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },

    /// Build the index, or reuse it if the source documents are unchanged.
    Index {
        /// Rebuild even if the stored fingerprint matches.
        #[arg(long)]
        rebuild: bool,
    },

    /// Show the passages most similar to a query.
    Search {
        query: String,

        /// Number of passages (defaults to retrieval.top_k).
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Answer one question.
    Ask {
        question: String,

        /// Print the answer as it is generated.
        #[arg(long)]
        stream: bool,

        /// Do not print citations and related forms.
        #[arg(long)]
        no_sources: bool,
    },

    /// Ask questions interactively.
    Chat,

    /// Print a shell completion script.
    Completions {
        shell: Shell,
    },
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let progress = ProgressMode::from_flag(&cli.progress).ok_or_else(|| {
        anyhow::anyhow!(
            "Unknown progress mode: {}. Use auto, off, human, or json.",
            cli.progress
        )
    })?;

    // Commands that don't require config
    match &cli.command {
        Commands::Init { force } => {
            init_cmd::run_init(&cli.config, *force)?;
            return Ok(());
        }
        Commands::Completions { shell } => {
            clap_complete::generate(*shell, &mut Cli::command(), "civic", &mut std::io::stdout());
            return Ok(());
        }
        _ => {}
    }

    let cfg = config::load_config(&cli.config)?;
    let api_key = cli.api_key.as_deref();

    match cli.command {
        Commands::Index { rebuild } => {
            index_cmd::run_index(&cfg, api_key, rebuild, progress).await?;
        }
        Commands::Search { query, limit } => {
            search::run_search(&cfg, api_key, &query, limit, progress).await?;
        }
        Commands::Ask {
            question,
            stream,
            no_sources,
        } => {
            answer_cmd::run_ask(&cfg, api_key, &question, stream, !no_sources, progress).await?;
        }
        Commands::Chat => {
            answer_cmd::run_chat(&cfg, api_key, progress).await?;
        }
        Commands::Init { .. } | Commands::Completions { .. } => {
            // Handled above (before config loading)
        }
    }

    Ok(())
}
