//! Parley CLI: the main entry point.
//!
//! Commands:
//! - `chat`: Interactive session (text, or simulated voice with `--voice`)
//! - `ask`: One-shot grounded answer
//! - `ingest`: Index documents and report what was loaded
//! - `serve`: Start the HTTP gateway
//! - `cases`: List client onboarding cases
//! - `config`: Show or initialize configuration

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "parley",
    about = "Parley: retrieval-grounded conversational assistant",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Talk to the assistant turn by turn
    Chat {
        /// Greet first and hold each reply for its simulated playback time
        #[arg(long)]
        voice: bool,
    },

    /// Ask a single question
    Ask {
        /// The question (quotes optional)
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,
    },

    /// Load, chunk and index documents, then optionally query them
    Ingest {
        /// Files or directories of .txt / .md documents
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Run a retrieval query against the fresh index
        #[arg(short, long)]
        query: Option<String>,
    },

    /// Start the HTTP gateway
    Serve {
        /// Override the bind host
        #[arg(long)]
        host: Option<String>,

        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// List client onboarding cases
    Cases {
        /// Only cases past their SLA threshold
        #[arg(long)]
        stalled: bool,

        /// Filter by client name (case-insensitive substring)
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Show or initialize configuration
    Config {
        /// Write a default config file if none exists
        #[arg(long, conflicts_with = "show")]
        init: bool,

        /// Print the effective configuration
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Chat output shares the terminal with logs, so keep it quiet by default.
    let default_level = match (&cli.command, cli.verbose) {
        (_, true) => "debug",
        (Commands::Chat { .. }, false) => "warn",
        _ => "info",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    if cli.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .init();
    }

    match cli.command {
        Commands::Chat { voice } => commands::chat::run(voice).await?,
        Commands::Ask { question } => commands::ask::run(&question.join(" ")).await?,
        Commands::Ingest { paths, query } => commands::ingest::run(&paths, query.as_deref()).await?,
        Commands::Serve { host, port } => commands::serve::run(host, port).await?,
        Commands::Cases { stalled, name } => commands::cases::run(stalled, name.as_deref())?,
        Commands::Config { init, show } => {
            if init {
                commands::config_cmd::init()?;
            } else if show {
                commands::config_cmd::show()?;
            } else {
                commands::config_cmd::path();
            }
        }
    }

    Ok(())
}
