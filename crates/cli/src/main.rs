//! Stockflow CLI, the main entry point.
//!
//! Commands:
//! - `ask`      Send one message and print the reply with a health line
//! - `chat`     Interactive tutoring session
//! - `context`  Show what the knowledge base retrieves for a query
//! - `status`   Show configuration and the initial health snapshot
//! - `config`   Inspect or validate the configuration file

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "stockflow",
    about = "Stockflow: Systems Thinking AI tutor with a resilient backend client",
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
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask the tutor a single question
    Ask {
        /// The question to send
        #[arg(short, long)]
        message: String,

        /// Tutoring module (python | prompt-eng)
        #[arg(long)]
        module: Option<String>,
    },

    /// Start an interactive tutoring session
    Chat {
        /// Tutoring module (python | prompt-eng)
        #[arg(long)]
        module: Option<String>,
    },

    /// Show the context retrieved for a query
    Context {
        /// Query text
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,
    },

    /// Show configuration and health status
    Status,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
    /// Print the configuration file path
    Path,
    /// Load and validate the configuration
    Validate,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    if cli.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }

    match cli.command {
        Commands::Ask { message, module } => commands::ask::run(&message, module.as_deref()).await?,
        Commands::Chat { module } => commands::chat::run(module.as_deref()).await?,
        Commands::Context { query } => commands::context::run(&query.join(" ")).await?,
        Commands::Status => commands::status::run().await?,
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_cmd::show().await?,
            ConfigAction::Path => commands::config_cmd::path().await?,
            ConfigAction::Validate => commands::config_cmd::validate().await?,
        },
    }

    Ok(())
}
