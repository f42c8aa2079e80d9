//! TaskPilot CLI: the main entry point.
//!
//! Commands:
//! - `onboard` : Write the default config
//! - `run`     : Execute one task
//! - `history` : Show recent task executions
//! - `tools`   : List the registered tools

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "taskpilot",
    about = "TaskPilot: an LLM task agent for meetings, notifications and letters",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize configuration
    Onboard,

    /// Execute a task
    Run {
        /// The request, in natural language
        #[arg(short, long)]
        message: String,

        /// Email address of the requester
        #[arg(short, long, env = "TASKPILOT_CALLER")]
        caller: String,

        /// Conversation id scoping recent-task context
        #[arg(long)]
        conversation: Option<String>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show recent task executions
    History {
        /// Email address of the requester
        #[arg(short, long, env = "TASKPILOT_CALLER")]
        caller: String,

        /// Only tasks from this conversation
        #[arg(long)]
        conversation: Option<String>,

        /// Number of tasks to show
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },

    /// List available tools
    Tools,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Onboard => commands::onboard::run().await?,
        Commands::Run {
            message,
            caller,
            conversation,
            json,
        } => commands::run::run(message, caller, conversation, json, cli.verbose).await?,
        Commands::History {
            caller,
            conversation,
            limit,
        } => commands::history::run(caller, conversation, limit).await?,
        Commands::Tools => commands::tools::run().await?,
    }

    Ok(())
}
