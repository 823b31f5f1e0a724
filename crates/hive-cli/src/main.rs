mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{agent::AgentSubcommand, message::MessageSubcommand, task::TaskSubcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "hive",
    about = "Shared-state coordination for a fleet of CLI agents",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from .hive/ or .git/)
    #[arg(long, global = true, env = "HIVE_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a hive project in the current directory
    Init {
        /// Project name (default: directory name)
        #[arg(long)]
        name: Option<String>,

        /// Persistence backend: json or sqlite
        #[arg(long, default_value = "json")]
        backend: String,
    },

    /// Show the shared state snapshot
    State,

    /// Manage agents
    Agent {
        #[command(subcommand)]
        subcommand: AgentSubcommand,
    },

    /// Manage tasks
    Task {
        #[command(subcommand)]
        subcommand: TaskSubcommand,
    },

    /// Send and read messages
    Message {
        #[command(subcommand)]
        subcommand: MessageSubcommand,
    },

    /// Create a backup of the shared state
    Backup,

    /// Restore shared state from a backup handle
    Restore {
        /// A backup file path (json backend) or history row id (sqlite backend)
        handle: String,
    },

    /// Delete messages older than the configured retention window
    Prune,

    /// Start the REST API server
    Serve {
        /// Port to listen on (0 = OS-assigned)
        #[arg(long, default_value = "4410")]
        port: u16,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Serve { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .init();

    let root_path = cli.root.as_deref();
    let root = root::resolve_root(root_path);

    let result = match cli.command {
        Commands::Init { name, backend } => cmd::init::run(&root, name.as_deref(), &backend, cli.json),
        Commands::State => cmd::state::run(&root, cli.json),
        Commands::Agent { subcommand } => cmd::agent::run(&root, subcommand, cli.json),
        Commands::Task { subcommand } => cmd::task::run(&root, subcommand, cli.json),
        Commands::Message { subcommand } => cmd::message::run(&root, subcommand, cli.json),
        Commands::Backup => cmd::backup::backup(&root, cli.json),
        Commands::Restore { handle } => cmd::backup::restore(&root, &handle, cli.json),
        Commands::Prune => cmd::prune::run(&root, cli.json),
        Commands::Serve { port } => cmd::serve::run(root, port),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
