mod commands;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tempo", version, about = "Task management with due-date notifications")]
struct Cli {
    /// Path to the TOML config file.
    #[arg(long, global = true, default_value = "~/.tempo/config.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the REST server and notification scheduler.
    Serve {
        /// Override the configured REST port.
        #[arg(long)]
        port: Option<u16>,
    },
    /// Check whether a server is running and print its health.
    Status,
    /// Manage tasks against a running server.
    Task {
        #[command(subcommand)]
        command: TaskCommands,
    },
}

#[derive(Subcommand)]
enum TaskCommands {
    /// Create a task.
    Add {
        title: String,
        /// Due date, RFC3339 (e.g. 2026-09-01T17:00:00Z).
        #[arg(long)]
        due: String,
        #[arg(long)]
        priority: Option<String>,
        #[arg(long)]
        desc: Option<String>,
    },
    /// List tasks, soonest due first.
    List {
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        priority: Option<String>,
    },
    /// Mark a task completed.
    Complete { id: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { port } => commands::server::serve(port, &cli.config).await,
        Commands::Status => commands::server::status(&cli.config).await,
        Commands::Task { command } => match command {
            TaskCommands::Add {
                title,
                due,
                priority,
                desc,
            } => commands::task::add(&title, &due, priority.as_deref(), desc.as_deref(), &cli.config).await,
            TaskCommands::List { status, priority } => {
                commands::task::list(status.as_deref(), priority.as_deref(), &cli.config).await
            }
            TaskCommands::Complete { id } => commands::task::complete(&id, &cli.config).await,
        },
    }
}
