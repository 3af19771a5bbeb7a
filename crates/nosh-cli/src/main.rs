//! Noshwork CLI tool.

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "nosh")]
#[command(about = "Noshwork operational CLI", long_about = None)]
struct Cli {
    /// API server URL
    #[arg(long, env = "NOSH_API_URL", default_value = "http://localhost:3000")]
    api_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage background jobs
    Jobs {
        #[command(subcommand)]
        command: JobCommands,
    },
    /// Check API server health
    Health,
}

#[derive(Subcommand)]
enum JobCommands {
    /// Enqueue a job from a JSON payload
    Enqueue {
        /// Job payload, e.g. '{"job_type":"content_publish","content_id":"v1","content_type":"video"}'
        payload: String,
    },
    /// Show a job's status
    Show {
        /// Job ID
        id: String,
    },
    /// Fire one scheduler tick
    Tick,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Jobs { command } => match command {
            JobCommands::Enqueue { payload } => {
                commands::jobs::enqueue(&cli.api_url, &payload).await?;
            }
            JobCommands::Show { id } => {
                commands::jobs::show(&cli.api_url, &id).await?;
            }
            JobCommands::Tick => {
                commands::jobs::tick(&cli.api_url).await?;
            }
        },
        Commands::Health => {
            commands::health(&cli.api_url).await?;
        }
    }

    Ok(())
}
