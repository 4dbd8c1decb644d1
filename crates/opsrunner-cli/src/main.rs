//! OpsRunner CLI tool.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod client;
mod commands;

use client::OpsClient;
use commands::jobs::ListArgs;

#[derive(Parser)]
#[command(name = "opsrunner")]
#[command(about = "OpsRunner operations CLI", long_about = None)]
struct Cli {
    /// Control-plane URL
    #[arg(long, env = "OPSRUNNER_API_URL", default_value = "http://localhost:3000")]
    api_url: String,

    /// Ops API key sent as X-Ops-Key
    #[arg(long, env = "OPS_API_KEY", hide_env_values = true)]
    ops_key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect and manage ops jobs
    Jobs {
        #[command(subcommand)]
        command: JobCommands,
    },
    /// Talk to the runner directly
    Runner {
        #[command(subcommand)]
        command: RunnerCommands,
    },
    /// Database maintenance
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
    /// Configuration checks
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum JobCommands {
    /// List recent jobs, newest first
    List {
        /// Filter by status (queued, running, succeeded, failed)
        #[arg(long)]
        status: Option<String>,
        /// Filter by job type
        #[arg(long)]
        job_type: Option<String>,
        /// Only jobs created at or after this RFC 3339 timestamp
        #[arg(long)]
        since: Option<String>,
        /// Maximum number of jobs to show (server caps at 200)
        #[arg(long)]
        limit: Option<i64>,
    },
    /// Show job details
    Show {
        /// Job ID
        id: String,
    },
    /// Record a queued job without running it
    Create {
        /// Job type
        job_type: String,
        /// JSON object payload
        #[arg(long)]
        payload: Option<String>,
        /// Requester recorded on the job
        #[arg(long)]
        requested_by: Option<String>,
    },
    /// Create a job and hand it to the runner
    Trigger {
        /// Job type
        job_type: String,
        /// JSON object payload
        #[arg(long)]
        payload: Option<String>,
    },
    /// Request cancellation (advisory)
    Cancel {
        /// Job ID
        id: String,
    },
    /// Show a job's event timeline
    Events {
        /// Job ID
        id: String,
    },
}

#[derive(Subcommand)]
enum RunnerCommands {
    /// Check runner health
    Health {
        /// Runner URL
        #[arg(long, env = "RUNNER_URL")]
        url: String,
        /// Runner shared secret
        #[arg(long, env = "RUNNER_TOKEN_OUTBOUND", hide_env_values = true)]
        token: String,
    },
}

#[derive(Subcommand)]
enum DbCommands {
    /// Apply pending migrations
    Migrate {
        #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
        database_url: String,
        #[arg(long, env = "DB_SCHEMA", default_value = "public")]
        schema: String,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Report missing required keys, deprecated keys and feature flags
    Audit {
        /// Which service to audit
        #[arg(long, value_enum, default_value = "control-plane")]
        target: commands::config::AuditTarget,
        /// Optional KDL settings file merged under the environment
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Jobs { command } => {
            let client = OpsClient::new(&cli.api_url, cli.ops_key)?;
            match command {
                JobCommands::List {
                    status,
                    job_type,
                    since,
                    limit,
                } => {
                    let args = ListArgs {
                        status,
                        job_type,
                        since,
                        limit,
                    };
                    commands::jobs::list(&client, &args).await?;
                }
                JobCommands::Show { id } => {
                    commands::jobs::show(&client, &id).await?;
                }
                JobCommands::Create {
                    job_type,
                    payload,
                    requested_by,
                } => {
                    commands::jobs::create(&client, &job_type, payload.as_deref(), requested_by)
                        .await?;
                }
                JobCommands::Trigger { job_type, payload } => {
                    commands::jobs::trigger(&client, &job_type, payload.as_deref()).await?;
                }
                JobCommands::Cancel { id } => {
                    commands::jobs::cancel(&client, &id).await?;
                }
                JobCommands::Events { id } => {
                    commands::jobs::events(&client, &id).await?;
                }
            }
        }
        Commands::Runner { command } => match command {
            RunnerCommands::Health { url, token } => {
                commands::runner::health(&url, &token).await?;
            }
        },
        Commands::Db { command } => match command {
            DbCommands::Migrate {
                database_url,
                schema,
            } => {
                commands::db::migrate(&database_url, &schema).await?;
            }
        },
        Commands::Config { command } => match command {
            ConfigCommands::Audit { target, config } => {
                let ok = commands::config::audit(target, config.as_deref())?;
                if !ok {
                    std::process::exit(1);
                }
            }
        },
    }

    Ok(())
}
