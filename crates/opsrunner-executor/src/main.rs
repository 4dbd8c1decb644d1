//! OpsRunner runner service.

use anyhow::Context;
use axum::http::HeaderValue;
use clap::Parser;
use opsrunner_config::{RunnerConfig, Settings};
use opsrunner_db::create_pool;
use opsrunner_executor::{RunnerState, routes};
use std::path::PathBuf;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "opsrunner-runner")]
#[command(about = "OpsRunner job runner", long_about = None)]
struct Args {
    /// Optional KDL settings file; environment variables take precedence
    #[arg(long, env = "OPSRUNNER_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut settings = Settings::from_env();
    if let Some(path) = &args.config {
        settings = settings
            .merge_kdl_file(path)
            .with_context(|| format!("failed to load {}", path.display()))?;
    }
    let config = RunnerConfig::from_settings(&settings).context("invalid runner configuration")?;

    init_tracing(&config);

    info!(
        runner_instance = %config.instance,
        allowlist = ?config.allowlist.kinds(),
        schema = %config.db_schema,
        "Starting runner"
    );

    let pool = create_pool(config.database_url.expose(), &config.db_schema)
        .await
        .context("failed to connect to database")?;
    info!("Database connected");

    let state = RunnerState::from_pool(pool, &config);

    let app = routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&config.allowed_origins));

    info!("Listening on {}", config.bind_addr);
    let listener = TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn init_tracing(config: &RunnerConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.to_lowercase()));

    if config.log_json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    if origins.is_empty() {
        CorsLayer::new()
    } else {
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
