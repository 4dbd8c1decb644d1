//! OpsRunner control-plane server.

use anyhow::Context;
use axum::http::HeaderValue;
use clap::Parser;
use opsrunner_api::{AppState, routes};
use opsrunner_config::{ControlPlaneConfig, Settings};
use opsrunner_db::{create_pool, run_migrations};
use std::path::PathBuf;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "opsrunner-server")]
#[command(about = "OpsRunner control plane", long_about = None)]
struct Args {
    /// Optional KDL settings file; environment variables take precedence
    #[arg(long, env = "OPSRUNNER_CONFIG")]
    config: Option<PathBuf>,

    /// Apply pending database migrations before serving
    #[arg(long)]
    migrate: bool,
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
    let config = ControlPlaneConfig::from_settings(&settings)
        .context("invalid control-plane configuration")?;

    init_tracing(&config);

    if config.is_production() && config.ops_api_key.is_none() {
        warn!("OPS_API_KEY is not set; ops endpoints will answer 500");
    }

    info!(app_env = %config.app_env, schema = %config.db_schema, "Connecting to database...");
    let pool = create_pool(config.database_url.expose(), &config.db_schema)
        .await
        .context("failed to connect to database")?;
    info!("Database connected");

    if args.migrate {
        run_migrations(&pool).await.context("migrations failed")?;
        info!("Migrations applied");
    }

    let bind_addr = config.bind_addr;
    let cors = cors_layer(&config.cors_origins);
    let state = AppState::from_pool(pool, config).context("invalid runner link")?;

    let app = routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    info!("Starting server on {}", bind_addr);
    let listener = TcpListener::bind(bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn init_tracing(config: &ControlPlaneConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.to_lowercase()));

    if config.log_json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

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
