//! Non-secret diagnostics.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use opsrunner_db::{DbProbe, probe};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/env", get(debug_env))
        .route("/db", get(debug_db))
}

#[derive(Debug, Serialize)]
struct EnvSummary {
    app_env: String,
    database_url_present: bool,
    detected_dialect: &'static str,
    db_schema: String,
    control_plane_base_url: Option<String>,
    feature_flags: BTreeMap<&'static str, bool>,
}

/// Configuration summary. Never includes secret values.
async fn debug_env(State(state): State<AppState>) -> Json<EnvSummary> {
    let config = &state.config;
    let url = config.database_url.expose();
    let detected_dialect = if url.starts_with("postgresql://") || url.starts_with("postgres://") {
        "postgresql"
    } else {
        "unknown"
    };

    Json(EnvSummary {
        app_env: config.app_env.clone(),
        database_url_present: !url.is_empty(),
        detected_dialect,
        db_schema: config.db_schema.clone(),
        control_plane_base_url: config.control_plane_base_url.clone(),
        feature_flags: config.features.entries().into_iter().collect(),
    })
}

#[derive(Debug, Serialize)]
struct DbSummary {
    dialect: &'static str,
    schema: String,
    can_select: bool,
    current_user: Option<String>,
}

async fn debug_db(State(state): State<AppState>) -> Json<DbSummary> {
    let DbProbe {
        can_select,
        current_user,
    } = match &state.pool {
        Some(pool) => probe(pool).await,
        None => DbProbe {
            can_select: false,
            current_user: None,
        },
    };

    Json(DbSummary {
        dialect: "postgresql",
        schema: state.config.db_schema.clone(),
        can_select,
        current_user,
    })
}
