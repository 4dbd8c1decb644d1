//! Job store for OpsRunner.
//!
//! The `ops_jobs` table is the only coordination primitive between the
//! control plane and the runner. Every write here is a single-row,
//! single-statement update keyed by job id.

pub mod error;
pub mod repo;

pub use error::{DbError, DbResult};
pub use repo::*;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

/// Create a new database connection pool whose connections use `schema` as
/// their search path.
pub async fn create_pool(database_url: &str, schema: &str) -> DbResult<PgPool> {
    if !is_valid_identifier(schema) {
        return Err(DbError::InvalidSchema(schema.to_string()));
    }
    let set_search_path = format!("SET search_path TO \"{}\"", schema);

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .after_connect(move |conn, _meta| {
            let statement = set_search_path.clone();
            Box::pin(async move {
                sqlx::query(&statement).execute(&mut *conn).await?;
                Ok(())
            })
        })
        .connect(database_url)
        .await?;
    Ok(pool)
}

/// Run database migrations.
pub async fn run_migrations(pool: &PgPool) -> DbResult<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Result of a connectivity check against the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbProbe {
    pub can_select: bool,
    pub current_user: Option<String>,
}

/// `SELECT 1`, then `current_user`. Never fails; failures are reported in
/// the probe.
pub async fn probe(pool: &PgPool) -> DbProbe {
    if sqlx::query("SELECT 1").execute(pool).await.is_err() {
        return DbProbe {
            can_select: false,
            current_user: None,
        };
    }
    let current_user = sqlx::query_scalar::<_, String>("SELECT current_user::text")
        .fetch_one(pool)
        .await
        .ok();
    DbProbe {
        can_select: true,
        current_user,
    }
}

fn is_valid_identifier(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 63
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !name.starts_with(|c: char| c.is_ascii_digit())
}
