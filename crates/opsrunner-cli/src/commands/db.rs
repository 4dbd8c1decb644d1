//! Database commands.

use anyhow::{Context, Result};
use opsrunner_config::normalize_database_url;
use opsrunner_db::{create_pool, run_migrations};

pub async fn migrate(database_url: &str, schema: &str) -> Result<()> {
    let url = normalize_database_url(database_url)?;
    let pool = create_pool(&url, schema)
        .await
        .context("failed to connect to database")?;
    run_migrations(&pool).await.context("migrations failed")?;
    println!("Migrations applied (schema: {})", schema);
    Ok(())
}
