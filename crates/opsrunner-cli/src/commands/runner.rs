//! Runner commands.

use anyhow::{Context, Result};
use opsrunner_config::Secret;
use opsrunner_scheduler::{HttpRunnerClient, RunnerClient};
use std::time::Duration;
use url::Url;

pub async fn health(url: &str, token: &str) -> Result<()> {
    let url = Url::parse(url).with_context(|| format!("invalid runner URL '{}'", url))?;
    let client = HttpRunnerClient::new(&url, Secret::new(token), Duration::from_secs(10))?;
    let health = client.health().await?;
    println!("{} (instance: {})", health.status, health.runner_instance);
    Ok(())
}
