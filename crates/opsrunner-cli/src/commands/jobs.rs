//! Job commands.

use anyhow::{Context, Result, bail};
use serde_json::{Value, json};

use crate::client::OpsClient;

#[derive(Debug, Default)]
pub struct ListArgs {
    pub status: Option<String>,
    pub job_type: Option<String>,
    pub since: Option<String>,
    pub limit: Option<i64>,
}

impl ListArgs {
    fn query(&self) -> Vec<(&'static str, String)> {
        let mut query = Vec::new();
        if let Some(status) = &self.status {
            query.push(("status", status.clone()));
        }
        if let Some(job_type) = &self.job_type {
            query.push(("job_type", job_type.clone()));
        }
        if let Some(since) = &self.since {
            query.push(("since", since.clone()));
        }
        if let Some(limit) = self.limit {
            query.push(("limit", limit.to_string()));
        }
        query
    }
}

/// Parse a `--payload` argument; it must be a JSON object.
fn parse_payload(raw: Option<&str>) -> Result<Option<Value>> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let value: Value = serde_json::from_str(raw).context("payload is not valid JSON")?;
    if !value.is_object() {
        bail!("payload must be a JSON object");
    }
    Ok(Some(value))
}

fn text(value: &Value) -> String {
    match value {
        Value::Null => "-".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn summary_line(job: &Value) -> String {
    format!(
        "{:<38} {:<28} {:<10} {}",
        text(&job["id"]),
        text(&job["job_type"]),
        text(&job["status"]),
        text(&job["created_at"]),
    )
}

pub async fn list(client: &OpsClient, args: &ListArgs) -> Result<()> {
    let body = client.get("/ops/jobs", &args.query()).await?;
    let jobs = body["jobs"].as_array().cloned().unwrap_or_default();

    println!("{:<38} {:<28} {:<10} CREATED", "ID", "TYPE", "STATUS");
    for job in &jobs {
        println!("{}", summary_line(job));
    }
    println!("{} job(s)", text(&body["count"]));
    Ok(())
}

pub async fn show(client: &OpsClient, id: &str) -> Result<()> {
    let job = client.get(&format!("/ops/jobs/{}", id), &[]).await?;
    println!("{}", serde_json::to_string_pretty(&job)?);
    Ok(())
}

pub async fn create(
    client: &OpsClient,
    job_type: &str,
    payload: Option<&str>,
    requested_by: Option<String>,
) -> Result<()> {
    let body = json!({
        "job_type": job_type,
        "payload": parse_payload(payload)?,
        "requested_by": requested_by,
    });
    let created = client.post("/ops/jobs", &body).await?;
    println!("{} {}", text(&created["job_id"]), text(&created["status"]));
    Ok(())
}

pub async fn trigger(client: &OpsClient, job_type: &str, payload: Option<&str>) -> Result<()> {
    let body = json!({
        "job_type": job_type,
        "payload": parse_payload(payload)?,
    });
    let triggered = client.post("/ops/trigger_runner", &body).await?;
    println!(
        "{} {} ({})",
        text(&triggered["job_id"]),
        text(&triggered["status"]),
        text(&triggered["message"])
    );
    Ok(())
}

pub async fn cancel(client: &OpsClient, id: &str) -> Result<()> {
    let body = client
        .post(&format!("/ops/jobs/{}/cancel", id), &json!({}))
        .await?;
    println!("{} {}", text(&body["job_id"]), text(&body["message"]));
    Ok(())
}

pub async fn events(client: &OpsClient, id: &str) -> Result<()> {
    let body = client.get(&format!("/ops/jobs/{}/events", id), &[]).await?;
    for event in body["events"].as_array().into_iter().flatten() {
        println!(
            "{}  {:<18} {}",
            text(&event["created_at"]),
            text(&event["event_type"]),
            text(&event["message"])
        );
    }
    Ok(())
}
