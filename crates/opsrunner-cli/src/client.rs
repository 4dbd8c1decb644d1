//! Thin HTTP client for the control-plane ops API.

use anyhow::{Context, Result, anyhow};
use reqwest::{Method, RequestBuilder};
use serde_json::Value;
use url::Url;

const OPS_KEY_HEADER: &str = "X-Ops-Key";
const API_PREFIX: &str = "/api/v1";

pub struct OpsClient {
    http: reqwest::Client,
    base_url: String,
    ops_key: Option<String>,
}

impl OpsClient {
    pub fn new(api_url: &str, ops_key: Option<String>) -> Result<Self> {
        let url = Url::parse(api_url).with_context(|| format!("invalid API URL '{}'", api_url))?;
        Ok(Self {
            http: reqwest::Client::new(),
            base_url: url.as_str().trim_end_matches('/').to_string(),
            ops_key: ops_key.filter(|k| !k.is_empty()),
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self
            .http
            .request(method, format!("{}{}{}", self.base_url, API_PREFIX, path));
        match &self.ops_key {
            Some(key) => builder.header(OPS_KEY_HEADER, key),
            None => builder,
        }
    }

    /// Send and decode a JSON body; non-2xx responses become errors carrying
    /// the server's `error` message.
    async fn send(&self, builder: RequestBuilder) -> Result<Value> {
        let response = builder.send().await.context("request to control plane failed")?;
        let status = response.status();
        let body: Value = response
            .json()
            .await
            .with_context(|| format!("control plane returned HTTP {} with a non-JSON body", status))?;

        if status.is_success() {
            Ok(body)
        } else {
            let message = body
                .get("error")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| body.to_string());
            Err(anyhow!("HTTP {}: {}", status.as_u16(), message))
        }
    }

    pub async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Value> {
        self.send(self.request(Method::GET, path).query(query)).await
    }

    pub async fn post(&self, path: &str, body: &Value) -> Result<Value> {
        self.send(self.request(Method::POST, path).json(body)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_sends_ops_key_and_decodes() {
        let app = Router::new().route(
            "/api/v1/ops/jobs",
            get(|headers: HeaderMap| async move {
                let key = headers
                    .get(OPS_KEY_HEADER)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                Json(json!({ "jobs": [], "count": 0, "key": key }))
            }),
        );
        let base = serve(app).await;

        let client = OpsClient::new(&base, Some("k1".to_string())).unwrap();
        let body = client.get("/ops/jobs", &[]).await.unwrap();
        assert_eq!(body["count"], 0);
        assert_eq!(body["key"], "k1");
    }

    #[tokio::test]
    async fn test_error_body_becomes_message() {
        let app = Router::new().route(
            "/api/v1/ops/jobs/x",
            get(|| async {
                (
                    StatusCode::BAD_REQUEST,
                    Json(json!({ "error": "Invalid job_id format" })),
                )
            }),
        );
        let base = serve(app).await;

        let client = OpsClient::new(&base, None).unwrap();
        let err = client.get("/ops/jobs/x", &[]).await.unwrap_err();
        assert_eq!(err.to_string(), "HTTP 400: Invalid job_id format");
    }

    #[test]
    fn test_rejects_bad_url() {
        assert!(OpsClient::new("not a url", None).is_err());
    }
}
