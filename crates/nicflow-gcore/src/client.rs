//! Gcore Cloud API client
//!
//! Thin authenticated wrapper around the v1 REST API. Project and region are
//! part of every resource path, so they are fixed per client.

use crate::error::{GcoreError, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;

pub const GCORE_API_BASE: &str = "https://api.gcore.com/cloud";

/// Environment variable holding the API token unless configured otherwise
pub const DEFAULT_TOKEN_ENV: &str = "GCORE_API_TOKEN";

/// Connection settings of the client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub project_id: u64,
    pub region_id: u64,
    pub api_token: String,
}

impl ClientConfig {
    pub fn new(project_id: u64, region_id: u64, api_token: impl Into<String>) -> Self {
        Self {
            base_url: GCORE_API_BASE.to_string(),
            project_id,
            region_id,
            api_token: api_token.into(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Create ClientConfig from environment variables
    ///
    /// Reads `GCORE_API_TOKEN`, `GCORE_PROJECT_ID`, `GCORE_REGION_ID` and the
    /// optional `GCORE_API_URL`.
    pub fn from_env() -> Result<Self> {
        let api_token = read_env(DEFAULT_TOKEN_ENV)?;
        let project_id = parse_id("GCORE_PROJECT_ID", &read_env("GCORE_PROJECT_ID")?)?;
        let region_id = parse_id("GCORE_REGION_ID", &read_env("GCORE_REGION_ID")?)?;

        let config = Self::new(project_id, region_id, api_token);
        Ok(match std::env::var("GCORE_API_URL") {
            Ok(url) if !url.is_empty() => config.with_base_url(url),
            _ => config,
        })
    }
}

fn read_env(name: &str) -> Result<String> {
    std::env::var(name).map_err(|_| GcoreError::MissingEnvVar(name.to_string()))
}

fn parse_id(name: &str, value: &str) -> Result<u64> {
    value.trim().parse().map_err(|_| {
        GcoreError::InvalidConfig(format!("{} must be numeric, got '{}'", name, value))
    })
}

/// Gcore Cloud API client
#[derive(Clone)]
pub struct GcoreClient {
    http: reqwest::Client,
    config: ClientConfig,
}

impl GcoreClient {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    /// URL of a project and region scoped resource, e.g. `instances`, `ports`
    pub(crate) fn resource_url(&self, resource: &str, suffix: &str) -> String {
        format!(
            "{}/v1/{}/{}/{}/{}",
            self.config.base_url,
            resource,
            self.config.project_id,
            self.config.region_id,
            suffix.trim_start_matches('/')
        )
    }

    pub(crate) fn task_url(&self, task_id: &str) -> String {
        format!("{}/v1/tasks/{}", self.config.base_url, task_id)
    }

    pub(crate) async fn get<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        tracing::debug!("GET {}", url);
        let response = self
            .http
            .get(url)
            .header(reqwest::header::AUTHORIZATION, self.auth_header())
            .send()
            .await?;
        decode_response(response).await
    }

    pub(crate) async fn send<B, T>(&self, method: reqwest::Method, url: &str, body: &B) -> Result<T>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned,
    {
        tracing::debug!("{} {}", method, url);
        let response = self
            .http
            .request(method, url)
            .header(reqwest::header::AUTHORIZATION, self.auth_header())
            .json(body)
            .send()
            .await?;
        decode_response(response).await
    }

    fn auth_header(&self) -> String {
        format!("APIKey {}", self.config.api_token)
    }
}

async fn decode_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        return Err(GcoreError::Api {
            status: status.as_u16(),
            message: error_message(&body),
        });
    }

    // empty bodies decode as null
    let body = if body.trim().is_empty() { "null" } else { &body };
    Ok(serde_json::from_str(body)?)
}

/// Error text of a failed response, `{"message": ...}` when the body is JSON
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}
