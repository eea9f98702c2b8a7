//! HTTP client for the remote task tracker
//!
//! Implements `TaskSource` against the tracker's task-manager API. The
//! client owns its `reqwest::Client` and timeout configuration; nothing is
//! shared through globals. Authentication uses the tracker's OAuth2
//! client-credentials flow, and the access token is refreshed transparently
//! before it expires.

use crate::source::{TaskFilter, TaskPage, TaskSource};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use serde::Deserialize;
use std::time::Duration;
use taskprobe_core::{Error, Result, Task};
use tokio::sync::RwLock;
use url::Url;

const TOKEN_PATH: &str = "api/2/idp/token";
const TASKS_PATH: &str = "api/task_manager/v2/tasks";

/// Refresh the token this long before its reported expiry
const TOKEN_REFRESH_MARGIN_SECS: i64 = 60;

/// Page size used when the filter leaves the limit at 0
const DEFAULT_PAGE_LIMIT: usize = 100;

/// Configuration for the tracker client
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Tracker endpoint given when the API client was created
    pub base_url: Url,
    /// API client id
    pub client_id: String,
    /// API client secret
    pub client_secret: String,
    /// Per-request timeout; expiry surfaces as an ordinary fetch failure
    pub fetch_timeout: Duration,
    /// Page size for continuation pages
    pub page_limit: usize,
}

#[derive(Debug)]
struct AccessToken {
    bearer: String,
    expires_at: DateTime<Utc>,
}

/// Authenticated tracker client
#[derive(Debug)]
pub struct TrackerClient {
    config: TrackerConfig,
    http: reqwest::Client,
    token: RwLock<Option<AccessToken>>,
}

impl TrackerClient {
    /// Build the HTTP client and perform the initial authentication
    pub async fn connect(config: TrackerConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.fetch_timeout)
            .build()
            .map_err(|e| Error::fetch(config.base_url.as_str(), e.to_string()))?;

        let client = Self {
            config,
            http,
            token: RwLock::new(None),
        };
        client.refresh_token().await?;
        Ok(client)
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.config
            .base_url
            .join(path)
            .map_err(|e| Error::fetch(path, e.to_string()))
    }

    async fn refresh_token(&self) -> Result<()> {
        #[derive(Debug, Default, Deserialize)]
        #[serde(default)]
        struct TokenResponse {
            access_token: String,
            expires_on: i64,
            error: String,
            error_description: String,
        }

        let url = self.endpoint(TOKEN_PATH)?;
        let response = self
            .http
            .post(url)
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| fetch_error(TOKEN_PATH, &e))?;

        let status = response.status();
        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| fetch_error(TOKEN_PATH, &e))?;

        if !status.is_success() {
            return Err(Error::fetch(
                TOKEN_PATH,
                format!(
                    "auth rejected: status [{}] [{}] message: {}",
                    status.as_u16(),
                    body.error,
                    body.error_description
                ),
            ));
        }

        // Expiry is epoch seconds; a missing value leaves the token
        // permanently stale so every request re-authenticates.
        let expires_at = Utc
            .timestamp_opt(body.expires_on, 0)
            .single()
            .unwrap_or_default();
        tracing::debug!(%expires_at, "refreshed tracker access token");
        *self.token.write().await = Some(AccessToken {
            bearer: body.access_token,
            expires_at,
        });
        Ok(())
    }

    async fn bearer(&self) -> Result<String> {
        {
            let token = self.token.read().await;
            if let Some(token) = token.as_ref() {
                let remaining = token.expires_at - Utc::now();
                if remaining > chrono::Duration::seconds(TOKEN_REFRESH_MARGIN_SECS) {
                    return Ok(token.bearer.clone());
                }
            }
        }

        self.refresh_token().await?;
        let token = self.token.read().await;
        token
            .as_ref()
            .map(|t| t.bearer.clone())
            .ok_or_else(|| Error::fetch(TOKEN_PATH, "no token after refresh"))
    }

    async fn get_tasks(&self, query: &[(&str, String)]) -> Result<TaskPage> {
        #[derive(Debug, Default, Deserialize)]
        #[serde(default)]
        struct Cursors {
            after: String,
        }

        #[derive(Debug, Default, Deserialize)]
        #[serde(default)]
        struct Paging {
            cursors: Cursors,
        }

        #[derive(Debug, Default, Deserialize)]
        #[serde(default)]
        struct ApiError {
            message: String,
        }

        #[derive(Debug, Default, Deserialize)]
        #[serde(default)]
        struct TasksResponse {
            items: Vec<Task>,
            paging: Paging,
            error: ApiError,
        }

        let url = self.endpoint(TASKS_PATH)?;
        let bearer = self.bearer().await?;
        let response = self
            .http
            .get(url)
            .bearer_auth(bearer)
            .query(query)
            .send()
            .await
            .map_err(|e| fetch_error(TASKS_PATH, &e))?;

        let status = response.status();
        let body: TasksResponse = response
            .json()
            .await
            .map_err(|e| fetch_error(TASKS_PATH, &e))?;

        if !status.is_success() {
            return Err(Error::fetch(
                TASKS_PATH,
                format!("error status {}: {}", status.as_u16(), body.error.message),
            ));
        }

        Ok(TaskPage {
            tasks: body.items,
            after: body.paging.cursors.after,
        })
    }
}

#[async_trait]
impl TaskSource for TrackerClient {
    async fn first_page(&self, filter: &TaskFilter) -> Result<TaskPage> {
        let limit = if filter.limit > 0 {
            filter.limit
        } else {
            DEFAULT_PAGE_LIMIT
        };
        let query = [
            ("lod", "full".to_string()),
            ("limit", limit.to_string()),
            ("order", "asc(updatedAt)".to_string()),
            ("state", filter.state.clone()),
            (
                "updatedAt",
                format!(
                    "gt({})",
                    filter
                        .updated_after
                        .to_rfc3339_opts(SecondsFormat::Secs, true)
                ),
            ),
        ];
        self.get_tasks(&query).await
    }

    async fn next_page(&self, after: &str) -> Result<TaskPage> {
        let query = [
            ("after", after.to_string()),
            ("limit", self.config.page_limit.to_string()),
        ];
        self.get_tasks(&query).await
    }
}

fn fetch_error(endpoint: &str, err: &reqwest::Error) -> Error {
    let message = if err.is_timeout() {
        format!("request timed out: {err}")
    } else {
        err.to_string()
    };
    Error::fetch(endpoint, message)
}
