//! JSON request/response client for the console backend.
//!
//! Every endpoint answers with an envelope `{"success": bool, "error"?: str, ...}`.
//! A `success: false` envelope becomes [`ApiError::Rejected`] carrying the
//! backend's text verbatim, whatever the HTTP status was.

use std::time::Duration;

use reqwest::{RequestBuilder, Response};
use scriptdeck_types::{LogLevel, LogRecord, ScriptId};
use serde::Deserialize;
use serde_json::{Map, Value};
use url::Url;

use crate::channel::HttpConnector;
use crate::error::{ApiError, DEFAULT_REJECTION};
use crate::read_capped_error_body;
use crate::retry::{RetryConfig, RetryOutcome, send_with_retry};

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
pub const DEFAULT_HISTORY_LIMIT: usize = 100;

/// Filters for `GET /api/logs/history`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryQuery {
    pub limit: usize,
    /// Only records from this source (display name or `system`).
    pub module: Option<String>,
    pub level: Option<LogLevel>,
}

impl Default for HistoryQuery {
    fn default() -> Self {
        Self::latest(DEFAULT_HISTORY_LIMIT)
    }
}

impl HistoryQuery {
    #[must_use]
    pub fn latest(limit: usize) -> Self {
        Self {
            limit,
            module: None,
            level: None,
        }
    }

    pub fn module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }

    pub fn level(mut self, level: LogLevel) -> Self {
        self.level = Some(level);
        self
    }
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(flatten)]
    fields: Map<String, Value>,
}

impl Envelope {
    fn into_fields(self) -> Result<Map<String, Value>, ApiError> {
        if self.success {
            return Ok(self.fields);
        }
        let message = self
            .error
            .filter(|text| !text.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_REJECTION.to_string());
        Err(ApiError::Rejected(message))
    }
}

fn take_field(fields: &mut Map<String, Value>, key: &'static str) -> Result<Value, ApiError> {
    fields
        .remove(key)
        .ok_or_else(|| <serde_json::Error as serde::de::Error>::missing_field(key).into())
}

#[derive(Debug, Clone)]
pub struct ConsoleApi {
    client: reqwest::Client,
    base_url: Url,
    retry: RetryConfig,
    request_timeout: Duration,
}

impl ConsoleApi {
    /// Client on the shared connection pool.
    #[must_use]
    pub fn new(base_url: Url) -> Self {
        Self::with_client(crate::http_client().clone(), base_url)
    }

    #[must_use]
    pub fn with_client(client: reqwest::Client, base_url: Url) -> Self {
        Self {
            client,
            base_url,
            retry: RetryConfig::default(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Connector for `GET /api/logs/stream` on the same host and client.
    pub fn stream_connector(&self) -> Result<HttpConnector, ApiError> {
        let url = self.endpoint(&["api", "logs", "stream"])?;
        Ok(HttpConnector::new(self.client.clone(), url))
    }

    /// `GET /api/logs/history`. Records that fail to parse are skipped.
    pub async fn history(&self, query: &HistoryQuery) -> Result<Vec<LogRecord>, ApiError> {
        let mut url = self.endpoint(&["api", "logs", "history"])?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("limit", &query.limit.to_string());
            if let Some(module) = &query.module {
                pairs.append_pair("module", module);
            }
            if let Some(level) = query.level {
                pairs.append_pair("level", level.as_str());
            }
        }

        let mut fields = self.get(url).await?;
        let Value::Array(raw) = take_field(&mut fields, "logs")? else {
            let error = <serde_json::Error as serde::de::Error>::custom("`logs` is not an array");
            return Err(error.into());
        };

        let total = raw.len();
        let records: Vec<LogRecord> = raw
            .into_iter()
            .filter_map(|value| match serde_json::from_value(value) {
                Ok(record) => Some(record),
                Err(e) => {
                    tracing::warn!(%e, "Dropping malformed history record");
                    None
                }
            })
            .collect();
        tracing::debug!(total, kept = records.len(), "Fetched log history");
        Ok(records)
    }

    /// `POST /api/logs/clear`.
    pub async fn clear_logs(&self) -> Result<(), ApiError> {
        let url = self.endpoint(&["api", "logs", "clear"])?;
        self.post(url, None).await.map(drop)
    }

    /// `POST /api/scripts/{id}/start`. Never retried.
    pub async fn start_script(&self, id: &ScriptId) -> Result<(), ApiError> {
        let url = self.endpoint(&["api", "scripts", id.as_str(), "start"])?;
        self.post(url, None).await.map(drop)
    }

    /// `POST /api/scripts/{id}/stop`. Never retried.
    pub async fn stop_script(&self, id: &ScriptId) -> Result<(), ApiError> {
        let url = self.endpoint(&["api", "scripts", id.as_str(), "stop"])?;
        self.post(url, None).await.map(drop)
    }

    /// `GET /api/config`, returned as opaque JSON.
    pub async fn config(&self) -> Result<Value, ApiError> {
        let url = self.endpoint(&["api", "config"])?;
        let mut fields = self.get(url).await?;
        take_field(&mut fields, "config")
    }

    /// `POST /api/config`.
    pub async fn save_config(&self, config: &Value) -> Result<(), ApiError> {
        let url = self.endpoint(&["api", "config"])?;
        self.post(url, Some(config)).await.map(drop)
    }

    /// `GET /api/portfolio/{code}`.
    pub async fn portfolio(&self, code: &str) -> Result<Value, ApiError> {
        let url = self.endpoint(&["api", "portfolio", code])?;
        let mut fields = self.get(url).await?;
        take_field(&mut fields, "portfolio")
    }

    /// `GET /api/simulator/{gid}`.
    pub async fn simulator(&self, gid: u64) -> Result<Value, ApiError> {
        let url = self.endpoint(&["api", "simulator", &gid.to_string()])?;
        let mut fields = self.get(url).await?;
        take_field(&mut fields, "simulator")
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ApiError::CannotBeABase)?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get(&self, url: Url) -> Result<Map<String, Value>, ApiError> {
        let build = || self.client.get(url.clone()).timeout(self.request_timeout);
        read_envelope(send_with_retry(build, &self.retry).await).await
    }

    async fn post(&self, url: Url, body: Option<&Value>) -> Result<Map<String, Value>, ApiError> {
        let build = || {
            let request: RequestBuilder =
                self.client.post(url.clone()).timeout(self.request_timeout);
            match body {
                Some(body) => request.json(body),
                None => request,
            }
        };
        read_envelope(send_with_retry(build, &RetryConfig::none()).await).await
    }
}

async fn read_envelope(outcome: RetryOutcome) -> Result<Map<String, Value>, ApiError> {
    let response = match outcome {
        RetryOutcome::Success(response) => response,
        RetryOutcome::HttpError(response) => return Err(status_error(response).await),
        RetryOutcome::ConnectionError { attempts, source } => {
            return Err(ApiError::Exhausted { attempts, source });
        }
        RetryOutcome::NonRetryable(e) => return Err(ApiError::Transport(e)),
    };

    let bytes = response.bytes().await.map_err(ApiError::Transport)?;
    let envelope: Envelope = serde_json::from_slice(&bytes)?;
    envelope.into_fields()
}

/// A non-2xx answer. The backend still sends its JSON envelope for some of
/// these (401 when not logged in), in which case its message wins.
async fn status_error(response: Response) -> ApiError {
    let status = response.status();
    let body = read_capped_error_body(response).await;
    if let Ok(envelope) = serde_json::from_str::<Envelope>(&body)
        && !envelope.success
        && envelope.error.is_some()
        && let Err(rejected) = envelope.into_fields()
    {
        return rejected;
    }
    ApiError::Status { status, body }
}
