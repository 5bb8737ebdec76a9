//! CBS OData API client.
//!
//! Retry policy per request:
//! - timeout, connection failure, 5xx: wait `retry_base^attempt` seconds,
//!   at most [`MAX_BACKOFF`], up to `max_retries` retries
//! - 429: wait the fixed rate-limit cooldown, same retry budget
//! - any other non-success status: fail immediately
//!
//! Exhausting the budget surfaces the last failure.

use crate::error::{ExtractError, Result};
use crate::transport::{ReqwestTransport, Sleeper, ThreadSleeper, Transport};
use housing_domain::Frame;
use serde_json::Value;
use std::time::Duration;

/// Sub-endpoints of a table that are not dimensions.
pub const NON_DIMENSION_ENDPOINTS: &[&str] = &[
    "TableInfos",
    "UntypedDataSet",
    "TypedDataSet",
    "DataProperties",
    "CategoryGroups",
];

/// Longest wait between two attempts
pub const MAX_BACKOFF: Duration = Duration::from_secs(300);

/// Connection and retry settings for the OData API
#[derive(Debug, Clone, PartialEq)]
pub struct ApiConfig {
    /// Base URL, e.g. `https://opendata.cbs.nl/ODataApi/odata`
    pub base_url: String,
    /// Per-request timeout
    pub timeout: Duration,
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Rows requested per page (`$top`)
    pub page_size: usize,
    /// Exponential backoff base in seconds
    pub retry_base: f64,
    /// Cooldown after HTTP 429
    pub rate_limit_delay: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://opendata.cbs.nl/ODataApi/odata".to_string(),
            timeout: Duration::from_secs(60),
            max_retries: 3,
            page_size: 10_000,
            retry_base: 2.0,
            rate_limit_delay: Duration::from_secs(10),
        }
    }
}

/// Blocking CBS OData client
pub struct CbsClient<T = ReqwestTransport, S = ThreadSleeper> {
    config: ApiConfig,
    transport: T,
    sleeper: S,
}

impl CbsClient {
    /// Client over a real HTTP connection.
    pub fn new(config: ApiConfig) -> Result<Self> {
        let transport =
            ReqwestTransport::new(config.timeout).map_err(|source| ExtractError::Transport {
                url: config.base_url.clone(),
                source,
            })?;
        tracing::info!(base_url = %config.base_url, "CBS API client initialized");
        Ok(Self::with_transport(config, transport, ThreadSleeper))
    }
}

impl<T: Transport, S: Sleeper> CbsClient<T, S> {
    pub const fn with_transport(config: ApiConfig, transport: T, sleeper: S) -> Self {
        Self {
            config,
            transport,
            sleeper,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &ApiConfig {
        &self.config
    }

    #[cfg(test)]
    pub(crate) const fn transport(&self) -> &T {
        &self.transport
    }

    fn url(&self, endpoint: &str) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        )
    }

    /// Waits that are negative, NaN or too large to represent become the cap.
    fn backoff(&self, attempt: u32) -> Duration {
        let secs = self.config.retry_base.powf(f64::from(attempt));
        Duration::try_from_secs_f64(secs).map_or(MAX_BACKOFF, |wait| wait.min(MAX_BACKOFF))
    }

    /// One GET with retries, parsed as JSON.
    fn get_json(&self, endpoint: &str, params: &[(String, String)]) -> Result<Value> {
        let url = self.url(endpoint);
        let mut query = vec![("$format".to_string(), "json".to_string())];
        query.extend(params.iter().cloned());

        let mut attempt: u32 = 0;
        loop {
            let wait = match self.transport.get(&url, &query) {
                Ok(response) if (200..300).contains(&response.status) => {
                    return serde_json::from_str(&response.body)
                        .map_err(|source| ExtractError::Json { url, source });
                }
                Ok(response) if response.status == 429 && attempt < self.config.max_retries => {
                    tracing::warn!(
                        url = %url,
                        attempt,
                        delay_secs = self.config.rate_limit_delay.as_secs_f64(),
                        "rate limited, cooling down"
                    );
                    self.config.rate_limit_delay
                }
                Ok(response) if response.status >= 500 && attempt < self.config.max_retries => {
                    let wait = self.backoff(attempt);
                    tracing::warn!(
                        url = %url,
                        status = response.status,
                        attempt,
                        delay_secs = wait.as_secs_f64(),
                        "server error, retrying"
                    );
                    wait
                }
                Ok(response) => {
                    tracing::error!(url = %url, status = response.status, "request failed");
                    return Err(ExtractError::Status {
                        status: response.status,
                        url,
                    });
                }
                Err(err) if err.is_transient() && attempt < self.config.max_retries => {
                    let wait = self.backoff(attempt);
                    tracing::warn!(
                        url = %url,
                        error = %err,
                        attempt,
                        delay_secs = wait.as_secs_f64(),
                        "transport failure, retrying"
                    );
                    wait
                }
                Err(source) => {
                    tracing::error!(url = %url, error = %source, "request failed");
                    return Err(ExtractError::Transport { url, source });
                }
            };
            self.sleeper.sleep(wait);
            attempt += 1;
        }
    }

    /// Single request; the `value` array of the envelope becomes the rows.
    /// A response without `value` is an empty table.
    pub fn fetch(&self, endpoint: &str, params: &[(String, String)]) -> Result<Frame> {
        let json = self.get_json(endpoint, params)?;
        match json.get("value") {
            Some(Value::Array(rows)) => Ok(Frame::from_json_rows(rows)?),
            Some(other) => {
                tracing::warn!(endpoint, kind = %json_kind(other), "unexpected 'value' payload");
                Ok(Frame::new())
            }
            None => {
                tracing::warn!(endpoint, "response has no 'value' key");
                Ok(Frame::new())
            }
        }
    }

    /// Names of the sub-endpoints listed in the table's metadata document.
    pub fn fetch_table_info(&self, table_id: &str) -> Result<Vec<String>> {
        let json = self.get_json(table_id, &[])?;
        let names = json
            .get("value")
            .and_then(Value::as_array)
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|e| e.get("name").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        Ok(names)
    }

    /// One unpaginated dimension table (`Key`, `Title`, ...).
    pub fn fetch_dimension(&self, table_id: &str, dimension: &str) -> Result<Frame> {
        self.fetch(&format!("{table_id}/{dimension}"), &[])
    }

    /// Page through `TypedDataSet` in increasing `$skip` order until a short
    /// page or the row cap.
    pub fn fetch_paginated(
        &self,
        table_id: &str,
        filters: &[String],
        select: &[&str],
        max_rows: Option<usize>,
    ) -> Result<Frame> {
        let endpoint = format!("{table_id}/TypedDataSet");
        let mut base_params = Vec::new();
        if !filters.is_empty() {
            base_params.push(("$filter".to_string(), filters.join(" and ")));
        }
        if !select.is_empty() {
            base_params.push(("$select".to_string(), select.join(",")));
        }

        let mut frame = Frame::new();
        let mut fetched = 0usize;
        let mut pages = 0usize;
        loop {
            let rows_to_fetch = max_rows.map_or(self.config.page_size, |cap| {
                self.config.page_size.min(cap.saturating_sub(fetched))
            });
            if rows_to_fetch == 0 {
                break;
            }

            let mut params = base_params.clone();
            params.push(("$top".to_string(), rows_to_fetch.to_string()));
            params.push(("$skip".to_string(), fetched.to_string()));

            let page = self.fetch(&endpoint, &params)?;
            pages += 1;
            let received = page.height();
            tracing::debug!(table = table_id, skip = fetched, received, "page fetched");
            if received == 0 {
                break;
            }
            fetched += received;
            frame = frame.vstack(page);
            if received < rows_to_fetch {
                break;
            }
        }

        tracing::info!(table = table_id, rows = fetched, pages, "paginated fetch complete");
        Ok(frame)
    }

    /// Every dimension listed in the table metadata. A dimension that fails
    /// to load is logged and returned as an empty table.
    pub fn fetch_all_dimensions(&self, table_id: &str) -> Result<Vec<(String, Frame)>> {
        let endpoints = self.fetch_table_info(table_id)?;
        let mut dimensions = Vec::new();
        for name in endpoints
            .into_iter()
            .filter(|n| !NON_DIMENSION_ENDPOINTS.contains(&n.as_str()))
        {
            let frame = match self.fetch_dimension(table_id, &name) {
                Ok(frame) => {
                    tracing::info!(table = table_id, dimension = %name, rows = frame.height(), "dimension loaded");
                    frame
                }
                Err(err) => {
                    tracing::warn!(table = table_id, dimension = %name, error = %err, "dimension unavailable");
                    Frame::new()
                }
            };
            dimensions.push((name, frame));
        }
        Ok(dimensions)
    }
}

const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
