//! REST connector over a paginated JSON API.
//!
//! Wire format:
//!
//! - `GET {base}/{object}?page=N&per_page=M&filter[field][op]=value` returns an
//!   envelope `{page, totalpages, totalitems, data, status, errors}` where
//!   `data` is an array of records or a single record
//! - `GET {base}/{object}?structure=1` returns `{data: {field: type}}`
//! - `POST {base}/{object}` upserts, `PUT`/`DELETE {base}/{object}/{pk}`
//!   update and delete by primary key
//! - `POST {base}/{activity_object}` stores a run summary
//!
//! A `status` of `INVALID_REQUEST` is reported as
//! [`ConnectorError::InvalidRequest`] with the envelope's `errors`.

use crate::{
    ActivitySummary, ConnectorError, Filter, Page, QueryOptions, RemoteConnector, Structure,
};
use futures::future::{BoxFuture, FutureExt};
use futures::stream::{self, StreamExt};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, Method, Url};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use sync_core::{is_empty_value, value_to_string, Row};
use tokio::time::sleep;

/// Default number of in-flight requests for batched calls
pub const DEFAULT_CONCURRENCY: usize = 10;

/// Maximum number of retries for transient failures
const MAX_RETRIES: u32 = 5;

/// Base delay between retries (doubled per attempt, capped at 1.6s)
const RETRY_BASE_DELAY_MS: u64 = 100;

const INVALID_REQUEST: &str = "INVALID_REQUEST";

/// Configuration for [`RestConnector`].
#[derive(Debug, Clone)]
pub struct RestConfig {
    /// Base URL of the API, e.g. `https://api.example.com/v1`
    pub base_url: String,

    /// Remote object (endpoint) name
    pub object: String,

    /// Bearer token sent with every request
    pub token: Option<String>,

    /// Page size requested from the API
    pub per_page: Option<u32>,

    /// Use batched insert/delete calls
    pub batch: bool,

    /// Width of the request fan-out for batched calls
    pub concurrency: usize,

    /// Per-request timeout
    pub timeout: Duration,

    /// Object that receives activity summaries
    pub activity_object: String,

    /// Retries for connection errors and HTTP 429/5xx
    pub max_retries: u32,
}

impl Default for RestConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            object: String::new(),
            token: None,
            per_page: None,
            batch: true,
            concurrency: DEFAULT_CONCURRENCY,
            timeout: Duration::from_secs(30),
            activity_object: "activity".to_string(),
            max_retries: MAX_RETRIES,
        }
    }
}

/// Response envelope shared by all endpoints.
#[derive(Debug, Default, Deserialize)]
struct Envelope {
    #[serde(default)]
    page: Option<u64>,
    #[serde(default)]
    totalpages: Option<u64>,
    #[serde(default)]
    totalitems: Option<u64>,
    #[serde(default)]
    data: Value,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    errors: Vec<Value>,
}

impl Envelope {
    fn into_result(self) -> Result<Self, ConnectorError> {
        if self.status.as_deref() == Some(INVALID_REQUEST) {
            let errors = self.errors.iter().map(value_to_string).collect();
            return Err(ConnectorError::InvalidRequest(errors));
        }
        Ok(self)
    }

    fn records(&self) -> Result<Vec<Row>, ConnectorError> {
        match &self.data {
            Value::Null => Ok(Vec::new()),
            Value::Array(items) => items.iter().map(record_from_value).collect(),
            single @ Value::Object(_) => Ok(vec![record_from_value(single)?]),
            other => Err(ConnectorError::Malformed(format!(
                "expected records in 'data', got {other}"
            ))),
        }
    }
}

fn record_from_value(value: &Value) -> Result<Row, ConnectorError> {
    match value {
        Value::Object(map) => Ok(map.iter().map(|(k, v)| (k.clone(), v.clone())).collect()),
        other => Err(ConnectorError::Malformed(format!(
            "expected a record object, got {other}"
        ))),
    }
}

fn row_to_value(row: &Row) -> Value {
    Value::Object(row.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
}

/// Connector for a paginated JSON API.
pub struct RestConnector {
    client: Client,
    base: Url,
    config: RestConfig,
    options: QueryOptions,
    has_more: bool,
    structure: Option<Structure>,
    primary_key: Option<String>,
}

impl RestConnector {
    pub fn new(config: RestConfig) -> Result<Self, ConnectorError> {
        let base = Url::parse(&config.base_url).map_err(|e| {
            ConnectorError::Malformed(format!("invalid base URL '{}': {e}", config.base_url))
        })?;
        if base.cannot_be_a_base() {
            return Err(ConnectorError::Malformed(format!(
                "base URL '{}' cannot carry a path",
                config.base_url
            )));
        }

        let mut headers = HeaderMap::new();
        if let Some(token) = &config.token {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| ConnectorError::Malformed(format!("invalid API token: {e}")))?;
            headers.insert(AUTHORIZATION, value);
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| ConnectorError::Transport {
                url: config.base_url.clone(),
                message: e.to_string(),
            })?;

        let options = QueryOptions {
            per_page: config.per_page,
            ..QueryOptions::default()
        };

        tracing::debug!(
            "REST connector for '{}' at {} (batch: {}, concurrency: {})",
            config.object,
            base,
            config.batch,
            config.concurrency
        );

        Ok(Self {
            client,
            base,
            config,
            options,
            has_more: true,
            structure: None,
            primary_key: None,
        })
    }

    fn url_for(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        // Checked in `new`: the base can carry a path.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn record_key(&self, row: &Row) -> Result<String, ConnectorError> {
        let field = self
            .primary_key
            .as_deref()
            .ok_or_else(|| ConnectorError::NoPrimaryKey(self.config.object.clone()))?;
        row.get(field)
            .filter(|v| !is_empty_value(v))
            .map(value_to_string)
            .ok_or_else(|| ConnectorError::MissingKey(field.to_string()))
    }

    /// Send a request, retrying transient failures with exponential backoff.
    async fn send(
        &self,
        method: Method,
        url: Url,
        query: &[(String, String)],
        body: Option<&Value>,
    ) -> Result<Envelope, ConnectorError> {
        let mut last_error: Option<ConnectorError> = None;
        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                let delay_ms = RETRY_BASE_DELAY_MS * (1 << (attempt - 1).min(4));
                tracing::warn!(
                    "Retrying {} {} (attempt {}/{}), waiting {}ms",
                    method,
                    url,
                    attempt,
                    self.config.max_retries,
                    delay_ms
                );
                sleep(Duration::from_millis(delay_ms)).await;
            }

            match self.send_once(method.clone(), url.clone(), query, body).await {
                Ok(envelope) => return Ok(envelope),
                Err(e) if e.is_retryable() => {
                    tracing::warn!("Transient failure for {} {}: {}", method, url, e);
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| ConnectorError::Transport {
            url: url.to_string(),
            message: "no attempt was made".to_string(),
        }))
    }

    async fn send_once(
        &self,
        method: Method,
        url: Url,
        query: &[(String, String)],
        body: Option<&Value>,
    ) -> Result<Envelope, ConnectorError> {
        let mut request = self.client.request(method, url.clone()).query(query);
        if let Some(body) = body {
            request = request.json(body);
        }

        let transport = |e: reqwest::Error| ConnectorError::Transport {
            url: url.to_string(),
            message: e.to_string(),
        };
        let response = request.send().await.map_err(transport)?;
        let status = response.status();
        let text = response.text().await.map_err(transport)?;

        let parsed = if text.trim().is_empty() {
            Ok(Envelope::default())
        } else {
            serde_json::from_str::<Envelope>(&text)
        };

        if !status.is_success() {
            // An INVALID_REQUEST envelope is more useful than the bare status.
            if let Ok(envelope) = parsed {
                envelope.into_result()?;
            }
            return Err(ConnectorError::Status {
                status: status.as_u16(),
                url: url.to_string(),
                body: text,
            });
        }

        parsed
            .map_err(|e| ConnectorError::Malformed(format!("{url}: {e}")))?
            .into_result()
    }

    async fn post_row(&self, row: &Row) -> Result<(), ConnectorError> {
        let url = self.url_for(&[&self.config.object]);
        self.send(Method::POST, url, &[], Some(&row_to_value(row)))
            .await
            .map(|_| ())
    }

    async fn delete_row(&self, row: &Row) -> Result<(), ConnectorError> {
        let key = self.record_key(row)?;
        let url = self.url_for(&[&self.config.object, &key]);
        self.send(Method::DELETE, url, &[], Some(&row_to_value(row)))
            .await
            .map(|_| ())
    }
}

#[async_trait::async_trait]
impl RemoteConnector for RestConnector {
    fn object(&self) -> &str {
        &self.config.object
    }

    fn options(&self) -> &QueryOptions {
        &self.options
    }

    fn set_options(&mut self, options: QueryOptions) {
        self.options = options;
        self.has_more = true;
    }

    fn has_more(&self) -> bool {
        self.has_more
    }

    fn supports_batch(&self) -> bool {
        self.config.batch
    }

    fn primary_key(&self) -> Option<&str> {
        self.primary_key.as_deref()
    }

    fn set_primary_key(&mut self, field: Option<String>) {
        self.primary_key = field;
    }

    async fn get_records(&mut self, extra: &[Filter]) -> Result<Page, ConnectorError> {
        let url = self.url_for(&[&self.config.object]);
        let query = self.options.to_query_pairs(extra);
        let envelope = self.send(Method::GET, url, &query, None).await?;
        let records = envelope.records()?;

        let page = envelope.page.unwrap_or(u64::from(self.options.page));
        let total_pages = envelope.totalpages.unwrap_or(page);
        self.has_more = page < total_pages;
        self.options.page = self.options.page.saturating_add(1);

        tracing::debug!(
            "Fetched page {}/{} of '{}': {} records ({} total)",
            page,
            total_pages,
            self.config.object,
            records.len(),
            envelope
                .totalitems
                .map(|n| n.to_string())
                .unwrap_or_else(|| "?".to_string())
        );

        Ok(Page {
            records,
            has_more: self.has_more,
        })
    }

    async fn get_structure(&mut self) -> Result<Structure, ConnectorError> {
        if let Some(structure) = &self.structure {
            return Ok(structure.clone());
        }
        let url = self.url_for(&[&self.config.object]);
        let query = [("structure".to_string(), "1".to_string())];
        let envelope = self.send(Method::GET, url, &query, None).await?;
        let structure = Structure::from_value(&envelope.data).ok_or_else(|| {
            ConnectorError::Malformed(format!(
                "structure of '{}' is not a field map",
                self.config.object
            ))
        })?;
        self.structure = Some(structure.clone());
        Ok(structure)
    }

    async fn insert_record(&mut self, row: &Row) -> Result<(), ConnectorError> {
        self.post_row(row).await
    }

    async fn insert_records(&mut self, rows: &[Row]) -> Vec<Result<(), ConnectorError>> {
        let this = &*self;
        let requests: Vec<BoxFuture<'_, Result<(), ConnectorError>>> =
            rows.iter().map(|row| this.post_row(row).boxed()).collect();
        stream::iter(requests)
            .buffered(this.config.concurrency.max(1))
            .collect::<Vec<_>>()
            .await
    }

    async fn update_record(&mut self, row: &Row) -> Result<(), ConnectorError> {
        let key = self.record_key(row)?;
        let url = self.url_for(&[&self.config.object, &key]);
        self.send(Method::PUT, url, &[], Some(&row_to_value(row)))
            .await
            .map(|_| ())
    }

    async fn delete_record(&mut self, row: &Row) -> Result<(), ConnectorError> {
        self.delete_row(row).await
    }

    async fn delete_records(&mut self, rows: &[Row]) -> Vec<Result<(), ConnectorError>> {
        let this = &*self;
        let requests: Vec<BoxFuture<'_, Result<(), ConnectorError>>> =
            rows.iter().map(|row| this.delete_row(row).boxed()).collect();
        stream::iter(requests)
            .buffered(this.config.concurrency.max(1))
            .collect::<Vec<_>>()
            .await
    }

    async fn insert_activity_record(
        &mut self,
        summary: &ActivitySummary,
    ) -> Result<(), ConnectorError> {
        let body = serde_json::to_value(summary)
            .map_err(|e| ConnectorError::Malformed(format!("activity summary: {e}")))?;
        let url = self.url_for(&[&self.config.activity_object]);
        self.send(Method::POST, url, &[], Some(&body))
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn connector(base_url: &str) -> RestConnector {
        RestConnector::new(RestConfig {
            base_url: base_url.to_string(),
            object: "contacts".to_string(),
            ..RestConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_url_for_keeps_base_path() {
        let c = connector("http://api.example.com/v1/");
        assert_eq!(
            c.url_for(&["contacts"]).as_str(),
            "http://api.example.com/v1/contacts"
        );
        assert_eq!(
            c.url_for(&["contacts", "a b/c"]).as_str(),
            "http://api.example.com/v1/contacts/a%20b%2Fc"
        );
    }

    #[test]
    fn test_record_key() {
        let mut c = connector("http://api.example.com");
        let row: Row = [("id".to_string(), json!(7))].into_iter().collect();
        assert_eq!(
            c.record_key(&row),
            Err(ConnectorError::NoPrimaryKey("contacts".into()))
        );
        c.set_primary_key(Some("id".into()));
        assert_eq!(c.record_key(&row).unwrap(), "7");
        c.set_primary_key(Some("email".into()));
        assert_eq!(
            c.record_key(&row),
            Err(ConnectorError::MissingKey("email".into()))
        );
    }

    #[test]
    fn test_envelope_records() {
        let many: Envelope =
            serde_json::from_value(json!({"page": 1, "totalpages": 2, "data": [{"a": 1}, {"a": 2}]}))
                .unwrap();
        assert_eq!(many.records().unwrap().len(), 2);

        let single: Envelope = serde_json::from_value(json!({"data": {"a": 1}})).unwrap();
        assert_eq!(single.records().unwrap().len(), 1);

        let bad: Envelope = serde_json::from_value(json!({"data": 5})).unwrap();
        assert!(matches!(bad.records(), Err(ConnectorError::Malformed(_))));
    }

    #[test]
    fn test_envelope_invalid_request() {
        let envelope: Envelope = serde_json::from_value(json!({
            "status": "INVALID_REQUEST",
            "errors": ["email is required"]
        }))
        .unwrap();
        assert_eq!(
            envelope.into_result().unwrap_err(),
            ConnectorError::InvalidRequest(vec!["email is required".into()])
        );
    }

    #[test]
    fn test_rejects_opaque_base_url() {
        let err = RestConnector::new(RestConfig {
            base_url: "mailto:someone@example.com".to_string(),
            ..RestConfig::default()
        })
        .err()
        .unwrap();
        assert!(matches!(err, ConnectorError::Malformed(_)));
    }
}
