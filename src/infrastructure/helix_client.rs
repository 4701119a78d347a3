use reqwest::blocking::Client;
use reqwest::Url;
use serde_json::Value;
use std::time::Duration;

use crate::config::ClientConfig;
use crate::domain::client::QueryClient;
use crate::domain::record::{Params, Row};
use crate::error::{GatewayError, Result};

const API_KEY_HEADER: &str = "x-api-key";

/// Blocking HTTP client for a HelixDB gateway.
///
/// Every named query is a `POST {endpoint}/{query_name}` with the params as a
/// JSON body. Not for use directly on an async executor thread: build and drop
/// it outside the runtime, and call it through the worker pool.
pub struct HelixClient {
    http: Client,
    endpoint: Url,
    api_key: Option<String>,
}

impl HelixClient {
    /// Creates a new HelixClient for the configured endpoint.
    ///
    /// # Returns
    ///
    /// `Validation` if the endpoint is not a URL, `Connection` if the
    /// underlying HTTP client cannot be built.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let endpoint = Url::parse(config.endpoint.trim()).map_err(|e| {
            GatewayError::Validation(format!(
                "Invalid HelixDB endpoint '{}': {}",
                config.endpoint, e
            ))
        })?;
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                log::error!("Failed to create HelixDB client: {}", e);
                GatewayError::Connection(format!("Failed to create HTTP client: {}", e))
            })?;

        log::info!("HelixDB client initialized for {}", endpoint);
        Ok(Self {
            http,
            endpoint,
            api_key: config.api_key.clone(),
        })
    }

    fn query_url(&self, query_name: &str) -> String {
        format!("{}/{}", self.endpoint.as_str().trim_end_matches('/'), query_name)
    }
}

impl QueryClient for HelixClient {
    fn execute(&self, query_name: &str, params: &Params) -> Result<Vec<Row>> {
        let url = self.query_url(query_name);
        log::debug!("POST {} ({} params)", url, params.len());

        let mut request = self.http.post(&url).json(params);
        if let Some(key) = &self.api_key {
            request = request.header(API_KEY_HEADER, key);
        }

        let response = request.send().map_err(|e| classify_send_error(query_name, e))?;
        let status = response.status();
        let body = response.text().map_err(|e| {
            GatewayError::Connection(format!(
                "Failed to read response for '{}': {}",
                query_name, e
            ))
        })?;

        if !status.is_success() {
            return Err(GatewayError::Query(format!(
                "'{}' returned {}: {}",
                query_name,
                status,
                body.trim()
            )));
        }
        parse_rows(query_name, &body)
    }
}

fn classify_send_error(query_name: &str, err: reqwest::Error) -> GatewayError {
    if err.is_builder() {
        GatewayError::Query(format!("Could not build request for '{}': {}", query_name, err))
    } else {
        GatewayError::Connection(format!("'{}' could not reach HelixDB: {}", query_name, err))
    }
}

/// Normalizes a response body into rows: an array of objects is taken as is,
/// a single object is one row and an empty body or `null` is no rows.
/// Non-object items are wrapped as `{"value": item}`.
pub(crate) fn parse_rows(query_name: &str, body: &str) -> Result<Vec<Row>> {
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }
    let value: Value = serde_json::from_str(body).map_err(|e| {
        GatewayError::Query(format!("'{}' returned malformed JSON: {}", query_name, e))
    })?;

    let rows = match value {
        Value::Null => Vec::new(),
        Value::Array(items) => items.into_iter().map(into_row).collect(),
        other => vec![into_row(other)],
    };
    Ok(rows)
}

fn into_row(value: Value) -> Row {
    match value {
        Value::Object(map) => map,
        other => {
            let mut row = Row::new();
            row.insert("value".to_string(), other);
            row
        }
    }
}
