//! Transaction sources
//!
//! ## HTTP
//!
//! Endpoint: `GET {api_url}/transactions?user_id={user}&page=1&page_size={n}`
//! Returns: `{"transactions": [...], "total": n, "page": 1, ...}` or a bare array
//!
//! ## File
//!
//! A JSON file holding either of the shapes above. Useful for demos and tests.

use crate::analytics::normalizer::RawRecord;
use crate::config::Config;
use async_trait::async_trait;
use serde_json::Value;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("transaction service returned status {0}")]
    Status(u16),

    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Anything that can produce one batch of raw transaction records
#[async_trait]
pub trait TransactionSource: Send + Sync {
    async fn fetch(&self) -> Result<Vec<RawRecord>, FetchError>;

    fn source_type(&self) -> &'static str;
}

/// Extract raw records from a response body
///
/// Accepts a bare array or an object with a `transactions` array. Any other
/// shape yields no records. Every array item yields exactly one record, so the
/// length of the result is the number of items the service sent. Items that
/// are not objects come back as blank records, which the normalizer drops
/// along with any other malformed item.
pub fn decode_payload(payload: Value) -> Vec<RawRecord> {
    let items = match payload {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("transactions") {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    };

    let total = items.len();
    let mut blank = 0;
    let records: Vec<RawRecord> = items
        .into_iter()
        .map(|item| {
            RawRecord::from_value(item).unwrap_or_else(|_| {
                blank += 1;
                RawRecord::default()
            })
        })
        .collect();

    if blank > 0 {
        log::debug!("{} of {} items are not objects", blank, total);
    }
    records
}

pub struct HttpTransactionSource {
    client: reqwest::Client,
    url: String,
    user_id: String,
    page_size: u32,
    api_token: Option<String>,
}

impl HttpTransactionSource {
    pub fn new(config: &Config) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            client,
            url: format!("{}/transactions", config.api_url.trim_end_matches('/')),
            user_id: config.user_id.clone(),
            page_size: config.page_size,
            api_token: config.api_token.clone(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl TransactionSource for HttpTransactionSource {
    async fn fetch(&self) -> Result<Vec<RawRecord>, FetchError> {
        let page_size = self.page_size.to_string();
        let mut request = self.client.get(&self.url).query(&[
            ("user_id", self.user_id.as_str()),
            ("page", "1"),
            ("page_size", page_size.as_str()),
        ]);
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;

        if !response.status().is_success() {
            return Err(FetchError::Status(response.status().as_u16()));
        }

        let payload: Value = response.json().await?;
        Ok(decode_payload(payload))
    }

    fn source_type(&self) -> &'static str {
        "http"
    }
}

pub struct FileTransactionSource {
    path: PathBuf,
}

impl FileTransactionSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl TransactionSource for FileTransactionSource {
    async fn fetch(&self) -> Result<Vec<RawRecord>, FetchError> {
        let body = tokio::fs::read(&self.path).await?;
        let payload: Value = serde_json::from_slice(&body)?;
        Ok(decode_payload(payload))
    }

    fn source_type(&self) -> &'static str {
        "file"
    }
}
