use std::path::PathBuf;

use async_trait::async_trait;
use queuefeed_parser::{parse_records, ParseError, Record};
use thiserror::Error;
use tracing::info;

use crate::http::excerpt;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("request to {url} failed: {message}")]
    Request { url: String, message: String },

    #[error("{url} answered {status}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Parse(#[from] ParseError),
}

#[async_trait]
pub trait RecordSource: Send + Sync {
    fn describe(&self) -> String;
    async fn fetch(&self) -> Result<Vec<Record>, SourceError>;
}

/// Downloads the JSON history over HTTP.
#[derive(Debug, Clone)]
pub struct HttpRecordSource {
    url: String,
    client: reqwest::Client,
}

impl HttpRecordSource {
    pub fn new(url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            url: url.into(),
            client,
        }
    }
}

#[async_trait]
impl RecordSource for HttpRecordSource {
    fn describe(&self) -> String {
        self.url.clone()
    }

    async fn fetch(&self) -> Result<Vec<Record>, SourceError> {
        info!(url = %self.url, "fetching validator queue data");

        let request_error = |err: reqwest::Error| SourceError::Request {
            url: self.url.clone(),
            message: err.to_string(),
        };

        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(request_error)?;

        let status = response.status();
        let body = response.bytes().await.map_err(request_error)?;

        if !status.is_success() {
            return Err(SourceError::Status {
                url: self.url.clone(),
                status: status.as_u16(),
                body: excerpt(&String::from_utf8_lossy(&body)),
            });
        }

        let records = parse_records(&body)?;
        info!(records = records.len(), "loaded validator queue records");
        Ok(records)
    }
}

/// Reads the JSON history from a local file.
#[derive(Debug, Clone)]
pub struct FileRecordSource {
    path: PathBuf,
}

impl FileRecordSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl RecordSource for FileRecordSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    async fn fetch(&self) -> Result<Vec<Record>, SourceError> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|source| SourceError::Io {
                path: self.path.clone(),
                source,
            })?;
        let records = parse_records(&bytes)?;
        info!(
            path = %self.path.display(),
            records = records.len(),
            "loaded validator queue records"
        );
        Ok(records)
    }
}
