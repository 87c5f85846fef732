//! Client for the Dune table upload API.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::http::excerpt;
use crate::secret::SecretString;

pub const UPLOAD_CSV_PATH: &str = "/api/v1/table/upload/csv";
pub const API_KEY_HEADER: &str = "X-Dune-Api-Key";

/// Request body for a CSV table upload.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CsvUpload {
    pub table_name: String,
    pub description: String,
    pub data: String,
    pub is_private: bool,
    /// Data rows in `data`, header excluded. Not sent.
    #[serde(skip)]
    pub rows: usize,
}

/// What the server confirmed about an accepted upload.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct UploadReceipt {
    pub table_name: Option<String>,
    pub content_hash: String,
    pub bytes: usize,
    pub rows: usize,
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("upload request failed: {0}")]
    Request(String),

    #[error("upload endpoint answered {status}: {body}")]
    Status { status: u16, body: String },

    #[error("upload was rejected: {0}")]
    Rejected(String),
}

#[async_trait]
pub trait TableUploader: Send + Sync {
    async fn upload(
        &self,
        api_key: &SecretString,
        upload: &CsvUpload,
    ) -> Result<UploadReceipt, UploadError>;
}

#[derive(Debug, Default, Deserialize)]
struct UploadResponse {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    table_name: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DuneClient {
    base_url: String,
    http: reqwest::Client,
}

impl DuneClient {
    pub fn with_client(base_url: &str, http: reqwest::Client) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        }
    }

    pub fn upload_url(&self) -> String {
        format!("{}{}", self.base_url, UPLOAD_CSV_PATH)
    }
}

#[async_trait]
impl TableUploader for DuneClient {
    async fn upload(
        &self,
        api_key: &SecretString,
        upload: &CsvUpload,
    ) -> Result<UploadReceipt, UploadError> {
        let content_hash = blake3::hash(upload.data.as_bytes()).to_hex().to_string();
        info!(
            table = %upload.table_name,
            bytes = upload.data.len(),
            rows = upload.rows,
            content_hash = %content_hash,
            "uploading CSV to Dune"
        );

        let response = self
            .http
            .post(self.upload_url())
            .header(API_KEY_HEADER, api_key.expose())
            .json(upload)
            .send()
            .await
            .map_err(|err| UploadError::Request(err.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| UploadError::Request(err.to_string()))?;

        if !status.is_success() {
            return Err(UploadError::Status {
                status: status.as_u16(),
                body: excerpt(&body),
            });
        }

        let table_name = interpret_response(&body)?;
        Ok(UploadReceipt {
            table_name,
            content_hash,
            bytes: upload.data.len(),
            rows: upload.rows,
        })
    }
}

/// Maps a 2xx body to the confirmed table name. An explicit `success: false`
/// is a rejection; a body that cannot be read is accepted with a warning.
fn interpret_response(body: &str) -> Result<Option<String>, UploadError> {
    let parsed = match serde_json::from_str::<UploadResponse>(body) {
        Ok(parsed) => parsed,
        Err(err) => {
            warn!(error = %err, body = %excerpt(body), "upload accepted but response was not in the expected format");
            return Ok(None);
        }
    };

    match parsed.success {
        Some(false) => {
            let reason = parsed
                .error
                .or(parsed.message)
                .unwrap_or_else(|| excerpt(body));
            Err(UploadError::Rejected(reason))
        }
        Some(true) => {
            info!(table = ?parsed.table_name, "upload succeeded");
            Ok(parsed.table_name)
        }
        None if parsed.table_name.is_some() => {
            info!(table = ?parsed.table_name, "upload succeeded");
            Ok(parsed.table_name)
        }
        None => {
            warn!(body = %excerpt(body), "upload accepted but response was not in the expected format");
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_with_table_name() {
        let name = interpret_response(r#"{"success": true, "table_name": "dataset_eth"}"#).unwrap();
        assert_eq!(name.as_deref(), Some("dataset_eth"));
    }

    #[test]
    fn bare_success_has_no_table_name() {
        assert_eq!(interpret_response(r#"{"success": true}"#).unwrap(), None);
    }

    #[test]
    fn table_name_without_success_flag_is_accepted() {
        let name = interpret_response(r#"{"table_name": "dataset_eth"}"#).unwrap();
        assert_eq!(name.as_deref(), Some("dataset_eth"));
    }

    #[test]
    fn explicit_failure_is_rejected() {
        let err = interpret_response(r#"{"success": false, "error": "quota exceeded"}"#)
            .unwrap_err();
        match err {
            UploadError::Rejected(reason) => assert_eq!(reason, "quota exceeded"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn unexpected_body_is_accepted() {
        assert_eq!(interpret_response("ok").unwrap(), None);
        assert_eq!(interpret_response("[1, 2]").unwrap(), None);
    }
}
