// crates/queuefeed-core/src/steps.rs

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use queuefeed_parser::{build_frame, clean_frame, encode_csv};
use tracing::info;

use crate::config::API_KEY_VAR;
use crate::dune::{CsvUpload, TableUploader};
use crate::error::{JobError, Result};
use crate::job::{JobContext, JobStep};
use crate::secret::{read_env_key, write_env_file};
use crate::source::RecordSource;

/// Validates settings before anything touches the disk or the network.
pub struct ProvisionStep;

#[async_trait]
impl JobStep for ProvisionStep {
    fn name(&self) -> &'static str {
        "provision"
    }

    async fn run(&self, ctx: &mut JobContext) -> Result<()> {
        ctx.settings.validate()?;
        info!(
            source = %ctx.settings.source_url,
            table = %ctx.settings.table.name,
            metric_columns = ctx.settings.schema.metric_columns.len(),
            "settings validated"
        );
        Ok(())
    }
}

/// Writes the supplied API key to the env file. Without a supplied key, an
/// env file that already holds one is accepted.
pub struct MaterializeSecretStep;

#[async_trait]
impl JobStep for MaterializeSecretStep {
    fn name(&self) -> &'static str {
        "materialize-secret"
    }

    async fn run(&self, ctx: &mut JobContext) -> Result<()> {
        let path = &ctx.settings.env_file;
        match &ctx.secret {
            Some(secret) => {
                write_env_file(path, API_KEY_VAR, secret)?;
                info!(path = %path.display(), key = API_KEY_VAR, "wrote API key to env file");
            }
            None => {
                read_env_key(path, API_KEY_VAR)?;
                info!(path = %path.display(), key = API_KEY_VAR, "using API key already present in env file");
            }
        }
        Ok(())
    }
}

pub struct FetchStep {
    source: Arc<dyn RecordSource>,
}

impl FetchStep {
    pub fn new(source: Arc<dyn RecordSource>) -> Self {
        Self { source }
    }
}

#[async_trait]
impl JobStep for FetchStep {
    fn name(&self) -> &'static str {
        "fetch"
    }

    async fn run(&self, ctx: &mut JobContext) -> Result<()> {
        let records = self.source.fetch().await?;
        info!(source = %self.source.describe(), records = records.len(), "records fetched");
        ctx.records = Some(records);
        Ok(())
    }
}

/// Builds the frame and drops rows with missing metric values.
pub struct CleanStep;

#[async_trait]
impl JobStep for CleanStep {
    fn name(&self) -> &'static str {
        "clean"
    }

    async fn run(&self, ctx: &mut JobContext) -> Result<()> {
        let records = ctx.records.take().ok_or(JobError::MissingInput {
            step: "clean",
            input: "fetched records",
        })?;

        let schema = &ctx.settings.schema;
        let df = build_frame(&records, schema)?;
        let (rows, columns) = df.shape();
        info!(rows, columns, "built frame");

        let table = clean_frame(&df, schema)?;
        ctx.table = Some(table);
        Ok(())
    }
}

/// Reads the API key back from the env file and uploads the CSV.
pub struct UploadStep {
    uploader: Arc<dyn TableUploader>,
}

impl UploadStep {
    pub fn new(uploader: Arc<dyn TableUploader>) -> Self {
        Self { uploader }
    }
}

#[async_trait]
impl JobStep for UploadStep {
    fn name(&self) -> &'static str {
        "upload"
    }

    async fn run(&self, ctx: &mut JobContext) -> Result<()> {
        let table = ctx.table.as_ref().ok_or(JobError::MissingInput {
            step: "upload",
            input: "a cleaned table",
        })?;

        let api_key = read_env_key(&ctx.settings.env_file, API_KEY_VAR)?;
        let upload = CsvUpload {
            table_name: ctx.settings.table.name.clone(),
            description: ctx.settings.table.description.clone(),
            data: encode_csv(&table.df)?,
            is_private: ctx.settings.table.is_private,
            rows: table.report.rows_after,
        };

        let receipt = self.uploader.upload(&api_key, &upload).await?;
        info!(
            table = receipt.table_name.as_deref().unwrap_or(&upload.table_name),
            content_hash = %receipt.content_hash,
            rows = receipt.rows,
            "table uploaded"
        );
        ctx.receipt = Some(receipt);
        Ok(())
    }
}

/// Writes the CSV to a local file instead of uploading it.
pub struct ExportStep {
    output: PathBuf,
}

impl ExportStep {
    pub fn new(output: PathBuf) -> Self {
        Self { output }
    }
}

#[async_trait]
impl JobStep for ExportStep {
    fn name(&self) -> &'static str {
        "export"
    }

    async fn run(&self, ctx: &mut JobContext) -> Result<()> {
        let table = ctx.table.as_ref().ok_or(JobError::MissingInput {
            step: "export",
            input: "a cleaned table",
        })?;

        let csv = encode_csv(&table.df)?;
        tokio::fs::write(&self.output, csv.as_bytes()).await?;
        info!(
            path = %self.output.display(),
            rows = table.report.rows_after,
            bytes = csv.len(),
            "CSV written"
        );
        ctx.export_path = Some(self.output.clone());
        Ok(())
    }
}
