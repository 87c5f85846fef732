// crates/queuefeed-core/src/error.rs

use queuefeed_parser::ParseError;
use thiserror::Error;

use crate::config::ConfigError;
use crate::dune::UploadError;
use crate::secret::SecretError;
use crate::source::SourceError;

#[derive(Error, Debug)]
pub enum JobError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Secret handling failed: {0}")]
    Secret(#[from] SecretError),

    #[error("Fetching records failed: {0}")]
    Source(#[from] SourceError),

    #[error("Data processing failed: {0}")]
    Parse(#[from] ParseError),

    #[error("Upload failed: {0}")]
    Upload(#[from] UploadError),

    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("step {step} needs {input}, which no earlier step produced")]
    MissingInput {
        step: &'static str,
        input: &'static str,
    },
}

pub type Result<T> = std::result::Result<T, JobError>;
