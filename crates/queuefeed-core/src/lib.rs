// crates/queuefeed-core/src/lib.rs

pub mod config;
pub mod dune;
pub mod error;
pub mod http;
pub mod job;
pub mod secret;
pub mod source;
pub mod steps;
pub mod trigger;

pub use config::Settings;
pub use error::{JobError, Result};
pub use job::{Job, JobContext, JobOutcome, JobReport, JobStep, StepRecord, StepStatus};
pub use trigger::{Trigger, TriggerPolicy};
