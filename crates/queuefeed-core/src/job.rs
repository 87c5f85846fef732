//! Linear job runner: steps execute in declared order and the first failure
//! stops the run.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use queuefeed_parser::{CleanReport, CleanedTable, Record};
use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::Settings;
use crate::dune::{TableUploader, UploadReceipt};
use crate::error::Result;
use crate::secret::SecretString;
use crate::source::RecordSource;
use crate::steps::{
    CleanStep, ExportStep, FetchStep, MaterializeSecretStep, ProvisionStep, UploadStep,
};
use crate::trigger::{Trigger, TriggerPolicy};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Succeeded,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, Serialize)]
pub struct StepRecord {
    pub name: &'static str,
    pub status: StepStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobOutcome {
    Succeeded,
    Failed,
    NotTriggered,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    pub run_id: Uuid,
    pub trigger: Trigger,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcome: JobOutcome,
    pub steps: Vec<StepRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clean: Option<CleanReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt: Option<UploadReceipt>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub export_path: Option<PathBuf>,
}

impl JobReport {
    pub fn is_failure(&self) -> bool {
        self.outcome == JobOutcome::Failed
    }

    pub fn step_names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|step| step.name).collect()
    }

    pub fn status_of(&self, name: &str) -> Option<StepStatus> {
        self.steps
            .iter()
            .find(|step| step.name == name)
            .map(|step| step.status)
    }
}

/// State handed from one step to the next.
#[derive(Debug)]
pub struct JobContext {
    pub settings: Settings,
    pub secret: Option<SecretString>,
    pub records: Option<Vec<Record>>,
    pub table: Option<CleanedTable>,
    pub receipt: Option<UploadReceipt>,
    pub export_path: Option<PathBuf>,
}

impl JobContext {
    pub fn new(settings: Settings, secret: Option<SecretString>) -> Self {
        Self {
            settings,
            secret,
            records: None,
            table: None,
            receipt: None,
            export_path: None,
        }
    }
}

#[async_trait]
pub trait JobStep: Send + Sync {
    fn name(&self) -> &'static str;
    async fn run(&self, ctx: &mut JobContext) -> Result<()>;
}

pub struct Job {
    policy: TriggerPolicy,
    steps: Vec<Box<dyn JobStep>>,
}

impl Job {
    pub fn new(policy: TriggerPolicy) -> Self {
        Self {
            policy,
            steps: Vec::new(),
        }
    }

    pub fn with_step(mut self, step: impl JobStep + 'static) -> Self {
        self.steps.push(Box::new(step));
        self
    }

    /// provision -> materialize-secret -> fetch -> clean -> upload
    pub fn upload(
        settings: &Settings,
        source: Arc<dyn RecordSource>,
        uploader: Arc<dyn TableUploader>,
    ) -> Self {
        Self::new(settings.trigger_policy())
            .with_step(ProvisionStep)
            .with_step(MaterializeSecretStep)
            .with_step(FetchStep::new(source))
            .with_step(CleanStep)
            .with_step(UploadStep::new(uploader))
    }

    /// provision -> fetch -> clean -> export, for runs that must not upload.
    pub fn export(settings: &Settings, source: Arc<dyn RecordSource>, output: PathBuf) -> Self {
        Self::new(settings.trigger_policy())
            .with_step(ProvisionStep)
            .with_step(FetchStep::new(source))
            .with_step(CleanStep)
            .with_step(ExportStep::new(output))
    }

    pub fn step_names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|step| step.name()).collect()
    }

    pub async fn run(&self, trigger: Trigger, mut ctx: JobContext) -> JobReport {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();

        if !self.policy.admits(&trigger) {
            info!(%run_id, %trigger, main_branch = %self.policy.main_branch, "trigger not admitted; nothing to run");
            return JobReport {
                run_id,
                trigger,
                started_at,
                finished_at: Utc::now(),
                outcome: JobOutcome::NotTriggered,
                steps: self.skipped_records(0),
                clean: None,
                receipt: None,
                export_path: None,
            };
        }

        info!(%run_id, %trigger, steps = self.steps.len(), "job started");

        let mut records = Vec::with_capacity(self.steps.len());
        let mut outcome = JobOutcome::Succeeded;

        for (index, step) in self.steps.iter().enumerate() {
            let name = step.name();
            let started = Instant::now();
            info!(%run_id, step = name, "step started");

            match step.run(&mut ctx).await {
                Ok(()) => {
                    let elapsed_ms = started.elapsed().as_millis() as u64;
                    info!(%run_id, step = name, elapsed_ms, "step succeeded");
                    records.push(StepRecord {
                        name,
                        status: StepStatus::Succeeded,
                        error: None,
                        elapsed_ms,
                    });
                }
                Err(err) => {
                    let elapsed_ms = started.elapsed().as_millis() as u64;
                    error!(%run_id, step = name, error = %err, "step failed");
                    records.push(StepRecord {
                        name,
                        status: StepStatus::Failed,
                        error: Some(err.to_string()),
                        elapsed_ms,
                    });
                    records.extend(self.skipped_records(index + 1));
                    outcome = JobOutcome::Failed;
                    break;
                }
            }
        }

        match outcome {
            JobOutcome::Failed => warn!(%run_id, "job failed"),
            _ => info!(%run_id, "job succeeded"),
        }

        JobReport {
            run_id,
            trigger,
            started_at,
            finished_at: Utc::now(),
            outcome,
            steps: records,
            clean: ctx.table.map(|table| table.report),
            receipt: ctx.receipt,
            export_path: ctx.export_path,
        }
    }

    fn skipped_records(&self, from: usize) -> Vec<StepRecord> {
        self.steps[from..]
            .iter()
            .map(|step| StepRecord {
                name: step.name(),
                status: StepStatus::Skipped,
                error: None,
                elapsed_ms: 0,
            })
            .collect()
    }
}
