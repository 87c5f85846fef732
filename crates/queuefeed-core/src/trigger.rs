use std::fmt;

use chrono::{DateTime, Duration, NaiveTime, Utc};
use serde::Serialize;
use thiserror::Error;

/// What caused a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Trigger {
    Schedule,
    Manual,
    Push { branch: String },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TriggerError {
    #[error("unknown trigger {0:?}; expected schedule, manual or push")]
    UnknownKind(String),

    #[error("push trigger requires a branch name")]
    MissingBranch,

    #[error("CI event {0:?} does not map to a trigger")]
    UnsupportedEvent(String),
}

impl Trigger {
    pub fn parse(kind: &str, branch: Option<&str>) -> Result<Self, TriggerError> {
        match kind.trim().to_ascii_lowercase().as_str() {
            "schedule" => Ok(Trigger::Schedule),
            "manual" => Ok(Trigger::Manual),
            "push" => {
                let branch = branch
                    .map(branch_name)
                    .filter(|name| !name.is_empty())
                    .ok_or(TriggerError::MissingBranch)?;
                Ok(Trigger::Push {
                    branch: branch.to_string(),
                })
            }
            other => Err(TriggerError::UnknownKind(other.to_string())),
        }
    }

    /// Reads the trigger from GitHub Actions variables. Without
    /// `GITHUB_EVENT_NAME` the run is treated as a manual invocation.
    pub fn from_ci_env<F>(lookup: F) -> Result<Self, TriggerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let Some(event) = lookup("GITHUB_EVENT_NAME").filter(|e| !e.is_empty()) else {
            return Ok(Trigger::Manual);
        };

        match event.as_str() {
            "schedule" => Ok(Trigger::Schedule),
            "workflow_dispatch" => Ok(Trigger::Manual),
            "push" => {
                let branch = lookup("GITHUB_REF_NAME")
                    .filter(|b| !b.is_empty())
                    .or_else(|| lookup("GITHUB_REF"));
                Trigger::parse("push", branch.as_deref())
            }
            _ => Err(TriggerError::UnsupportedEvent(event)),
        }
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trigger::Schedule => f.write_str("schedule"),
            Trigger::Manual => f.write_str("manual"),
            Trigger::Push { branch } => write!(f, "push:{branch}"),
        }
    }
}

fn branch_name(reference: &str) -> &str {
    let reference = reference.trim();
    reference.strip_prefix("refs/heads/").unwrap_or(reference)
}

/// Which triggers run the job, and when the daily run fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerPolicy {
    pub daily_at: NaiveTime,
    pub main_branch: String,
}

impl TriggerPolicy {
    pub fn admits(&self, trigger: &Trigger) -> bool {
        match trigger {
            Trigger::Schedule | Trigger::Manual => true,
            Trigger::Push { branch } => *branch == self.main_branch,
        }
    }

    /// Next daily run strictly after `now`.
    pub fn next_scheduled_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let today = now.date_naive().and_time(self.daily_at).and_utc();
        if today > now {
            today
        } else {
            today + Duration::days(1)
        }
    }
}
