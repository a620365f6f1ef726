//! Analysis job record and its lifecycle state machine.
//!
//! A job is created `pending` and moves exactly once to `completed` or
//! `failed`. Both stores route every mutation through
//! [`AnalysisJob::apply`], so the transition rules and the
//! `result`/`errorMessage` invariants live in one place.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::analysis::AnalysisInput;
use crate::error::CoreError;
use crate::report::AnalysisResult;
use crate::types::{new_job_id, JobId, Timestamp};

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Lifecycle status of an analysis job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Accepted and waiting on (or being processed by) the runner.
    Pending,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Statuses reachable from `self`. Terminal statuses have none.
    pub fn valid_transitions(self) -> &'static [JobStatus] {
        match self {
            JobStatus::Pending => &[JobStatus::Completed, JobStatus::Failed],
            JobStatus::Completed | JobStatus::Failed => &[],
        }
    }

    pub fn can_transition(self, to: JobStatus) -> bool {
        self.valid_transitions().contains(&to)
    }
}

impl FromStr for JobStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            other => Err(CoreError::Internal(format!("Invalid job status: {other}"))),
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Job record
// ---------------------------------------------------------------------------

/// One submitted analysis request and its lifecycle record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisJob {
    pub id: JobId,
    pub input: AnalysisInput,
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<AnalysisResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<Timestamp>,
}

/// Partial fields merged into an existing job by a store update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobUpdate {
    pub status: Option<JobStatus>,
    pub result: Option<AnalysisResult>,
    pub error_message: Option<String>,
}

impl JobUpdate {
    pub fn completed(result: AnalysisResult) -> Self {
        Self {
            status: Some(JobStatus::Completed),
            result: Some(result),
            error_message: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: Some(JobStatus::Failed),
            result: None,
            error_message: Some(message.into()),
        }
    }
}

impl AnalysisJob {
    /// Create a new `pending` job for a validated input.
    pub fn new(input: AnalysisInput, now: Timestamp) -> Self {
        Self {
            id: new_job_id(),
            input,
            status: JobStatus::Pending,
            result: None,
            error_message: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Merge `update` into this job.
    ///
    /// Terminal jobs reject every update. The merged record must satisfy
    /// [`AnalysisJob::check_invariants`]; on error `self` is left untouched.
    pub fn apply(&mut self, update: JobUpdate, now: Timestamp) -> Result<(), CoreError> {
        if self.is_terminal() {
            return Err(CoreError::Conflict(format!(
                "Job {} is already {} and cannot be modified",
                self.id, self.status
            )));
        }

        let next_status = update.status.unwrap_or(self.status);
        if next_status != self.status && !self.status.can_transition(next_status) {
            return Err(CoreError::Conflict(format!(
                "Invalid transition: {} -> {}",
                self.status, next_status
            )));
        }

        let mut next = self.clone();
        next.status = next_status;
        if update.result.is_some() {
            next.result = update.result;
        }
        if update.error_message.is_some() {
            next.error_message = update.error_message;
        }
        next.updated_at = now;
        if next_status.is_terminal() {
            next.completed_at = Some(now);
        }

        next.check_invariants()?;
        *self = next;
        Ok(())
    }

    /// `result` is present iff completed; a non-empty `errorMessage` is
    /// present iff failed.
    pub fn check_invariants(&self) -> Result<(), CoreError> {
        let completed = self.status == JobStatus::Completed;
        let failed = self.status == JobStatus::Failed;

        if self.result.is_some() != completed {
            return Err(CoreError::Validation(format!(
                "result must be set if and only if the job is completed (status: {})",
                self.status
            )));
        }

        match &self.error_message {
            Some(msg) if !failed => Err(CoreError::Validation(format!(
                "errorMessage set on a {} job: {msg}",
                self.status
            ))),
            Some(msg) if msg.trim().is_empty() => Err(CoreError::Validation(
                "errorMessage must not be empty".to_string(),
            )),
            None if failed => Err(CoreError::Validation(
                "failed job requires an errorMessage".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
