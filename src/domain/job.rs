//! Scheduled transfer job: a deferred intent tracked through
//! pending -> running -> {succeeded, failed}. Terminal states are final.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::domain::TransferOutcome;

/// Shown to callers while the job waits for its eta.
pub const PENDING_STAGE_MESSAGE: &str = "transfer is scheduled and waiting to be executed";

#[derive(Debug, Clone, PartialEq)]
pub enum JobState {
    Pending,
    Running,
    Succeeded(TransferOutcome),
    Failed { reason: String },
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Pending => "pending",
            JobState::Running => "running",
            JobState::Succeeded(_) => "succeeded",
            JobState::Failed { .. } => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Succeeded(_) | JobState::Failed { .. })
    }
}

#[derive(Debug, Clone)]
pub struct TransferJob {
    pub id: Uuid,
    pub sender_id: i64,
    pub receiver_account: i64,
    pub amount: BigDecimal,
    /// Earliest moment the job is eligible for dispatch.
    pub eta: DateTime<Utc>,
    pub state: JobState,
    /// Execution attempts already retried; capped by the scheduler.
    pub retry_count: i32,
    pub created_at: DateTime<Utc>,
}

impl TransferJob {
    pub fn new(
        sender_id: i64,
        receiver_account: i64,
        amount: BigDecimal,
        eta: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender_id,
            receiver_account,
            amount,
            eta,
            state: JobState::Pending,
            retry_count: 0,
            created_at: now,
        }
    }

    pub fn status(&self) -> JobStatus {
        match &self.state {
            JobState::Pending => JobStatus::Pending {
                message: PENDING_STAGE_MESSAGE.to_string(),
                eta: self.eta,
            },
            JobState::Running => JobStatus::Running {
                retry_count: self.retry_count,
            },
            JobState::Succeeded(result) => JobStatus::Succeeded {
                result: result.clone(),
                retry_count: self.retry_count,
            },
            JobState::Failed { reason } => JobStatus::Failed {
                reason: reason.clone(),
                retry_count: self.retry_count,
            },
        }
    }
}

/// Caller-facing view of a job. `NotFound` is a distinct outcome, never
/// collapsed into `Failed`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobStatus {
    NotFound,
    Pending {
        message: String,
        eta: DateTime<Utc>,
    },
    Running {
        retry_count: i32,
    },
    Succeeded {
        result: TransferOutcome,
        retry_count: i32,
    },
    Failed {
        reason: String,
        retry_count: i32,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> TransferJob {
        TransferJob::new(
            1,
            1_000_000_002,
            BigDecimal::from(500),
            Utc::now(),
            Utc::now(),
        )
    }

    #[test]
    fn new_job_starts_pending() {
        let job = job();
        assert_eq!(job.state, JobState::Pending);
        assert_eq!(job.retry_count, 0);
        assert!(!job.state.is_terminal());
    }

    #[test]
    fn pending_status_carries_stage_message() {
        let job = job();
        match job.status() {
            JobStatus::Pending { message, eta } => {
                assert_eq!(message, PENDING_STAGE_MESSAGE);
                assert_eq!(eta, job.eta);
            }
            other => panic!("unexpected status: {other:?}"),
        }
    }

    #[test]
    fn failed_status_carries_reason_and_retries() {
        let mut job = job();
        job.retry_count = 2;
        job.state = JobState::Failed {
            reason: "storage unavailable".to_string(),
        };
        assert!(job.state.is_terminal());
        assert_eq!(
            job.status(),
            JobStatus::Failed {
                reason: "storage unavailable".to_string(),
                retry_count: 2,
            }
        );
    }
}
