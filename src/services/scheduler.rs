//! Deferred transfers: a durable job queue polled by a worker loop.
//! Due jobs are claimed transitionally (pending -> running) and handed to the
//! executor; transient storage failures are retried with a fixed backoff.

use std::sync::Arc;

use bigdecimal::BigDecimal;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::domain::{JobState, JobStatus, TransferJob};
use crate::error::TransferError;
use crate::ports::{AccountStore, JobStore};
use crate::services::{validator, TransferService};

/// Execution attempts per job, the first one included.
pub const MAX_ATTEMPTS: i32 = 3;
/// Delay before a transiently failed job becomes due again.
pub const RETRY_BACKOFF_SECS: i64 = 60;

const CLAIM_BATCH: i64 = 10;

#[derive(Clone)]
pub struct Scheduler {
    accounts: Arc<dyn AccountStore>,
    jobs: Arc<dyn JobStore>,
    transfers: TransferService,
    clock: Arc<dyn Clock>,
}

impl Scheduler {
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        jobs: Arc<dyn JobStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let transfers = TransferService::new(accounts.clone(), clock.clone());
        Self {
            accounts,
            jobs,
            transfers,
            clock,
        }
    }

    /// Persist a transfer to run at `eta`. The request is validated against
    /// current account state before any job is created; a transfer that is
    /// valid now can still fail at execution time, and that later failure is
    /// recorded on the job rather than raised here.
    pub async fn schedule(
        &self,
        sender_id: i64,
        receiver_account: i64,
        amount: BigDecimal,
        eta: DateTime<Utc>,
    ) -> Result<Uuid, TransferError> {
        let sender = self
            .accounts
            .account_by_id(sender_id)
            .await?
            .ok_or(TransferError::SenderNotFound(sender_id))?;
        let receiver = self
            .accounts
            .account_by_number(receiver_account)
            .await?
            .ok_or(TransferError::ReceiverNotFound(receiver_account))?;

        validator::validate(&sender, &receiver, &amount, self.clock.today())?;

        let now = self.clock.now();
        if eta <= now {
            return Err(TransferError::Scheduling(format!(
                "scheduled time {eta} is not in the future"
            )));
        }

        let job = TransferJob::new(sender_id, receiver_account, amount, eta, now);
        self.jobs.insert_job(&job).await?;

        info!(job_id = %job.id, %eta, sender_id, receiver_account, "transfer scheduled");
        Ok(job.id)
    }

    /// The executor this scheduler dispatches through.
    pub fn transfers(&self) -> &TransferService {
        &self.transfers
    }

    /// Current state of a job. Unknown ids are reported as `NotFound`.
    pub async fn status(&self, job_id: Uuid) -> Result<JobStatus, TransferError> {
        Ok(match self.jobs.job(job_id).await? {
            Some(job) => job.status(),
            None => JobStatus::NotFound,
        })
    }

    /// Claim and dispatch every job due as of the injected clock. Returns the
    /// number of jobs dispatched. The worker loop calls this; tests drive it
    /// directly for deterministic time control.
    pub async fn poll_once(&self) -> Result<usize, TransferError> {
        let due = self.jobs.claim_due(self.clock.now(), CLAIM_BATCH).await?;
        let count = due.len();
        if count > 0 {
            debug!("dispatching {count} due job(s)");
        }
        for job in due {
            self.dispatch(job).await;
        }
        Ok(count)
    }

    /// One execution attempt for a claimed (running) job. Every outcome is
    /// recorded on the job; nothing propagates to the scheduling caller.
    async fn dispatch(&self, job: TransferJob) {
        let result = self
            .transfers
            .transfer_immediate(job.sender_id, job.receiver_account, job.amount.clone())
            .await;

        match result {
            Ok(outcome) => {
                info!(job_id = %job.id, retry_count = job.retry_count, "scheduled transfer completed");
                if let Err(e) = self.jobs.finish(job.id, JobState::Succeeded(outcome)).await {
                    error!(job_id = %job.id, "failed to record job success: {e}");
                }
            }
            Err(e) if e.is_transient() && job.retry_count + 1 < MAX_ATTEMPTS => {
                let next_eta = self.clock.now() + ChronoDuration::seconds(RETRY_BACKOFF_SECS);
                warn!(
                    job_id = %job.id,
                    attempt = job.retry_count + 1,
                    %next_eta,
                    "transient failure, will retry: {e}"
                );
                if let Err(e) = self
                    .jobs
                    .push_back_for_retry(job.id, job.retry_count + 1, next_eta)
                    .await
                {
                    error!(job_id = %job.id, "failed to schedule retry: {e}");
                }
            }
            Err(e) => {
                warn!(job_id = %job.id, retry_count = job.retry_count, "scheduled transfer failed: {e}");
                if let Err(record_err) = self
                    .jobs
                    .finish(
                        job.id,
                        JobState::Failed {
                            reason: e.to_string(),
                        },
                    )
                    .await
                {
                    error!(job_id = %job.id, "failed to record job failure: {record_err}");
                }
            }
        }
    }

    /// Worker loop: poll for due jobs, dispatch, sleep, repeat.
    pub async fn run(self, poll_interval: Duration) {
        info!("scheduler worker started");
        loop {
            if let Err(e) = self.poll_once().await {
                error!("worker batch error: {e}");
            }
            sleep(poll_interval).await;
        }
    }
}
