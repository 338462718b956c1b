//! Storage ports. Adapters implement these against Postgres or memory;
//! services depend only on the traits.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{Account, JobState, LedgerEntry, TransferJob};

#[derive(Debug, Error)]
pub enum StoreError {
    /// Optimistic commit lost the race, or an illegal state transition
    /// was attempted. Callers re-read and retry.
    #[error("conflicting concurrent update")]
    Conflict,

    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Clone)]
pub struct NewAccount {
    pub holder: String,
    pub account_number: i64,
    pub initial_deposit: BigDecimal,
}

/// The sender fields the executor's compare-and-commit is keyed on.
#[derive(Debug, Clone, PartialEq)]
pub struct BalanceState {
    pub balance: BigDecimal,
    pub daily_remaining: BigDecimal,
    pub last_reset_date: NaiveDate,
}

/// Conditional sender-side mutation: applied only if the stored state still
/// equals `expected`, otherwise the commit fails with [`StoreError::Conflict`].
#[derive(Debug, Clone)]
pub struct SenderCommit {
    pub id: i64,
    pub expected: BalanceState,
    pub updated: BalanceState,
}

#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn insert_account(
        &self,
        new: NewAccount,
        opened_at: DateTime<Utc>,
    ) -> StoreResult<Account>;

    async fn account_by_id(&self, id: i64) -> StoreResult<Option<Account>>;

    async fn account_by_number(&self, number: i64) -> StoreResult<Option<Account>>;

    async fn list_accounts(&self) -> StoreResult<Vec<Account>>;

    /// Atomic unit of a transfer: conditional sender debit, receiver credit
    /// (unconditional increment), and both ledger entries. Either everything
    /// commits or nothing does. Returns the accounts as committed.
    async fn commit_transfer(
        &self,
        sender: SenderCommit,
        receiver_id: i64,
        amount: BigDecimal,
        debit: LedgerEntry,
        credit: LedgerEntry,
    ) -> StoreResult<(Account, Account)>;

    /// Entries for one account, most recent first.
    async fn entries_for_account(&self, account_id: i64) -> StoreResult<Vec<LedgerEntry>>;
}

#[async_trait]
pub trait JobStore: Send + Sync {
    async fn insert_job(&self, job: &TransferJob) -> StoreResult<()>;

    async fn job(&self, id: Uuid) -> StoreResult<Option<TransferJob>>;

    /// Atomically flip due pending jobs (eta <= now) to running and return
    /// them. A job claimed here is never handed to a second worker.
    async fn claim_due(&self, now: DateTime<Utc>, limit: i64) -> StoreResult<Vec<TransferJob>>;

    /// Return a running job to pending with a new eta after a transient
    /// failure. Fails with `Conflict` unless the job is currently running.
    async fn push_back_for_retry(
        &self,
        id: Uuid,
        retry_count: i32,
        next_eta: DateTime<Utc>,
    ) -> StoreResult<()>;

    /// Move a running job to a terminal state. Fails with `Conflict` unless
    /// the job is currently running; terminal states are never left.
    async fn finish(&self, id: Uuid, state: JobState) -> StoreResult<()>;
}
