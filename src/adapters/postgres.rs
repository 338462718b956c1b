//! Postgres implementation of the storage ports. Row types stay private to
//! the adapter; the transfer commit is one database transaction with a
//! conditional sender update, so a stale snapshot rolls back as a conflict.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{
    standing_daily_limit, Account, EntryKind, JobState, LedgerEntry, TransferJob, TransferOutcome,
};
use crate::ports::{
    AccountStore, JobStore, NewAccount, SenderCommit, StoreError, StoreResult,
};

#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn map_insert_err(e: sqlx::Error) -> StoreError {
    if matches!(&e, sqlx::Error::Database(db) if db.is_unique_violation()) {
        StoreError::Conflict
    } else {
        StoreError::Sqlx(e)
    }
}

#[async_trait]
impl AccountStore for PostgresStore {
    async fn insert_account(
        &self,
        new: NewAccount,
        opened_at: DateTime<Utc>,
    ) -> StoreResult<Account> {
        let row = sqlx::query_as::<_, AccountRow>(
            r#"
            INSERT INTO accounts (
                holder, account_number, balance, daily_remaining, last_reset_date, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(&new.holder)
        .bind(new.account_number)
        .bind(&new.initial_deposit)
        .bind(standing_daily_limit())
        .bind(opened_at.date_naive())
        .bind(opened_at)
        .fetch_one(&self.pool)
        .await
        .map_err(map_insert_err)?;

        Ok(row.into_domain())
    }

    async fn account_by_id(&self, id: i64) -> StoreResult<Option<Account>> {
        let row = sqlx::query_as::<_, AccountRow>("SELECT * FROM accounts WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(AccountRow::into_domain))
    }

    async fn account_by_number(&self, number: i64) -> StoreResult<Option<Account>> {
        let row =
            sqlx::query_as::<_, AccountRow>("SELECT * FROM accounts WHERE account_number = $1")
                .bind(number)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(AccountRow::into_domain))
    }

    async fn list_accounts(&self) -> StoreResult<Vec<Account>> {
        let rows = sqlx::query_as::<_, AccountRow>("SELECT * FROM accounts ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(AccountRow::into_domain).collect())
    }

    async fn commit_transfer(
        &self,
        sender: SenderCommit,
        receiver_id: i64,
        amount: BigDecimal,
        debit: LedgerEntry,
        credit: LedgerEntry,
    ) -> StoreResult<(Account, Account)> {
        let mut tx = self.pool.begin().await?;

        // Conditional debit: zero rows means another commit got there first.
        let sender_row = sqlx::query_as::<_, AccountRow>(
            r#"
            UPDATE accounts
            SET balance = $1, daily_remaining = $2, last_reset_date = $3
            WHERE id = $4
              AND balance = $5
              AND daily_remaining = $6
              AND last_reset_date = $7
            RETURNING *
            "#,
        )
        .bind(&sender.updated.balance)
        .bind(&sender.updated.daily_remaining)
        .bind(sender.updated.last_reset_date)
        .bind(sender.id)
        .bind(&sender.expected.balance)
        .bind(&sender.expected.daily_remaining)
        .bind(sender.expected.last_reset_date)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(sender_row) = sender_row else {
            tx.rollback().await?;
            return Err(StoreError::Conflict);
        };

        // Credit side carries no limit check; a plain increment suffices.
        let receiver_row = sqlx::query_as::<_, AccountRow>(
            "UPDATE accounts SET balance = balance + $1 WHERE id = $2 RETURNING *",
        )
        .bind(&amount)
        .bind(receiver_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(receiver_row) = receiver_row else {
            tx.rollback().await?;
            return Err(StoreError::Conflict);
        };

        for entry in [&debit, &credit] {
            sqlx::query(
                r#"
                INSERT INTO ledger_entries (id, account_id, account_number, amount, kind, created_at)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(entry.id)
            .bind(entry.account_id)
            .bind(entry.account_number)
            .bind(&entry.amount)
            .bind(entry.kind.as_str())
            .bind(entry.created_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok((sender_row.into_domain(), receiver_row.into_domain()))
    }

    async fn entries_for_account(&self, account_id: i64) -> StoreResult<Vec<LedgerEntry>> {
        let rows = sqlx::query_as::<_, LedgerEntryRow>(
            "SELECT * FROM ledger_entries WHERE account_id = $1 ORDER BY created_at DESC, id DESC",
        )
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(LedgerEntryRow::into_domain).collect()
    }
}

#[async_trait]
impl JobStore for PostgresStore {
    async fn insert_job(&self, job: &TransferJob) -> StoreResult<()> {
        let (state, result, error) = encode_state(&job.state)?;
        sqlx::query(
            r#"
            INSERT INTO transfer_jobs (
                id, sender_id, receiver_account, amount, eta, state, retry_count, result, error, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(job.id)
        .bind(job.sender_id)
        .bind(job.receiver_account)
        .bind(&job.amount)
        .bind(job.eta)
        .bind(state)
        .bind(job.retry_count)
        .bind(result)
        .bind(error)
        .bind(job.created_at)
        .execute(&self.pool)
        .await
        .map_err(map_insert_err)?;

        Ok(())
    }

    async fn job(&self, id: Uuid) -> StoreResult<Option<TransferJob>> {
        let row = sqlx::query_as::<_, JobRow>("SELECT * FROM transfer_jobs WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(JobRow::into_domain).transpose()
    }

    async fn claim_due(&self, now: DateTime<Utc>, limit: i64) -> StoreResult<Vec<TransferJob>> {
        // SKIP LOCKED keeps concurrent workers from blocking on, or
        // double-claiming, the same rows.
        let rows = sqlx::query_as::<_, JobRow>(
            r#"
            UPDATE transfer_jobs SET state = 'running'
            WHERE id IN (
                SELECT id FROM transfer_jobs
                WHERE state = 'pending' AND eta <= $1
                ORDER BY eta
                LIMIT $2
                FOR UPDATE SKIP LOCKED
            )
            RETURNING *
            "#,
        )
        .bind(now)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(JobRow::into_domain).collect()
    }

    async fn push_back_for_retry(
        &self,
        id: Uuid,
        retry_count: i32,
        next_eta: DateTime<Utc>,
    ) -> StoreResult<()> {
        let updated = sqlx::query(
            r#"
            UPDATE transfer_jobs
            SET state = 'pending', retry_count = $1, eta = $2
            WHERE id = $3 AND state = 'running'
            "#,
        )
        .bind(retry_count)
        .bind(next_eta)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(StoreError::Conflict);
        }
        Ok(())
    }

    async fn finish(&self, id: Uuid, state: JobState) -> StoreResult<()> {
        if !state.is_terminal() {
            return Err(StoreError::Conflict);
        }
        let (state, result, error) = encode_state(&state)?;

        let updated = sqlx::query(
            r#"
            UPDATE transfer_jobs
            SET state = $1, result = $2, error = $3
            WHERE id = $4 AND state = 'running'
            "#,
        )
        .bind(state)
        .bind(result)
        .bind(error)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(StoreError::Conflict);
        }
        Ok(())
    }
}

fn encode_state(
    state: &JobState,
) -> StoreResult<(&'static str, Option<serde_json::Value>, Option<String>)> {
    Ok(match state {
        JobState::Pending => ("pending", None, None),
        JobState::Running => ("running", None, None),
        JobState::Succeeded(outcome) => {
            let payload = serde_json::to_value(outcome)
                .map_err(|e| StoreError::Unavailable(format!("unencodable job result: {e}")))?;
            ("succeeded", Some(payload), None)
        }
        JobState::Failed { reason } => ("failed", None, Some(reason.clone())),
    })
}

/// Internal row types for SQLx. Not exposed outside the adapter.
#[derive(Debug, sqlx::FromRow)]
struct AccountRow {
    id: i64,
    holder: String,
    account_number: i64,
    balance: BigDecimal,
    daily_remaining: BigDecimal,
    last_reset_date: NaiveDate,
    created_at: DateTime<Utc>,
}

impl AccountRow {
    fn into_domain(self) -> Account {
        Account {
            id: self.id,
            holder: self.holder,
            account_number: self.account_number,
            balance: self.balance,
            daily_remaining: self.daily_remaining,
            last_reset_date: self.last_reset_date,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct LedgerEntryRow {
    id: Uuid,
    account_id: i64,
    account_number: i64,
    amount: BigDecimal,
    kind: String,
    created_at: DateTime<Utc>,
}

impl LedgerEntryRow {
    fn into_domain(self) -> StoreResult<LedgerEntry> {
        let kind = EntryKind::parse(&self.kind)
            .ok_or_else(|| StoreError::Unavailable(format!("unknown entry kind: {}", self.kind)))?;
        Ok(LedgerEntry {
            id: self.id,
            account_id: self.account_id,
            account_number: self.account_number,
            amount: self.amount,
            kind,
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct JobRow {
    id: Uuid,
    sender_id: i64,
    receiver_account: i64,
    amount: BigDecimal,
    eta: DateTime<Utc>,
    state: String,
    retry_count: i32,
    result: Option<serde_json::Value>,
    error: Option<String>,
    created_at: DateTime<Utc>,
}

impl JobRow {
    fn into_domain(self) -> StoreResult<TransferJob> {
        let state = match self.state.as_str() {
            "pending" => JobState::Pending,
            "running" => JobState::Running,
            "succeeded" => {
                let payload = self.result.ok_or_else(|| {
                    StoreError::Unavailable(format!("job {} has no result payload", self.id))
                })?;
                let outcome: TransferOutcome = serde_json::from_value(payload)
                    .map_err(|e| StoreError::Unavailable(format!("corrupt job result: {e}")))?;
                JobState::Succeeded(outcome)
            }
            "failed" => JobState::Failed {
                reason: self.error.unwrap_or_else(|| "unknown failure".to_string()),
            },
            other => {
                return Err(StoreError::Unavailable(format!(
                    "unknown job state: {other}"
                )))
            }
        };

        Ok(TransferJob {
            id: self.id,
            sender_id: self.sender_id,
            receiver_account: self.receiver_account,
            amount: self.amount,
            eta: self.eta,
            state,
            retry_count: self.retry_count,
            created_at: self.created_at,
        })
    }
}
