//! In-memory store. One mutex over the whole state makes every operation,
//! including the transfer commit, a single atomic unit; the same conditional
//! semantics as the Postgres adapter, without the database.

use std::collections::HashMap;

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::domain::{standing_daily_limit, Account, JobState, LedgerEntry, TransferJob};
use crate::ports::{
    AccountStore, JobStore, NewAccount, SenderCommit, StoreError, StoreResult,
};

#[derive(Default)]
struct Inner {
    accounts: HashMap<i64, Account>,
    entries: Vec<LedgerEntry>,
    jobs: HashMap<Uuid, TransferJob>,
    next_account_id: i64,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn insert_account(
        &self,
        new: NewAccount,
        opened_at: DateTime<Utc>,
    ) -> StoreResult<Account> {
        let mut inner = self.inner.lock().await;
        if inner
            .accounts
            .values()
            .any(|a| a.account_number == new.account_number || a.holder == new.holder)
        {
            return Err(StoreError::Conflict);
        }

        inner.next_account_id += 1;
        let account = Account {
            id: inner.next_account_id,
            holder: new.holder,
            account_number: new.account_number,
            balance: new.initial_deposit,
            daily_remaining: standing_daily_limit(),
            last_reset_date: opened_at.date_naive(),
            created_at: opened_at,
        };
        inner.accounts.insert(account.id, account.clone());
        Ok(account)
    }

    async fn account_by_id(&self, id: i64) -> StoreResult<Option<Account>> {
        let inner = self.inner.lock().await;
        Ok(inner.accounts.get(&id).cloned())
    }

    async fn account_by_number(&self, number: i64) -> StoreResult<Option<Account>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .accounts
            .values()
            .find(|a| a.account_number == number)
            .cloned())
    }

    async fn list_accounts(&self) -> StoreResult<Vec<Account>> {
        let inner = self.inner.lock().await;
        let mut accounts: Vec<Account> = inner.accounts.values().cloned().collect();
        accounts.sort_by_key(|a| a.id);
        Ok(accounts)
    }

    async fn commit_transfer(
        &self,
        sender: SenderCommit,
        receiver_id: i64,
        amount: BigDecimal,
        debit: LedgerEntry,
        credit: LedgerEntry,
    ) -> StoreResult<(Account, Account)> {
        let mut inner = self.inner.lock().await;

        // Compare-and-commit: the sender must still be in the state the
        // executor validated against.
        {
            let stored = inner
                .accounts
                .get(&sender.id)
                .ok_or(StoreError::Conflict)?;
            if stored.balance != sender.expected.balance
                || stored.daily_remaining != sender.expected.daily_remaining
                || stored.last_reset_date != sender.expected.last_reset_date
            {
                return Err(StoreError::Conflict);
            }
            if !inner.accounts.contains_key(&receiver_id) {
                return Err(StoreError::Conflict);
            }
        }

        let sender_after = {
            let stored = inner
                .accounts
                .get_mut(&sender.id)
                .ok_or(StoreError::Conflict)?;
            stored.balance = sender.updated.balance;
            stored.daily_remaining = sender.updated.daily_remaining;
            stored.last_reset_date = sender.updated.last_reset_date;
            stored.clone()
        };

        let receiver_after = {
            let stored = inner
                .accounts
                .get_mut(&receiver_id)
                .ok_or(StoreError::Conflict)?;
            stored.balance = &stored.balance + &amount;
            stored.clone()
        };

        inner.entries.push(debit);
        inner.entries.push(credit);

        Ok((sender_after, receiver_after))
    }

    async fn entries_for_account(&self, account_id: i64) -> StoreResult<Vec<LedgerEntry>> {
        let inner = self.inner.lock().await;
        let mut entries: Vec<LedgerEntry> = inner
            .entries
            .iter()
            .filter(|e| e.account_id == account_id)
            .cloned()
            .collect();
        entries.reverse(); // insertion order is commit order; newest first
        Ok(entries)
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn insert_job(&self, job: &TransferJob) -> StoreResult<()> {
        let mut inner = self.inner.lock().await;
        if inner.jobs.contains_key(&job.id) {
            return Err(StoreError::Conflict);
        }
        inner.jobs.insert(job.id, job.clone());
        Ok(())
    }

    async fn job(&self, id: Uuid) -> StoreResult<Option<TransferJob>> {
        let inner = self.inner.lock().await;
        Ok(inner.jobs.get(&id).cloned())
    }

    async fn claim_due(&self, now: DateTime<Utc>, limit: i64) -> StoreResult<Vec<TransferJob>> {
        let mut inner = self.inner.lock().await;

        let mut due_ids: Vec<(DateTime<Utc>, Uuid)> = inner
            .jobs
            .values()
            .filter(|j| j.state == JobState::Pending && j.eta <= now)
            .map(|j| (j.eta, j.id))
            .collect();
        due_ids.sort();
        due_ids.truncate(limit.max(0) as usize);

        let mut claimed = Vec::with_capacity(due_ids.len());
        for (_, id) in due_ids {
            if let Some(job) = inner.jobs.get_mut(&id) {
                job.state = JobState::Running;
                claimed.push(job.clone());
            }
        }
        Ok(claimed)
    }

    async fn push_back_for_retry(
        &self,
        id: Uuid,
        retry_count: i32,
        next_eta: DateTime<Utc>,
    ) -> StoreResult<()> {
        let mut inner = self.inner.lock().await;
        let job = inner.jobs.get_mut(&id).ok_or(StoreError::Conflict)?;
        if job.state != JobState::Running {
            return Err(StoreError::Conflict);
        }
        job.state = JobState::Pending;
        job.retry_count = retry_count;
        job.eta = next_eta;
        Ok(())
    }

    async fn finish(&self, id: Uuid, state: JobState) -> StoreResult<()> {
        if !state.is_terminal() {
            return Err(StoreError::Conflict);
        }
        let mut inner = self.inner.lock().await;
        let job = inner.jobs.get_mut(&id).ok_or(StoreError::Conflict)?;
        if job.state != JobState::Running {
            return Err(StoreError::Conflict);
        }
        job.state = state;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn new_account(holder: &str, number: i64, deposit: i64) -> NewAccount {
        NewAccount {
            holder: holder.to_string(),
            account_number: number,
            initial_deposit: BigDecimal::from(deposit),
        }
    }

    #[tokio::test]
    async fn account_numbers_are_unique() {
        let store = MemoryStore::new();
        let now = Utc::now();
        store
            .insert_account(new_account("user1", 1_000_000_001, 5000), now)
            .await
            .unwrap();
        let err = store
            .insert_account(new_account("user2", 1_000_000_001, 3000), now)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict));
    }

    #[tokio::test]
    async fn holders_are_unique() {
        let store = MemoryStore::new();
        let now = Utc::now();
        store
            .insert_account(new_account("user1", 1_000_000_001, 5000), now)
            .await
            .unwrap();
        let err = store
            .insert_account(new_account("user1", 1_000_000_002, 3000), now)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict));
    }

    #[tokio::test]
    async fn claim_due_skips_future_and_non_pending_jobs() {
        let store = MemoryStore::new();
        let now = Utc::now();

        let due = TransferJob::new(1, 1_000_000_002, BigDecimal::from(100), now, now);
        let future = TransferJob::new(
            1,
            1_000_000_002,
            BigDecimal::from(100),
            now + Duration::hours(1),
            now,
        );
        store.insert_job(&due).await.unwrap();
        store.insert_job(&future).await.unwrap();

        let claimed = store.claim_due(now, 10).await.unwrap();
        assert_eq!(claimed.len(), 1);
        assert_eq!(claimed[0].id, due.id);
        assert_eq!(claimed[0].state, JobState::Running);

        // Already claimed; a second poll finds nothing.
        assert!(store.claim_due(now, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn terminal_states_cannot_be_left() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let job = TransferJob::new(1, 1_000_000_002, BigDecimal::from(100), now, now);
        store.insert_job(&job).await.unwrap();
        store.claim_due(now, 10).await.unwrap();

        store
            .finish(
                job.id,
                JobState::Failed {
                    reason: "storage unavailable".to_string(),
                },
            )
            .await
            .unwrap();

        let err = store
            .push_back_for_retry(job.id, 1, now + Duration::seconds(60))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict));

        let err = store
            .finish(
                job.id,
                JobState::Failed {
                    reason: "again".to_string(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict));
    }

    #[tokio::test]
    async fn finish_rejects_non_terminal_states() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let job = TransferJob::new(1, 1_000_000_002, BigDecimal::from(100), now, now);
        store.insert_job(&job).await.unwrap();
        store.claim_due(now, 10).await.unwrap();

        let err = store.finish(job.id, JobState::Pending).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict));
    }
}
