//! Transfer executor: validate, then commit the balance mutation and the
//! ledger pair as one atomic unit. Both the immediate path and scheduled
//! dispatch go through here.

use std::sync::Arc;

use bigdecimal::BigDecimal;
use tracing::{debug, info};

use crate::clock::Clock;
use crate::domain::{LedgerEntry, PartyBalance, TransferOutcome};
use crate::error::TransferError;
use crate::ports::{AccountStore, BalanceState, SenderCommit, StoreError};
use crate::services::validator;

/// Re-reads after losing the optimistic commit race. Contention beyond this
/// is surfaced as a storage failure, which the scheduler treats as transient.
const COMMIT_RETRIES: u32 = 5;

#[derive(Clone)]
pub struct TransferService {
    accounts: Arc<dyn AccountStore>,
    clock: Arc<dyn Clock>,
}

impl TransferService {
    pub fn new(accounts: Arc<dyn AccountStore>, clock: Arc<dyn Clock>) -> Self {
        Self { accounts, clock }
    }

    /// Execute a transfer now. The sender-side debit (including the lazy
    /// daily-limit reset) is compare-and-committed against the state read
    /// here; a lost race re-reads and re-validates against fresh state.
    pub async fn transfer_immediate(
        &self,
        sender_id: i64,
        receiver_account: i64,
        amount: BigDecimal,
    ) -> Result<TransferOutcome, TransferError> {
        for _ in 0..COMMIT_RETRIES {
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

            let today = self.clock.today();
            let remaining = validator::validate(&sender, &receiver, &amount, today)?;

            let now = self.clock.now();
            let debit = LedgerEntry::debit(&sender, &amount, now);
            let credit = LedgerEntry::credit(&receiver, &amount, now);

            let commit = SenderCommit {
                id: sender.id,
                expected: BalanceState {
                    balance: sender.balance.clone(),
                    daily_remaining: sender.daily_remaining.clone(),
                    last_reset_date: sender.last_reset_date,
                },
                updated: BalanceState {
                    balance: &sender.balance - &amount,
                    daily_remaining: &remaining - &amount,
                    last_reset_date: today,
                },
            };

            match self
                .accounts
                .commit_transfer(commit, receiver.id, amount.clone(), debit, credit)
                .await
            {
                Ok((sender, receiver)) => {
                    info!(
                        sender_id,
                        receiver_account,
                        %amount,
                        "transfer committed"
                    );
                    return Ok(TransferOutcome {
                        amount,
                        sender: PartyBalance {
                            holder: sender.holder,
                            account_number: sender.account_number,
                            balance: sender.balance,
                            daily_remaining: Some(sender.daily_remaining),
                        },
                        receiver: PartyBalance {
                            holder: receiver.holder,
                            account_number: receiver.account_number,
                            balance: receiver.balance,
                            daily_remaining: None,
                        },
                    });
                }
                Err(StoreError::Conflict) => {
                    debug!(sender_id, "commit lost the race, re-reading");
                    continue;
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(StoreError::Conflict.into())
    }

    /// Ledger entries for one account, most recent first.
    pub async fn transactions_for_account(
        &self,
        account_id: i64,
    ) -> Result<Vec<LedgerEntry>, TransferError> {
        self.accounts
            .account_by_id(account_id)
            .await?
            .ok_or(TransferError::AccountNotFound(account_id))?;

        Ok(self.accounts.entries_for_account(account_id).await?)
    }
}
