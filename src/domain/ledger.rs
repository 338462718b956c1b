//! Ledger entry domain entity.
//! Immutable fact of one signed balance change; always written in
//! debit/credit pairs whose amounts are additive inverses.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::Account;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Debit,
    Credit,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Debit => "debit",
            EntryKind::Credit => "credit",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "debit" => Some(EntryKind::Debit),
            "credit" => Some(EntryKind::Credit),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub account_id: i64,
    /// Denormalized for audit stability.
    pub account_number: i64,
    /// Signed: negative on the debit side, positive on the credit side.
    pub amount: BigDecimal,
    pub kind: EntryKind,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    pub fn debit(account: &Account, amount: &BigDecimal, at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            account_id: account.id,
            account_number: account.account_number,
            amount: -amount.clone(),
            kind: EntryKind::Debit,
            created_at: at,
        }
    }

    pub fn credit(account: &Account, amount: &BigDecimal, at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            account_id: account.id,
            account_number: account.account_number,
            amount: amount.clone(),
            kind: EntryKind::Credit,
            created_at: at,
        }
    }
}
