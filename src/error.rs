use bigdecimal::BigDecimal;
use thiserror::Error;

use crate::ports::StoreError;

/// Validation rejections, in the order they are checked. Deterministic facts
/// about current state; never retried.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RejectReason {
    #[error("invalid transfer amount")]
    InvalidAmount,

    #[error("cannot transfer to the same account")]
    SelfTransfer,

    #[error("insufficient funds")]
    InsufficientFunds,

    #[error("transfer exceeds daily limit of {remaining}")]
    DailyLimitExceeded { remaining: BigDecimal },
}

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("sender {0} not found")]
    SenderNotFound(i64),

    #[error("receiver account {0} not found")]
    ReceiverNotFound(i64),

    #[error("account {0} not found")]
    AccountNotFound(i64),

    #[error("transfer rejected: {0}")]
    Rejected(#[from] RejectReason),

    #[error("storage failure: {0}")]
    Storage(#[from] StoreError),

    #[error("scheduling error: {0}")]
    Scheduling(String),
}

impl TransferError {
    /// Whether the scheduler should retry. Only infrastructure failures
    /// qualify; rejections and missing accounts are terminal.
    pub fn is_transient(&self) -> bool {
        matches!(self, TransferError::Storage(_))
    }
}
