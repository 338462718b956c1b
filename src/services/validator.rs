//! Pure transfer validation. The decision is a function of the two accounts,
//! the amount, and today's date; the lazy daily-limit reset is computed here
//! and persisted by the executor under the same atomic boundary as the debit.

use bigdecimal::BigDecimal;
use chrono::NaiveDate;

use crate::domain::Account;
use crate::error::RejectReason;

/// Gate a transfer. Checks run in a fixed order and the first failure wins;
/// a self-transfer of a non-positive amount reports `InvalidAmount`.
/// On success, returns the sender's allowance after the once-per-day reset.
pub fn validate(
    sender: &Account,
    receiver: &Account,
    amount: &BigDecimal,
    today: NaiveDate,
) -> Result<BigDecimal, RejectReason> {
    if *amount <= BigDecimal::from(0) {
        return Err(RejectReason::InvalidAmount);
    }

    if sender.account_number == receiver.account_number {
        return Err(RejectReason::SelfTransfer);
    }

    if sender.balance < *amount {
        return Err(RejectReason::InsufficientFunds);
    }

    let (remaining, _) = sender.rolled_allowance(today);
    if *amount > remaining {
        return Err(RejectReason::DailyLimitExceeded { remaining });
    }

    Ok(remaining)
}
