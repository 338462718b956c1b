//! Account domain entity.
//! Holds the balance and the per-day spending allowance for one holder.

use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Standing ceiling on cumulative outbound transfers within one calendar day.
pub fn standing_daily_limit() -> BigDecimal {
    BigDecimal::from(2000)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,
    pub holder: String,
    /// External routing identifier, distinct from the internal id.
    pub account_number: i64,
    pub balance: BigDecimal,
    /// Spend still permitted today. Only meaningful together with
    /// `last_reset_date`; use [`Account::rolled_allowance`] to read it.
    pub daily_remaining: BigDecimal,
    pub last_reset_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// The allowance as of `today`, applying the lazy once-per-day reset.
    /// Returns the effective remaining amount and the reset date to persist.
    pub fn rolled_allowance(&self, today: NaiveDate) -> (BigDecimal, NaiveDate) {
        if self.last_reset_date != today {
            (standing_daily_limit(), today)
        } else {
            (self.daily_remaining.clone(), self.last_reset_date)
        }
    }
}
