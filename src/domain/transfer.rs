//! Success summary returned by the transfer executor.

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartyBalance {
    pub holder: String,
    pub account_number: i64,
    pub balance: BigDecimal,
    /// Present only on the sender side; credits carry no allowance.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub daily_remaining: Option<BigDecimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferOutcome {
    pub amount: BigDecimal,
    pub sender: PartyBalance,
    pub receiver: PartyBalance,
}
