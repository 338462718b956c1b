pub mod account;
pub mod job;
pub mod ledger;
pub mod transfer;

pub use account::{standing_daily_limit, Account};
pub use job::{JobState, JobStatus, TransferJob};
pub use ledger::{EntryKind, LedgerEntry};
pub use transfer::{PartyBalance, TransferOutcome};
