pub mod adapters;
pub mod cli;
pub mod clock;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod ports;
pub mod services;

pub use error::{RejectReason, TransferError};
pub use services::{Scheduler, TransferService};
