pub mod scheduler;
pub mod transfer;
pub mod validator;

pub use scheduler::Scheduler;
pub use transfer::TransferService;
