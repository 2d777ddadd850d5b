// Settlement state machine and its driver
pub mod processor;
pub mod scheduler;

pub use processor::SettlementProcessor;
pub use scheduler::SettlementScheduler;
