// Escrow trade domain: records, persistence, trade creation
pub mod intake;
pub mod models;
pub mod repository;

pub use intake::TradeIntake;
pub use models::{EscrowTrade, TradeStatus};
pub use repository::TradeRepository;
