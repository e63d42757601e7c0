pub mod account;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod fees;
pub mod funding;
pub mod ledger;
pub mod mock;
pub mod node;
pub mod orchestrator;
pub mod seed;
pub mod types;
pub mod workload;

pub type Result<T> = std::result::Result<T, error::Error>;
pub use error::Error;
