pub mod aggregate;
pub mod commands;
pub mod config;
pub mod dashboard;
pub mod export;
pub mod firebase;
pub mod records;
pub mod store;
pub mod summary;

#[cfg(test)]
mod export_tests;
#[cfg(test)]
mod records_tests;
#[cfg(test)]
mod summary_tests;

pub use commands::{BotCommand, CommandError};
pub use config::{DashboardConfig, StoreConfig};
pub use dashboard::{AccountView, Collection, Dashboard};
pub use firebase::FirebaseStore;
pub use records::{BotStatus, LogLevel, StatusRecord};
pub use store::{MemoryStore, RealtimeStore, StoreError, Subscription};
pub use summary::Summary;
