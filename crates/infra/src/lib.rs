//! Infrastructure layer: stores, the transaction engine and backend wiring.

pub mod compensating;
pub mod config;
pub mod engine;
pub mod error;
pub mod in_memory;
pub mod locks;
pub mod postgres;
pub mod query;
pub mod store;

#[cfg(test)]
mod integration_tests;

pub use compensating::CompensatingStore;
pub use config::{AppEngine, ConfigError, StoreConfig, build_engine};
pub use engine::{EngineError, TransactionEngine};
pub use error::{StoreError, StoreResult};
pub use in_memory::InMemoryStore;
pub use postgres::PostgresStore;
pub use query::Pagination;
