//! Process configuration and backend wiring.
//!
//! `StoreConfig` is built once at startup and handed to [`build_engine`]; nothing here
//! is read lazily from globals.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{info, instrument};

use stockroom_catalog::{CatalogPolicy, DeletePolicy};
use stockroom_transactions::{
    ExportRecord, NewInquiry, NewInsertion, NewLoan, Transaction, TransactionKind,
    TransactionView,
};

use crate::compensating::CompensatingStore;
use crate::engine::{EngineError, TransactionEngine};
use crate::error::StoreError;
use crate::in_memory::InMemoryStore;
use crate::postgres::PostgresStore;
use crate::query::DEFAULT_PAGE_SIZE;
use crate::store::CatalogStore;

const DEFAULT_MAX_CONNECTIONS: u32 = 10;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set when USE_PERSISTENT_STORES=true")]
    Missing(&'static str),

    #[error("invalid value '{value}' for {key}")]
    Invalid { key: &'static str, value: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Backend selection and tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// PostgreSQL when true, in-memory stores otherwise.
    pub persistent: bool,
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub policy: CatalogPolicy,
    pub default_page_size: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            persistent: false,
            database_url: None,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            policy: CatalogPolicy::default(),
            default_page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

fn parse<T: std::str::FromStr>(
    key: &'static str,
    raw: Option<String>,
) -> Result<Option<T>, ConfigError> {
    match raw {
        None => Ok(None),
        Some(value) => {
            let trimmed = value.trim();
            trimmed
                .parse::<T>()
                .map(Some)
                .map_err(|_| ConfigError::Invalid { key, value })
        }
    }
}

impl StoreConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through `lookup` (env var name -> value).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let persistent = parse::<bool>("USE_PERSISTENT_STORES", lookup("USE_PERSISTENT_STORES"))?
            .unwrap_or(defaults.persistent);
        let database_url = lookup("DATABASE_URL").filter(|url| !url.trim().is_empty());
        if persistent && database_url.is_none() {
            return Err(ConfigError::Missing("DATABASE_URL"));
        }

        let max_connections = parse::<u32>("DB_MAX_CONNECTIONS", lookup("DB_MAX_CONNECTIONS"))?
            .unwrap_or(defaults.max_connections);
        if max_connections == 0 {
            return Err(ConfigError::Invalid {
                key: "DB_MAX_CONNECTIONS",
                value: "0".to_string(),
            });
        }

        let policy = CatalogPolicy {
            storage_categories: parse::<DeletePolicy>(
                "STORAGE_DELETE_POLICY",
                lookup("STORAGE_DELETE_POLICY"),
            )?
            .unwrap_or(defaults.policy.storage_categories),
            category_items: parse::<DeletePolicy>(
                "CATEGORY_DELETE_POLICY",
                lookup("CATEGORY_DELETE_POLICY"),
            )?
            .unwrap_or(defaults.policy.category_items),
        };

        let default_page_size = parse::<u32>("DEFAULT_PAGE_SIZE", lookup("DEFAULT_PAGE_SIZE"))?
            .unwrap_or(defaults.default_page_size);
        if default_page_size == 0 {
            return Err(ConfigError::Invalid {
                key: "DEFAULT_PAGE_SIZE",
                value: "0".to_string(),
            });
        }

        Ok(Self {
            persistent,
            database_url,
            max_connections,
            policy,
            default_page_size,
        })
    }
}

pub type InMemoryEngine = TransactionEngine<CompensatingStore<InMemoryStore>>;
pub type PersistentEngine = TransactionEngine<PostgresStore>;

/// The engine over whichever backend the configuration selected.
#[derive(Clone)]
pub enum AppEngine {
    InMemory(Arc<InMemoryEngine>),
    Persistent(Arc<PersistentEngine>),
}

macro_rules! delegate {
    ($self:ident, $engine:ident => $call:expr) => {
        match $self {
            AppEngine::InMemory($engine) => $call,
            AppEngine::Persistent($engine) => $call,
        }
    };
}

impl AppEngine {
    pub fn in_memory(policy: CatalogPolicy, default_page_size: u32) -> Self {
        let store = CompensatingStore::new(InMemoryStore::with_policy(policy));
        AppEngine::InMemory(Arc::new(
            TransactionEngine::new(store).with_default_page_size(default_page_size),
        ))
    }

    pub fn backend(&self) -> &'static str {
        match self {
            AppEngine::InMemory(_) => "in_memory",
            AppEngine::Persistent(_) => "postgres",
        }
    }

    /// Storage/category/item operations.
    pub fn catalog(&self) -> &dyn CatalogStore {
        match self {
            AppEngine::InMemory(engine) => engine.store() as &dyn CatalogStore,
            AppEngine::Persistent(engine) => engine.store(),
        }
    }

    pub async fn create_loan(&self, request: NewLoan) -> Result<Transaction, EngineError> {
        delegate!(self, engine => engine.create_loan(request).await)
    }

    pub async fn create_inquiry(&self, request: NewInquiry) -> Result<Transaction, EngineError> {
        delegate!(self, engine => engine.create_inquiry(request).await)
    }

    pub async fn create_insertion(
        &self,
        request: NewInsertion,
    ) -> Result<Transaction, EngineError> {
        delegate!(self, engine => engine.create_insertion(request).await)
    }

    pub async fn get_by_identifier(&self, identifier: &str) -> Result<Transaction, EngineError> {
        delegate!(self, engine => engine.get_by_identifier(identifier).await)
    }

    pub async fn get_by_seq(
        &self,
        kind: TransactionKind,
        seq: u64,
    ) -> Result<Transaction, EngineError> {
        delegate!(self, engine => engine.get_by_seq(kind, seq).await)
    }

    pub async fn apply_status(
        &self,
        identifier: &str,
        status: &str,
    ) -> Result<Transaction, EngineError> {
        delegate!(self, engine => engine.apply_status(identifier, status).await)
    }

    pub async fn delete_by_identifier(&self, identifier: &str) -> Result<(), EngineError> {
        delegate!(self, engine => engine.delete_by_identifier(identifier).await)
    }

    pub async fn list(&self, page: i64, limit: i64) -> Result<Vec<TransactionView>, EngineError> {
        delegate!(self, engine => engine.list(page, limit).await)
    }

    pub async fn export(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<ExportRecord>, EngineError> {
        delegate!(self, engine => engine.export(from, to).await)
    }
}

/// Build the engine selected by `config`. The persistent backend is connected and
/// its schema applied before returning.
#[instrument(skip(config), fields(persistent = config.persistent), err)]
pub async fn build_engine(config: &StoreConfig) -> Result<AppEngine, ConfigError> {
    if !config.persistent {
        info!(
            storage_categories = %config.policy.storage_categories,
            category_items = %config.policy.category_items,
            "using in-memory stores"
        );
        return Ok(AppEngine::in_memory(config.policy, config.default_page_size));
    }

    let database_url = config
        .database_url
        .as_deref()
        .ok_or(ConfigError::Missing("DATABASE_URL"))?;
    let store = PostgresStore::connect(database_url, config.max_connections, config.policy).await?;
    store.migrate().await?;
    info!(max_connections = config.max_connections, "using postgres stores");

    Ok(AppEngine::Persistent(Arc::new(
        TransactionEngine::new(store).with_default_page_size(config.default_page_size),
    )))
}
