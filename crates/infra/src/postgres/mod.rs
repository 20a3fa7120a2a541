//! PostgreSQL-backed catalog, ledger and transaction log.
//!
//! ## Atomic transitions
//!
//! `TransitionStore::commit` runs in ONE database transaction:
//!
//! 1. `SELECT version ... FOR UPDATE` on the transaction row (serializes writers,
//!    checks the expected version)
//! 2. the stock effect under the item's row lock
//!    (`UPDATE items SET quantity = quantity + $delta WHERE ... AND quantity + $delta >= 0`)
//! 3. the record update, bumping `version`
//!
//! Any failure drops the sqlx transaction, which rolls everything back.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (unique violation) | `23505` | `Conflict` |
//! | Database (foreign key violation) | `23503` | `Domain(ParentNotFound)` |
//! | Database (check constraint violation) | `23514` | `Domain(Validation)` |
//! | Database (other integrity violation) | `23xxx` | `Constraint` |
//! | Database (other) | Any other | `Backend` |
//! | PoolClosed | N/A | `PoolClosed` |
//! | RowNotFound | N/A | `NotFound` |
//! | Other | N/A | `Backend` |

mod catalog;
mod ledger;
mod log;
mod rows;

use std::sync::Arc;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, instrument};

use stockroom_catalog::CatalogPolicy;
use stockroom_core::DomainError;

use crate::error::{StoreError, StoreResult};

const INIT_SCHEMA: &str = include_str!("../../migrations/0001_init.sql");

/// Store backed by a PostgreSQL pool.
///
/// `Send + Sync`; clones share the pool.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: Arc<PgPool>,
    policy: CatalogPolicy,
}

impl PostgresStore {
    pub fn new(pool: PgPool, policy: CatalogPolicy) -> Self {
        Self {
            pool: Arc::new(pool),
            policy,
        }
    }

    /// Open a pool against `database_url`.
    #[instrument(skip(database_url), err)]
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        policy: CatalogPolicy,
    ) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool, policy))
    }

    /// Create tables and indexes if they do not exist yet.
    #[instrument(skip(self), err)]
    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::raw_sql(INIT_SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        info!("schema ready");
        Ok(())
    }

    pub fn policy(&self) -> CatalogPolicy {
        self.policy
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Map SQLx errors to StoreError.
pub(crate) fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => StoreError::Conflict(msg),
                Some("23503") => DomainError::parent_not_found(msg).into(),
                Some("23514") => DomainError::validation(msg).into(),
                Some(code) if code.starts_with("23") => StoreError::Constraint(msg),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::PoolClosed => StoreError::PoolClosed(operation.to_string()),
        sqlx::Error::RowNotFound => StoreError::not_found(format!("row in {operation}")),
        other => StoreError::Backend(format!("sqlx error in {}: {}", operation, other)),
    }
}
