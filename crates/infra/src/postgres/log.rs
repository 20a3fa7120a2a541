use chrono::{DateTime, Utc};
use sqlx::{PgConnection, Row};
use tracing::{Span, instrument};

use stockroom_core::ExpectedVersion;
use stockroom_transactions::{
    ExportRecord, StockEffect, Transaction, TransactionKind, TransactionRef,
};

use super::ledger::{adjust_in, materialize_in};
use super::rows::{self, columns, table};
use super::{PostgresStore, map_sqlx_error};
use crate::error::{StoreError, StoreResult};
use crate::query::Pagination;
use crate::store::{TransactionLog, TransitionCommit, TransitionStore};

/// Export rows for every kind, joined to the linked item and its category.
///
/// `ord` keeps loans, inquiries and insertions in that order.
const EXPORT_SQL: &str = "\
SELECT 0 AS ord, 'loan' AS kind, t.seq, t.id, t.employee_name, t.employee_department, \
       t.employee_position, c.name AS category_name, i.name AS item_name, t.quantity, \
       t.status, t.notes, t.created_at, t.item_id, \
       t.loan_time AS loan_time, t.return_time AS return_time, t.completed_at, \
       t.returned_at AS returned_at, NULL::BYTEA AS image \
  FROM loan_transactions t \
  LEFT JOIN items i ON i.id = t.item_id \
  LEFT JOIN categories c ON c.id = i.category_id \
 WHERE t.created_at BETWEEN $1 AND $2 \
UNION ALL \
SELECT 1, 'inquiry', t.seq, t.id, t.employee_name, t.employee_department, \
       t.employee_position, c.name, i.name, t.quantity, \
       t.status, t.notes, t.created_at, t.item_id, \
       NULL::TIMESTAMPTZ, NULL::TIMESTAMPTZ, t.completed_at, \
       NULL::TIMESTAMPTZ, NULL::BYTEA \
  FROM inquiry_transactions t \
  LEFT JOIN items i ON i.id = t.item_id \
  LEFT JOIN categories c ON c.id = i.category_id \
 WHERE t.created_at BETWEEN $1 AND $2 \
UNION ALL \
SELECT 2, 'insertion', t.seq, t.id, t.employee_name, t.employee_department, \
       t.employee_position, c.name, i.name, t.request_quantity, \
       t.status, t.notes, t.created_at, t.item_id, \
       NULL::TIMESTAMPTZ, NULL::TIMESTAMPTZ, t.completed_at, \
       NULL::TIMESTAMPTZ, t.image \
  FROM insertion_transactions t \
  LEFT JOIN items i ON i.id = t.item_id \
  LEFT JOIN categories c ON c.id = i.category_id \
 WHERE t.created_at BETWEEN $1 AND $2 \
ORDER BY ord, seq";

fn expected_param(expected: ExpectedVersion) -> Option<i64> {
    match expected {
        ExpectedVersion::Any => None,
        ExpectedVersion::Exact(v) => Some(v as i64),
    }
}

/// Read `seq`/`version` back from a RETURNING clause into the record.
fn stamp(mut transaction: Transaction, row: &sqlx::postgres::PgRow) -> StoreResult<Transaction> {
    let seq: i64 = row
        .try_get("seq")
        .map_err(|e| StoreError::backend(format!("missing seq: {e}")))?;
    let version: i64 = row
        .try_get("version")
        .map_err(|e| StoreError::backend(format!("missing version: {e}")))?;
    transaction.set_seq(seq as u64);
    transaction.set_version(version as u64);
    Ok(transaction)
}

async fn insert_in(conn: &mut PgConnection, transaction: Transaction) -> StoreResult<Transaction> {
    let row = match &transaction {
        Transaction::Loan(t) => sqlx::query(
            "INSERT INTO loan_transactions (id, employee_name, employee_department, \
             employee_position, quantity, item_id, loan_time, return_time, returned_at, \
             completed_at, status, notes, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
             RETURNING seq, version",
        )
        .bind(t.id.as_uuid())
        .bind(&t.employee.name)
        .bind(&t.employee.department)
        .bind(&t.employee.position)
        .bind(t.quantity)
        .bind(t.item_id.map(|i| *i.as_uuid()))
        .bind(t.loan_time)
        .bind(t.return_time)
        .bind(t.returned_at)
        .bind(t.completed_at)
        .bind(t.status.as_str())
        .bind(&t.notes)
        .bind(t.created_at)
        .fetch_one(&mut *conn)
        .await,
        Transaction::Inquiry(t) => sqlx::query(
            "INSERT INTO inquiry_transactions (id, employee_name, employee_department, \
             employee_position, quantity, item_id, completed_at, status, notes, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             RETURNING seq, version",
        )
        .bind(t.id.as_uuid())
        .bind(&t.employee.name)
        .bind(&t.employee.department)
        .bind(&t.employee.position)
        .bind(t.quantity)
        .bind(t.item_id.map(|i| *i.as_uuid()))
        .bind(t.completed_at)
        .bind(t.status.as_str())
        .bind(&t.notes)
        .bind(t.created_at)
        .fetch_one(&mut *conn)
        .await,
        Transaction::Insertion(t) => sqlx::query(
            "INSERT INTO insertion_transactions (id, employee_name, employee_department, \
             employee_position, request_name, request_quantity, request_shelf, \
             request_category_id, item_id, image, completed_at, status, notes, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14) \
             RETURNING seq, version",
        )
        .bind(t.id.as_uuid())
        .bind(&t.employee.name)
        .bind(&t.employee.department)
        .bind(&t.employee.position)
        .bind(&t.item_request.name)
        .bind(t.item_request.quantity)
        .bind(&t.item_request.shelf)
        .bind(t.item_request.category_id.as_uuid())
        .bind(t.item_id.map(|i| *i.as_uuid()))
        .bind(t.image.as_deref())
        .bind(t.completed_at)
        .bind(t.status.as_str())
        .bind(&t.notes)
        .bind(t.created_at)
        .fetch_one(&mut *conn)
        .await,
    }
    .map_err(|e| map_sqlx_error("insert_transaction", e))?;

    stamp(transaction, &row)
}

/// Overwrite the mutable columns and bump `version`.
async fn update_in(
    conn: &mut PgConnection,
    transaction: &Transaction,
    expected: ExpectedVersion,
) -> StoreResult<Transaction> {
    let expected_version = expected_param(expected);
    let row = match transaction {
        Transaction::Loan(t) => sqlx::query(
            "UPDATE loan_transactions SET employee_name = $2, employee_department = $3, \
             employee_position = $4, quantity = $5, item_id = $6, loan_time = $7, \
             return_time = $8, returned_at = $9, completed_at = $10, status = $11, \
             notes = $12, version = version + 1 \
             WHERE id = $1 AND ($13::BIGINT IS NULL OR version = $13) \
             RETURNING seq, version",
        )
        .bind(t.id.as_uuid())
        .bind(&t.employee.name)
        .bind(&t.employee.department)
        .bind(&t.employee.position)
        .bind(t.quantity)
        .bind(t.item_id.map(|i| *i.as_uuid()))
        .bind(t.loan_time)
        .bind(t.return_time)
        .bind(t.returned_at)
        .bind(t.completed_at)
        .bind(t.status.as_str())
        .bind(&t.notes)
        .bind(expected_version)
        .fetch_optional(&mut *conn)
        .await,
        Transaction::Inquiry(t) => sqlx::query(
            "UPDATE inquiry_transactions SET employee_name = $2, employee_department = $3, \
             employee_position = $4, quantity = $5, item_id = $6, completed_at = $7, \
             status = $8, notes = $9, version = version + 1 \
             WHERE id = $1 AND ($10::BIGINT IS NULL OR version = $10) \
             RETURNING seq, version",
        )
        .bind(t.id.as_uuid())
        .bind(&t.employee.name)
        .bind(&t.employee.department)
        .bind(&t.employee.position)
        .bind(t.quantity)
        .bind(t.item_id.map(|i| *i.as_uuid()))
        .bind(t.completed_at)
        .bind(t.status.as_str())
        .bind(&t.notes)
        .bind(expected_version)
        .fetch_optional(&mut *conn)
        .await,
        Transaction::Insertion(t) => sqlx::query(
            "UPDATE insertion_transactions SET employee_name = $2, employee_department = $3, \
             employee_position = $4, request_name = $5, request_quantity = $6, \
             request_shelf = $7, request_category_id = $8, item_id = $9, image = $10, \
             completed_at = $11, status = $12, notes = $13, version = version + 1 \
             WHERE id = $1 AND ($14::BIGINT IS NULL OR version = $14) \
             RETURNING seq, version",
        )
        .bind(t.id.as_uuid())
        .bind(&t.employee.name)
        .bind(&t.employee.department)
        .bind(&t.employee.position)
        .bind(&t.item_request.name)
        .bind(t.item_request.quantity)
        .bind(&t.item_request.shelf)
        .bind(t.item_request.category_id.as_uuid())
        .bind(t.item_id.map(|i| *i.as_uuid()))
        .bind(t.image.as_deref())
        .bind(t.completed_at)
        .bind(t.status.as_str())
        .bind(&t.notes)
        .bind(expected_version)
        .fetch_optional(&mut *conn)
        .await,
    }
    .map_err(|e| map_sqlx_error("update_transaction", e))?;

    match row {
        Some(row) => stamp(transaction.clone(), &row),
        None => {
            let reference = transaction.reference();
            let exists = sqlx::query(&format!(
                "SELECT 1 FROM {} WHERE id = $1",
                table(reference.kind)
            ))
            .bind(reference.id.as_uuid())
            .fetch_optional(&mut *conn)
            .await
            .map_err(|e| map_sqlx_error("update_transaction", e))?;
            Err(match exists {
                Some(_) => StoreError::Conflict(format!("{reference}: expected {expected:?}")),
                None => StoreError::not_found(reference.to_string()),
            })
        }
    }
}

#[async_trait::async_trait]
impl TransactionLog for PostgresStore {
    #[instrument(skip(self, transaction), fields(identifier = %transaction.reference(), seq), err)]
    async fn insert(&self, transaction: Transaction) -> StoreResult<Transaction> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| map_sqlx_error("acquire_connection", e))?;
        let stored = insert_in(&mut conn, transaction).await?;
        Span::current().record("seq", stored.seq());
        Ok(stored)
    }

    async fn get(&self, reference: TransactionRef) -> StoreResult<Option<Transaction>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM {} WHERE id = $1",
            columns(reference.kind),
            table(reference.kind)
        ))
        .bind(reference.id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_transaction", e))?;
        row.map(|row| rows::transaction(reference.kind, &row))
            .transpose()
    }

    async fn get_by_seq(&self, kind: TransactionKind, seq: u64) -> StoreResult<Option<Transaction>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM {} WHERE seq = $1",
            columns(kind),
            table(kind)
        ))
        .bind(seq as i64)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_transaction_by_seq", e))?;
        row.map(|row| rows::transaction(kind, &row)).transpose()
    }

    async fn list(&self, kind: TransactionKind, page: Pagination) -> StoreResult<Vec<Transaction>> {
        let found = sqlx::query(&format!(
            "SELECT {} FROM {} ORDER BY seq LIMIT $1 OFFSET $2",
            columns(kind),
            table(kind)
        ))
        .bind(page.limit as i64)
        .bind(page.offset as i64)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_transactions", e))?;
        found
            .iter()
            .map(|row| rows::transaction(kind, row))
            .collect()
    }

    #[instrument(skip(self, transaction), fields(identifier = %transaction.reference()), err)]
    async fn update(
        &self,
        transaction: &Transaction,
        expected: ExpectedVersion,
    ) -> StoreResult<Transaction> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| map_sqlx_error("acquire_connection", e))?;
        update_in(&mut conn, transaction, expected).await
    }

    #[instrument(skip(self), fields(identifier = %reference), err)]
    async fn delete(&self, reference: TransactionRef) -> StoreResult<bool> {
        let done = sqlx::query(&format!(
            "DELETE FROM {} WHERE id = $1",
            table(reference.kind)
        ))
        .bind(reference.id.as_uuid())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("delete_transaction", e))?;
        Ok(done.rows_affected() > 0)
    }

    #[instrument(skip(self), fields(rows), err)]
    async fn export(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StoreResult<Vec<ExportRecord>> {
        let found = sqlx::query(EXPORT_SQL)
            .bind(from)
            .bind(to)
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("export_transactions", e))?;
        Span::current().record("rows", found.len());
        found.iter().map(rows::export_record).collect()
    }
}

#[async_trait::async_trait]
impl TransitionStore for PostgresStore {
    #[instrument(
        skip(self, commit),
        fields(identifier = %commit.next.reference(), status = %commit.next.status()),
        err
    )]
    async fn commit(&self, commit: TransitionCommit) -> StoreResult<Transaction> {
        let TransitionCommit {
            mut next,
            expected,
            effect,
        } = commit;
        let reference = next.reference();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let row = sqlx::query(&format!(
            "SELECT version FROM {} WHERE id = $1 FOR UPDATE",
            table(reference.kind)
        ))
        .bind(reference.id.as_uuid())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("lock_transaction", e))?
        .ok_or_else(|| StoreError::not_found(reference.to_string()))?;

        let current: i64 = row
            .try_get("version")
            .map_err(|e| StoreError::backend(format!("missing version: {e}")))?;
        if !expected.matches(current as u64) {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback_transaction", e))?;
            return Err(StoreError::Conflict(format!(
                "{reference}: expected {expected:?}, found {current}"
            )));
        }

        match &effect {
            StockEffect::None => {}
            StockEffect::Adjust { item_id, delta } => {
                adjust_in(&mut tx, *item_id, *delta).await?;
            }
            StockEffect::Materialize(request) => {
                let applied = materialize_in(&mut tx, request).await?;
                next.set_item(Some(applied.item_id));
            }
        }

        // The row is locked and its version checked above.
        let stored = update_in(&mut tx, &next, ExpectedVersion::Any).await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(stored)
    }
}
