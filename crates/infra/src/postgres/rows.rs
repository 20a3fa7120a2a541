//! SQLx row types and their conversion into domain values.

use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::postgres::PgRow;
use uuid::Uuid;

use stockroom_catalog::{Category, CategorySummary, Item, NewItem, Storage};
use stockroom_core::{CategoryId, ItemId, StorageId, TransactionId};
use stockroom_transactions::{
    Employee, ExportRecord, InquiryTransaction, InsertionTransaction, LoanTransaction,
    Transaction, TransactionKind, TransactionRef, TransactionStatus,
};

use crate::error::{StoreError, StoreResult};
use crate::store::encode_image;

pub(super) const STORAGE_COLUMNS: &str = "id, name, location";
pub(super) const CATEGORY_COLUMNS: &str = "id, name, storage_id, image";
pub(super) const ITEM_COLUMNS: &str = "id, name, quantity, shelf, category_id";

pub(super) const LOAN_COLUMNS: &str = "seq, id, employee_name, employee_department, \
     employee_position, quantity, item_id, loan_time, return_time, returned_at, completed_at, \
     status, notes, created_at, version";
pub(super) const INQUIRY_COLUMNS: &str = "seq, id, employee_name, employee_department, \
     employee_position, quantity, item_id, completed_at, status, notes, created_at, version";
pub(super) const INSERTION_COLUMNS: &str = "seq, id, employee_name, employee_department, \
     employee_position, request_name, request_quantity, request_shelf, request_category_id, \
     item_id, image, completed_at, status, notes, created_at, version";

pub(super) fn table(kind: TransactionKind) -> &'static str {
    match kind {
        TransactionKind::Loan => "loan_transactions",
        TransactionKind::Inquiry => "inquiry_transactions",
        TransactionKind::Insertion => "insertion_transactions",
    }
}

pub(super) fn columns(kind: TransactionKind) -> &'static str {
    match kind {
        TransactionKind::Loan => LOAN_COLUMNS,
        TransactionKind::Inquiry => INQUIRY_COLUMNS,
        TransactionKind::Insertion => INSERTION_COLUMNS,
    }
}

fn decode(what: &str, err: sqlx::Error) -> StoreError {
    StoreError::backend(format!("failed to deserialize {what} row: {err}"))
}

fn parse_status(raw: &str) -> StoreResult<TransactionStatus> {
    raw.parse()
        .map_err(|_| StoreError::backend(format!("stored status '{raw}' is not recognized")))
}

#[derive(Debug)]
pub(super) struct StorageRow {
    id: Uuid,
    name: String,
    location: String,
}

impl<'r> sqlx::FromRow<'r, PgRow> for StorageRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(StorageRow {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            location: row.try_get("location")?,
        })
    }
}

impl From<StorageRow> for Storage {
    fn from(row: StorageRow) -> Self {
        Storage {
            id: StorageId::from_uuid(row.id),
            name: row.name,
            location: row.location,
        }
    }
}

pub(super) fn storage(row: &PgRow) -> StoreResult<Storage> {
    use sqlx::FromRow;
    StorageRow::from_row(row)
        .map(Storage::from)
        .map_err(|e| decode("storage", e))
}

#[derive(Debug)]
pub(super) struct CategoryRow {
    id: Uuid,
    name: String,
    storage_id: Option<Uuid>,
    image: Option<Vec<u8>>,
}

impl<'r> sqlx::FromRow<'r, PgRow> for CategoryRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(CategoryRow {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            storage_id: row.try_get("storage_id")?,
            image: row.try_get("image")?,
        })
    }
}

impl From<CategoryRow> for Category {
    fn from(row: CategoryRow) -> Self {
        Category {
            id: CategoryId::from_uuid(row.id),
            name: row.name,
            storage_id: row.storage_id.map(StorageId::from_uuid),
            image: row.image,
        }
    }
}

pub(super) fn category(row: &PgRow) -> StoreResult<Category> {
    use sqlx::FromRow;
    CategoryRow::from_row(row)
        .map(Category::from)
        .map_err(|e| decode("category", e))
}

pub(super) fn category_summary(row: &PgRow) -> StoreResult<CategorySummary> {
    let id: Uuid = row.try_get("id").map_err(|e| decode("category", e))?;
    let name: String = row.try_get("name").map_err(|e| decode("category", e))?;
    Ok(CategorySummary {
        id: CategoryId::from_uuid(id),
        name,
    })
}

#[derive(Debug)]
pub(super) struct ItemRow {
    id: Uuid,
    name: String,
    quantity: i64,
    shelf: String,
    category_id: Option<Uuid>,
}

impl<'r> sqlx::FromRow<'r, PgRow> for ItemRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(ItemRow {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            quantity: row.try_get("quantity")?,
            shelf: row.try_get("shelf")?,
            category_id: row.try_get("category_id")?,
        })
    }
}

impl ItemRow {
    fn into_item(self) -> StoreResult<Item> {
        Ok(Item::restore(
            ItemId::from_uuid(self.id),
            self.name,
            self.quantity,
            self.shelf,
            self.category_id.map(CategoryId::from_uuid),
        )?)
    }
}

pub(super) fn item(row: &PgRow) -> StoreResult<Item> {
    use sqlx::FromRow;
    ItemRow::from_row(row)
        .map_err(|e| decode("item", e))?
        .into_item()
}

/// Columns every transaction table shares.
#[derive(Debug)]
struct CommonRow {
    seq: i64,
    id: Uuid,
    employee: Employee,
    item_id: Option<Uuid>,
    completed_at: Option<DateTime<Utc>>,
    status: String,
    notes: String,
    created_at: DateTime<Utc>,
    version: i64,
}

impl<'r> sqlx::FromRow<'r, PgRow> for CommonRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(CommonRow {
            seq: row.try_get("seq")?,
            id: row.try_get("id")?,
            employee: Employee {
                name: row.try_get("employee_name")?,
                department: row.try_get("employee_department")?,
                position: row.try_get("employee_position")?,
            },
            item_id: row.try_get("item_id")?,
            completed_at: row.try_get("completed_at")?,
            status: row.try_get("status")?,
            notes: row.try_get("notes")?,
            created_at: row.try_get("created_at")?,
            version: row.try_get("version")?,
        })
    }
}

/// Decode a row of `kind`'s table into a domain transaction.
pub(super) fn transaction(kind: TransactionKind, row: &PgRow) -> StoreResult<Transaction> {
    use sqlx::FromRow;
    let common = CommonRow::from_row(row).map_err(|e| decode(kind.as_str(), e))?;
    let status = parse_status(&common.status)?;
    let id = TransactionId::from_uuid(common.id);
    let item_id = common.item_id.map(ItemId::from_uuid);
    let seq = common.seq as u64;
    let version = common.version as u64;

    let decoded = match kind {
        TransactionKind::Loan => {
            let get = |col: &str| -> StoreResult<Option<DateTime<Utc>>> {
                row.try_get(col).map_err(|e| decode("loan", e))
            };
            let loan_time: DateTime<Utc> =
                row.try_get("loan_time").map_err(|e| decode("loan", e))?;
            let return_time: DateTime<Utc> =
                row.try_get("return_time").map_err(|e| decode("loan", e))?;
            let quantity: i64 = row.try_get("quantity").map_err(|e| decode("loan", e))?;
            Transaction::Loan(LoanTransaction {
                id,
                seq,
                employee: common.employee,
                quantity,
                item_id,
                loan_time,
                return_time,
                returned_at: get("returned_at")?,
                completed_at: common.completed_at,
                status,
                notes: common.notes,
                created_at: common.created_at,
                version,
            })
        }
        TransactionKind::Inquiry => {
            let quantity: i64 = row.try_get("quantity").map_err(|e| decode("inquiry", e))?;
            Transaction::Inquiry(InquiryTransaction {
                id,
                seq,
                employee: common.employee,
                quantity,
                item_id,
                completed_at: common.completed_at,
                status,
                notes: common.notes,
                created_at: common.created_at,
                version,
            })
        }
        TransactionKind::Insertion => {
            let decode_err = |e| decode("insertion", e);
            let category: Uuid = row.try_get("request_category_id").map_err(decode_err)?;
            Transaction::Insertion(InsertionTransaction {
                id,
                seq,
                employee: common.employee,
                item_request: NewItem {
                    name: row.try_get("request_name").map_err(decode_err)?,
                    quantity: row.try_get("request_quantity").map_err(decode_err)?,
                    shelf: row.try_get("request_shelf").map_err(decode_err)?,
                    category_id: CategoryId::from_uuid(category),
                },
                item_id,
                image: row.try_get("image").map_err(decode_err)?,
                completed_at: common.completed_at,
                status,
                notes: common.notes,
                created_at: common.created_at,
                version,
            })
        }
    };
    Ok(decoded)
}

/// One row of the export UNION.
pub(super) fn export_record(row: &PgRow) -> StoreResult<ExportRecord> {
    let d = |e| decode("export", e);
    let kind: String = row.try_get("kind").map_err(d)?;
    let kind: TransactionKind = kind.parse()?;
    let id: Uuid = row.try_get("id").map_err(d)?;
    let status: String = row.try_get("status").map_err(d)?;
    let item_id: Option<Uuid> = row.try_get("item_id").map_err(d)?;
    let image: Option<Vec<u8>> = row.try_get("image").map_err(d)?;
    let seq: i64 = row.try_get("seq").map_err(d)?;

    Ok(ExportRecord {
        kind: kind.export_tag().to_string(),
        identifier: TransactionRef::new(kind, TransactionId::from_uuid(id)),
        seq: seq as u64,
        employee_name: row.try_get("employee_name").map_err(d)?,
        employee_department: row.try_get("employee_department").map_err(d)?,
        employee_position: row.try_get("employee_position").map_err(d)?,
        category_name: row.try_get("category_name").map_err(d)?,
        item_name: row.try_get("item_name").map_err(d)?,
        quantity: row.try_get("quantity").map_err(d)?,
        status: parse_status(&status)?,
        notes: row.try_get("notes").map_err(d)?,
        created_at: row.try_get("created_at").map_err(d)?,
        item_id: item_id.map(ItemId::from_uuid),
        loan_time: row.try_get("loan_time").map_err(d)?,
        return_time: row.try_get("return_time").map_err(d)?,
        completed_at: row.try_get("completed_at").map_err(d)?,
        returned_at: row.try_get("returned_at").map_err(d)?,
        image: image.as_deref().map(encode_image),
    })
}
