//! Catalog domain module: storages contain categories, categories contain items.
//!
//! This crate contains business rules for the catalog, implemented purely as
//! deterministic domain logic (no IO, no HTTP, no storage). Quantity arithmetic
//! lives on [`Item`] so that every store applies the same non-negative rule.

pub mod category;
pub mod item;
pub mod policy;
pub mod storage;

pub use category::{Category, CategorySummary, NewCategory};
pub use item::{Item, ItemPatch, NewItem};
pub use policy::{CatalogPolicy, DeletePolicy};
pub use storage::{NewStorage, Storage, StoragePatch};
