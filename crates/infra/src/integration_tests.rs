//! End-to-end tests of the transaction engine over the in-memory stores.
//!
//! Tests: request → engine → CompensatingStore → InMemoryStore
//!
//! Verifies:
//! - Stock moves exactly once per transition and never goes negative
//! - Failed transitions leave status and stock untouched
//! - Concurrent transitions on one transaction or one item stay consistent

use std::sync::Arc;

use chrono::{Duration, Utc};

use stockroom_catalog::{Item, NewCategory, NewItem, NewStorage};
use stockroom_core::{CategoryId, ItemId};
use stockroom_transactions::{
    Employee, NewInquiry, NewInsertion, NewLoan, Transaction, TransactionKind, TransactionStatus,
};

use crate::compensating::CompensatingStore;
use crate::engine::{EngineError, TransactionEngine};
use crate::in_memory::InMemoryStore;
use crate::store::CatalogStore;

type Engine = TransactionEngine<CompensatingStore<InMemoryStore>>;

fn engine() -> Engine {
    TransactionEngine::new(CompensatingStore::new(InMemoryStore::new()))
}

fn employee() -> Employee {
    Employee {
        name: "Budi".to_string(),
        department: "Operations".to_string(),
        position: "Supervisor".to_string(),
    }
}

async fn category(engine: &Engine) -> CategoryId {
    let storage = engine
        .store()
        .create_storage(NewStorage {
            name: "Gudang Utama".to_string(),
            location: "Surabaya".to_string(),
        })
        .await
        .unwrap();
    engine
        .store()
        .create_category(NewCategory {
            name: "Alat Tulis".to_string(),
            storage_id: storage.id,
            image: None,
        })
        .await
        .unwrap()
        .id
}

async fn stocked(engine: &Engine, name: &str, quantity: i64) -> Item {
    let category_id = category(engine).await;
    engine
        .store()
        .create_item(NewItem {
            name: name.to_string(),
            quantity,
            shelf: "B2".to_string(),
            category_id,
        })
        .await
        .unwrap()
}

async fn on_hand(engine: &Engine, item_id: ItemId) -> i64 {
    engine
        .store()
        .get_item(item_id)
        .await
        .unwrap()
        .unwrap()
        .quantity()
}

async fn inquiry(engine: &Engine, item_id: ItemId, quantity: i64) -> Transaction {
    engine
        .create_inquiry(NewInquiry {
            employee: employee(),
            item_id,
            quantity,
            notes: String::new(),
        })
        .await
        .unwrap()
}

async fn loan(engine: &Engine, item_id: ItemId, quantity: i64) -> Transaction {
    let start = Utc::now();
    engine
        .create_loan(NewLoan {
            employee: employee(),
            item_id,
            quantity,
            loan_time: start,
            return_time: start + Duration::days(7),
            notes: "projector for training".to_string(),
        })
        .await
        .unwrap()
}

fn insertion_request(category_id: CategoryId, name: &str, quantity: i64) -> NewInsertion {
    NewInsertion {
        employee: employee(),
        item_request: NewItem {
            name: name.to_string(),
            quantity,
            shelf: "C3".to_string(),
            category_id,
        },
        image: Some(vec![1, 2, 3]),
        notes: String::new(),
    }
}

#[tokio::test]
async fn completing_an_inquiry_debits_exactly_once() {
    let engine = engine();
    let item = stocked(&engine, "Stapler", 10).await;
    let tx = inquiry(&engine, item.id_typed(), 3).await;
    let identifier = tx.reference().to_string();

    let done = engine.apply_status(&identifier, "completed").await.unwrap();
    assert_eq!(done.status(), TransactionStatus::Completed);
    assert!(done.completed_at().is_some());
    assert_eq!(on_hand(&engine, item.id_typed()).await, 7);

    let err = engine.apply_status(&identifier, "completed").await.unwrap_err();
    assert!(matches!(err, EngineError::IllegalTransition { .. }));
    assert_eq!(on_hand(&engine, item.id_typed()).await, 7);
}

#[tokio::test]
async fn completing_an_insertion_creates_and_links_the_item() {
    let engine = engine();
    let category_id = category(&engine).await;
    let tx = engine
        .create_insertion(insertion_request(category_id, "Whiteboard Marker", 20))
        .await
        .unwrap();
    assert_eq!(tx.item_id(), None);

    let identifier = tx.reference().to_string();
    let done = engine.apply_status(&identifier, "completed").await.unwrap();
    let item_id = done.item_id().expect("insertion linked to its item");

    let created = engine.store().get_item(item_id).await.unwrap().unwrap();
    assert_eq!(created.name(), "Whiteboard Marker");
    assert_eq!(created.quantity(), 20);
    assert_eq!(created.category_id(), Some(category_id));

    let err = engine.apply_status(&identifier, "completed").await.unwrap_err();
    assert!(matches!(err, EngineError::IllegalTransition { .. }));
    assert_eq!(on_hand(&engine, item_id).await, 20);
}

#[tokio::test]
async fn insertion_merges_into_item_with_same_name() {
    let engine = engine();
    let existing = stocked(&engine, "Stapler", 10).await;
    let category_id = existing.category_id().unwrap();

    let tx = engine
        .create_insertion(insertion_request(category_id, "Stapler", 5))
        .await
        .unwrap();
    let done = engine.transition(tx.reference(), TransactionStatus::Completed).await.unwrap();

    assert_eq!(done.item_id(), Some(existing.id_typed()));
    let merged = engine.store().get_item(existing.id_typed()).await.unwrap().unwrap();
    assert_eq!(merged.quantity(), 15);
    assert_eq!(merged.shelf(), "C3");
}

#[tokio::test]
async fn insufficient_stock_leaves_transaction_pending() {
    let engine = engine();
    let item = stocked(&engine, "Projector", 2).await;
    let tx = loan(&engine, item.id_typed(), 5).await;

    let err = engine
        .transition(tx.reference(), TransactionStatus::Completed)
        .await
        .unwrap_err();
    match err {
        EngineError::InsufficientStock {
            available,
            requested,
            ..
        } => {
            assert_eq!(available, 2);
            assert_eq!(requested, 5);
        }
        other => panic!("expected insufficient stock, got {other:?}"),
    }

    let reloaded = engine.get(tx.reference()).await.unwrap();
    assert_eq!(reloaded.status(), TransactionStatus::Pending);
    assert_eq!(on_hand(&engine, item.id_typed()).await, 2);
}

#[tokio::test]
async fn loan_return_credits_back_once() {
    let engine = engine();
    let item = stocked(&engine, "Projector", 4).await;
    let tx = loan(&engine, item.id_typed(), 3).await;

    engine.transition(tx.reference(), TransactionStatus::Approved).await.unwrap();
    engine.transition(tx.reference(), TransactionStatus::Completed).await.unwrap();
    assert_eq!(on_hand(&engine, item.id_typed()).await, 1);

    let returned = engine.transition(tx.reference(), TransactionStatus::Returned).await.unwrap();
    assert_eq!(returned.status(), TransactionStatus::Returned);
    assert_eq!(on_hand(&engine, item.id_typed()).await, 4);
    match returned {
        Transaction::Loan(loan) => assert!(loan.returned_at.is_some()),
        other => panic!("expected a loan, got {other:?}"),
    }

    let err = engine
        .transition(tx.reference(), TransactionStatus::Returned)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::IllegalTransition { .. }));
    assert_eq!(on_hand(&engine, item.id_typed()).await, 4);
}

#[tokio::test]
async fn rejecting_never_moves_stock() {
    let engine = engine();
    let item = stocked(&engine, "Stapler", 10).await;
    let tx = inquiry(&engine, item.id_typed(), 4).await;

    let rejected = engine.transition(tx.reference(), TransactionStatus::Rejected).await.unwrap();
    assert_eq!(rejected.status(), TransactionStatus::Rejected);
    assert_eq!(on_hand(&engine, item.id_typed()).await, 10);

    let err = engine
        .transition(tx.reference(), TransactionStatus::Completed)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::IllegalTransition { .. }));
    assert_eq!(on_hand(&engine, item.id_typed()).await, 10);
}

#[tokio::test]
async fn boundary_rejects_unknown_prefix_and_status() {
    let engine = engine();
    let item = stocked(&engine, "Stapler", 10).await;
    let tx = inquiry(&engine, item.id_typed(), 1).await;

    let err = engine
        .apply_status(&tx.reference().to_string(), "teleported")
        .await
        .unwrap_err();
    assert_eq!(
        err,
        EngineError::IllegalTransition {
            from: "pending".to_string(),
            to: "teleported".to_string(),
        }
    );

    let bogus = format!("transfer_{}", tx.id_typed());
    let err = engine.apply_status(&bogus, "completed").await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidTransactionKind(_)));

    let err = engine.apply_status("inquiry_not-a-uuid", "completed").await.unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));

    // Status strings are case-insensitive.
    let done = engine
        .apply_status(&tx.reference().to_string(), "  Completed ")
        .await
        .unwrap();
    assert_eq!(done.status(), TransactionStatus::Completed);
}

#[tokio::test]
async fn creation_validates_requests_and_references() {
    let engine = engine();
    let item = stocked(&engine, "Stapler", 10).await;

    let err = engine
        .create_inquiry(NewInquiry {
            employee: employee(),
            item_id: item.id_typed(),
            quantity: 0,
            notes: String::new(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));

    let err = engine
        .create_inquiry(NewInquiry {
            employee: employee(),
            item_id: ItemId::new(),
            quantity: 1,
            notes: String::new(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));

    let start = Utc::now();
    let err = engine
        .create_loan(NewLoan {
            employee: employee(),
            item_id: item.id_typed(),
            quantity: 1,
            loan_time: start,
            return_time: start - Duration::hours(1),
            notes: String::new(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));

    let err = engine
        .create_insertion(insertion_request(CategoryId::new(), "Binder", 3))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
}

#[tokio::test]
async fn listing_pages_each_kind_and_concatenates() {
    let engine = engine();
    let item = stocked(&engine, "Stapler", 10).await;
    let category_id = item.category_id().unwrap();

    let first_loan = loan(&engine, item.id_typed(), 1).await;
    loan(&engine, item.id_typed(), 2).await;
    inquiry(&engine, item.id_typed(), 1).await;
    engine
        .create_insertion(insertion_request(category_id, "Binder", 3))
        .await
        .unwrap();

    let all = engine.list(1, 10).await.unwrap();
    let kinds: Vec<_> = all.iter().map(|v| v.transaction.kind()).collect();
    assert_eq!(
        kinds,
        vec![
            TransactionKind::Loan,
            TransactionKind::Loan,
            TransactionKind::Inquiry,
            TransactionKind::Insertion,
        ]
    );

    let json = serde_json::to_value(&all[0]).unwrap();
    assert_eq!(json["identifier"], first_loan.reference().to_string());
    assert_eq!(json["kind"], "loan");

    // Page 2 of size 1: only loans have a second row.
    let second = engine.list(2, 1).await.unwrap();
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].transaction.seq(), 2);

    // Out-of-range page/limit fall back to page 1 and the default size.
    assert_eq!(engine.list(0, 0).await.unwrap().len(), 4);

    let by_seq = engine.get_by_seq(TransactionKind::Loan, 1).await.unwrap();
    assert_eq!(by_seq.reference(), first_loan.reference());
}

#[tokio::test]
async fn delete_removes_record_regardless_of_status() {
    let engine = engine();
    let item = stocked(&engine, "Stapler", 10).await;
    let tx = inquiry(&engine, item.id_typed(), 2).await;
    let identifier = tx.reference().to_string();
    engine.apply_status(&identifier, "completed").await.unwrap();

    engine.delete_by_identifier(&identifier).await.unwrap();
    assert!(matches!(
        engine.get_by_identifier(&identifier).await,
        Err(EngineError::NotFound(_))
    ));
    assert!(matches!(
        engine.delete_by_identifier(&identifier).await,
        Err(EngineError::NotFound(_))
    ));
    // Deleting history does not give stock back.
    assert_eq!(on_hand(&engine, item.id_typed()).await, 8);
}

#[tokio::test]
async fn transition_after_item_deletion_is_not_found() {
    let engine = engine();
    let item = stocked(&engine, "Stapler", 10).await;
    let doomed = inquiry(&engine, item.id_typed(), 2).await;
    let other = inquiry(&engine, item.id_typed(), 2).await;

    engine.store().delete_item(item.id_typed()).await.unwrap();

    let err = engine
        .transition(doomed.reference(), TransactionStatus::Completed)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
    let reloaded = engine.get(doomed.reference()).await.unwrap();
    assert_eq!(reloaded.status(), TransactionStatus::Pending);
    assert_eq!(reloaded.item_id(), None);

    // Transitions that move no stock still work.
    let rejected = engine
        .transition(other.reference(), TransactionStatus::Rejected)
        .await
        .unwrap();
    assert_eq!(rejected.status(), TransactionStatus::Rejected);
}

#[tokio::test]
async fn export_covers_inclusive_window() {
    let engine = engine();
    let item = stocked(&engine, "Stapler", 10).await;
    let before = Utc::now() - Duration::seconds(1);
    let tx = loan(&engine, item.id_typed(), 1).await;

    let rows = engine.export(before, tx.created_at()).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].kind, "LoanTransaction");
    assert_eq!(rows[0].item_name.as_deref(), Some("Stapler"));
    assert_eq!(rows[0].category_name.as_deref(), Some("Alat Tulis"));

    let empty = engine
        .export(before - Duration::days(2), before - Duration::days(1))
        .await
        .unwrap();
    assert!(empty.is_empty());

    let err = engine.export(tx.created_at(), before).await.unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_completions_of_one_transaction_debit_once() {
    let engine = Arc::new(engine());
    let item = stocked(&engine, "Stapler", 10).await;
    let tx = inquiry(&engine, item.id_typed(), 3).await;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let engine = engine.clone();
        let reference = tx.reference();
        handles.push(tokio::spawn(async move {
            engine.transition(reference, TransactionStatus::Completed).await
        }));
    }

    let mut succeeded = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => succeeded += 1,
            Err(err) => assert!(matches!(err, EngineError::IllegalTransition { .. })),
        }
    }
    assert_eq!(succeeded, 1);
    assert_eq!(on_hand(&engine, item.id_typed()).await, 7);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_debits_on_one_item_never_go_negative() {
    let engine = Arc::new(engine());
    let item = stocked(&engine, "Kertas A4", 10).await;

    let mut references = Vec::new();
    for _ in 0..6 {
        references.push(inquiry(&engine, item.id_typed(), 2).await.reference());
    }

    let mut handles = Vec::new();
    for reference in references {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            engine.transition(reference, TransactionStatus::Completed).await
        }));
    }

    let mut completed = 0;
    let mut short = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => completed += 1,
            Err(EngineError::InsufficientStock { .. }) => short += 1,
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }
    assert_eq!(completed, 5);
    assert_eq!(short, 1);
    assert_eq!(on_hand(&engine, item.id_typed()).await, 0);
}
