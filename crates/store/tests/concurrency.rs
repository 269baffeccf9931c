//! Concurrency properties of the in-memory inventory ledger.
//!
//! These tests exercise the ordered-locking protocol under contention:
//! overselling must be impossible, overlapping reservations must never
//! deadlock, and failed reservations must leave no partial effects.

use std::time::Duration;

use common::{Money, ProductId};
use domain::Product;
use store::{InventoryLedger, MemoryStore, ProductStore, ReserveRequest, StoreError};

async fn seed(store: &MemoryStore, name: &str, stock: u32) -> ProductId {
    let product = Product::new(name, "stress test", Money::from_cents(1000), stock);
    let id = product.id;
    store.insert_product(product).await.unwrap();
    id
}

async fn stock_of(store: &MemoryStore, id: ProductId) -> u32 {
    store.get_product(id).await.unwrap().unwrap().stock_quantity
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_reservations_never_oversell() {
    let store = MemoryStore::new();
    let product = seed(&store, "Beans", 10).await;

    let mut handles = Vec::new();
    for _ in 0..32 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store
                .reserve_all(&[ReserveRequest::new(product, 1)])
                .await
                .is_ok()
        }));
    }

    let mut successes = 0;
    for handle in handles {
        if handle.await.unwrap() {
            successes += 1;
        }
    }

    // Exactly the available stock was handed out, never more.
    assert_eq!(successes, 10);
    assert_eq!(stock_of(&store, product).await, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn overlapping_product_sets_do_not_deadlock() {
    let store = MemoryStore::new();
    let a = seed(&store, "Beans", 1_000_000).await;
    let b = seed(&store, "Filter", 1_000_000).await;

    // Submit {A,B} and {B,A} concurrently, many times. Without the global
    // lock ordering this interleaving deadlocks quickly.
    let run = async {
        for _ in 0..200 {
            let s1 = store.clone();
            let s2 = store.clone();
            let t1 = tokio::spawn(async move {
                s1.reserve_all(&[ReserveRequest::new(a, 1), ReserveRequest::new(b, 1)])
                    .await
                    .unwrap();
            });
            let t2 = tokio::spawn(async move {
                s2.reserve_all(&[ReserveRequest::new(b, 1), ReserveRequest::new(a, 1)])
                    .await
                    .unwrap();
            });
            t1.await.unwrap();
            t2.await.unwrap();
        }
    };

    tokio::time::timeout(Duration::from_secs(30), run)
        .await
        .expect("reservations over overlapping sets must complete in bounded time");

    assert_eq!(stock_of(&store, a).await, 1_000_000 - 400);
    assert_eq!(stock_of(&store, b).await, 1_000_000 - 400);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn failed_reservations_leave_no_partial_effects() {
    let store = MemoryStore::new();
    let a = seed(&store, "Beans", 20).await;
    let b = seed(&store, "Filter", 20).await;

    // 40 checkouts compete for 20 units of each product; both products are
    // always requested together, so accounting must stay in lockstep.
    let mut handles = Vec::new();
    for _ in 0..40 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store
                .reserve_all(&[ReserveRequest::new(a, 1), ReserveRequest::new(b, 1)])
                .await
        }));
    }

    let mut successes = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            Err(StoreError::InsufficientStock { .. }) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(successes, 20);
    assert_eq!(stock_of(&store, a).await, 0);
    assert_eq!(stock_of(&store, b).await, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn release_roundtrip_restores_stock_under_contention() {
    let store = MemoryStore::new();
    let a = seed(&store, "Beans", 50).await;
    let b = seed(&store, "Filter", 50).await;

    let mut handles = Vec::new();
    for i in 0..30u32 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            let quantity = i % 3 + 1;
            let requests = [ReserveRequest::new(a, quantity), ReserveRequest::new(b, quantity)];
            if store.reserve_all(&requests).await.is_ok() {
                store.release_all(&requests).await.unwrap();
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    // Every reservation was compensated, so the ledger is back where it
    // started.
    assert_eq!(stock_of(&store, a).await, 50);
    assert_eq!(stock_of(&store, b).await, 50);
}
