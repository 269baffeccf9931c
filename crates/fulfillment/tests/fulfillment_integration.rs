//! End-to-end fulfillment scenarios over the in-memory store and bus.

use std::sync::Arc;
use std::time::Duration;

use common::{Money, ProductId, UserId};
use domain::{OrderStatus, Product, UserIdentity};
use events::{InMemoryEventBus, OrderCreatedEvent, PaymentProcessedEvent};
use fulfillment::{CartService, FulfillmentError, FulfillmentService};
use payment::{PaymentConfig, PaymentProcessor};
use store::{CartStore, MemoryStore, OrderStore, ProductStore, StoreError};

type Service = FulfillmentService<MemoryStore, InMemoryEventBus>;

struct Harness {
    store: MemoryStore,
    bus: InMemoryEventBus,
    service: Arc<Service>,
    cart: CartService<MemoryStore>,
    user: UserIdentity,
    product_x: ProductId,
    product_y: ProductId,
}

/// Catalog from the canonical scenario: X at 10.00 (stock 5), Y at 5.00.
async fn setup(stock_y: u32) -> Harness {
    let store = MemoryStore::new();
    let bus = InMemoryEventBus::new();

    let x = Product::new("Product X", "test", Money::from_cents(1000), 5);
    let y = Product::new("Product Y", "test", Money::from_cents(500), stock_y);
    let (product_x, product_y) = (x.id, y.id);
    store.insert_product(x).await.unwrap();
    store.insert_product(y).await.unwrap();

    let service = Arc::new(FulfillmentService::new(store.clone(), bus.clone()));
    let cart = CartService::new(store.clone());

    let user = UserIdentity {
        id: UserId::new(),
        email: "jane@example.com".to_string(),
        first_name: "Jane".to_string(),
        last_name: "Doe".to_string(),
    };

    Harness {
        store,
        bus,
        service,
        cart,
        user,
        product_x,
        product_y,
    }
}

async fn fill_cart(h: &Harness) {
    h.cart.add_item(h.user.id, h.product_x, 2).await.unwrap();
    h.cart.add_item(h.user.id, h.product_y, 1).await.unwrap();
}

async fn stock_of(h: &Harness, id: ProductId) -> u32 {
    h.store.get_product(id).await.unwrap().unwrap().stock_quantity
}

/// Polls until the order reaches the expected status or the deadline hits.
async fn await_status(h: &Harness, order_id: common::OrderId, expected: OrderStatus) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let order = h.store.get_order(order_id).await.unwrap().unwrap();
        if order.status() == expected {
            return;
        }
        if tokio::time::Instant::now() > deadline {
            panic!("order never reached {expected}, stuck at {}", order.status());
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn checkout_reserves_stock_and_empties_the_cart() {
    let h = setup(5).await;
    fill_cart(&h).await;

    let order = h
        .service
        .create_order_from_cart(h.user.id, &h.user)
        .await
        .unwrap();

    assert_eq!(order.status(), OrderStatus::Reserved);
    assert_eq!(order.total_price().cents(), 2500);
    assert_eq!(order.items().len(), 2);
    assert_eq!(stock_of(&h, h.product_x).await, 3);
    assert_eq!(stock_of(&h, h.product_y).await, 4);
    assert!(h.cart.get_cart(h.user.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn checkout_line_prices_come_from_lock_time_product_rows() {
    let h = setup(5).await;
    fill_cart(&h).await;

    let order = h
        .service
        .create_order_from_cart(h.user.id, &h.user)
        .await
        .unwrap();

    let x_line = order
        .items()
        .iter()
        .find(|item| item.product_id == h.product_x)
        .unwrap();
    assert_eq!(x_line.price_at_time.cents(), 1000);
    assert_eq!(x_line.total_price().cents(), 2000);
}

#[tokio::test]
async fn shortfall_aborts_checkout_without_side_effects() {
    let h = setup(0).await;
    // Y has no stock, so it can only be added to the cart directly.
    h.cart.add_item(h.user.id, h.product_x, 2).await.unwrap();
    h.store
        .upsert_cart_item(h.user.id, h.product_y, 1)
        .await
        .unwrap();

    let result = h.service.create_order_from_cart(h.user.id, &h.user).await;

    match result {
        Err(FulfillmentError::Store(StoreError::InsufficientStock { product_id, .. })) => {
            assert_eq!(product_id, h.product_y);
        }
        other => panic!("expected InsufficientStock, got {other:?}"),
    }
    assert_eq!(stock_of(&h, h.product_x).await, 5);
    assert!(h.service.orders_history(h.user.id).await.unwrap().is_empty());
    assert_eq!(h.cart.get_cart(h.user.id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn empty_cart_is_a_business_error() {
    let h = setup(5).await;
    let result = h.service.create_order_from_cart(h.user.id, &h.user).await;
    assert!(matches!(result, Err(FulfillmentError::EmptyCart(id)) if id == h.user.id));
}

#[tokio::test]
async fn identity_mismatch_is_rejected() {
    let h = setup(5).await;
    fill_cart(&h).await;

    let stranger = UserId::new();
    let result = h.service.create_order_from_cart(stranger, &h.user).await;
    assert!(matches!(
        result,
        Err(FulfillmentError::IdentityMismatch { .. })
    ));
}

#[tokio::test]
async fn successful_payment_advances_the_order() {
    let h = setup(5).await;
    fill_cart(&h).await;
    let order = h
        .service
        .create_order_from_cart(h.user.id, &h.user)
        .await
        .unwrap();

    let created = OrderCreatedEvent::for_order(&order);
    let outcome = PaymentProcessedEvent::success(&created);
    h.service.handle_payment_outcome(&outcome).await.unwrap();

    let order = h.store.get_order(order.id()).await.unwrap().unwrap();
    assert_eq!(order.status(), OrderStatus::PaymentProcessed);

    // Redelivery of the same event is harmless.
    h.service.handle_payment_outcome(&outcome).await.unwrap();
    let order = h.store.get_order(order.id()).await.unwrap().unwrap();
    assert_eq!(order.status(), OrderStatus::PaymentProcessed);
}

#[tokio::test]
async fn failed_payment_cancels_and_restores_stock() {
    let h = setup(5).await;
    fill_cart(&h).await;
    let order = h
        .service
        .create_order_from_cart(h.user.id, &h.user)
        .await
        .unwrap();
    assert_eq!(stock_of(&h, h.product_x).await, 3);

    let created = OrderCreatedEvent::for_order(&order);
    let outcome = PaymentProcessedEvent::failure(&created, "card declined");
    h.service.handle_payment_outcome(&outcome).await.unwrap();

    let cancelled = h.store.get_order(order.id()).await.unwrap().unwrap();
    assert_eq!(cancelled.status(), OrderStatus::Cancelled);
    assert_eq!(stock_of(&h, h.product_x).await, 5);
    assert_eq!(stock_of(&h, h.product_y).await, 5);

    // A second identical event must not release stock again.
    h.service.handle_payment_outcome(&outcome).await.unwrap();
    assert_eq!(stock_of(&h, h.product_x).await, 5);
    assert_eq!(stock_of(&h, h.product_y).await, 5);
}

#[tokio::test]
async fn payment_outcome_for_unknown_order_is_nonfatal() {
    let h = setup(5).await;
    fill_cart(&h).await;
    let order = h
        .service
        .create_order_from_cart(h.user.id, &h.user)
        .await
        .unwrap();

    let mut created = OrderCreatedEvent::for_order(&order);
    created.order_id = common::OrderId::new();

    let outcome = PaymentProcessedEvent::success(&created);
    h.service.handle_payment_outcome(&outcome).await.unwrap();

    // The real order is untouched.
    let order = h.store.get_order(order.id()).await.unwrap().unwrap();
    assert_eq!(order.status(), OrderStatus::Reserved);
}

#[tokio::test]
async fn payment_outcome_for_foreign_user_is_ignored() {
    let h = setup(5).await;
    fill_cart(&h).await;
    let order = h
        .service
        .create_order_from_cart(h.user.id, &h.user)
        .await
        .unwrap();

    let mut created = OrderCreatedEvent::for_order(&order);
    created.user_id = UserId::new();

    let outcome = PaymentProcessedEvent::success(&created);
    h.service.handle_payment_outcome(&outcome).await.unwrap();

    let order = h.store.get_order(order.id()).await.unwrap().unwrap();
    assert_eq!(order.status(), OrderStatus::Reserved);
}

#[tokio::test]
async fn external_status_updates_follow_the_forward_guard() {
    let h = setup(5).await;
    fill_cart(&h).await;
    let order = h
        .service
        .create_order_from_cart(h.user.id, &h.user)
        .await
        .unwrap();

    let created = OrderCreatedEvent::for_order(&order);
    h.service
        .handle_payment_outcome(&PaymentProcessedEvent::success(&created))
        .await
        .unwrap();

    let confirmed = h
        .service
        .update_order_status(
            order.id(),
            h.user.id,
            OrderStatus::PaymentProcessed,
            OrderStatus::Confirmed,
        )
        .await
        .unwrap();
    assert_eq!(confirmed.status(), OrderStatus::Confirmed);

    // Backward move is rejected on the supplied pair alone.
    let result = h
        .service
        .update_order_status(
            order.id(),
            h.user.id,
            OrderStatus::Confirmed,
            OrderStatus::Reserved,
        )
        .await;
    assert!(matches!(result, Err(FulfillmentError::Transition(_))));

    // A foreign user sees OrderNotFound, not a permission error.
    let result = h
        .service
        .update_order_status(
            order.id(),
            UserId::new(),
            OrderStatus::Confirmed,
            OrderStatus::Completed,
        )
        .await;
    assert!(matches!(result, Err(FulfillmentError::OrderNotFound(_))));

    let completed = h
        .service
        .update_order_status(
            order.id(),
            h.user.id,
            OrderStatus::Confirmed,
            OrderStatus::Completed,
        )
        .await
        .unwrap();
    assert!(completed.is_terminal());
}

#[tokio::test]
async fn order_details_hides_foreign_orders() {
    let h = setup(5).await;
    fill_cart(&h).await;
    let order = h
        .service
        .create_order_from_cart(h.user.id, &h.user)
        .await
        .unwrap();

    assert!(h.service.order_details(order.id(), h.user.id).await.is_ok());
    let result = h.service.order_details(order.id(), UserId::new()).await;
    assert!(matches!(result, Err(FulfillmentError::OrderNotFound(_))));
}

#[tokio::test]
async fn saga_converges_to_payment_processed_through_the_bus() {
    let h = setup(5).await;
    fill_cart(&h).await;

    // Wire the full loop: simulator consumes order events, orchestrator
    // consumes payment events.
    let processor = PaymentProcessor::new(h.bus.clone(), PaymentConfig::instant(1.0));
    tokio::spawn(processor.run());
    tokio::spawn(h.service.clone().run_payment_listener());
    tokio::task::yield_now().await;

    let order = h
        .service
        .create_order_from_cart(h.user.id, &h.user)
        .await
        .unwrap();
    assert_eq!(order.status(), OrderStatus::Reserved);

    await_status(&h, order.id(), OrderStatus::PaymentProcessed).await;
}

#[tokio::test]
async fn saga_converges_to_cancelled_when_payment_declines() {
    let h = setup(5).await;
    fill_cart(&h).await;

    let processor = PaymentProcessor::new(h.bus.clone(), PaymentConfig::instant(0.0));
    tokio::spawn(processor.run());
    tokio::spawn(h.service.clone().run_payment_listener());
    tokio::task::yield_now().await;

    let order = h
        .service
        .create_order_from_cart(h.user.id, &h.user)
        .await
        .unwrap();

    await_status(&h, order.id(), OrderStatus::Cancelled).await;
    assert_eq!(stock_of(&h, h.product_x).await, 5);
    assert_eq!(stock_of(&h, h.product_y).await, 5);
}
