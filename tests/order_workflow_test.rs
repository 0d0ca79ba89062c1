mod common;

use assert_matches::assert_matches;
use common::TestApp;
use rust_decimal_macros::dec;
use sea_orm::{EntityTrait, PaginatorTrait};
use storefront_api::{
    entities::commerce::{CartItem, Order, OrderStatus, PaymentStatus},
    errors::ServiceError,
    services::{
        commerce::ProductUpdate,
        orders::{CreateOrderInput, OrderFilter},
        PageRequest,
    },
};
use uuid::Uuid;

fn checkout(address_id: Uuid) -> CreateOrderInput {
    CreateOrderInput {
        address_id,
        payment_method: Some("card".to_string()),
        notes: None,
    }
}

#[tokio::test]
async fn order_snapshots_prices_decrements_stock_and_empties_cart() {
    let app = TestApp::new().await;
    let buyer = app.user("buyer@example.com").await;
    let address = app.address(buyer.id, "Home").await;
    let tee = app.product("TEE-1", dec!(25.00), 10).await;
    let mug = app.product("MUG-1", dec!(12.50), 4).await;
    app.add_to_cart(buyer.id, tee, 2).await;
    app.add_to_cart(buyer.id, mug, 1).await;

    let orders = &app.state.services.orders;
    let order = orders
        .create_order(buyer.id, checkout(address.id))
        .await
        .expect("order placed");

    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.payment_status, PaymentStatus::Pending);
    assert_eq!(order.subtotal, dec!(62.50));
    assert_eq!(order.shipping_cost, dec!(9.99));
    assert_eq!(order.tax, dec!(6.25));
    assert_eq!(order.total, dec!(78.74));
    assert_eq!(order.items.len(), 2);
    assert_eq!(order.items[0].line_number, 1);
    assert_eq!(order.items[1].line_number, 2);
    assert_eq!(order.address.as_ref().map(|a| a.id), Some(address.id));

    assert!(order.order_number.starts_with("ORD-"));
    assert_eq!(order.order_number.len(), "ORD-YYMMDD-NNNN".len());

    assert_eq!(app.stock_of(tee).await, 8);
    assert_eq!(app.stock_of(mug).await, 3);

    let cart = app.state.services.cart.get_or_create(buyer.id).await.unwrap();
    assert!(cart.items.is_empty());
    assert_eq!(cart.subtotal, dec!(0));

    // Later price changes do not touch the placed order
    app.state
        .services
        .catalog
        .update_product(
            tee,
            ProductUpdate {
                price: Some(dec!(99.00)),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let reloaded = orders.get_order(&buyer.auth, order.id).await.unwrap();
    assert_eq!(reloaded.subtotal, dec!(62.50));
    assert_eq!(reloaded.total, dec!(78.74));
    let tee_line = reloaded
        .items
        .iter()
        .find(|line| line.product_id == tee)
        .expect("tee line");
    assert_eq!(tee_line.price, dec!(25.00));
    assert_eq!(tee_line.line_total, dec!(50.00));
}

#[tokio::test]
async fn failure_midway_rolls_back_every_decrement() {
    let app = TestApp::new().await;
    let buyer = app.user("buyer@example.com").await;
    let address = app.address(buyer.id, "Home").await;
    let plenty = app.product("PLENTY", dec!(10.00), 10).await;
    let scarce = app.product("SCARCE", dec!(10.00), 5).await;
    app.add_to_cart(buyer.id, plenty, 3).await;
    app.add_to_cart(buyer.id, scarce, 4).await;

    // Stock drops after the item was carted
    app.state
        .services
        .catalog
        .update_product(
            scarce,
            ProductUpdate {
                stock: Some(2),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let result = app
        .state
        .services
        .orders
        .create_order(buyer.id, checkout(address.id))
        .await;
    assert_matches!(result, Err(ServiceError::InsufficientStock(_)));

    assert_eq!(app.stock_of(plenty).await, 10);
    assert_eq!(app.stock_of(scarce).await, 2);
    assert_eq!(Order::find().count(app.db()).await.unwrap(), 0);
    assert_eq!(CartItem::find().count(app.db()).await.unwrap(), 2);
}

#[tokio::test]
async fn deleted_product_in_cart_fails_checkout_without_side_effects() {
    let app = TestApp::new().await;
    let buyer = app.user("buyer@example.com").await;
    let address = app.address(buyer.id, "Home").await;
    let kept = app.product("KEPT", dec!(10.00), 10).await;
    let gone = app.product("GONE", dec!(10.00), 10).await;
    app.add_to_cart(buyer.id, kept, 1).await;
    app.add_to_cart(buyer.id, gone, 1).await;
    app.state.services.catalog.delete_product(gone).await.unwrap();

    let result = app
        .state
        .services
        .orders
        .create_order(buyer.id, checkout(address.id))
        .await;
    assert_matches!(result, Err(ServiceError::ProductNotFound(id)) if id == gone);
    assert_eq!(app.stock_of(kept).await, 10);
    assert_eq!(Order::find().count(app.db()).await.unwrap(), 0);
}

#[tokio::test]
async fn empty_cart_and_foreign_address_are_rejected() {
    let app = TestApp::new().await;
    let buyer = app.user("buyer@example.com").await;
    let other = app.user("other@example.com").await;
    let mine = app.address(buyer.id, "Home").await;
    let theirs = app.address(other.id, "Elsewhere").await;
    let orders = &app.state.services.orders;

    assert_matches!(
        orders.create_order(buyer.id, checkout(mine.id)).await,
        Err(ServiceError::EmptyCart)
    );

    let item = app.product("ITEM", dec!(5.00), 5).await;
    app.add_to_cart(buyer.id, item, 1).await;

    assert_matches!(
        orders.create_order(buyer.id, checkout(theirs.id)).await,
        Err(ServiceError::Forbidden(_))
    );
    assert_matches!(
        orders.create_order(buyer.id, checkout(Uuid::new_v4())).await,
        Err(ServiceError::NotFound(_))
    );
    assert_eq!(app.stock_of(item).await, 5);
}

#[tokio::test]
async fn free_shipping_starts_strictly_above_threshold() {
    let app = TestApp::new().await;
    let buyer = app.user("buyer@example.com").await;
    let address = app.address(buyer.id, "Home").await;
    let at_threshold = app.product("HUNDRED", dec!(100.00), 5).await;
    let above = app.product("HUNDRED-01", dec!(100.01), 5).await;
    let orders = &app.state.services.orders;

    app.add_to_cart(buyer.id, at_threshold, 1).await;
    let order = orders.create_order(buyer.id, checkout(address.id)).await.unwrap();
    assert_eq!(order.subtotal, dec!(100.00));
    assert_eq!(order.shipping_cost, dec!(9.99));
    assert_eq!(order.tax, dec!(10.00));
    assert_eq!(order.total, dec!(119.99));

    app.add_to_cart(buyer.id, above, 1).await;
    let order = orders.create_order(buyer.id, checkout(address.id)).await.unwrap();
    assert_eq!(order.subtotal, dec!(100.01));
    assert_eq!(order.shipping_cost, dec!(0));
    assert_eq!(order.tax, dec!(10.00));
    assert_eq!(order.total, dec!(110.01));
}

#[tokio::test]
async fn tax_is_ten_percent_of_subtotal() {
    let app = TestApp::new().await;
    let buyer = app.user("buyer@example.com").await;
    let address = app.address(buyer.id, "Home").await;
    let item = app.product("HALF", dec!(22.75), 5).await;
    app.add_to_cart(buyer.id, item, 2).await;

    let order = app
        .state
        .services
        .orders
        .create_order(buyer.id, checkout(address.id))
        .await
        .unwrap();
    assert_eq!(order.subtotal, dec!(45.50));
    assert_eq!(order.tax, dec!(4.55));
    assert_eq!(order.total, dec!(60.04));
}

#[tokio::test]
async fn cancellation_restores_stock_once() {
    let app = TestApp::new().await;
    let buyer = app.user("buyer@example.com").await;
    let address = app.address(buyer.id, "Home").await;
    let item = app.product("RESTORE", dec!(15.00), 10).await;
    app.add_to_cart(buyer.id, item, 3).await;

    let orders = &app.state.services.orders;
    let order = orders.create_order(buyer.id, checkout(address.id)).await.unwrap();
    assert_eq!(app.stock_of(item).await, 7);

    let cancelled = orders.cancel_order(&buyer.auth, order.id).await.unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert_eq!(app.stock_of(item).await, 10);

    assert_matches!(
        orders.cancel_order(&buyer.auth, order.id).await,
        Err(ServiceError::InvalidTransition(_))
    );
    assert_eq!(app.stock_of(item).await, 10);
}

#[tokio::test]
async fn cancellation_restores_every_line() {
    let app = TestApp::new().await;
    let buyer = app.user("buyer@example.com").await;
    let address = app.address(buyer.id, "Home").await;
    let first = app.product("PAIR-A", dec!(10.00), 5).await;
    let second = app.product("PAIR-B", dec!(4.00), 10).await;
    app.add_to_cart(buyer.id, first, 2).await;
    app.add_to_cart(buyer.id, second, 3).await;

    let orders = &app.state.services.orders;
    let order = orders.create_order(buyer.id, checkout(address.id)).await.unwrap();
    assert_eq!(order.items.len(), 2);
    assert_eq!(app.stock_of(first).await, 3);
    assert_eq!(app.stock_of(second).await, 7);

    orders.cancel_order(&buyer.auth, order.id).await.unwrap();
    assert_eq!(app.stock_of(first).await, 5);
    assert_eq!(app.stock_of(second).await, 10);
}

#[tokio::test]
async fn confirmed_orders_can_be_cancelled_but_shipped_cannot() {
    let app = TestApp::new().await;
    let buyer = app.user("buyer@example.com").await;
    let address = app.address(buyer.id, "Home").await;
    let item = app.product("GUARD", dec!(20.00), 10).await;
    let orders = &app.state.services.orders;

    app.add_to_cart(buyer.id, item, 1).await;
    let confirmed = orders.create_order(buyer.id, checkout(address.id)).await.unwrap();
    orders
        .update_order_status(confirmed.id, "confirmed")
        .await
        .unwrap();
    let cancelled = orders.cancel_order(&buyer.auth, confirmed.id).await.unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);

    app.add_to_cart(buyer.id, item, 2).await;
    let shipped = orders.create_order(buyer.id, checkout(address.id)).await.unwrap();
    orders.update_order_status(shipped.id, "SHIPPED").await.unwrap();
    let stock_before = app.stock_of(item).await;

    assert_matches!(
        orders.cancel_order(&buyer.auth, shipped.id).await,
        Err(ServiceError::InvalidTransition(_))
    );
    assert_eq!(app.stock_of(item).await, stock_before);
    let unchanged = orders.get_order(&buyer.auth, shipped.id).await.unwrap();
    assert_eq!(unchanged.status, OrderStatus::Shipped);
}

#[tokio::test]
async fn only_owner_or_admin_may_cancel_or_view() {
    let app = TestApp::new().await;
    let buyer = app.user("buyer@example.com").await;
    let stranger = app.user("stranger@example.com").await;
    let admin = app.admin().await;
    let address = app.address(buyer.id, "Home").await;
    let item = app.product("OWNED", dec!(8.00), 3).await;
    app.add_to_cart(buyer.id, item, 1).await;

    let orders = &app.state.services.orders;
    let order = orders.create_order(buyer.id, checkout(address.id)).await.unwrap();

    assert_matches!(
        orders.get_order(&stranger.auth, order.id).await,
        Err(ServiceError::Forbidden(_))
    );
    assert_matches!(
        orders.cancel_order(&stranger.auth, order.id).await,
        Err(ServiceError::Forbidden(_))
    );
    assert_matches!(
        orders.cancel_order(&buyer.auth, Uuid::new_v4()).await,
        Err(ServiceError::NotFound(_))
    );

    assert!(orders.get_order(&admin.auth, order.id).await.is_ok());
    let cancelled = orders.cancel_order(&admin.auth, order.id).await.unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert_eq!(app.stock_of(item).await, 3);
}

#[tokio::test]
async fn admin_status_override_skips_transition_rules() {
    let app = TestApp::new().await;
    let buyer = app.user("buyer@example.com").await;
    let address = app.address(buyer.id, "Home").await;
    let item = app.product("OVERRIDE", dec!(30.00), 5).await;
    app.add_to_cart(buyer.id, item, 1).await;

    let orders = &app.state.services.orders;
    let order = orders.create_order(buyer.id, checkout(address.id)).await.unwrap();

    let delivered = orders.update_order_status(order.id, "DELIVERED").await.unwrap();
    assert_eq!(delivered.status, OrderStatus::Delivered);
    let reopened = orders.update_order_status(order.id, "pending").await.unwrap();
    assert_eq!(reopened.status, OrderStatus::Pending);

    assert_matches!(
        orders.update_order_status(order.id, "LOST").await,
        Err(ServiceError::InvalidStatus(_))
    );
    assert_matches!(
        orders.update_order_status(Uuid::new_v4(), "SHIPPED").await,
        Err(ServiceError::NotFound(_))
    );

    let paid = orders.update_payment_status(order.id, "paid").await.unwrap();
    assert_eq!(paid.payment_status, PaymentStatus::Paid);
    assert_matches!(
        orders.update_payment_status(order.id, "SOMEDAY").await,
        Err(ServiceError::InvalidStatus(_))
    );
}

#[tokio::test]
async fn stats_and_admin_listing() {
    let app = TestApp::new().await;
    let alice = app.user("alice@example.com").await;
    let bob = app.user("bob@example.com").await;
    let alice_home = app.address(alice.id, "Alice").await;
    let bob_home = app.address(bob.id, "Bob").await;
    let item = app.product("STATS", dec!(10.00), 50).await;
    let orders = &app.state.services.orders;

    app.add_to_cart(alice.id, item, 1).await;
    let first = orders.create_order(alice.id, checkout(alice_home.id)).await.unwrap();
    app.add_to_cart(alice.id, item, 1).await;
    let second = orders.create_order(alice.id, checkout(alice_home.id)).await.unwrap();
    app.add_to_cart(bob.id, item, 1).await;
    let third = orders.create_order(bob.id, checkout(bob_home.id)).await.unwrap();

    orders.update_order_status(first.id, "SHIPPED").await.unwrap();
    orders.cancel_order(&alice.auth, second.id).await.unwrap();

    let stats = orders.get_order_stats().await.unwrap();
    assert_eq!(stats.total, 3);
    assert_eq!(stats.pending, 1);
    assert_eq!(stats.shipped, 1);
    assert_eq!(stats.cancelled, 1);
    assert_eq!(stats.processing, 0);
    assert_eq!(stats.delivered, 0);

    let mine = orders
        .list_orders_for_user(alice.id, PageRequest::new(1, 10))
        .await
        .unwrap();
    assert_eq!(mine.total, 2);
    assert!(mine.items.iter().all(|o| o.user_id == alice.id));

    let by_email = orders
        .list_all_orders(
            OrderFilter {
                search: Some("BOB@".to_string()),
                ..Default::default()
            },
            PageRequest::new(1, 10),
        )
        .await
        .unwrap();
    assert_eq!(by_email.total, 1);
    assert_eq!(by_email.items[0].id, third.id);

    let shipped = orders
        .list_all_orders(
            OrderFilter {
                status: Some("shipped".to_string()),
                ..Default::default()
            },
            PageRequest::new(1, 10),
        )
        .await
        .unwrap();
    assert_eq!(shipped.total, 1);
    assert_eq!(shipped.items[0].id, first.id);

    let by_number = orders.get_order_by_number(&third.order_number).await.unwrap();
    assert_eq!(by_number.id, third.id);

    assert_matches!(
        orders
            .list_all_orders(
                OrderFilter {
                    payment_status: Some("NOPE".to_string()),
                    ..Default::default()
                },
                PageRequest::default(),
            )
            .await,
        Err(ServiceError::InvalidStatus(_))
    );
}
