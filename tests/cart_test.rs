mod common;

use assert_matches::assert_matches;
use common::TestApp;
use rust_decimal_macros::dec;
use storefront_api::{
    errors::ServiceError,
    services::commerce::{AddCartItemInput, ProductUpdate},
};
use uuid::Uuid;

fn line(product_id: Uuid, quantity: i32, size: Option<&str>) -> AddCartItemInput {
    AddCartItemInput {
        product_id,
        quantity: Some(quantity),
        size: size.map(str::to_string),
        color: None,
    }
}

#[tokio::test]
async fn cart_is_created_lazily_and_reused() {
    let app = TestApp::new().await;
    let shopper = app.user("shopper@example.com").await;
    let cart = &app.state.services.cart;

    let first = cart.get_or_create(shopper.id).await.unwrap();
    let second = cart.get_or_create(shopper.id).await.unwrap();
    assert_eq!(first.id, second.id);
    assert!(first.items.is_empty());
    assert_eq!(first.item_count, 0);
}

#[tokio::test]
async fn adding_the_same_variant_merges_quantities() {
    let app = TestApp::new().await;
    let shopper = app.user("shopper@example.com").await;
    let tee = app.product("TEE", dec!(12.00), 10).await;
    let cart = &app.state.services.cart;

    cart.add_item(shopper.id, line(tee, 2, Some("M"))).await.unwrap();
    let view = cart.add_item(shopper.id, line(tee, 3, Some("M"))).await.unwrap();
    assert_eq!(view.item_count, 1);
    assert_eq!(view.items[0].quantity, 5);
    assert_eq!(view.subtotal, dec!(60.00));

    let view = cart.add_item(shopper.id, line(tee, 1, Some("S"))).await.unwrap();
    assert_eq!(view.item_count, 2);

    let view = cart.add_item(shopper.id, line(tee, 1, None)).await.unwrap();
    assert_eq!(view.item_count, 3);
    let view = cart.add_item(shopper.id, line(tee, 1, None)).await.unwrap();
    assert_eq!(view.item_count, 3);
    assert_eq!(view.subtotal, dec!(96.00));
}

#[tokio::test]
async fn quantity_defaults_to_one() {
    let app = TestApp::new().await;
    let shopper = app.user("shopper@example.com").await;
    let mug = app.product("MUG", dec!(7.50), 4).await;

    let view = app
        .state
        .services
        .cart
        .add_item(
            shopper.id,
            AddCartItemInput {
                product_id: mug,
                quantity: None,
                size: None,
                color: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(view.items[0].quantity, 1);
    assert_eq!(view.items[0].line_total, dec!(7.50));
}

#[tokio::test]
async fn add_rejects_bad_quantities_and_missing_products() {
    let app = TestApp::new().await;
    let shopper = app.user("shopper@example.com").await;
    let cap = app.product("CAP", dec!(15.00), 3).await;
    let cart = &app.state.services.cart;

    assert_matches!(
        cart.add_item(shopper.id, line(cap, 0, None)).await,
        Err(ServiceError::InvalidQuantity(_))
    );
    assert_matches!(
        cart.add_item(shopper.id, line(cap, -2, None)).await,
        Err(ServiceError::InvalidQuantity(_))
    );
    assert_matches!(
        cart.add_item(shopper.id, line(cap, 4, None)).await,
        Err(ServiceError::InsufficientStock(_))
    );
    assert_matches!(
        cart.add_item(shopper.id, line(Uuid::new_v4(), 1, None)).await,
        Err(ServiceError::NotFound(_))
    );

    // Merged total is checked against stock as well
    cart.add_item(shopper.id, line(cap, 2, None)).await.unwrap();
    assert_matches!(
        cart.add_item(shopper.id, line(cap, 2, None)).await,
        Err(ServiceError::InsufficientStock(_))
    );
    let view = cart.get_or_create(shopper.id).await.unwrap();
    assert_eq!(view.items[0].quantity, 2);
}

#[tokio::test]
async fn update_quantity_checks_ownership_and_stock() {
    let app = TestApp::new().await;
    let shopper = app.user("shopper@example.com").await;
    let other = app.user("other@example.com").await;
    let sock = app.product("SOCK", dec!(4.00), 6).await;
    let cart = &app.state.services.cart;

    let view = cart.add_item(shopper.id, line(sock, 1, None)).await.unwrap();
    let item_id = view.items[0].id;

    let view = cart.update_quantity(shopper.id, item_id, 4).await.unwrap();
    assert_eq!(view.items[0].quantity, 4);
    assert_eq!(view.subtotal, dec!(16.00));

    assert_matches!(
        cart.update_quantity(shopper.id, item_id, 0).await,
        Err(ServiceError::InvalidQuantity(_))
    );
    assert_matches!(
        cart.update_quantity(shopper.id, item_id, 7).await,
        Err(ServiceError::InsufficientStock(_))
    );
    assert_matches!(
        cart.update_quantity(other.id, item_id, 2).await,
        Err(ServiceError::NotFound(_))
    );
}

#[tokio::test]
async fn update_quantity_reports_deleted_product() {
    let app = TestApp::new().await;
    let shopper = app.user("shopper@example.com").await;
    let gone = app.product("GONE", dec!(9.00), 5).await;
    let cart = &app.state.services.cart;

    let view = cart.add_item(shopper.id, line(gone, 1, None)).await.unwrap();
    app.state.services.catalog.delete_product(gone).await.unwrap();

    let view_after = cart.get_or_create(shopper.id).await.unwrap();
    assert_eq!(view_after.item_count, 1);
    assert!(view_after.items[0].product.is_none());
    assert_eq!(view_after.subtotal, dec!(0));

    assert_matches!(
        cart.update_quantity(shopper.id, view.items[0].id, 2).await,
        Err(ServiceError::ProductNotFound(id)) if id == gone
    );
}

#[tokio::test]
async fn remove_and_clear_are_idempotent() {
    let app = TestApp::new().await;
    let shopper = app.user("shopper@example.com").await;
    let pen = app.product("PEN", dec!(2.00), 20).await;
    let pad = app.product("PAD", dec!(3.00), 20).await;
    let cart = &app.state.services.cart;

    cart.add_item(shopper.id, line(pen, 2, None)).await.unwrap();
    let view = cart.add_item(shopper.id, line(pad, 1, None)).await.unwrap();
    let pen_line = view
        .items
        .iter()
        .find(|l| l.product_id == pen)
        .map(|l| l.id)
        .unwrap();

    let view = cart.remove_item(shopper.id, pen_line).await.unwrap();
    assert_eq!(view.item_count, 1);
    let view = cart.remove_item(shopper.id, pen_line).await.unwrap();
    assert_eq!(view.item_count, 1);
    assert_eq!(view.subtotal, dec!(3.00));

    let view = cart.clear(shopper.id).await.unwrap();
    assert!(view.items.is_empty());
    let view = cart.clear(shopper.id).await.unwrap();
    assert!(view.items.is_empty());
}

#[tokio::test]
async fn subtotal_tracks_current_prices() {
    let app = TestApp::new().await;
    let shopper = app.user("shopper@example.com").await;
    let lamp = app.product("LAMP", dec!(20.00), 5).await;
    let cart = &app.state.services.cart;

    cart.add_item(shopper.id, line(lamp, 2, None)).await.unwrap();
    app.state
        .services
        .catalog
        .update_product(
            lamp,
            ProductUpdate {
                price: Some(dec!(18.50)),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let view = cart.get_or_create(shopper.id).await.unwrap();
    assert_eq!(view.subtotal, dec!(37.00));
}

#[tokio::test]
async fn merging_beyond_the_quantity_range_is_invalid() {
    let app = TestApp::new().await;
    let shopper = app.user("shopper@example.com").await;
    let bolts = app.product("BOLTS", dec!(0.01), i32::MAX).await;
    let cart = &app.state.services.cart;

    cart.add_item(shopper.id, line(bolts, i32::MAX - 1, None))
        .await
        .unwrap();
    let err = cart
        .add_item(shopper.id, line(bolts, 2, None))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidQuantity(_));

    let view = cart.get_or_create(shopper.id).await.unwrap();
    assert_eq!(view.items[0].quantity, i32::MAX - 1);
}

#[tokio::test]
async fn cart_insert_failures_other_than_races_surface() {
    let app = TestApp::new().await;

    // No such user: the foreign key rejects the cart row.
    let err = app
        .state
        .services
        .cart
        .get_or_create(Uuid::new_v4())
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::DatabaseError(_));
}
