mod common;

use std::str::FromStr;

use axum::http::{Method, StatusCode};
use common::{response_json, TestApp, PASSWORD};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{json, Value};

fn decimal(value: &Value) -> Decimal {
    match value {
        Value::String(s) => Decimal::from_str(s).expect("decimal string"),
        Value::Number(n) => Decimal::from_str(&n.to_string()).expect("decimal number"),
        other => panic!("not a decimal: {other}"),
    }
}

#[tokio::test]
async fn register_login_me_logout() {
    let app = TestApp::new().await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/auth/register",
            Some(json!({
                "email": "New.User@Example.com",
                "password": PASSWORD,
                "name": "New User"
            })),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = response_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["email"], "new.user@example.com");
    assert_eq!(body["data"]["role"], "USER");
    assert!(body["data"].get("password_hash").is_none());

    let duplicate = app
        .request(
            Method::POST,
            "/api/v1/auth/register",
            Some(json!({ "email": "new.user@example.com", "password": PASSWORD })),
            None,
        )
        .await;
    assert_eq!(duplicate.status(), StatusCode::CONFLICT);

    let wrong = app
        .request(
            Method::POST,
            "/api/v1/auth/login",
            Some(json!({ "email": "new.user@example.com", "password": "not-the-password" })),
            None,
        )
        .await;
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);

    let login = app
        .request(
            Method::POST,
            "/api/v1/auth/login",
            Some(json!({ "email": "new.user@example.com", "password": PASSWORD })),
            None,
        )
        .await;
    assert_eq!(login.status(), StatusCode::OK);
    let body = response_json(login).await;
    let token = body["data"]["token"].as_str().expect("token").to_string();

    let me = app
        .request(Method::GET, "/api/v1/auth/me", None, Some(&token))
        .await;
    assert_eq!(me.status(), StatusCode::OK);
    let body = response_json(me).await;
    assert_eq!(body["data"]["name"], "New User");

    let logout = app
        .request(Method::POST, "/api/v1/auth/logout", None, Some(&token))
        .await;
    assert_eq!(logout.status(), StatusCode::OK);

    let after = app
        .request(Method::GET, "/api/v1/auth/me", None, Some(&token))
        .await;
    assert_eq!(after.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn protected_routes_require_a_token_and_admin_routes_a_role() {
    let app = TestApp::new().await;
    let customer = app.user("customer@example.com").await;
    let admin = app.admin().await;

    let anonymous = app.request(Method::GET, "/api/v1/cart", None, None).await;
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);
    let body = response_json(anonymous).await;
    assert_eq!(body["error"], "Unauthorized");

    let bogus = app
        .request(Method::GET, "/api/v1/orders", None, Some("not-a-real-token"))
        .await;
    assert_eq!(bogus.status(), StatusCode::UNAUTHORIZED);

    let forbidden = app
        .request(Method::GET, "/api/v1/admin/orders", None, Some(&customer.token))
        .await;
    assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);

    let allowed = app
        .request(Method::GET, "/api/v1/admin/orders/stats", None, Some(&admin.token))
        .await;
    assert_eq!(allowed.status(), StatusCode::OK);
    let body = response_json(allowed).await;
    assert_eq!(body["data"]["total"], 0);
}

#[tokio::test]
async fn storefront_catalog_is_public() {
    let app = TestApp::new().await;
    let product = app.product("PUBLIC-1", dec!(19.99), 4).await;

    let list = app
        .request(Method::GET, "/api/v1/products?page=1&limit=5", None, None)
        .await;
    assert_eq!(list.status(), StatusCode::OK);
    let body = response_json(list).await;
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["limit"], 5);
    assert_eq!(body["data"]["items"][0]["id"], product.to_string());

    let single = app
        .request(Method::GET, &format!("/api/v1/products/{}", product), None, None)
        .await;
    assert_eq!(single.status(), StatusCode::OK);
    let body = response_json(single).await;
    assert_eq!(decimal(&body["data"]["price"]), dec!(19.99));

    let categories = app.request(Method::GET, "/api/v1/categories", None, None).await;
    assert_eq!(categories.status(), StatusCode::OK);

    let missing = app
        .request(
            Method::GET,
            "/api/v1/products/00000000-0000-0000-0000-000000000000",
            None,
            None,
        )
        .await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn checkout_over_http() {
    let app = TestApp::new().await;
    let buyer = app.user("buyer@example.com").await;
    let admin = app.admin().await;
    let product = app.product("HTTP-1", dec!(30.00), 5).await;

    let address = app
        .request(
            Method::POST,
            "/api/v1/addresses",
            Some(json!({
                "name": "Buyer",
                "phone": "555-0101",
                "street": "1 Market St",
                "city": "Springfield",
                "state": "IL",
                "zip_code": "62701"
            })),
            Some(&buyer.token),
        )
        .await;
    assert_eq!(address.status(), StatusCode::CREATED);
    let address = response_json(address).await;
    assert_eq!(address["data"]["is_default"], true);
    assert_eq!(address["data"]["country"], "USA");
    let address_id = address["data"]["id"].as_str().unwrap().to_string();

    let empty = app
        .request(
            Method::POST,
            "/api/v1/orders",
            Some(json!({ "address_id": address_id })),
            Some(&buyer.token),
        )
        .await;
    assert_eq!(empty.status(), StatusCode::BAD_REQUEST);

    let cart = app
        .request(
            Method::POST,
            "/api/v1/cart/items",
            Some(json!({ "product_id": product, "quantity": 2 })),
            Some(&buyer.token),
        )
        .await;
    assert_eq!(cart.status(), StatusCode::OK);
    let cart = response_json(cart).await;
    assert_eq!(decimal(&cart["data"]["subtotal"]), dec!(60.00));

    let too_many = app
        .request(
            Method::POST,
            "/api/v1/cart/items",
            Some(json!({ "product_id": product, "quantity": 10 })),
            Some(&buyer.token),
        )
        .await;
    assert_eq!(too_many.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let placed = app
        .request(
            Method::POST,
            "/api/v1/orders",
            Some(json!({ "address_id": address_id, "payment_method": "card" })),
            Some(&buyer.token),
        )
        .await;
    assert_eq!(placed.status(), StatusCode::CREATED);
    let placed = response_json(placed).await;
    let order = &placed["data"];
    assert_eq!(order["status"], "PENDING");
    assert_eq!(order["payment_status"], "PENDING");
    assert_eq!(decimal(&order["subtotal"]), dec!(60.00));
    assert_eq!(decimal(&order["shipping_cost"]), dec!(9.99));
    assert_eq!(decimal(&order["tax"]), dec!(6.00));
    assert_eq!(decimal(&order["total"]), dec!(75.99));
    let order_id = order["id"].as_str().unwrap().to_string();
    assert_eq!(app.stock_of(product).await, 3);

    let mine = app
        .request(Method::GET, "/api/v1/orders", None, Some(&buyer.token))
        .await;
    let mine = response_json(mine).await;
    assert_eq!(mine["data"]["total"], 1);

    let shipped = app
        .request(
            Method::PUT,
            &format!("/api/v1/admin/orders/{}/status", order_id),
            Some(json!({ "status": "shipped" })),
            Some(&admin.token),
        )
        .await;
    assert_eq!(shipped.status(), StatusCode::OK);

    let cancel = app
        .request(
            Method::POST,
            &format!("/api/v1/orders/{}/cancel", order_id),
            None,
            Some(&buyer.token),
        )
        .await;
    assert_eq!(cancel.status(), StatusCode::CONFLICT);
    assert_eq!(app.stock_of(product).await, 3);

    let bad_status = app
        .request(
            Method::PUT,
            &format!("/api/v1/admin/orders/{}/status", order_id),
            Some(json!({ "status": "teleported" })),
            Some(&admin.token),
        )
        .await;
    assert_eq!(bad_status.status(), StatusCode::BAD_REQUEST);

    let paid = app
        .request(
            Method::PUT,
            &format!("/api/v1/admin/orders/{}/payment-status", order_id),
            Some(json!({ "payment_status": "PAID" })),
            Some(&admin.token),
        )
        .await;
    assert_eq!(paid.status(), StatusCode::OK);
    let paid = response_json(paid).await;
    assert_eq!(paid["data"]["payment_status"], "PAID");
}

#[tokio::test]
async fn responses_carry_request_ids() {
    let app = TestApp::new().await;
    let user = app.user("trace@example.com").await;

    let response = app
        .request(Method::GET, "/api/v1/cart", None, Some(&user.token))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let header = response
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .expect("x-request-id header");
    let body = response_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["meta"]["request_id"], header.as_str());

    let failure = app.request(Method::GET, "/api/v1/orders", None, None).await;
    let header = failure
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .expect("x-request-id header");
    let body = response_json(failure).await;
    assert_eq!(body["request_id"], header.as_str());
}

#[tokio::test]
async fn health_reports_database_status() {
    let app = TestApp::new().await;

    let response = app.request(Method::GET, "/health", None, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["status"], "up");
    assert_eq!(body["details"]["database"]["status"], "up");

    let live = app.request(Method::GET, "/health/live", None, None).await;
    assert_eq!(live.status(), StatusCode::OK);
    let ready = app.request(Method::GET, "/health/ready", None, None).await;
    assert_eq!(ready.status(), StatusCode::OK);
}

#[tokio::test]
async fn account_and_user_admin_routes() {
    let app = TestApp::new().await;
    let admin = app.admin().await;
    let shopper = app.user("shopper@example.com").await;

    let profile = app
        .request(
            Method::PUT,
            "/api/v1/auth/profile",
            Some(json!({ "name": "Sam Shopper" })),
            Some(&shopper.token),
        )
        .await;
    assert_eq!(profile.status(), StatusCode::OK);
    let body = response_json(profile).await;
    assert_eq!(body["data"]["name"], "Sam Shopper");

    let changed = app
        .request(
            Method::POST,
            "/api/v1/auth/change-password",
            Some(json!({ "current_password": PASSWORD, "new_password": "another-long-secret" })),
            Some(&shopper.token),
        )
        .await;
    assert_eq!(changed.status(), StatusCode::OK);
    let body = response_json(changed).await;
    let new_token = body["data"]["token"].as_str().expect("token").to_string();

    let stale = app
        .request(Method::GET, "/api/v1/auth/me", None, Some(&shopper.token))
        .await;
    assert_eq!(stale.status(), StatusCode::UNAUTHORIZED);

    let forbidden = app
        .request(Method::GET, "/api/v1/admin/users", None, Some(&new_token))
        .await;
    assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);

    let listed = app
        .request(
            Method::GET,
            "/api/v1/admin/users?role=user&search=shopper",
            None,
            Some(&admin.token),
        )
        .await;
    assert_eq!(listed.status(), StatusCode::OK);
    let body = response_json(listed).await;
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["items"][0]["email"], "shopper@example.com");

    let bad_role = app
        .request(Method::GET, "/api/v1/admin/users?role=owner", None, Some(&admin.token))
        .await;
    assert_eq!(bad_role.status(), StatusCode::BAD_REQUEST);

    let deactivated = app
        .request(
            Method::PUT,
            &format!("/api/v1/admin/users/{}", shopper.id),
            Some(json!({ "is_active": false })),
            Some(&admin.token),
        )
        .await;
    assert_eq!(deactivated.status(), StatusCode::OK);
    let body = response_json(deactivated).await;
    assert_eq!(body["data"]["is_active"], false);

    let deleted = app
        .request(
            Method::DELETE,
            &format!("/api/v1/admin/users/{}", shopper.id),
            None,
            Some(&admin.token),
        )
        .await;
    assert_eq!(deleted.status(), StatusCode::OK);

    let gone = app
        .request(
            Method::DELETE,
            &format!("/api/v1/admin/users/{}", shopper.id),
            None,
            Some(&admin.token),
        )
        .await;
    assert_eq!(gone.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn product_list_accepts_size_and_color_lists() {
    let app = TestApp::new().await;
    // Seeded products offer sizes S and M with no colors.
    let tee = app.product("TEE-SM", dec!(15.00), 5).await;

    let matched = app
        .request(Method::GET, "/api/v1/products?sizes=XL,%20M", None, None)
        .await;
    assert_eq!(matched.status(), StatusCode::OK);
    let body = response_json(matched).await;
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["items"][0]["id"], tee.to_string());

    let none = app
        .request(Method::GET, "/api/v1/products?colors=red", None, None)
        .await;
    let body = response_json(none).await;
    assert_eq!(body["data"]["total"], 0);
}
