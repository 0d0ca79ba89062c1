#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request},
    response::Response,
    Router,
};
use rust_decimal::Decimal;
use sea_orm::{DatabaseConnection, EntityTrait};
use serde_json::Value;
use storefront_api::{
    auth::{AuthUser, LoginInput, RegisterInput},
    build_router,
    config::AppConfig,
    db,
    entities::{commerce::Product, UserRole},
    services::commerce::{AddCartItemInput, AddressInput, AddressView, CategoryInput, ProductInput},
    AppState,
};
use tempfile::TempDir;
use tower::ServiceExt;
use uuid::Uuid;

pub const PASSWORD: &str = "correct-horse-battery";

/// A registered account together with a live bearer token.
#[derive(Debug, Clone)]
pub struct TestUser {
    pub id: Uuid,
    pub email: String,
    pub token: String,
    pub auth: AuthUser,
}

/// Application harness backed by a throwaway SQLite file.
///
/// The pool holds a single connection unless a test raises
/// `db_max_connections` through [`TestApp::with_config`].
pub struct TestApp {
    router: Router,
    pub state: AppState,
    _dir: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    pub async fn with_config(tweak: impl FnOnce(&mut AppConfig)) -> Self {
        let dir = tempfile::tempdir().expect("create temp dir for test database");
        let path = dir.path().join("storefront_test.db");

        let mut cfg = AppConfig::new(
            format!("sqlite://{}?mode=rwc", path.display()),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.cors_allow_any_origin = true;
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;
        tweak(&mut cfg);

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let state = AppState::new(Arc::new(pool), cfg);
        let router = build_router(state.clone());

        Self {
            router,
            state,
            _dir: dir,
        }
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.state.db
    }

    /// Registers and logs in a customer.
    pub async fn user(&self, email: &str) -> TestUser {
        self.account(email, UserRole::User).await
    }

    /// Registers and logs in an administrator.
    pub async fn admin(&self) -> TestUser {
        self.account("admin@example.com", UserRole::Admin).await
    }

    async fn account(&self, email: &str, role: UserRole) -> TestUser {
        let auth = &self.state.services.auth;
        let created = auth
            .create_user(
                RegisterInput {
                    email: email.to_string(),
                    password: PASSWORD.to_string(),
                    name: Some(format!("Test {}", email)),
                    phone: None,
                },
                role,
            )
            .await
            .expect("seed user");
        let session = auth
            .login(LoginInput {
                email: email.to_string(),
                password: PASSWORD.to_string(),
            })
            .await
            .expect("seed login");

        TestUser {
            id: created.id,
            email: created.email,
            token: session.token,
            auth: AuthUser {
                id: created.id,
                role,
            },
        }
    }

    pub async fn category(&self, name: &str) -> Uuid {
        self.state
            .services
            .catalog
            .create_category(CategoryInput {
                name: name.to_string(),
                description: None,
                image: None,
                is_active: None,
            })
            .await
            .expect("seed category")
            .id
    }

    /// Seeds an active product in a fresh category.
    pub async fn product(&self, sku: &str, price: Decimal, stock: i32) -> Uuid {
        let category_id = self.category(&format!("Category {}", sku)).await;
        self.product_in(category_id, sku, price, stock).await
    }

    pub async fn product_in(&self, category_id: Uuid, sku: &str, price: Decimal, stock: i32) -> Uuid {
        self.state
            .services
            .catalog
            .create_product(ProductInput {
                name: format!("Product {}", sku),
                description: Some(format!("Seeded product {}", sku)),
                price,
                compare_price: None,
                sku: sku.to_string(),
                stock: Some(stock),
                images: Vec::new(),
                sizes: vec!["S".to_string(), "M".to_string()],
                colors: Vec::new(),
                category_id,
                is_active: Some(true),
                is_featured: Some(false),
            })
            .await
            .expect("seed product")
            .id
    }

    pub async fn address(&self, user_id: Uuid, label: &str) -> AddressView {
        self.state
            .services
            .addresses
            .create(user_id, address_input(label))
            .await
            .expect("seed address")
    }

    pub async fn add_to_cart(&self, user_id: Uuid, product_id: Uuid, quantity: i32) {
        self.state
            .services
            .cart
            .add_item(
                user_id,
                AddCartItemInput {
                    product_id,
                    quantity: Some(quantity),
                    size: None,
                    color: None,
                },
            )
            .await
            .expect("seed cart line");
    }

    pub async fn stock_of(&self, product_id: Uuid) -> i32 {
        Product::find_by_id(product_id)
            .one(self.db())
            .await
            .expect("load product")
            .expect("product exists")
            .stock
    }

    /// Send a request against the router with an optional bearer token.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }
}

pub fn address_input(label: &str) -> AddressInput {
    AddressInput {
        name: format!("{} Recipient", label),
        phone: "555-0100".to_string(),
        street: format!("{} Main St", label),
        city: "Springfield".to_string(),
        state: "IL".to_string(),
        zip_code: "62701".to_string(),
        country: None,
        is_default: false,
    }
}

pub async fn response_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read response body");
    serde_json::from_slice(&bytes).expect("response body is json")
}
